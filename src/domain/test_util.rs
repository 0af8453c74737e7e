use anyhow::anyhow;

/// Whether an in-memory driven port should behave as if its backing store is reachable.
/// Lets service tests exercise the "database went away" path without a database.
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    /// Return an error if the port is configured as disconnected
    pub fn blow_up_if_disconnected(&self) -> Result<(), anyhow::Error> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(anyhow!("could not reach the task store!")),
        }
    }
}

/// Records the arguments of every call to a mocked async function and hands back a
/// preconfigured return value. Mocking crates don't cope well with `async fn` in traits,
/// so driving-port mocks are written by hand on top of this.
///
/// * `Args` is whatever should be captured per call (use a tuple for several arguments)
/// * `Ret` is the mocked function's return type
///
/// # Example
///
/// ```ignore
/// struct MockTaskService {
///     delete_task_result: FakeImplementation<(i32, i32), Result<(), TaskError>>,
/// }
///
/// impl TaskPort for Mutex<MockTaskService> {
///     async fn delete_task(&self, user_id: i32, task_id: i32, /* ports */) -> Result<(), TaskError> {
///         let mut locked_self = self.lock().expect("mock task service mutex poisoned");
///         locked_self.delete_task_result.save_arguments((user_id, task_id));
///         locked_self.delete_task_result.return_value_result()
///     }
/// }
/// ```
pub struct FakeImplementation<Args, Ret> {
    saved_arguments: Vec<Args>,
    return_value: Option<Ret>,
}

impl<Args, Ret> FakeImplementation<Args, Ret> {
    pub fn new() -> FakeImplementation<Args, Ret> {
        FakeImplementation {
            saved_arguments: Vec::new(),
            return_value: None,
        }
    }

    /// Saves arguments from a single invocation
    pub fn save_arguments(&mut self, arguments: Args) {
        self.saved_arguments.push(arguments)
    }

    /// Every set of arguments this fake has been invoked with, oldest first
    pub fn calls(&self) -> &[Args] {
        self.saved_arguments.as_slice()
    }
}

impl<Args, Success, Fail> FakeImplementation<Args, Result<Success, Fail>>
where
    Success: Clone,
    Fail: Clone,
{
    /// Configure the [Result] to hand back. Both sides must be [Clone] so the fake can be
    /// invoked more than once.
    pub fn set_returned_result(&mut self, return_value: Result<Success, Fail>) {
        self.return_value = Some(return_value);
    }

    pub fn return_value_result(&self) -> Result<Success, Fail> {
        match self.return_value {
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(err.clone()),
            None => panic!("Tried to return from a function where the return value wasn't set!"),
        }
    }
}

impl<Args, Success> FakeImplementation<Args, anyhow::Result<Success>>
where
    Success: Clone,
{
    /// [anyhow::Error] isn't [Clone], so errors are stored by message and rebuilt on every call
    pub fn set_returned_anyhow(&mut self, return_value: anyhow::Result<Success>) {
        match return_value {
            Ok(ok_result) => self.return_value = Some(Ok(ok_result)),
            Err(err) => self.return_value = Some(Err(anyhow!(format!("{}", err)))),
        }
    }

    pub fn return_value_anyhow(&self) -> anyhow::Result<Success> {
        match self.return_value {
            None => panic!("Tried to return from a function where the value wasn't set!"),
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(anyhow!(format!("{}", err))),
        }
    }
}
