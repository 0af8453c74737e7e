use crate::domain;
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::driving_ports::TaskError;
use crate::external_connections::{
    ExternalConnectivity, TransactableExternalConnectivity, TransactionHandle,
};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use thiserror::Error;
use tracing::{debug, info};
use validator::ValidationErrors;

/// The board column a task sits in. Declaration order is board order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TaskStatus {
    #[default]
    #[display("backlog")]
    Backlog,
    #[display("in_progress")]
    InProgress,
    #[display("done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Backlog, Self::InProgress, Self::Done];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl TryFrom<&str> for TaskStatus {
    type Error = UnknownVariant;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "backlog" => Ok(Self::Backlog),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(UnknownVariant {
                kind: "task status",
                value: value.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    #[display("low")]
    Low,
    #[default]
    #[display("med")]
    Med,
    #[display("high")]
    High,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }
}

impl TryFrom<&str> for Priority {
    type Error = UnknownVariant;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(Self::Low),
            "med" => Ok(Self::Med),
            "high" => Ok(Self::High),
            _ => Err(UnknownVariant {
                kind: "priority",
                value: value.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub label: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i32,
    pub owner_user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub order: i32,
    pub tags: Vec<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub percent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Progress shown to the user. A non-empty checklist always wins over the stored percent.
    pub fn progress(&self) -> i32 {
        self.checklist
            .as_deref()
            .and_then(checklist_progress)
            .unwrap_or_else(|| clamp_percent(self.percent))
    }

    /// The UTC calendar days this task covers, inclusive. A task with only one of its dates
    /// set covers just that day; a task with neither isn't on the calendar at all.
    pub fn schedule_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start_at.or(self.due_at)?;
        let end = self.due_at.or(self.start_at)?;

        Some((start.date_naive(), end.date_naive()))
    }
}

pub fn clamp_percent(percent: i32) -> i32 {
    percent.clamp(0, 100)
}

/// round(100 * checked / total), halves rounding up. None for an empty checklist.
pub fn checklist_progress(items: &[ChecklistItem]) -> Option<i32> {
    if items.is_empty() {
        return None;
    }

    let total = items.len() as i64;
    let checked = items.iter().filter(|item| item.checked).count() as i64;
    Some(((200 * checked + total) / (2 * total)) as i32)
}

/// Trims tags, drops blank ones and removes duplicates while keeping first-seen order
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || normalized.iter().any(|seen| seen == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_owned());
    }

    normalized
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn normalize_checklist(checklist: Option<Vec<ChecklistItem>>) -> Option<Vec<ChecklistItem>> {
    checklist
        .map(|items| {
            items
                .into_iter()
                .map(|item| ChecklistItem {
                    label: item.label.trim().to_owned(),
                    checked: item.checked,
                })
                .collect::<Vec<_>>()
        })
        .filter(|items| !items.is_empty())
}

fn check_schedule(
    start_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
) -> Result<(), ValidationErrors> {
    match (start_at, due_at) {
        (Some(start), Some(due)) if start > due => Err(domain::field_error(
            "due_at",
            "schedule_order",
            "due_at must not be earlier than start_at",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub percent: i32,
}

impl NewTask {
    fn normalized(self) -> NewTask {
        NewTask {
            title: self.title.trim().to_owned(),
            description: normalize_description(self.description),
            tags: normalize_tags(self.tags),
            checklist: normalize_checklist(self.checklist),
            percent: clamp_percent(self.percent),
            ..self
        }
    }
}

/// A partial task update. `None` leaves a field alone; for the clearable fields
/// `Some(None)` removes the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub start_at: Option<Option<DateTime<Utc>>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub checklist: Option<Option<Vec<ChecklistItem>>>,
    pub percent: Option<i32>,
}

impl TaskUpdate {
    /// Applies everything except the status change, which needs column bookkeeping
    fn apply_content(&self, task: &mut Task) -> Result<(), ValidationErrors> {
        if let Some(title) = &self.title {
            task.title = title.trim().to_owned();
        }
        if let Some(description) = &self.description {
            task.description = normalize_description(description.clone());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(tags) = &self.tags {
            task.tags = normalize_tags(tags.clone());
        }
        if let Some(start_at) = self.start_at {
            task.start_at = start_at;
        }
        if let Some(due_at) = self.due_at {
            task.due_at = due_at;
        }
        if let Some(checklist) = &self.checklist {
            task.checklist = normalize_checklist(checklist.clone());
        }
        if let Some(percent) = self.percent {
            task.percent = clamp_percent(percent);
        }

        check_schedule(task.start_at, task.due_at)
    }
}

/// Inclusive range of calendar days. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(domain::field_error(
                "to",
                "range_order",
                "to must not be earlier than from",
            )),
            _ => Ok(()),
        }
    }

    /// Whether a task's schedule overlaps this window. Unscheduled tasks only match an
    /// unbounded window.
    pub fn overlaps(&self, task: &Task) -> bool {
        let Some((start, end)) = task.schedule_span() else {
            return self.is_unbounded();
        };

        self.from.is_none_or(|from| end >= from) && self.to.is_none_or(|to| start <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub search: Option<String>,
    pub window: DateWindow,
}

impl TaskFilter {
    pub fn for_column(status: TaskStatus) -> TaskFilter {
        TaskFilter {
            status: Some(status),
            ..TaskFilter::default()
        }
    }

    /// Trims the search text, dropping it entirely if nothing is left
    pub fn normalized(self) -> TaskFilter {
        TaskFilter {
            search: self
                .search
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
            ..self
        }
    }

    /// Reference semantics for the filter. Driven adapters must return exactly the tasks
    /// for which this is true.
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| status != task.status) {
            return false;
        }

        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_ref()
                .is_some_and(|text| text.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }

        self.window.overlaps(task)
    }
}

/// Where a task lives on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPlacement {
    pub task_id: i32,
    pub status: TaskStatus,
    pub order: i32,
}

/// Target of a drag-and-drop. Positions past the end of the column append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDestination {
    pub status: TaskStatus,
    pub position: usize,
}

/// Placements that number `column` contiguously from zero in its current sequence, skipping
/// tasks already in the right spot
fn renumber<'task>(
    status: TaskStatus,
    column: impl IntoIterator<Item = &'task Task>,
) -> Vec<TaskPlacement> {
    column
        .into_iter()
        .enumerate()
        .filter_map(|(index, task)| {
            let order = index as i32;
            if task.order == order && task.status == status {
                None
            } else {
                Some(TaskPlacement {
                    task_id: task.id,
                    status,
                    order,
                })
            }
        })
        .collect()
}

/// Works out the placements for dragging `task` into `destination`. `source` is the task's
/// current column and `target` the destination column, both sorted by order; when the task
/// stays in its column the two are the same slice.
pub fn plan_move(
    task: &Task,
    source: &[Task],
    target: &[Task],
    destination: TaskDestination,
) -> Vec<TaskPlacement> {
    let mut target_column: Vec<&Task> = target.iter().filter(|other| other.id != task.id).collect();
    let position = destination.position.min(target_column.len());
    target_column.insert(position, task);

    let mut placements = renumber(destination.status, target_column);
    if task.status != destination.status {
        placements.extend(renumber(
            task.status,
            source.iter().filter(|other| other.id != task.id),
        ));
    }

    placements
}

/// A user's tasks grouped into board columns, each sorted by order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub backlog: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl Board {
    pub fn from_tasks(tasks: Vec<Task>) -> Board {
        let mut board = Board::default();
        for task in tasks {
            match task.status {
                TaskStatus::Backlog => board.backlog.push(task),
                TaskStatus::InProgress => board.in_progress.push(task),
                TaskStatus::Done => board.done.push(task),
            }
        }
        for column in [&mut board.backlog, &mut board.in_progress, &mut board.done] {
            column.sort_by_key(|task| (task.order, task.id));
        }

        board
    }
}

pub mod driven_ports {
    use super::*;

    pub trait TaskReader: Sync {
        /// Tasks owned by the user matching the filter, sorted by status then order
        async fn tasks_for_user(
            &self,
            user_id: i32,
            filter: &TaskFilter,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<Task>, anyhow::Error>;

        async fn user_task_by_id(
            &self,
            user_id: i32,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Task>, anyhow::Error>;
    }

    pub trait TaskWriter: Sync {
        async fn create_task_for_user(
            &self,
            user_id: i32,
            order: i32,
            new_task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Task, anyhow::Error>;

        /// Persists every field of the task, including its placement
        async fn save_task(
            &self,
            task: &Task,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn set_placements(
            &self,
            user_id: i32,
            placements: &[TaskPlacement],
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        /// Returns whether a task was actually removed
        async fn delete_task(
            &self,
            user_id: i32,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum TaskError {
        #[error("the requested task does not exist")]
        TaskNotFound,
        #[error("checklist item {0} does not exist")]
        ChecklistItemNotFound(usize),
        #[error("task data was invalid: {0}")]
        Invalid(ValidationErrors),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl From<ValidationErrors> for TaskError {
        fn from(value: ValidationErrors) -> Self {
            Self::Invalid(value)
        }
    }


    pub trait TaskPort {
        async fn list_tasks(
            &self,
            user_id: i32,
            filter: &TaskFilter,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Vec<Task>, TaskError>;

        async fn board(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Board, TaskError>;

        async fn task_by_id(
            &self,
            user_id: i32,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Task, TaskError>;

        async fn create_task(
            &self,
            user_id: i32,
            new_task: NewTask,
            ext_cxn: &mut impl TransactableExternalConnectivity,
            task_read: &impl TaskReader,
            task_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;

        async fn update_task(
            &self,
            user_id: i32,
            task_id: i32,
            update: &TaskUpdate,
            ext_cxn: &mut impl TransactableExternalConnectivity,
            task_read: &impl TaskReader,
            task_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;

        async fn toggle_checklist_item(
            &self,
            user_id: i32,
            task_id: i32,
            item_index: usize,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
            task_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;

        async fn move_task(
            &self,
            user_id: i32,
            task_id: i32,
            destination: TaskDestination,
            ext_cxn: &mut impl TransactableExternalConnectivity,
            task_read: &impl TaskReader,
            task_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;

        async fn delete_task(
            &self,
            user_id: i32,
            task_id: i32,
            ext_cxn: &mut impl TransactableExternalConnectivity,
            task_read: &impl TaskReader,
            task_write: &impl TaskWriter,
        ) -> Result<(), TaskError>;
    }
}

pub struct TaskService {}

async fn find_owned_task(
    user_id: i32,
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_read: &impl TaskReader,
) -> Result<Task, TaskError> {
    task_read
        .user_task_by_id(user_id, task_id, ext_cxn)
        .await
        .context("looking up a task")?
        .ok_or(TaskError::TaskNotFound)
}

impl driving_ports::TaskPort for TaskService {
    async fn list_tasks(
        &self,
        user_id: i32,
        filter: &TaskFilter,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Vec<Task>, TaskError> {
        filter.window.validate()?;
        let tasks = task_read
            .tasks_for_user(user_id, filter, ext_cxn)
            .await
            .context("listing tasks")?;

        Ok(tasks)
    }

    async fn board(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Board, TaskError> {
        let tasks = task_read
            .tasks_for_user(user_id, &TaskFilter::default(), ext_cxn)
            .await
            .context("loading the board")?;

        Ok(Board::from_tasks(tasks))
    }

    async fn task_by_id(
        &self,
        user_id: i32,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Task, TaskError> {
        find_owned_task(user_id, task_id, ext_cxn, task_read).await
    }

    async fn create_task(
        &self,
        user_id: i32,
        new_task: NewTask,
        ext_cxn: &mut impl TransactableExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let new_task = new_task.normalized();
        check_schedule(new_task.start_at, new_task.due_at)?;

        let mut txn = ext_cxn
            .start_transaction()
            .await
            .context("starting task creation")?;
        let column = task_read
            .tasks_for_user(user_id, &TaskFilter::for_column(new_task.status), &mut txn)
            .await
            .context("reading the destination column")?;
        let order = column.iter().map(|task| task.order).max().map_or(0, |max| max + 1);

        let created = task_write
            .create_task_for_user(user_id, order, &new_task, &mut txn)
            .await
            .context("inserting a task")?;
        txn.commit().await.context("committing task creation")?;

        info!(task_id = created.id, status = %created.status, order, "created task");
        Ok(created)
    }

    async fn update_task(
        &self,
        user_id: i32,
        task_id: i32,
        update: &TaskUpdate,
        ext_cxn: &mut impl TransactableExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let mut txn = ext_cxn
            .start_transaction()
            .await
            .context("starting task update")?;
        let mut task = find_owned_task(user_id, task_id, &mut txn, task_read).await?;
        update.apply_content(&mut task)?;
        task.updated_at = Utc::now();

        let previous_status = task.status;
        let changing_column = update
            .status
            .is_some_and(|status| status != previous_status);
        if let Some(status) = update.status.filter(|_| changing_column) {
            let target = task_read
                .tasks_for_user(user_id, &TaskFilter::for_column(status), &mut txn)
                .await
                .context("reading the destination column")?;
            task.status = status;
            task.order = target.iter().map(|other| other.order).max().map_or(0, |max| max + 1);
        }

        task_write
            .save_task(&task, &mut txn)
            .await
            .context("saving task changes")?;

        if changing_column {
            let source = task_read
                .tasks_for_user(user_id, &TaskFilter::for_column(previous_status), &mut txn)
                .await
                .context("reading the column a task left")?;
            let compaction = renumber(previous_status, &source);
            task_write
                .set_placements(user_id, &compaction, &mut txn)
                .await
                .context("compacting the column a task left")?;
        }

        txn.commit().await.context("committing task update")?;
        Ok(task)
    }

    async fn toggle_checklist_item(
        &self,
        user_id: i32,
        task_id: i32,
        item_index: usize,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let mut task = find_owned_task(user_id, task_id, &mut *ext_cxn, task_read).await?;
        let item = task
            .checklist
            .as_mut()
            .and_then(|items| items.get_mut(item_index))
            .ok_or(TaskError::ChecklistItemNotFound(item_index))?;
        item.checked = !item.checked;
        task.updated_at = Utc::now();

        task_write
            .save_task(&task, &mut *ext_cxn)
            .await
            .context("saving a checklist toggle")?;

        debug!(task_id, item_index, progress = task.progress(), "toggled checklist item");
        Ok(task)
    }

    async fn move_task(
        &self,
        user_id: i32,
        task_id: i32,
        destination: TaskDestination,
        ext_cxn: &mut impl TransactableExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let mut txn = ext_cxn
            .start_transaction()
            .await
            .context("starting task move")?;
        let task = find_owned_task(user_id, task_id, &mut txn, task_read).await?;

        let source = task_read
            .tasks_for_user(user_id, &TaskFilter::for_column(task.status), &mut txn)
            .await
            .context("reading the source column")?;
        let placements = if destination.status == task.status {
            plan_move(&task, &source, &source, destination)
        } else {
            let target = task_read
                .tasks_for_user(user_id, &TaskFilter::for_column(destination.status), &mut txn)
                .await
                .context("reading the destination column")?;
            plan_move(&task, &source, &target, destination)
        };

        task_write
            .set_placements(user_id, &placements, &mut txn)
            .await
            .context("writing new task placements")?;
        let moved = find_owned_task(user_id, task_id, &mut txn, task_read).await?;
        txn.commit().await.context("committing task move")?;

        info!(
            task_id,
            status = %moved.status,
            order = moved.order,
            placements = placements.len(),
            "moved task"
        );
        Ok(moved)
    }

    async fn delete_task(
        &self,
        user_id: i32,
        task_id: i32,
        ext_cxn: &mut impl TransactableExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        let mut txn = ext_cxn
            .start_transaction()
            .await
            .context("starting task deletion")?;
        let task = find_owned_task(user_id, task_id, &mut txn, task_read).await?;

        let removed = task_write
            .delete_task(user_id, task_id, &mut txn)
            .await
            .context("deleting a task")?;
        if !removed {
            return Err(TaskError::TaskNotFound);
        }

        let column = task_read
            .tasks_for_user(user_id, &TaskFilter::for_column(task.status), &mut txn)
            .await
            .context("reading the column a task was deleted from")?;
        task_write
            .set_placements(user_id, &renumber(task.status, &column), &mut txn)
            .await
            .context("compacting the column a task was deleted from")?;
        txn.commit().await.context("committing task deletion")?;

        info!(task_id, "deleted task");
        Ok(())
    }
}
