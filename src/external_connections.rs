use sqlx::PgConnection;

/// Something holding a live database connection which driven adapters can run queries on
pub trait ConnectionHandle: Send {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

/// Gives driven adapters access to external systems (currently just the database) without
/// the domain knowing whether it's talking to the pool or to an open transaction.
pub trait ExternalConnectivity: Send + Sync {
    type DbHandle<'cxn_borrow>: ConnectionHandle
    where
        Self: 'cxn_borrow;

    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error>;
}

/// A connectivity source that can open a transaction. Work done through the returned handle
/// is only persisted once it's committed.
pub trait Transactable {
    type Handle: ExternalConnectivity + TransactionHandle;

    async fn start_transaction(&self) -> Result<Self::Handle, anyhow::Error>;
}

/// An open transaction
pub trait TransactionHandle {
    async fn commit(self) -> Result<(), anyhow::Error>;
}

/// Shorthand for connectivity that supports both plain queries and transactions
pub trait TransactableExternalConnectivity: ExternalConnectivity + Transactable {}

impl<T> TransactableExternalConnectivity for T where T: ExternalConnectivity + Transactable {}

#[cfg(test)]
pub mod test_util {
    use super::*;
    use anyhow::anyhow;

    /// Stand-in connectivity for tests that use in-memory driven ports. Any attempt to reach
    /// the database through it fails.
    pub struct FakeExternalConnectivity {
        pub is_transacting: bool,
    }

    impl FakeExternalConnectivity {
        pub fn new() -> Self {
            FakeExternalConnectivity {
                is_transacting: false,
            }
        }
    }

    pub struct FakeConnectionHandle;

    impl ConnectionHandle for FakeConnectionHandle {
        fn borrow_connection(&mut self) -> &mut PgConnection {
            unimplemented!("fake connectivity has no database connection")
        }
    }

    impl ExternalConnectivity for FakeExternalConnectivity {
        type DbHandle<'cxn_borrow> = FakeConnectionHandle;

        async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error> {
            Err(anyhow!("fake connectivity cannot connect to a database"))
        }
    }

    impl Transactable for FakeExternalConnectivity {
        type Handle = FakeExternalConnectivity;

        async fn start_transaction(&self) -> Result<Self::Handle, anyhow::Error> {
            Ok(FakeExternalConnectivity {
                is_transacting: true,
            })
        }
    }

    impl TransactionHandle for FakeExternalConnectivity {
        async fn commit(self) -> Result<(), anyhow::Error> {
            if !self.is_transacting {
                return Err(anyhow!("committed outside of a transaction"));
            }

            Ok(())
        }
    }
}
