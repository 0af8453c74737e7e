use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use sqlx::{Connection, PgConnection, PgPool};
use std::env;
use std::future::Future;
use task_board::db;
use tokio::runtime::Runtime;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

/// A throwaway database that's dropped again when the test finishes
struct TestDatabase {
    base_url: String,
    db_name: String,
}

impl TestDatabase {
    async fn create(base_url: &str) -> Result<Self, sqlx::Error> {
        let schema_id: u32 = thread_rng().gen_range(10_000..99_999);
        let db_name = format!("test_db_{schema_id}");
        let mut conn = PgConnection::connect(base_url).await?;

        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        Ok(TestDatabase {
            base_url: base_url.trim_end_matches('/').to_owned(),
            db_name,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.db_name)
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let db_to_drop = self.db_name.clone();
        let conn_str = self.base_url.clone();

        TOKIO_RT.block_on(async move {
            let mut conn = match PgConnection::connect(&conn_str).await {
                Ok(cxn) => cxn,
                Err(conn_err) => {
                    println!("Failed to reconnect to drop test database {db_to_drop}, please remove it manually. Error: {conn_err}");
                    return;
                }
            };

            let drop_result = sqlx::query(&format!("DROP DATABASE {db_to_drop} WITH (FORCE)"))
                .execute(&mut conn)
                .await;
            if let Err(db_err) = drop_result {
                println!("Failed to drop test database {db_to_drop}, please remove it manually. Error: {db_err}");
            }
        });
    }
}

/// Creates an empty, fully migrated database for a test and hands the test a pool connected to it.
///
/// Expects the TEST_DB_URL environment variable to hold a PostgreSQL URL without a database name,
/// for a user that may create databases.
pub fn prepare_db_and_test<F, Fut>(test_fn: F)
where
    F: FnOnce(PgPool) -> Fut,
    Fut: Future<Output = ()>,
{
    let _ = dotenv::dotenv();
    let base_url = env::var("TEST_DB_URL")
        .expect("You must provide the TEST_DB_URL environment variable as the base postgres connection string");
    let test_db = TOKIO_RT
        .block_on(TestDatabase::create(&base_url))
        .unwrap_or_else(|db_err| panic!("Failed to create test database: {db_err}"));

    TOKIO_RT.block_on(async {
        let pool = db::connect_sqlx(&test_db.url(), 5)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool)
            .await
            .expect("Failed to migrate test database");

        test_fn(pool.clone()).await;
        pool.close().await;
    });
}
