//! PostgreSQL fixture for integration tests.
//!
//! Every test binary starts one container on first use and applies the
//! schema it was given; each test then gets its own pool with the listed
//! tables emptied. Run the tests of one binary with `--test-threads=1`.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct TestDatabase {
    // Dropping the handle stops the container.
    _container: ContainerAsync<Postgres>,
    connection_string: String,
}

static DATABASE: OnceCell<TestDatabase> = OnceCell::const_new();

async fn database(schema: &'static str) -> &'static TestDatabase {
    DATABASE
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string = format!("postgres://postgres:postgres@{host}:{port}/postgres");

            let pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(schema).execute(&pool).await.unwrap();
            pool.close().await;

            TestDatabase {
                _container: container,
                connection_string,
            }
        })
        .await
}

/// Returns a pool on the shared test database with `tables` truncated.
///
/// `schema` is applied once per test binary, by the first caller.
pub async fn fresh_pool(schema: &'static str, tables: &[&str]) -> PgPool {
    let database = database(schema).await;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database.connection_string)
        .await
        .unwrap();

    if !tables.is_empty() {
        sqlx::raw_sql(&format!("TRUNCATE TABLE {} RESTART IDENTITY", tables.join(", ")))
            .execute(&pool)
            .await
            .unwrap();
    }
    pool
}

