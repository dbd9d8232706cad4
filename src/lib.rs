pub mod db;
pub mod error;
pub mod etl;
pub mod models;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn init_logger(verbose: bool) {
    LOGGER.call_once(|| {
        let default_filter = if verbose { "debug" } else { "info" };
        env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::db::MIGRATOR;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;
    use testcontainers_modules::postgres::Postgres;
    use testcontainers_modules::testcontainers::{
        ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
    };
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum TestDatabaseError {
        #[error("database error: {0}")]
        Sqlx(#[from] sqlx::Error),
        #[error("migration error: {0}")]
        Migration(#[from] sqlx::migrate::MigrateError),
        #[error("container error: {0}")]
        Container(#[from] TestcontainersError),
    }

    /// Ephemeral migrated database backed by a disposable Postgres container.
    pub struct TestDatabase {
        pool: PgPool,
        _container: ContainerAsync<Postgres>,
    }

    impl TestDatabase {
        pub async fn new() -> Result<Self, TestDatabaseError> {
            let container = Postgres::default().start().await?;
            let host = container.get_host().await?;
            let port = container.get_host_port_ipv4(5432).await?;
            let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            MIGRATOR.run(&pool).await?;

            Ok(Self {
                pool,
                _container: container,
            })
        }

        pub fn pool(&self) -> &PgPool {
            &self.pool
        }

        pub fn pool_clone(&self) -> PgPool {
            self.pool.clone()
        }
    }

    /// Provision a migrated database, or skip the calling test when no
    /// container runtime is available.
    pub async fn provision_database() -> Option<TestDatabase> {
        match TestDatabase::new().await {
            Ok(db) => Some(db),
            Err(TestDatabaseError::Container(err)) => {
                eprintln!("skipping test: container runtime unavailable: {err}");
                None
            }
            Err(err) => panic!("failed to provision test database: {err:?}"),
        }
    }
}
