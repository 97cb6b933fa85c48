//! Test utilities for database integration tests
//!
//! Every `TestDatabase` is a private in-memory SQLite database with all
//! migrations applied, so tests never share state and need no container.

use crate::DbConnection;
use courier_migrations::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

/// Isolated database for a single test
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    /// Create an empty database without running migrations
    pub async fn new() -> anyhow::Result<Self> {
        // One connection only: each SQLite in-memory connection is its own database
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;

        let test_db = TestDatabase { db: Arc::new(db) };
        test_db
            .test_connection()
            .await
            .map_err(|e| anyhow::anyhow!("Initial connection test failed: {}", e))?;

        Ok(test_db)
    }

    /// Create a database and run all migrations
    pub async fn with_migrations() -> anyhow::Result<Self> {
        let test_db = Self::new().await?;

        Migrator::up(test_db.db.as_ref(), None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(test_db)
    }

    /// Get a cloned handle to the connection
    pub fn connection(&self) -> Arc<DbConnection> {
        self.db.clone()
    }

    async fn test_connection(&self) -> anyhow::Result<()> {
        self.db.execute_unprepared("SELECT 1").await?;
        Ok(())
    }
}
