use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;

use courier_migrations::Migrator;

async fn connect_in_memory() -> anyhow::Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1);
    Ok(Database::connect(opt).await?)
}

async fn table_exists(db: &DatabaseConnection, table: &str) -> anyhow::Result<bool> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            [table.into()],
        ))
        .await?;
    let count: i64 = match row {
        Some(row) => row.try_get("", "count")?,
        None => 0,
    };
    Ok(count == 1)
}

#[tokio::test]
async fn test_migration_up_creates_tables() -> anyhow::Result<()> {
    let db = connect_in_memory().await?;

    Migrator::up(&db, None).await?;

    for table in ["mail_jobs", "labels", "templates", "storage_usage"] {
        assert!(table_exists(&db, table).await?, "missing table {}", table);
    }

    Ok(())
}

#[tokio::test]
async fn test_migration_down_drops_tables() -> anyhow::Result<()> {
    let db = connect_in_memory().await?;

    Migrator::up(&db, None).await?;
    Migrator::down(&db, None).await?;

    for table in ["mail_jobs", "labels", "templates", "storage_usage"] {
        assert!(!table_exists(&db, table).await?, "table {} still present", table);
    }

    Ok(())
}

#[tokio::test]
async fn test_migration_up_is_idempotent() -> anyhow::Result<()> {
    let db = connect_in_memory().await?;

    Migrator::up(&db, None).await?;
    Migrator::up(&db, None).await?;

    let status = Migrator::get_applied_migrations(&db).await?;
    assert_eq!(status.len(), 1);

    Ok(())
}
