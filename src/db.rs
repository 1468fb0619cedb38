use migration::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;

use crate::error::AppResult;

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url);
    options.sqlx_logging(false);
    if database_url.contains(":memory:") {
        // every pooled connection would otherwise get its own empty database
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;

    pragma(&db, "PRAGMA journal_mode=WAL").await?;
    pragma(&db, "PRAGMA synchronous=NORMAL").await?;
    pragma(&db, "PRAGMA busy_timeout=5000").await?;

    Migrator::up(&db, None).await?;
    Ok(db)
}

async fn pragma(db: &DatabaseConnection, sql: &str) -> AppResult<()> {
    db.execute(Statement::from_string(db.get_database_backend(), sql.to_string())).await?;
    Ok(())
}

#[cfg(test)]
pub async fn memory() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:").await.expect("in-memory database")
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectionTrait, Statement};

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let db = super::memory().await;

        let rows = db
            .query_all(Statement::from_string(
                db.get_database_backend(),
                "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name".to_string(),
            ))
            .await
            .unwrap();

        let names: Vec<String> =
            rows.iter().map(|row| row.try_get::<String>("", "name").unwrap()).collect();

        for table in ["ignore_list", "movies", "watchlist"] {
            assert!(names.iter().any(|n| n == table), "{table} table missing");
        }
    }
}
