use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use std::collections::HashMap;
use tracing::info;

use crate::error::StoreError;
use crate::lists::{ConfigRepository, ListRepository};
use crate::types::{ListEntry, ListKind};

pub async fn initialize_database(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database: {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    }

    let db_pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    migrate(&db_pool).await?;

    info!("Database initialized successfully");

    Ok(db_pool)
}

/// Single-connection in-memory database with migrations applied.
pub async fn memory_database() -> Result<SqlitePool> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

async fn migrate(db_pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(db_pool)
        .await
        .context("Failed to run migrations")
}

/// List and configuration repositories backed by SQLite.
#[derive(Clone)]
pub struct SqliteStorage {
    db_pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn close(&self) {
        self.db_pool.close().await;
    }
}

#[async_trait]
impl ListRepository for SqliteStorage {
    async fn add(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError> {
        let query = format!("INSERT OR IGNORE INTO {} (ip, mask) VALUES (?, ?)", kind.table());
        sqlx::query(&query)
            .bind(&entry.ip)
            .bind(&entry.mask)
            .execute(&self.db_pool)
            .await?;

        info!("Added to {}: {}", kind, entry);
        Ok(())
    }

    async fn delete(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {} WHERE ip = ?", kind.table());
        let result = sqlx::query(&query)
            .bind(&entry.ip)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            info!("{} does not exist in {}", entry, kind);
            return Err(StoreError::NotFound {
                kind,
                entry: entry.to_string(),
            });
        }

        info!("Deleted from {}: {}", kind, entry);
        Ok(())
    }

    async fn exists(&self, kind: ListKind, entry: &ListEntry) -> Result<bool, StoreError> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE ip = ?)", kind.table());
        let exists = sqlx::query_scalar::<_, i64>(&query)
            .bind(&entry.ip)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(exists != 0)
    }

    async fn list_all(&self, kind: ListKind) -> Result<Vec<String>, StoreError> {
        let query = format!("SELECT ip FROM {}", kind.table());
        let ips = sqlx::query_scalar::<_, String>(&query)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(ips)
    }
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    key: String,
    value: i64,
}

#[async_trait]
impl ConfigRepository for SqliteStorage {
    async fn get_limits(&self) -> Result<HashMap<String, i64>, StoreError> {
        let rows = sqlx::query_as::<_, ConfigRow>("SELECT key, value FROM configurations")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
    }
}
