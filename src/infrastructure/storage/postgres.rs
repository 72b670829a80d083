//! PostgreSQL storage: one JSONB document per entity

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::storage::{check_revision, Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

static TABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("table name pattern is valid"));

/// Connection settings for the shared pool
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Open a pool that several tables can share
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage_failure("connect to PostgreSQL", e))
    }
}

/// Entity storage backed by a `(key, data JSONB)` table
pub struct PostgresStorage<E>
where
    E: StorageEntity,
{
    pool: PgPool,
    table_name: String,
    _phantom: PhantomData<E>,
}

impl<E> Debug for PostgresStorage<E>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl<E> PostgresStorage<E>
where
    E: StorageEntity,
{
    /// Table names are interpolated into SQL, so they must be plain identifiers
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Result<Self, DomainError> {
        let table_name = table_name.into();

        if !TABLE_NAME_PATTERN.is_match(&table_name) {
            return Err(DomainError::configuration(format!(
                "Invalid table name '{}'",
                table_name
            )));
        }

        Ok(Self {
            pool,
            table_name,
            _phantom: PhantomData,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                key VARCHAR(255) PRIMARY KEY,
                data JSONB NOT NULL,
                revision BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage_failure(format_args!("create table {}", self.table_name), e))?;

        // tables created before revisions were tracked
        let query = format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS revision BIGINT NOT NULL DEFAULT 0",
            self.table_name
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| self.failure("add revision column", e))?;

        Ok(())
    }

    fn revision_of(entity: &E) -> i64 {
        entity
            .revision()
            .and_then(|revision| i64::try_from(revision).ok())
            .unwrap_or_default()
    }

    fn failure(&self, action: &str, cause: sqlx::Error) -> DomainError {
        DomainError::storage_failure(format_args!("{} in {}", action, self.table_name), cause)
    }

    fn encode(entity: &E) -> Result<serde_json::Value, DomainError> {
        Ok(serde_json::to_value(entity)?)
    }

    fn decode(row: &PgRow) -> Result<E, DomainError> {
        let data: serde_json::Value = row
            .try_get("data")
            .map_err(|e| DomainError::storage_failure("read row", e))?;

        Ok(serde_json::from_value(data)?)
    }
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let query = format!("SELECT data FROM {} WHERE key = $1", self.table_name);

        let row = sqlx::query(&query)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.failure("get", e))?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let query = format!("SELECT data FROM {} ORDER BY created_at", self.table_name);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.failure("list", e))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let data = Self::encode(&entity)?;
        let query = format!(
            "INSERT INTO {} (key, data, revision) VALUES ($1, $2, $3) ON CONFLICT (key) DO NOTHING",
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .bind(Self::revision_of(&entity))
            .execute(&self.pool)
            .await
            .map_err(|e| self.failure("create", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::conflict(format!(
                "Entity with key '{}' already exists",
                key
            )));
        }

        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let data = Self::encode(&entity)?;
        let query = format!(
            "UPDATE {} SET data = $2, revision = $3, updated_at = NOW() WHERE key = $1",
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .bind(Self::revision_of(&entity))
            .execute(&self.pool)
            .await
            .map_err(|e| self.failure("update", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            )));
        }

        Ok(entity)
    }

    /// Conditional single-statement update on the revision column
    async fn update_if_revision(&self, entity: E, expected: u64) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let data = Self::encode(&entity)?;
        let expected_revision = i64::try_from(expected)
            .map_err(|_| DomainError::validation(format!("Revision {} out of range", expected)))?;
        let query = format!(
            r#"
            UPDATE {} SET data = $2, revision = $3, updated_at = NOW()
            WHERE key = $1 AND revision = $4
            "#,
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .bind(Self::revision_of(&entity))
            .bind(expected_revision)
            .execute(&self.pool)
            .await
            .map_err(|e| self.failure("update", e))?;

        if result.rows_affected() == 0 {
            return match self.get(entity.key()).await? {
                Some(current) => {
                    check_revision(&current, expected)?;
                    Err(DomainError::conflict(format!(
                        "Entity with key '{}' changed concurrently",
                        key
                    )))
                }
                None => Err(DomainError::not_found(format!(
                    "Entity with key '{}' not found",
                    key
                ))),
            };
        }

        Ok(entity)
    }

    /// Single-statement upsert
    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let data = Self::encode(&entity)?;
        let query = format!(
            r#"
            INSERT INTO {} (key, data, revision) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET data = EXCLUDED.data, revision = EXCLUDED.revision, updated_at = NOW()
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(entity.key().as_str())
            .bind(&data)
            .bind(Self::revision_of(&entity))
            .execute(&self.pool)
            .await
            .map_err(|e| self.failure("save", e))?;

        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let query = format!("DELETE FROM {} WHERE key = $1", self.table_name);

        let result = sqlx::query(&query)
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| self.failure("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE key = $1) AS found",
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.failure("check", e))?;

        row.try_get("found")
            .map_err(|e| DomainError::storage_failure("read row", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Workflow;

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_connect_timeout(5);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_table_name_validation() {
        // connect_lazy does not touch the network
        let pool = PgPool::connect_lazy("postgres://localhost/test").unwrap();

        assert!(PostgresStorage::<Workflow>::new(pool.clone(), "workflows").is_ok());
        assert!(PostgresStorage::<Workflow>::new(pool.clone(), "wf; DROP TABLE x").is_err());
        assert!(PostgresStorage::<Workflow>::new(pool, "Workflows").is_err());
    }
}
