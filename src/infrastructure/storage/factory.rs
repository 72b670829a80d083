//! Storage factory for runtime backend selection

use std::str::FromStr;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::{PostgresConfig, PostgresStorage};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    InMemory,
    Postgres,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::configuration(format!(
                "Unknown storage backend '{}'",
                other
            ))),
        }
    }
}

/// Creates storages for every entity type from one backend connection
#[derive(Debug, Clone)]
pub enum StorageFactory {
    InMemory,
    Postgres(PgPool),
}

impl StorageFactory {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Connect to the configured backend once
    pub async fn connect(
        storage_type: StorageType,
        postgres: Option<&PostgresConfig>,
    ) -> Result<Self, DomainError> {
        match storage_type {
            StorageType::InMemory => Ok(Self::InMemory),
            StorageType::Postgres => {
                let config = postgres.ok_or_else(|| {
                    DomainError::configuration("storage.database_url is required for postgres")
                })?;
                let pool = config.connect().await?;
                info!(max_connections = config.max_connections, "Connected to PostgreSQL");
                Ok(Self::Postgres(pool))
            }
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }

    /// Storage for one entity type; `table_name` is ignored in memory
    pub async fn create<E>(&self, table_name: &str) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match self {
            Self::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
            Self::Postgres(pool) => {
                let storage = PostgresStorage::<E>::new(pool.clone(), table_name)?;
                storage.ensure_table().await?;
                Ok(Arc::new(storage))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Prompt, PromptId};

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("In-Memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("postgres".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert_eq!("pg".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert!("redis".parse::<StorageType>().is_err());
    }

    #[tokio::test]
    async fn test_postgres_requires_config() {
        let result = StorageFactory::connect(StorageType::Postgres, None).await;
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_in_memory_factory() {
        let factory = StorageFactory::connect(StorageType::InMemory, None).await.unwrap();
        assert_eq!(factory.storage_type(), StorageType::InMemory);

        let storage = factory.create::<Prompt>("prompts").await.unwrap();
        storage
            .create(Prompt::new(PromptId::new("p1").unwrap(), "P1", "text"))
            .await
            .unwrap();

        assert_eq!(storage.list().await.unwrap().len(), 1);
    }
}
