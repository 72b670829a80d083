//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::{StorageEntity, StorageKey};

/// Generic storage port. Every write replaces one whole record.
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    /// Retrieves an entity by its key
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves all entities
    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Creates a new entity, returns error if already exists
    async fn create(&self, entity: E) -> Result<E, DomainError>;

    /// Updates an existing entity, returns error if not found
    async fn update(&self, entity: E) -> Result<E, DomainError>;

    /// Creates the entity if missing, otherwise replaces it
    async fn save(&self, entity: E) -> Result<E, DomainError> {
        if self.exists(entity.key()).await? {
            self.update(entity).await
        } else {
            self.create(entity).await
        }
    }

    /// Updates an existing entity only while the stored copy is still at
    /// `expected` revision; a newer stored copy is a conflict
    async fn update_if_revision(&self, entity: E, expected: u64) -> Result<E, DomainError> {
        let current = self.get(entity.key()).await?.ok_or_else(|| {
            DomainError::not_found(format!(
                "Entity with key '{}' not found",
                entity.key().as_str()
            ))
        })?;

        check_revision(&current, expected)?;
        self.update(entity).await
    }

    /// Deletes an entity by its key, returns true if deleted
    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError>;

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Conflict unless `stored` is at the `expected` revision
pub fn check_revision<E: StorageEntity>(stored: &E, expected: u64) -> Result<(), DomainError> {
    match stored.revision() {
        Some(revision) if revision != expected => Err(DomainError::conflict(format!(
            "Entity with key '{}' changed concurrently (expected revision {}, found {})",
            stored.key().as_str(),
            expected,
            revision
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock storage that can fail every call, or only writes after a given count
    #[derive(Debug)]
    pub struct MockStorage<E>
    where
        E: StorageEntity,
    {
        entities: Mutex<HashMap<String, E>>,
        error: Mutex<Option<String>>,
        fail_writes_after: Mutex<Option<usize>>,
        writes: AtomicUsize,
    }

    impl<E> Default for MockStorage<E>
    where
        E: StorageEntity,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<E> MockStorage<E>
    where
        E: StorageEntity,
    {
        pub fn new() -> Self {
            Self {
                entities: Mutex::new(HashMap::new()),
                error: Mutex::new(None),
                fail_writes_after: Mutex::new(None),
                writes: AtomicUsize::new(0),
            }
        }

        pub fn with_entity(self, entity: E) -> Self {
            self.entities
                .lock()
                .unwrap()
                .insert(entity.key().as_str().to_string(), entity);
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        /// Allow `count` successful writes, then fail every following write
        pub fn with_write_failure_after(self, count: usize) -> Self {
            *self.fail_writes_after.lock().unwrap() = Some(count);
            self
        }

        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn snapshot(&self, key: &str) -> Option<E> {
            self.entities.lock().unwrap().get(key).cloned()
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::storage(error));
            }
            Ok(())
        }

        fn check_write(&self) -> Result<(), DomainError> {
            self.check_error()?;
            let done = self.writes.fetch_add(1, Ordering::SeqCst);

            if let Some(limit) = *self.fail_writes_after.lock().unwrap() {
                if done >= limit {
                    return Err(DomainError::storage("store unavailable"));
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<E> Storage<E> for MockStorage<E>
    where
        E: StorageEntity + 'static,
    {
        async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
            self.check_error()?;
            Ok(self.entities.lock().unwrap().get(key.as_str()).cloned())
        }

        async fn list(&self) -> Result<Vec<E>, DomainError> {
            self.check_error()?;
            Ok(self.entities.lock().unwrap().values().cloned().collect())
        }

        async fn create(&self, entity: E) -> Result<E, DomainError> {
            self.check_write()?;
            let key = entity.key().as_str().to_string();
            let mut entities = self.entities.lock().unwrap();

            if entities.contains_key(&key) {
                return Err(DomainError::conflict(format!(
                    "Entity with key '{}' already exists",
                    key
                )));
            }

            entities.insert(key, entity.clone());
            Ok(entity)
        }

        async fn update(&self, entity: E) -> Result<E, DomainError> {
            self.check_write()?;
            let key = entity.key().as_str().to_string();
            let mut entities = self.entities.lock().unwrap();

            if !entities.contains_key(&key) {
                return Err(DomainError::not_found(format!(
                    "Entity with key '{}' not found",
                    key
                )));
            }

            entities.insert(key, entity.clone());
            Ok(entity)
        }

        async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
            self.check_write()?;
            Ok(self.entities.lock().unwrap().remove(key.as_str()).is_some())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        struct NoteKey(String);

        impl StorageKey for NoteKey {
            fn as_str(&self) -> &str {
                &self.0
            }
        }

        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Note {
            id: NoteKey,
            body: String,
        }

        impl StorageEntity for Note {
            type Key = NoteKey;

            fn key(&self) -> &Self::Key {
                &self.id
            }
        }

        fn note(id: &str, body: &str) -> Note {
            Note {
                id: NoteKey(id.to_string()),
                body: body.to_string(),
            }
        }

        #[tokio::test]
        async fn test_save_creates_then_updates() {
            let storage: MockStorage<Note> = MockStorage::new();

            storage.save(note("n1", "first")).await.unwrap();
            storage.save(note("n1", "second")).await.unwrap();

            let stored = storage.get(&NoteKey("n1".to_string())).await.unwrap();
            assert_eq!(stored.unwrap().body, "second");
            assert_eq!(storage.write_count(), 2);
        }

        #[tokio::test]
        async fn test_create_conflict() {
            let storage: MockStorage<Note> = MockStorage::new().with_entity(note("n1", "x"));

            let result = storage.create(note("n1", "y")).await;
            assert!(matches!(result, Err(DomainError::Conflict { .. })));
        }

        #[tokio::test]
        async fn test_write_failure_after_limit() {
            let storage: MockStorage<Note> = MockStorage::new().with_write_failure_after(1);

            assert!(storage.create(note("n1", "ok")).await.is_ok());
            let result = storage.update(note("n1", "fails")).await;
            assert!(matches!(result, Err(DomainError::Storage { .. })));

            // reads keep working
            assert_eq!(storage.snapshot("n1").unwrap().body, "ok");
        }

        #[tokio::test]
        async fn test_with_error_fails_reads() {
            let storage: MockStorage<Note> = MockStorage::new().with_error("down");

            assert!(storage.list().await.is_err());
        }
    
        #[tokio::test]
        async fn test_update_if_revision_detects_stale_copy() {
            use crate::domain::{Workflow, WorkflowId};

            let original = Workflow::new(WorkflowId::new("wf-rev").unwrap(), "Rev");
            let storage: MockStorage<Workflow> = MockStorage::new().with_entity(original.clone());

            let mut first = original.clone();
            first.set_name("First");
            storage
                .update_if_revision(first, original.version().into())
                .await
                .unwrap();

            let mut second = original.clone();
            second.set_name("Second");
            let result = storage
                .update_if_revision(second, original.version().into())
                .await;

            assert!(matches!(result, Err(DomainError::Conflict { .. })));
            assert_eq!(storage.snapshot("wf-rev").unwrap().name(), "First");
        }
    }
}
