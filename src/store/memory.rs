//! In-memory repository backend.

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{ChangeEvent, Record, Repository};
use crate::errors::{DevGuardError, DevGuardResult};

const DEFAULT_FEED_CAPACITY: usize = 256;

/// Repository kept in memory, publishing every mutation on its feed.
pub struct InMemoryRepository<T: Record> {
    records: RwLock<Vec<T>>,
    events: broadcast::Sender<ChangeEvent<T>>,
}

impl<T: Record> InMemoryRepository<T> {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates an empty repository whose feed buffers `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            records: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Number of rows.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn publish(&self, event: ChangeEvent<T>) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn list(&self) -> DevGuardResult<Vec<T>> {
        Ok(self.records.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> DevGuardResult<Option<T>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned())
    }

    async fn insert(&self, record: T) -> DevGuardResult<T> {
        {
            let mut records = self.records.write().await;
            if records.iter().any(|r| r.id() == record.id()) {
                return Err(DevGuardError::store(format!(
                    "Duplicate key {} in {}",
                    record.id(),
                    T::TABLE
                )));
            }
            records.push(record.clone());
        }
        self.publish(ChangeEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update(&self, record: T) -> DevGuardResult<T> {
        {
            let mut records = self.records.write().await;
            let slot = records
                .iter_mut()
                .find(|r| r.id() == record.id())
                .ok_or_else(|| {
                    DevGuardError::store(format!("No row {} in {}", record.id(), T::TABLE))
                })?;
            *slot = record.clone();
        }
        self.publish(ChangeEvent::Updated(record.clone()));
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> DevGuardResult<bool> {
        let removed = {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|r| r.id() != id);
            records.len() != before
        };
        if removed {
            self.publish(ChangeEvent::Deleted(id));
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<T>> {
        self.events.subscribe()
    }
}

impl<T: Record> std::fmt::Debug for InMemoryRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("table", &T::TABLE)
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}
