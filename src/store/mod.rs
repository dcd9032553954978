//! Record store for the dashboard's realtime-backed tables.
//!
//! Tables are reached through the [`Repository`] trait. Every mutation is
//! published on a broadcast change feed which the dispatch loops
//! ([`NotificationCenter::run`]) consume.

mod memory;
mod notifications;
mod records;
mod schedules;
mod webhooks;

pub use memory::InMemoryRepository;
pub use notifications::{NotificationCenter, NotificationToast, MAX_NOTIFICATIONS};
pub use records::{
    Notification, NotificationSeverity, NotificationType, ScanHistory, ScanResults,
    ScanSchedule, ScanStatus, ScheduleType, TriggerType, WebhookToken,
};
pub use schedules::{ScanScheduler, DEFAULT_HISTORY_LIMIT};
pub use webhooks::{WebhookTokens, WebhookTrigger};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::DevGuardResult;

/// A row of a realtime table.
pub trait Record: Clone + Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Primary key.
    fn id(&self) -> Uuid;
}

/// Change published on a table's feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    /// A row was inserted.
    Inserted(T),
    /// A row was replaced.
    Updated(T),
    /// A row was removed.
    Deleted(Uuid),
}

impl<T: Record> ChangeEvent<T> {
    /// Primary key of the affected row.
    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => record.id(),
            ChangeEvent::Deleted(id) => *id,
        }
    }
}

/// Access to one table.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Returns all rows.
    async fn list(&self) -> DevGuardResult<Vec<T>>;

    /// Returns the row with `id`, if any.
    async fn get(&self, id: Uuid) -> DevGuardResult<Option<T>>;

    /// Inserts a row.
    async fn insert(&self, record: T) -> DevGuardResult<T>;

    /// Replaces an existing row.
    async fn update(&self, record: T) -> DevGuardResult<T>;

    /// Removes a row. Returns false if it did not exist.
    async fn delete(&self, id: Uuid) -> DevGuardResult<bool>;

    /// Subscribes to the change feed.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<T>>;
}

/// Adapts a change feed receiver into a stream.
///
/// Lagged receivers skip the missed events and keep going. The stream ends
/// when the feed closes.
pub fn changes<T: Record>(
    mut receiver: broadcast::Receiver<ChangeEvent<T>>,
) -> impl Stream<Item = ChangeEvent<T>> {
    async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => yield event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(table = T::TABLE, skipped, "Change feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
