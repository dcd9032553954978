//! Notification center fed by the notifications change feed.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{ChangeEvent, Notification, NotificationSeverity, Repository};
use crate::errors::DevGuardResult;

/// Most notifications kept in the center.
pub const MAX_NOTIFICATIONS: usize = 50;

/// Toast shown when a notification arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationToast {
    /// Title.
    pub title: String,
    /// Description.
    pub message: String,
    /// Icon chosen by severity.
    pub icon: &'static str,
}

impl NotificationToast {
    fn from_notification(notification: &Notification) -> Self {
        let icon = match notification.severity {
            Some(NotificationSeverity::High) => "🚨",
            Some(NotificationSeverity::Medium) => "⚠️",
            Some(NotificationSeverity::Low) => "ℹ️",
            Some(NotificationSeverity::Info) | None => "🔔",
        };
        Self {
            title: notification.title.clone(),
            message: notification.message.clone(),
            icon,
        }
    }
}

#[derive(Debug, Default)]
struct CenterState {
    items: Vec<Notification>,
    unread: usize,
}

impl CenterState {
    fn recount(&mut self) {
        self.unread = self.items.iter().filter(|n| !n.read).count();
    }
}

/// Newest-first list of notifications with an unread count.
///
/// Clones share the same state, so one clone can run the dispatch loop while
/// another serves reads.
#[derive(Clone)]
pub struct NotificationCenter {
    repo: Arc<dyn Repository<Notification>>,
    state: Arc<RwLock<CenterState>>,
}

impl NotificationCenter {
    /// Creates an empty center over `repo`. Call [`refresh`](Self::refresh)
    /// to load existing rows.
    pub fn new(repo: Arc<dyn Repository<Notification>>) -> Self {
        Self {
            repo,
            state: Arc::new(RwLock::new(CenterState::default())),
        }
    }

    /// Reloads the newest notifications from the repository.
    pub async fn refresh(&self) -> DevGuardResult<()> {
        let mut items = self.repo.list().await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(MAX_NOTIFICATIONS);

        let mut state = self.state.write().await;
        state.items = items;
        state.recount();
        Ok(())
    }

    /// Current notifications, newest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.items.clone()
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self) -> usize {
        self.state.read().await.unread
    }

    /// Marks one notification as read.
    pub async fn mark_as_read(&self, id: Uuid) -> DevGuardResult<()> {
        if let Some(mut notification) = self.repo.get(id).await? {
            notification.read = true;
            self.repo.update(notification).await?;
        }

        let mut state = self.state.write().await;
        if let Some(item) = state.items.iter_mut().find(|n| n.id == id) {
            item.read = true;
        }
        state.recount();
        Ok(())
    }

    /// Marks every unread notification as read. Returns how many changed.
    pub async fn mark_all_as_read(&self) -> DevGuardResult<usize> {
        let unread: Vec<Uuid> = {
            let state = self.state.read().await;
            state.items.iter().filter(|n| !n.read).map(|n| n.id).collect()
        };
        if unread.is_empty() {
            return Ok(0);
        }

        for id in &unread {
            if let Some(mut notification) = self.repo.get(*id).await? {
                notification.read = true;
                self.repo.update(notification).await?;
            }
        }

        let mut state = self.state.write().await;
        for item in &mut state.items {
            item.read = true;
        }
        state.unread = 0;
        tracing::info!(count = unread.len(), "All notifications marked as read");
        Ok(unread.len())
    }

    /// Deletes one notification.
    pub async fn delete(&self, id: Uuid) -> DevGuardResult<()> {
        self.repo.delete(id).await?;

        let mut state = self.state.write().await;
        state.items.retain(|n| n.id != id);
        state.recount();
        Ok(())
    }

    /// Deletes every notification.
    pub async fn clear_all(&self) -> DevGuardResult<()> {
        for notification in self.repo.list().await? {
            self.repo.delete(notification.id).await?;
        }

        let mut state = self.state.write().await;
        state.items.clear();
        state.unread = 0;
        Ok(())
    }

    /// Applies one feed event. Inserts return the toast to show.
    pub async fn dispatch(&self, event: ChangeEvent<Notification>) -> Option<NotificationToast> {
        let mut state = self.state.write().await;
        match event {
            ChangeEvent::Inserted(notification) => {
                if state.items.iter().any(|n| n.id == notification.id) {
                    return None;
                }
                let toast = NotificationToast::from_notification(&notification);
                state.items.insert(0, notification);
                state.items.truncate(MAX_NOTIFICATIONS);
                state.recount();
                Some(toast)
            }
            ChangeEvent::Updated(notification) => {
                if let Some(slot) = state.items.iter_mut().find(|n| n.id == notification.id) {
                    *slot = notification;
                }
                state.recount();
                None
            }
            ChangeEvent::Deleted(id) => {
                state.items.retain(|n| n.id != id);
                state.recount();
                None
            }
        }
    }

    /// Dispatch loop: applies feed events until the feed closes, handing
    /// each toast to `on_toast`. A lagged feed triggers a full refresh.
    pub async fn run<F>(
        &self,
        mut receiver: broadcast::Receiver<ChangeEvent<Notification>>,
        mut on_toast: F,
    ) -> DevGuardResult<()>
    where
        F: FnMut(NotificationToast) + Send,
    {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(toast) = self.dispatch(event).await {
                        on_toast(toast);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification feed lagged, refreshing");
                    self.refresh().await?;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Notification feed closed");
                    return Ok(());
                }
            }
        }
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryRepository, NotificationType};
    use chrono::{Duration, Utc};

    fn notification(severity: Option<NotificationSeverity>) -> Notification {
        Notification::new(NotificationType::ScanComplete, "Scan complete: api", "Found 0", severity)
    }

    fn center() -> (Arc<InMemoryRepository<Notification>>, NotificationCenter) {
        let repo = Arc::new(InMemoryRepository::new());
        let center = NotificationCenter::new(repo.clone());
        (repo, center)
    }

    #[tokio::test]
    async fn test_insert_prepends_and_counts_unread() {
        let (_, center) = center();
        let first = notification(None);
        let second = notification(Some(NotificationSeverity::High));

        center.dispatch(ChangeEvent::Inserted(first.clone())).await;
        let toast = center.dispatch(ChangeEvent::Inserted(second.clone())).await;

        assert_eq!(toast.map(|t| t.icon), Some("🚨"));
        let items = center.notifications().await;
        assert_eq!(items[0].id, second.id);
        assert_eq!(center.unread_count().await, 2);
    }

    #[tokio::test]
    async fn test_insert_caps_list() {
        let (_, center) = center();
        for _ in 0..(MAX_NOTIFICATIONS + 5) {
            center.dispatch(ChangeEvent::Inserted(notification(None))).await;
        }
        assert_eq!(center.notifications().await.len(), MAX_NOTIFICATIONS);
        assert_eq!(center.unread_count().await, MAX_NOTIFICATIONS);
    }

    #[tokio::test]
    async fn test_update_and_delete_events() {
        let (_, center) = center();
        let mut item = notification(Some(NotificationSeverity::Low));
        center.dispatch(ChangeEvent::Inserted(item.clone())).await;

        item.read = true;
        center.dispatch(ChangeEvent::Updated(item.clone())).await;
        assert_eq!(center.unread_count().await, 0);

        center.dispatch(ChangeEvent::Deleted(item.id)).await;
        assert!(center.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_orders_newest_first() {
        let (repo, center) = center();
        let mut old = notification(None);
        old.created_at = Utc::now() - Duration::hours(1);
        let new = notification(None);
        repo.insert(old.clone()).await.unwrap();
        repo.insert(new.clone()).await.unwrap();

        center.refresh().await.unwrap();

        let items = center.notifications().await;
        assert_eq!(items[0].id, new.id);
        assert_eq!(items[1].id, old.id);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_noop_when_none_unread() {
        let (repo, center) = center();
        let mut feed = repo.subscribe();

        assert_eq!(center.mark_all_as_read().await.unwrap(), 0);
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_as_read_persists() {
        let (repo, center) = center();
        let item = repo.insert(notification(None)).await.unwrap();
        center.refresh().await.unwrap();

        center.mark_as_read(item.id).await.unwrap();

        assert_eq!(center.unread_count().await, 0);
        assert!(repo.get(item.id).await.unwrap().unwrap().read);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (repo, center) = center();
        repo.insert(notification(None)).await.unwrap();
        repo.insert(notification(None)).await.unwrap();
        center.refresh().await.unwrap();

        center.clear_all().await.unwrap();

        assert!(repo.is_empty().await);
        assert_eq!(center.unread_count().await, 0);
    }
}
