//! Integration tests for the record stores and their change feeds.

use devguard_client::store::{
    changes, ChangeEvent, InMemoryRepository, Notification, NotificationCenter, NotificationType,
    Repository, ScanHistory, ScanResults, ScanSchedule, ScanScheduler, ScanStatus, ScheduleType,
    TriggerType, WebhookToken, WebhookTokens, WebhookTrigger,
};
use devguard_client::DevGuardError;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Tables {
    schedules: Arc<InMemoryRepository<ScanSchedule>>,
    history: Arc<InMemoryRepository<ScanHistory>>,
    notifications: Arc<InMemoryRepository<Notification>>,
    tokens: Arc<InMemoryRepository<WebhookToken>>,
}

impl Tables {
    fn new() -> Self {
        Self {
            schedules: Arc::new(InMemoryRepository::new()),
            history: Arc::new(InMemoryRepository::new()),
            notifications: Arc::new(InMemoryRepository::new()),
            tokens: Arc::new(InMemoryRepository::new()),
        }
    }

    fn scheduler(&self) -> ScanScheduler {
        ScanScheduler::new(
            self.schedules.clone(),
            self.history.clone(),
            self.notifications.clone(),
        )
    }

    fn webhooks(&self) -> WebhookTokens {
        WebhookTokens::new(self.tokens.clone(), self.history.clone())
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_completed_scan_reaches_notification_center() {
    // Arrange
    let tables = Tables::new();
    let scheduler = tables.scheduler();
    let center = NotificationCenter::new(tables.notifications.clone());

    let (toast_tx, mut toasts) = mpsc::unbounded_channel();
    let feed = tables.notifications.subscribe();
    let runner = center.clone();
    let task = tokio::spawn(async move {
        runner
            .run(feed, move |toast| {
                let _ = toast_tx.send(toast);
            })
            .await
    });

    let schedule = scheduler
        .create(ScanSchedule::new(
            "acme/api",
            "https://github.com/acme/api",
            ScheduleType::Daily,
        ))
        .await
        .unwrap();

    // Act
    let scan = scheduler.trigger_manual_scan(&schedule).await.unwrap();
    let (entry, stored) = scheduler
        .complete_scan(
            scan.id,
            ScanResults {
                duration_seconds: Some(12),
                files_scanned: 40,
                vulnerabilities_found: 5,
                high_count: 2,
                medium_count: 2,
                low_count: 1,
            },
        )
        .await
        .unwrap();
    let toast = recv(&mut toasts).await;

    // Assert
    assert_eq!(entry.status, ScanStatus::Completed);
    assert_eq!(entry.duration_seconds, Some(12));
    let stored = stored.unwrap();
    assert_eq!(stored.kind, NotificationType::VulnerabilityDetected);
    assert_eq!(toast.title, "Critical vulnerabilities found in acme/api");
    assert_eq!(toast.message, "Found 5 vulnerabilities (2 high, 2 medium, 1 low)");
    assert_eq!(toast.icon, "🚨");
    assert_eq!(center.unread_count().await, 1);
    assert_eq!(center.notifications().await[0].id, stored.id);

    let schedule = tables.schedules.get(schedule.id).await.unwrap().unwrap();
    assert!(schedule.last_scan_at.is_some());

    task.abort();
}

#[tokio::test]
async fn test_read_state_follows_feed() {
    let tables = Tables::new();
    let center = NotificationCenter::new(tables.notifications.clone());
    let (toast_tx, mut toasts) = mpsc::unbounded_channel();
    let feed = tables.notifications.subscribe();
    let runner = center.clone();
    let task = tokio::spawn(async move {
        runner
            .run(feed, move |toast| {
                let _ = toast_tx.send(toast);
            })
            .await
    });

    let first = tables
        .notifications
        .insert(Notification::new(NotificationType::Reminder, "Welcome", "Hello", None))
        .await
        .unwrap();
    let second = tables
        .notifications
        .insert(Notification::new(
            NotificationType::ScanComplete,
            "Scan complete: web",
            "Found 0",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(recv(&mut toasts).await.title, "Welcome");
    assert_eq!(recv(&mut toasts).await.icon, "🔔");
    assert_eq!(center.unread_count().await, 2);

    center.mark_as_read(first.id).await.unwrap();
    assert_eq!(center.unread_count().await, 1);

    assert_eq!(center.mark_all_as_read().await.unwrap(), 1);
    assert_eq!(center.mark_all_as_read().await.unwrap(), 0);
    assert_eq!(center.unread_count().await, 0);
    assert!(tables.notifications.get(second.id).await.unwrap().unwrap().read);

    center.delete(first.id).await.unwrap();
    assert_eq!(center.notifications().await.len(), 1);

    task.abort();
}

#[tokio::test]
async fn test_unscheduled_clean_scan_is_silent() {
    let tables = Tables::new();
    let scheduler = tables.scheduler();
    let mut feed = Box::pin(changes(tables.history.subscribe()));

    let scan = tables
        .history
        .insert(ScanHistory::running("acme/web", TriggerType::Manual))
        .await
        .unwrap();
    let (_, notification) = scheduler
        .complete_scan(scan.id, ScanResults::default())
        .await
        .unwrap();

    assert!(notification.is_none());
    assert!(tables.notifications.is_empty().await);
    assert!(matches!(feed.next().await, Some(ChangeEvent::Inserted(_))));
    match feed.next().await {
        Some(ChangeEvent::Updated(entry)) => assert_eq!(entry.status, ScanStatus::Completed),
        other => panic!("expected update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_webhook_scan_flow() {
    // Arrange
    let tables = Tables::new();
    let webhooks = tables.webhooks();
    let token = webhooks
        .create("CI pipeline", Some("acme/api".to_string()))
        .await
        .unwrap();
    assert_eq!(token.token.len(), 64);
    assert!(token.token.chars().all(|c| c.is_ascii_hexdigit()));

    // Act
    let entry = webhooks
        .trigger_scan(
            Some(&token.token),
            WebhookTrigger {
                commit_sha: Some("abc123".to_string()),
                pr_number: Some(17),
                ..WebhookTrigger::default()
            },
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(entry.repository_name, "acme/api");
    assert_eq!(entry.trigger_type, TriggerType::Webhook);
    assert_eq!(entry.status, ScanStatus::Running);
    assert_eq!(entry.metadata["branch"], "main");
    assert_eq!(entry.metadata["event_type"], "push");
    assert_eq!(entry.metadata["trigger_source"], "webhook");
    assert_eq!(entry.metadata["commit_sha"], "abc123");
    assert_eq!(entry.metadata["pr_number"], 17);
    assert_eq!(entry.metadata["webhook_token_name"], "CI pipeline");

    let used = tables.tokens.get(token.id).await.unwrap().unwrap();
    assert!(used.last_used_at.is_some());
    assert_eq!(tables.history.len().await, 1);
}

#[tokio::test]
async fn test_webhook_rejects_bad_tokens() {
    let tables = Tables::new();
    let webhooks = tables.webhooks();
    let token = webhooks.create("deploy", None).await.unwrap();

    let missing = webhooks
        .trigger_scan(None, WebhookTrigger::default())
        .await
        .unwrap_err();
    let wrong = webhooks
        .trigger_scan(Some("not-a-token"), WebhookTrigger::default())
        .await
        .unwrap_err();
    webhooks.toggle(token.id, false).await.unwrap();
    let inactive = webhooks
        .trigger_scan(Some(&token.token), WebhookTrigger::default())
        .await
        .unwrap_err();

    for err in [&missing, &wrong, &inactive] {
        assert!(matches!(err, DevGuardError::Unauthorized { .. }));
        assert!(!err.is_retryable());
    }
    assert_eq!(
        missing.to_string(),
        "Unauthorized: Missing x-webhook-token header"
    );
    assert_eq!(
        inactive.to_string(),
        "Unauthorized: Invalid or inactive webhook token"
    );
    assert!(tables.history.is_empty().await);
}

#[tokio::test]
async fn test_webhook_repository_fallback() {
    let tables = Tables::new();
    let webhooks = tables.webhooks();
    let token = webhooks.create("generic", None).await.unwrap();

    let entry = webhooks
        .trigger_scan(Some(&token.token), WebhookTrigger::default())
        .await
        .unwrap();

    assert_eq!(entry.repository_name, "Unknown Repository");
    assert!(entry.metadata["commit_sha"].is_null());
}
