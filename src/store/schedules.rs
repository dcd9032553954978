//! Scan schedules and scan history.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{
    Notification, NotificationSeverity, NotificationType, Repository, ScanHistory, ScanResults,
    ScanSchedule, ScanStatus, TriggerType,
};
use crate::errors::{DevGuardError, DevGuardResult};

/// History entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Manages schedules, their scan runs and completion notifications.
#[derive(Clone)]
pub struct ScanScheduler {
    schedules: Arc<dyn Repository<ScanSchedule>>,
    history: Arc<dyn Repository<ScanHistory>>,
    notifications: Arc<dyn Repository<Notification>>,
}

impl ScanScheduler {
    /// Creates a scheduler over the three tables.
    pub fn new(
        schedules: Arc<dyn Repository<ScanSchedule>>,
        history: Arc<dyn Repository<ScanHistory>>,
        notifications: Arc<dyn Repository<Notification>>,
    ) -> Self {
        Self {
            schedules,
            history,
            notifications,
        }
    }

    /// Stores a new schedule with fresh timestamps.
    #[instrument(skip(self, schedule), fields(repository = %schedule.repository_name))]
    pub async fn create(&self, mut schedule: ScanSchedule) -> DevGuardResult<ScanSchedule> {
        let now = Utc::now();
        schedule.created_at = now;
        schedule.updated_at = now;
        self.schedules.insert(schedule).await
    }

    /// Schedules, newest first.
    pub async fn list(&self) -> DevGuardResult<Vec<ScanSchedule>> {
        let mut schedules = self.schedules.list().await?;
        schedules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(schedules)
    }

    /// Replaces a schedule, stamping `updated_at`.
    pub async fn update(&self, mut schedule: ScanSchedule) -> DevGuardResult<ScanSchedule> {
        schedule.updated_at = Utc::now();
        self.schedules.update(schedule).await
    }

    /// Deletes a schedule.
    pub async fn delete(&self, id: Uuid) -> DevGuardResult<bool> {
        self.schedules.delete(id).await
    }

    /// Enables or disables a schedule.
    pub async fn toggle(&self, id: Uuid, enabled: bool) -> DevGuardResult<ScanSchedule> {
        let mut schedule = self.schedule(id).await?;
        schedule.enabled = enabled;
        self.update(schedule).await
    }

    /// Most recent scan runs, newest first. `None` means 20.
    pub async fn history(&self, limit: Option<usize>) -> DevGuardResult<Vec<ScanHistory>> {
        let mut entries = self.history.list().await?;
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries.truncate(limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        Ok(entries)
    }

    /// Records a running manual scan for `schedule`.
    #[instrument(skip(self, schedule), fields(repository = %schedule.repository_name))]
    pub async fn trigger_manual_scan(
        &self,
        schedule: &ScanSchedule,
    ) -> DevGuardResult<ScanHistory> {
        let mut entry = ScanHistory::running(schedule.repository_name.clone(), TriggerType::Manual);
        entry.schedule_id = Some(schedule.id);
        let entry = self.history.insert(entry).await?;
        tracing::info!(scan_id = %entry.id, "Scan started");
        Ok(entry)
    }

    /// Marks a run completed and notifies according to its schedule.
    ///
    /// Returns the updated entry and the notification that was stored, if
    /// any. Runs without a schedule notify only when high findings exist.
    #[instrument(skip(self, results))]
    pub async fn complete_scan(
        &self,
        history_id: Uuid,
        results: ScanResults,
    ) -> DevGuardResult<(ScanHistory, Option<Notification>)> {
        let mut entry = self
            .history
            .get(history_id)
            .await?
            .ok_or_else(|| DevGuardError::store(format!("No scan {history_id}")))?;

        let now = Utc::now();
        entry.status = ScanStatus::Completed;
        entry.completed_at = Some(now);
        entry.duration_seconds = Some(results.duration_seconds.unwrap_or_else(|| {
            u64::try_from((now - entry.started_at).num_seconds()).unwrap_or(0)
        }));
        entry.files_scanned = results.files_scanned;
        entry.vulnerabilities_found = results.vulnerabilities_found;
        entry.high_count = results.high_count;
        entry.medium_count = results.medium_count;
        entry.low_count = results.low_count;
        let entry = self.history.update(entry).await?;

        let schedule = match entry.schedule_id {
            Some(id) => self.schedules.get(id).await?,
            None => None,
        };

        let should_notify = match &schedule {
            Some(s) => s.notify_on_complete || (s.notify_on_critical && results.high_count > 0),
            None => results.high_count > 0,
        };

        if let Some(mut schedule) = schedule {
            schedule.last_scan_at = Some(now);
            self.schedules.update(schedule).await?;
        }

        let notification = if should_notify {
            let notification = self
                .notifications
                .insert(completion_notification(&entry, &results))
                .await?;
            Some(notification)
        } else {
            None
        };

        tracing::info!(
            scan_id = %entry.id,
            found = results.vulnerabilities_found,
            high = results.high_count,
            notified = notification.is_some(),
            "Scan completed"
        );
        Ok((entry, notification))
    }

    /// Marks a run failed.
    pub async fn fail_scan(
        &self,
        history_id: Uuid,
        message: impl Into<String>,
    ) -> DevGuardResult<ScanHistory> {
        let mut entry = self
            .history
            .get(history_id)
            .await?
            .ok_or_else(|| DevGuardError::store(format!("No scan {history_id}")))?;
        entry.status = ScanStatus::Failed;
        entry.completed_at = Some(Utc::now());
        entry.error_message = Some(message.into());
        self.history.update(entry).await
    }

    async fn schedule(&self, id: Uuid) -> DevGuardResult<ScanSchedule> {
        self.schedules
            .get(id)
            .await?
            .ok_or_else(|| DevGuardError::store(format!("No scan schedule {id}")))
    }
}

fn completion_notification(entry: &ScanHistory, results: &ScanResults) -> Notification {
    let repo = &entry.repository_name;
    let notification = if results.high_count > 0 {
        Notification::new(
            NotificationType::VulnerabilityDetected,
            format!("Critical vulnerabilities found in {repo}"),
            results.summary(),
            Some(NotificationSeverity::High),
        )
    } else {
        Notification::new(
            NotificationType::ScanComplete,
            format!("Scan complete: {repo}"),
            results.summary(),
            Some(NotificationSeverity::Info),
        )
    };

    let notification = notification.with_metadata("scanId", entry.id.to_string());
    match entry.schedule_id {
        Some(id) => notification.with_metadata("scheduleId", id.to_string()),
        None => notification.with_metadata("scheduleId", Value::Null),
    }
}

impl std::fmt::Debug for ScanScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanScheduler").finish_non_exhaustive()
    }
}
