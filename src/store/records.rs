//! Realtime-backed dashboard records.
//!
//! Field names follow the table columns (snake_case).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::Record;

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// New findings.
    VulnerabilityDetected,
    /// An issue was assigned.
    IssueAssigned,
    /// A scan finished.
    ScanComplete,
    /// A fix was applied.
    FixApplied,
    /// The user was mentioned.
    Mention,
    /// Reminder.
    Reminder,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    /// High.
    High,
    /// Medium.
    Medium,
    /// Low.
    Low,
    /// Informational.
    Info,
}

/// A dashboard notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Option<Uuid>,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Title.
    pub title: String,
    /// Message.
    pub message: String,
    /// Severity.
    pub severity: Option<NotificationSeverity>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Read flag.
    #[serde(default)]
    pub read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates an unread notification.
    pub fn new(
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Option<NotificationSeverity>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            kind,
            title: title.into(),
            message: message.into(),
            severity,
            metadata: Map::new(),
            read: false,
            created_at: Utc::now(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl Record for Notification {
    const TABLE: &'static str = "notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Token authorizing webhook-triggered scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookToken {
    /// Identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Secret token, 64 hex characters.
    pub token: String,
    /// Repository scans are attributed to by default.
    pub repository_name: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last successful use.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Inactive tokens are rejected.
    pub is_active: bool,
}

impl Record for WebhookToken {
    const TABLE: &'static str = "webhook_tokens";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// How a schedule is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Only on demand.
    Manual,
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// Every week.
    Weekly,
    /// When a pull request merges.
    OnPrMerge,
}

/// A repository scan schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSchedule {
    /// Identifier.
    pub id: Uuid,
    /// Repository name.
    pub repository_name: String,
    /// Repository URL.
    pub repository_url: String,
    /// Trigger.
    pub schedule_type: ScheduleType,
    /// Time of day, `HH:MM`.
    pub schedule_time: Option<String>,
    /// Day of week for weekly schedules, 0 = Sunday.
    pub schedule_day: Option<u8>,
    /// Enabled flag.
    pub enabled: bool,
    /// Last completed scan.
    pub last_scan_at: Option<DateTime<Utc>>,
    /// Next planned scan.
    pub next_scan_at: Option<DateTime<Utc>>,
    /// Branches to scan.
    #[serde(default)]
    pub scan_branches: Vec<String>,
    /// Notify after every scan.
    pub notify_on_complete: bool,
    /// Notify when high findings exist.
    pub notify_on_critical: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl ScanSchedule {
    /// Creates an enabled schedule scanning `main`, notifying on critical findings.
    pub fn new(
        repository_name: impl Into<String>,
        repository_url: impl Into<String>,
        schedule_type: ScheduleType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repository_name: repository_name.into(),
            repository_url: repository_url.into(),
            schedule_type,
            schedule_time: None,
            schedule_day: None,
            enabled: true,
            last_scan_at: None,
            next_scan_at: None,
            scan_branches: vec!["main".to_string()],
            notify_on_complete: false,
            notify_on_critical: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for ScanSchedule {
    const TABLE: &'static str = "scan_schedules";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Scan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Queued.
    Pending,
    /// In progress.
    Running,
    /// Finished.
    Completed,
    /// Failed.
    Failed,
}

/// What started a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A schedule fired.
    Scheduled,
    /// A user started it.
    Manual,
    /// A pull request merged.
    PrMerge,
    /// A webhook call.
    Webhook,
}

/// One scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHistory {
    /// Identifier.
    pub id: Uuid,
    /// Schedule that produced the run.
    pub schedule_id: Option<Uuid>,
    /// Repository name.
    pub repository_name: String,
    /// Status.
    pub status: ScanStatus,
    /// Trigger.
    pub trigger_type: TriggerType,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Duration in seconds.
    pub duration_seconds: Option<u64>,
    /// Files scanned.
    #[serde(default)]
    pub files_scanned: u32,
    /// Total findings.
    #[serde(default)]
    pub vulnerabilities_found: u32,
    /// High findings.
    #[serde(default)]
    pub high_count: u32,
    /// Medium findings.
    #[serde(default)]
    pub medium_count: u32,
    /// Low findings.
    #[serde(default)]
    pub low_count: u32,
    /// Failure message.
    pub error_message: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ScanHistory {
    /// Creates a running entry started now.
    pub fn running(repository_name: impl Into<String>, trigger_type: TriggerType) -> Self {
        Self {
            id: Uuid::new_v4(),
            schedule_id: None,
            repository_name: repository_name.into(),
            status: ScanStatus::Running,
            trigger_type,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            files_scanned: 0,
            vulnerabilities_found: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            error_message: None,
            metadata: Map::new(),
        }
    }
}

impl Record for ScanHistory {
    const TABLE: &'static str = "scan_history";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Results reported when a scan finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResults {
    /// Duration; computed from the start time when absent.
    pub duration_seconds: Option<u64>,
    /// Files scanned.
    pub files_scanned: u32,
    /// Total findings.
    pub vulnerabilities_found: u32,
    /// High findings.
    pub high_count: u32,
    /// Medium findings.
    pub medium_count: u32,
    /// Low findings.
    pub low_count: u32,
}

impl ScanResults {
    /// Summary line used in notifications.
    pub fn summary(&self) -> String {
        format!(
            "Found {} vulnerabilities ({} high, {} medium, {} low)",
            self.vulnerabilities_found, self.high_count, self.medium_count, self.low_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_column_names() {
        let notification = Notification::new(
            NotificationType::ScanComplete,
            "Scan complete: api",
            "Found 0 vulnerabilities",
            Some(NotificationSeverity::Info),
        );
        let json = serde_json::to_value(&notification).unwrap();

        assert_eq!(json["type"], "scan_complete");
        assert_eq!(json["severity"], "info");
        assert_eq!(json["read"], false);
    }

    #[test]
    fn test_schedule_type_wire_name() {
        let json = serde_json::to_value(ScheduleType::OnPrMerge).unwrap();
        assert_eq!(json, "on_pr_merge");
    }

    #[test]
    fn test_results_summary() {
        let results = ScanResults {
            vulnerabilities_found: 6,
            high_count: 1,
            medium_count: 2,
            low_count: 3,
            ..ScanResults::default()
        };
        assert_eq!(
            results.summary(),
            "Found 6 vulnerabilities (1 high, 2 medium, 3 low)"
        );
    }
}
