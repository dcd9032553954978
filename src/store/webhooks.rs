//! Webhook tokens and webhook-triggered scans.

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{Repository, ScanHistory, TriggerType, WebhookToken};
use crate::errors::{DevGuardError, DevGuardResult};
use crate::types::remediation::DEFAULT_BRANCH;

const TOKEN_BYTES: usize = 32;
const UNKNOWN_REPOSITORY: &str = "Unknown Repository";

/// Body of a webhook scan request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookTrigger {
    /// Repository name; defaults to the token's repository.
    pub repository_name: Option<String>,
    /// Caller identification, `webhook` by default.
    pub trigger_source: Option<String>,
    /// Branch, `main` by default.
    pub branch: Option<String>,
    /// Commit being scanned.
    pub commit_sha: Option<String>,
    /// Pull request number.
    pub pr_number: Option<u64>,
    /// Event type, `push` by default.
    pub event_type: Option<String>,
}

/// Manages webhook tokens and records webhook scans.
#[derive(Clone)]
pub struct WebhookTokens {
    tokens: Arc<dyn Repository<WebhookToken>>,
    history: Arc<dyn Repository<ScanHistory>>,
}

impl WebhookTokens {
    /// Creates a manager over the token and scan history tables.
    pub fn new(
        tokens: Arc<dyn Repository<WebhookToken>>,
        history: Arc<dyn Repository<ScanHistory>>,
    ) -> Self {
        Self { tokens, history }
    }

    /// Creates an active token with a fresh random secret.
    #[instrument(skip(self, repository_name))]
    pub async fn create(
        &self,
        name: &str,
        repository_name: Option<String>,
    ) -> DevGuardResult<WebhookToken> {
        let token = WebhookToken {
            id: Uuid::new_v4(),
            name: name.to_string(),
            token: generate_token(),
            repository_name: repository_name.filter(|r| !r.is_empty()),
            created_at: Utc::now(),
            last_used_at: None,
            is_active: true,
        };
        self.tokens.insert(token).await
    }

    /// Tokens, newest first.
    pub async fn list(&self) -> DevGuardResult<Vec<WebhookToken>> {
        let mut tokens = self.tokens.list().await?;
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    /// Deletes a token.
    pub async fn delete(&self, id: Uuid) -> DevGuardResult<bool> {
        self.tokens.delete(id).await
    }

    /// Activates or deactivates a token.
    pub async fn toggle(&self, id: Uuid, is_active: bool) -> DevGuardResult<WebhookToken> {
        let mut token = self
            .tokens
            .get(id)
            .await?
            .ok_or_else(|| DevGuardError::store(format!("No webhook token {id}")))?;
        token.is_active = is_active;
        self.tokens.update(token).await
    }

    /// Validates `token` and records a running webhook scan.
    #[instrument(skip(self, token, trigger))]
    pub async fn trigger_scan(
        &self,
        token: Option<&str>,
        trigger: WebhookTrigger,
    ) -> DevGuardResult<ScanHistory> {
        let secret = token.filter(|t| !t.is_empty()).ok_or_else(|| {
            DevGuardError::Unauthorized {
                message: "Missing x-webhook-token header".to_string(),
            }
        })?;

        let mut record = self
            .tokens
            .list()
            .await?
            .into_iter()
            .find(|t| t.is_active && t.token == secret)
            .ok_or_else(|| DevGuardError::Unauthorized {
                message: "Invalid or inactive webhook token".to_string(),
            })?;

        record.last_used_at = Some(Utc::now());
        let record = self.tokens.update(record).await?;

        let repository_name = trigger
            .repository_name
            .or_else(|| record.repository_name.clone())
            .unwrap_or_else(|| UNKNOWN_REPOSITORY.to_string());

        let mut metadata = Map::new();
        metadata.insert(
            "trigger_source".into(),
            trigger.trigger_source.unwrap_or_else(|| "webhook".into()).into(),
        );
        metadata.insert(
            "branch".into(),
            trigger.branch.unwrap_or_else(|| DEFAULT_BRANCH.into()).into(),
        );
        metadata.insert("commit_sha".into(), trigger.commit_sha.map_or(Value::Null, Value::from));
        metadata.insert("pr_number".into(), trigger.pr_number.map_or(Value::Null, Value::from));
        metadata.insert(
            "event_type".into(),
            trigger.event_type.unwrap_or_else(|| "push".into()).into(),
        );
        metadata.insert("webhook_token_name".into(), record.name.clone().into());

        let mut entry = ScanHistory::running(repository_name, TriggerType::Webhook);
        entry.metadata = metadata;
        let entry = self.history.insert(entry).await?;

        tracing::info!(
            scan_id = %entry.id,
            repository = %entry.repository_name,
            token_name = %record.name,
            "Webhook scan triggered"
        );
        Ok(entry)
    }
}

impl std::fmt::Debug for WebhookTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookTokens").finish_non_exhaustive()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
