//! Calendar sync for service-contract due dates
//!
//! After every contract write the next visit is pushed to an external
//! calendar through a signed webhook. Delivery failures are reported to the
//! caller and never roll back the contract write.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;

use crm_core::{ContractStatus, Date, EntityId, ServiceContract, TenantId};

use crate::config::CalendarConfig;
use crate::telemetry::metrics;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Crm-Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarAction {
    /// Create or move the event for the next due date
    Upsert,
    /// The contract has no upcoming visit
    Cancel,
}

/// Payload posted to the calendar webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub action: CalendarAction,
    pub tenant_id: TenantId,
    pub contract_id: EntityId,
    pub account_id: EntityId,
    pub name: String,
    pub due_date: Option<Date>,
    pub status: ContractStatus,
    /// Event id from a previous sync, if any
    pub event_id: Option<String>,
}

impl CalendarEvent {
    pub fn for_contract(contract: &ServiceContract) -> Self {
        let action = match (contract.status, contract.next_due_date) {
            (ContractStatus::Active, Some(_)) => CalendarAction::Upsert,
            _ => CalendarAction::Cancel,
        };
        Self {
            action,
            tenant_id: contract.tenant_id,
            contract_id: contract.contract_id,
            account_id: contract.account_id,
            name: contract.name.clone(),
            due_date: contract.next_due_date,
            status: contract.status,
            event_id: contract.calendar_event_id.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Failed to build calendar client: {0}")]
    Client(String),

    #[error("Failed to sign calendar payload: {0}")]
    Signing(String),

    #[error("Calendar request failed: {0}")]
    Request(String),

    #[error("Calendar webhook returned status {0}")]
    Status(u16),
}

/// Outbound calendar integration.
#[async_trait]
pub trait CalendarSync: Send + Sync {
    /// Whether events are actually delivered anywhere.
    fn is_enabled(&self) -> bool;

    /// Deliver one event. Returns the event id assigned by the calendar, if
    /// it sent one back.
    async fn sync(&self, event: &CalendarEvent) -> Result<Option<String>, CalendarError>;
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopCalendarSync;

#[async_trait]
impl CalendarSync for NoopCalendarSync {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn sync(&self, _event: &CalendarEvent) -> Result<Option<String>, CalendarError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    event_id: Option<String>,
}

/// POSTs HMAC-signed JSON events to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookCalendarSync {
    client: reqwest::Client,
    url: String,
    signing_secret: Option<SecretString>,
}

/// Hex HMAC-SHA256 of `payload`.
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String, CalendarError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CalendarError::Signing(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl WebhookCalendarSync {
    pub fn new(
        url: impl Into<String>,
        signing_secret: Option<SecretString>,
        timeout: std::time::Duration,
    ) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            signing_secret,
        })
    }
}

#[async_trait]
impl CalendarSync for WebhookCalendarSync {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn sync(&self, event: &CalendarEvent) -> Result<Option<String>, CalendarError> {
        let body = serde_json::to_vec(event).map_err(|e| CalendarError::Request(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "CRM-Calendar/1.0");
        if let Some(secret) = &self.signing_secret {
            let signature = sign_payload(&body, secret.expose_secret())?;
            request = request.header(SIGNATURE_HEADER, format!("sha256={}", signature));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| CalendarError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status(status.as_u16()));
        }

        // An empty or non-JSON reply is a success without an event id
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CalendarError::Request(e.to_string()))?;
        Ok(serde_json::from_slice::<WebhookReply>(&bytes)
            .ok()
            .and_then(|reply| reply.event_id))
    }
}

/// Build the calendar integration from configuration.
pub fn from_config(config: &CalendarConfig) -> Result<Arc<dyn CalendarSync>, CalendarError> {
    match &config.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Calendar webhook sync enabled");
            Ok(Arc::new(WebhookCalendarSync::new(
                url.clone(),
                config.signing_secret.clone(),
                config.timeout,
            )?))
        }
        None => Ok(Arc::new(NoopCalendarSync)),
    }
}

/// Outcome of pushing a contract to the calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub synced: bool,
    pub event_id: Option<String>,
    pub error: Option<String>,
}

/// Push `contract` to the calendar, logging and recording failures.
pub async fn sync_contract(calendar: &dyn CalendarSync, contract: &ServiceContract) -> SyncOutcome {
    if !calendar.is_enabled() {
        return SyncOutcome::default();
    }

    let event = CalendarEvent::for_contract(contract);
    let outcome = match calendar.sync(&event).await {
        Ok(event_id) => {
            tracing::debug!(
                contract_id = %contract.contract_id,
                action = ?event.action,
                "Calendar event synced"
            );
            SyncOutcome {
                synced: true,
                event_id,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(
                contract_id = %contract.contract_id,
                error = %e,
                "Calendar sync failed"
            );
            SyncOutcome {
                synced: false,
                event_id: None,
                error: Some(e.to_string()),
            }
        }
    };

    if let Some(m) = metrics() {
        m.record_calendar_sync(outcome.synced);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Bytes, http::HeaderMap, routing::post, Json, Router};
    use chrono::{NaiveDate, Utc};
    use crm_core::{new_entity_id, ServiceFrequency};
    use std::sync::Mutex;
    use std::time::Duration;

    fn contract() -> ServiceContract {
        let now = Utc::now();
        ServiceContract {
            contract_id: new_entity_id(),
            tenant_id: new_entity_id(),
            owner_id: None,
            account_id: new_entity_id(),
            name: "HVAC maintenance".to_string(),
            description: None,
            frequency: ServiceFrequency::Quarterly,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: None,
            next_due_date: NaiveDate::from_ymd_opt(2026, 4, 1),
            last_completed_on: None,
            status: ContractStatus::Active,
            calendar_event_id: None,
            log_retention: 24,
            created_at: now,
            updated_at: now,
        }
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}/events", addr)
    }

    #[test]
    fn test_sign_payload_is_hex_sha256() {
        let signature = sign_payload(b"{\"a\":1}", "secret").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, sign_payload(b"{\"a\":1}", "secret").unwrap());
        assert_ne!(signature, sign_payload(b"{\"a\":1}", "other").unwrap());
    }

    #[test]
    fn test_event_action_follows_contract_state() {
        let mut c = contract();
        assert_eq!(CalendarEvent::for_contract(&c).action, CalendarAction::Upsert);

        c.status = ContractStatus::Expired;
        c.next_due_date = None;
        assert_eq!(CalendarEvent::for_contract(&c).action, CalendarAction::Cancel);
    }

    #[tokio::test]
    async fn test_noop_sync_reports_not_synced() {
        let outcome = sync_contract(&NoopCalendarSync, &contract()).await;
        assert!(!outcome.synced);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_webhook_sends_signed_body_and_reads_event_id() {
        let seen: Arc<Mutex<Vec<(Option<String>, Vec<u8>)>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            "/events",
            post(move |headers: HeaderMap, body: Bytes| {
                let captured = captured.clone();
                async move {
                    let signature = headers
                        .get(SIGNATURE_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    captured.lock().unwrap().push((signature, body.to_vec()));
                    Json(serde_json::json!({ "event_id": "evt-42" }))
                }
            }),
        );
        let url = spawn_server(router).await;

        let sync = WebhookCalendarSync::new(
            url,
            Some(SecretString::from("hook-secret".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();
        let outcome = sync_contract(&sync, &contract()).await;
        assert!(outcome.synced);
        assert_eq!(outcome.event_id.as_deref(), Some("evt-42"));

        let seen = seen.lock().unwrap();
        let (signature, body) = &seen[0];
        let expected = format!("sha256={}", sign_payload(body, "hook-secret").unwrap());
        assert_eq!(signature.as_deref(), Some(expected.as_str()));
        let event: CalendarEvent = serde_json::from_slice(body).unwrap();
        assert_eq!(event.action, CalendarAction::Upsert);
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_reported() {
        let router = Router::new().route(
            "/events",
            post(|| async { axum::http::StatusCode::BAD_GATEWAY }),
        );
        let url = spawn_server(router).await;

        let sync = WebhookCalendarSync::new(url, None, Duration::from_secs(5)).unwrap();
        let outcome = sync_contract(&sync, &contract()).await;
        assert!(!outcome.synced);
        assert!(outcome.error.unwrap().contains("502"));
    }
}
