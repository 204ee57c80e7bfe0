//! HTTP delivery with bounded retries and a durable audit trail.
//!
//! Every attempt writes exactly one audit row, success or not. Failures are
//! swallowed into those rows: nothing a recipient does can propagate an
//! error past [`DeliveryEngine::deliver`].

use crate::models::{DeliveryChannel, DeliveryLogRecord, EventType};
use crate::services::database::DispatchStore;
use crate::services::metrics::record_delivery_attempt;
use crate::services::signature::sign_payload;
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

/// Response bodies are truncated to this length before logging.
pub const RESPONSE_BODY_LIMIT: usize = 1000;

/// How a recipient authenticates the delivery.
#[derive(Debug, Clone)]
pub enum RecipientAuth {
    /// HMAC signature under the subscription's shared secret.
    Signature { secret: String },
    /// Static integration key header (CRM mode, no HMAC).
    IntegrationKey { key: Secret<String> },
}

/// One delivery unit: a recipient plus the exact bytes to send.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub channel: DeliveryChannel,
    pub url: String,
    pub auth: RecipientAuth,
    pub subscription_id: Option<Uuid>,
    pub order_id: Uuid,
    pub event: EventType,
    /// Serialized payload; the same bytes are signed and transmitted.
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct DeliveryEngine {
    client: reqwest::Client,
    max_attempts: u32,
    backoff_base: Duration,
    user_agent: String,
}

impl DeliveryEngine {
    pub fn new(
        client: reqwest::Client,
        max_attempts: u32,
        backoff_base: Duration,
        user_agent: String,
    ) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            backoff_base,
            user_agent,
        }
    }

    /// Deliver to one recipient, retrying with exponential backoff.
    ///
    /// Transport-level failures are treated exactly like a failed HTTP
    /// response: logged with status 0 and the error message as body, then
    /// retried under the same backoff.
    #[tracing::instrument(skip(self, store, request), fields(
        url = %request.url,
        order_id = %request.order_id,
        event = %request.event,
        channel = %request.channel,
    ))]
    pub async fn deliver(
        &self,
        store: &dyn DispatchStore,
        request: &DeliveryRequest,
    ) -> DeliveryOutcome {
        let signature = match &request.auth {
            RecipientAuth::Signature { secret } => match sign_payload(&request.body, secret) {
                Ok(signature) => Some(signature),
                Err(e) => {
                    warn!(error = %e, "Refusing to deliver unsigned payload");
                    self.append_log(store, request, 0, Some(e.to_string()), 1, false)
                        .await;
                    record_delivery_attempt(request.channel.as_str(), "signing_error");
                    return DeliveryOutcome {
                        delivered: false,
                        attempts: 0,
                    };
                }
            },
            RecipientAuth::IntegrationKey { .. } => None,
        };

        for attempt in 1..=self.max_attempts {
            let (status, body, success) = self.attempt(request, signature.as_deref()).await;

            self.append_log(store, request, status, body, attempt, success)
                .await;
            record_delivery_attempt(
                request.channel.as_str(),
                if success { "success" } else { "failure" },
            );

            if success {
                info!(attempt = attempt, status = status, "Delivery succeeded");
                return DeliveryOutcome {
                    delivered: true,
                    attempts: attempt,
                };
            }

            if attempt < self.max_attempts {
                let backoff = self.backoff_base * 2u32.pow(attempt);
                warn!(
                    attempt = attempt,
                    status = status,
                    backoff_ms = backoff.as_millis() as u64,
                    "Delivery attempt failed, retrying after backoff"
                );
                sleep(backoff).await;
            } else {
                warn!(
                    attempt = attempt,
                    status = status,
                    "Delivery failed after max attempts, giving up"
                );
            }
        }

        DeliveryOutcome {
            delivered: false,
            attempts: self.max_attempts,
        }
    }

    /// One HTTP attempt: (response status, truncated body, success).
    async fn attempt(
        &self,
        request: &DeliveryRequest,
        signature: Option<&str>,
    ) -> (i32, Option<String>, bool) {
        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .body(request.body.clone());

        builder = match &request.auth {
            RecipientAuth::Signature { .. } => builder
                .header("X-Signature", signature.unwrap_or_default())
                .header("X-Event", request.event.as_str()),
            RecipientAuth::IntegrationKey { key } => {
                builder.header("X-Integration-Key", key.expose_secret())
            }
        };

        match builder.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                (
                    status.as_u16() as i32,
                    Some(truncate(&body, RESPONSE_BODY_LIMIT)),
                    status.is_success(),
                )
            }
            Err(e) => (0, Some(truncate(&e.to_string(), RESPONSE_BODY_LIMIT)), false),
        }
    }

    /// Append an audit row; an audit failure is logged, never raised.
    async fn append_log(
        &self,
        store: &dyn DispatchStore,
        request: &DeliveryRequest,
        status: i32,
        body: Option<String>,
        attempt: u32,
        success: bool,
    ) {
        let record = DeliveryLogRecord::attempt(
            request.channel,
            request.subscription_id,
            request.order_id,
            request.event,
            &request.body,
            status,
            body,
            attempt,
            success,
        );

        if let Err(e) = store.append_delivery_log(&record).await {
            tracing::error!(
                error = %e,
                order_id = %request.order_id,
                attempt = attempt,
                "Failed to append delivery audit record"
            );
        }
    }
}

fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}
