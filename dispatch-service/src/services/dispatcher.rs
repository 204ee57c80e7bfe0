//! Dispatch orchestration: event validation, recipient resolution and
//! best-effort concurrent fan-out.
//!
//! Only orchestration-level problems (unknown event, missing order, broken
//! configuration) surface as errors. Individual recipient failures degrade
//! into audit rows and never fail the dispatch request.

use crate::config::CrmConfig;
use crate::error::AppError;
use crate::models::{DeliveryChannel, EventType, Order};
use crate::services::database::DispatchStore;
use crate::services::delivery::{DeliveryEngine, DeliveryRequest, RecipientAuth};
use crate::services::ledger::build_ledger;
use crate::services::metrics::record_dispatch;
use crate::services::payload::{assemble, DispatchPayload};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Aggregate result of a webhook fan-out.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WebhookDispatchSummary {
    pub webhooks_notified: u32,
    pub failed: u32,
}

/// Result of a CRM forward. `skipped` marks the free-order short-circuit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CrmForwardOutcome {
    pub delivered: bool,
    pub skipped: bool,
}

pub struct Dispatcher {
    store: Arc<dyn DispatchStore>,
    engine: DeliveryEngine,
    crm: CrmConfig,
    default_commission: Decimal,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        engine: DeliveryEngine,
        crm: CrmConfig,
        default_commission: Decimal,
    ) -> Self {
        Self {
            store,
            engine,
            crm,
            default_commission,
        }
    }

    /// Fan an order event out to every active, event-matching subscription.
    ///
    /// All recipients are delivered to concurrently, each with its own
    /// retry timeline; one recipient's outage never delays or aborts
    /// another's delivery.
    #[instrument(skip(self), fields(order_id = %order_id, event = %event))]
    pub async fn notify_webhooks(
        &self,
        order_id: Uuid,
        event: EventType,
    ) -> Result<WebhookDispatchSummary, AppError> {
        let order = self.load_order(order_id).await?;
        let subscriptions = self.store.active_subscriptions(event).await?;

        if subscriptions.is_empty() {
            info!("No active subscriptions for event");
            record_dispatch("webhook", "no_recipients");
            return Ok(WebhookDispatchSummary {
                webhooks_notified: 0,
                failed: 0,
            });
        }

        let (_, body) = self.build_payload(&order, event).await?;

        let mut tasks = JoinSet::new();
        for subscription in subscriptions {
            let engine = self.engine.clone();
            let store = Arc::clone(&self.store);
            let request = DeliveryRequest {
                channel: DeliveryChannel::Webhook,
                url: subscription.webhook_url.clone(),
                auth: RecipientAuth::Signature {
                    secret: subscription.secret_key.clone(),
                },
                subscription_id: Some(subscription.subscription_id),
                order_id,
                event,
                body: body.clone(),
            };
            tasks.spawn(async move { engine.deliver(store.as_ref(), &request).await });
        }

        let mut notified = 0u32;
        let mut failed = 0u32;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(outcome) if outcome.delivered => notified += 1,
                Ok(_) => failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Delivery task panicked");
                    failed += 1;
                }
            }
        }

        info!(notified = notified, failed = failed, "Webhook fan-out settled");
        record_dispatch("webhook", "ok");
        Ok(WebhookDispatchSummary {
            webhooks_notified: notified,
            failed,
        })
    }

    /// Forward an order event to the configured CRM endpoint.
    ///
    /// Free orders are not forwarded: the short-circuit succeeds without
    /// producing a single delivery attempt or audit row.
    #[instrument(skip(self), fields(order_id = %order_id, event = %event))]
    pub async fn forward_to_crm(
        &self,
        order_id: Uuid,
        event: EventType,
    ) -> Result<CrmForwardOutcome, AppError> {
        if self.crm.url.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CRM endpoint is not configured"
            )));
        }

        let order = self.load_order(order_id).await?;
        let (payload, body) = self.build_payload(&order, event).await?;

        if order.is_free() || payload.data.totals.total_amount.is_zero() {
            info!(
                payment_method = order.payment_method.as_deref().unwrap_or(""),
                "Free order, skipping CRM forward"
            );
            record_dispatch("crm", "skipped_free");
            return Ok(CrmForwardOutcome {
                delivered: false,
                skipped: true,
            });
        }

        let request = DeliveryRequest {
            channel: DeliveryChannel::Crm,
            url: self.crm.url.clone(),
            auth: RecipientAuth::IntegrationKey {
                key: self.crm.integration_key.clone(),
            },
            subscription_id: None,
            order_id,
            event,
            body,
        };

        let outcome = self.engine.deliver(self.store.as_ref(), &request).await;
        record_dispatch("crm", if outcome.delivered { "ok" } else { "failed" });
        Ok(CrmForwardOutcome {
            delivered: outcome.delivered,
            skipped: false,
        })
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.store
            .load_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))
    }

    /// Build the ledger and payload once per dispatch; the serialized body
    /// is the exact string every recipient gets.
    async fn build_payload(
        &self,
        order: &Order,
        event: EventType,
    ) -> Result<(DispatchPayload, String), AppError> {
        let mut partner_ids: Vec<Uuid> = Vec::new();
        for item in &order.items {
            if let Some(pid) = item.partner_id {
                if !partner_ids.contains(&pid) {
                    partner_ids.push(pid);
                }
            }
        }
        if !partner_ids.contains(&order.partner_id) {
            partner_ids.push(order.partner_id);
        }

        let partners = self.store.load_partners(&partner_ids).await?;
        let entries = build_ledger(order, &partners, self.default_commission);
        if entries.is_empty() {
            warn!("Order produced no ledger entries, payload carries empty partner list");
        }

        let payload = assemble(order, &entries, event, Utc::now())?;
        let body = serde_json::to_string(&payload)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Payload serialization: {}", e)))?;
        Ok((payload, body))
    }
}
