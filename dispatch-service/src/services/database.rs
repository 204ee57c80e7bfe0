//! Database service for dispatch-service.
//!
//! Orders, items, partners and customer profiles are owned by the commerce
//! backend and read here; this service only appends to its own audit tables
//! and reads webhook subscriptions maintained by the admin surface.

use crate::error::AppError;
use crate::models::{
    DeliveryChannel, DeliveryLogRecord, EventType, Order, OrderItem, OrderRow, Partner,
    WebhookSubscription,
};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Read/append access required by the dispatch pipeline.
///
/// Implemented by [`Database`] in production; tests substitute an in-memory
/// double so delivery and orchestration behavior is assertable without a
/// live Postgres.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Load an order with its customer snapshot and ordered items.
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    /// Load the partner records for the given ids; missing ids are simply
    /// absent from the result.
    async fn load_partners(&self, partner_ids: &[Uuid]) -> Result<Vec<Partner>, AppError>;

    /// Active subscriptions whose event set contains `event`.
    async fn active_subscriptions(
        &self,
        event: EventType,
    ) -> Result<Vec<WebhookSubscription>, AppError>;

    /// Append one delivery-attempt audit row. Rows are never updated.
    async fn append_delivery_log(&self, record: &DeliveryLogRecord) -> Result<(), AppError>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "dispatch-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl DispatchStore for Database {
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["load_order"])
            .start_timer();

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT o.order_id, o.partner_id, o.customer_id, o.status, o.order_type,
                   o.iva_rate, o.iva_included_in_price, o.shipping_cost,
                   o.payment_method, o.payment_id, o.payment_status, o.payment_preference_id,
                   o.booking_id, o.service_id, o.appointment_date, o.appointment_time,
                   o.pet_id, o.booking_notes, o.created_utc, o.updated_utc,
                   p.full_name AS customer_full_name,
                   p.email AS customer_email,
                   p.phone AS customer_phone
            FROM orders o
            LEFT JOIN profiles p ON p.profile_id = o.customer_id
            WHERE o.order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load order: {}", e)))?;

        let Some(row) = row else {
            timer.observe_duration();
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT item_id, order_id, name, price, original_price, quantity,
                   discount_percentage, iva_rate, partner_id, position
            FROM order_items
            WHERE order_id = $1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load order items: {}", e))
        })?;

        timer.observe_duration();
        Ok(Some(Order::from_parts(row, items)))
    }

    #[instrument(skip(self, partner_ids))]
    async fn load_partners(&self, partner_ids: &[Uuid]) -> Result<Vec<Partner>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["load_partners"])
            .start_timer();

        let partners = sqlx::query_as::<_, Partner>(
            r#"
            SELECT partner_id, business_name, email, phone, address, city,
                   commission_percentage
            FROM partners
            WHERE partner_id = ANY($1)
            "#,
        )
        .bind(partner_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load partners: {}", e)))?;

        timer.observe_duration();
        Ok(partners)
    }

    #[instrument(skip(self), fields(event = %event))]
    async fn active_subscriptions(
        &self,
        event: EventType,
    ) -> Result<Vec<WebhookSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["active_subscriptions"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, WebhookSubscription>(
            r#"
            SELECT subscription_id, webhook_url, secret_key, events, is_active,
                   created_utc, updated_utc
            FROM webhook_subscriptions
            WHERE is_active = TRUE AND $1 = ANY(events)
            "#,
        )
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load subscriptions: {}", e))
        })?;

        timer.observe_duration();
        Ok(subscriptions)
    }

    #[instrument(skip(self, record), fields(order_id = %record.order_id, attempt = record.attempt_number))]
    async fn append_delivery_log(&self, record: &DeliveryLogRecord) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_delivery_log"])
            .start_timer();

        let table = match record.channel {
            DeliveryChannel::Webhook => "webhook_logs",
            DeliveryChannel::Crm => "crm_webhook_logs",
        };

        let query = format!(
            r#"
            INSERT INTO {} (log_id, subscription_id, order_id, event, payload,
                            response_status, response_body, attempt_number, success, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            table
        );

        sqlx::query(&query)
            .bind(record.log_id)
            .bind(record.subscription_id)
            .bind(record.order_id)
            .bind(&record.event)
            .bind(&record.payload)
            .bind(record.response_status)
            .bind(record.response_body.as_deref())
            .bind(record.attempt_number)
            .bind(record.success)
            .bind(record.created_utc)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to append delivery log: {}", e))
            })?;

        timer.observe_duration();
        Ok(())
    }
}
