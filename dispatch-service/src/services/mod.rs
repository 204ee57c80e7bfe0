//! Services module for dispatch-service.

pub mod database;
pub mod delivery;
pub mod dispatcher;
pub mod ledger;
pub mod metrics;
pub mod payload;
pub mod signature;
pub mod tax;

pub use database::{Database, DispatchStore};
pub use delivery::{DeliveryEngine, DeliveryOutcome, DeliveryRequest, RecipientAuth};
pub use dispatcher::{CrmForwardOutcome, Dispatcher, WebhookDispatchSummary};
pub use metrics::{get_metrics, init_metrics, record_delivery_attempt, record_dispatch};
