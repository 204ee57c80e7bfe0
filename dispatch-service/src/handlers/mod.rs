pub mod dispatch;

pub use dispatch::{forward_to_crm, notify_webhooks};
