//! Configuration module for dispatch-service.

use crate::error::AppError;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub server: ServerConfig,
    pub service_name: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub crm: CrmConfig,
    pub delivery: DeliveryConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Target CRM endpoint for the single-recipient forwarding path.
///
/// An empty URL means the CRM path is not configured; forwarding attempts
/// then surface a configuration error instead of silently dropping events.
#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub url: String,
    pub integration_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Total delivery attempts per recipient, including the first.
    pub max_attempts: u32,
    /// Base unit for exponential backoff: attempt n sleeps base * 2^n.
    pub backoff_base_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Commission applied when a partner record carries no percentage.
    pub default_commission_percentage: Decimal,
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let server = config::Config::builder()
            .add_source(config::File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize::<ServerConfig>()?;

        Ok(Self {
            server,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "dispatch-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            crm: CrmConfig {
                url: get_env("CRM_URL", Some(""), is_prod)?,
                integration_key: Secret::new(get_env("CRM_INTEGRATION_KEY", Some(""), is_prod)?),
            },
            delivery: DeliveryConfig {
                max_attempts: env::var("DELIVERY_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                backoff_base_ms: env::var("DELIVERY_BACKOFF_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
                user_agent: env::var("DELIVERY_USER_AGENT")
                    .unwrap_or_else(|_| format!("dispatch-service/{}", env!("CARGO_PKG_VERSION"))),
            },
            ledger: LedgerConfig {
                default_commission_percentage: get_env("DEFAULT_COMMISSION_PERCENTAGE", Some("5.0"), is_prod)
                    .and_then(|s| {
                        Decimal::from_str(&s).map_err(|e| {
                            AppError::ConfigError(anyhow::anyhow!(
                                "Invalid DEFAULT_COMMISSION_PERCENTAGE: {}",
                                e
                            ))
                        })
                    })?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
