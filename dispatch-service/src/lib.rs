//! Dispatch Service - order event fan-out with per-partner financial breakdowns.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod services;
pub mod startup;

#[cfg(test)]
pub(crate) mod testing;
