//! Data access for PV/wind site forecasts.
//!
//! The core is [`forecast::resolve_latest_values`], which picks the latest
//! forecast value per site and target interval under horizon, day-ahead,
//! model and creation-time filters, optionally adjusted by curtailments and
//! summed by region.

pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod store;
pub mod telemetry;

#[cfg(feature = "api")]
pub mod api;

pub use error::{DataError, DataResult};
