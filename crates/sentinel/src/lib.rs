//! Aqua sentinel HTTP service
//!
//! Exposes the forecasting pipeline over HTTP alongside health checks and
//! Prometheus metrics.

pub mod api;
pub mod config;
pub mod error;
