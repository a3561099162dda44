//! Observability infrastructure for Trip Kitty
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for on-chain flows
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("kitty", LogFormat::Pretty)?;
//!
//! // Only when a metrics port is configured
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, FlowGuard, FlowMetrics};
