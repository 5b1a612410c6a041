//! Metric definitions and export for the orchestrator.
//!
//! This crate provides a unified metrics interface using the `metrics` crate
//! facade. When the `prometheus` feature is enabled, metrics are exported in
//! Prometheus format behind a `/metrics` endpoint owned by the server crate.
//!
//! ```rust,ignore
//! use conflux_metrics::{counter, histogram};
//!
//! counter!("conflux_tool_calls_total", "provider" => "tickets", "status" => "ok").increment(1);
//! histogram!("conflux_tool_call_duration_seconds").record(0.123);
//! ```

mod definitions;
mod recorder;

pub use definitions::*;
pub use recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics};

// Re-export the facade macros for convenience so downstream crates depend on
// exactly one metrics crate.
pub use metrics::{counter, gauge, histogram};
