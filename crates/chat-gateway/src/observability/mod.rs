//! Observability module for the Chat Gateway.
//!
//! Provides metrics definitions and the Prometheus recorder.

pub mod metrics;
