//! Observability module for the academy service.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
