//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the ambient
//! service plumbing (configuration, telemetry, metrics, health).

/// Order store REST adapter (source and sink).
pub mod store;

/// Host execution context and command host adapters.
pub mod host;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;
