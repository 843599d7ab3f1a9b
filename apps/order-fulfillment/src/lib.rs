#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Order Fulfillment - Shop-to-Game Delivery Loop
//!
//! Polls the shop's order store for paid, undelivered orders, runs each
//! order's command on the game host exactly once per process, and marks the
//! order delivered in the store.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Order records and delivery bookkeeping
//!   - `order`: Order record and status
//!   - `delivery`: Per-process deduplication of dispatched orders
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Order source, order sink, command executor, command host
//!   - `services`: The polling fulfillment loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `store`: PostgREST order store client
//!   - `host`: Host execution thread, RCON and dry-run hosts
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`: Prometheus metrics
//!   - `telemetry`: Tracing setup
//!
//! # Data Flow
//!
//! ```text
//!            fetch                claim             submit
//! Store ──────────────► Loop ──────────► Tracker    ───────► Host thread ──► Game
//!   ▲                    │                                      │
//!   │   PATCH delivered  │  ack task (after host answer)        │
//!   └────────────────────┴──────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Orders and delivery tracking, no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::delivery::{DeliveryTracker, InMemoryDeliveryTracker};
pub use domain::order::{OrderRecord, OrderStatus};

// Ports
pub use application::ports::{
    CommandExecutor, CommandHost, DispatchFault, DispatchTicket, FetchError, HostError,
    OrderSink, OrderSource, ParseError, UpdateError,
};

// Fulfillment loop
pub use application::services::{
    CycleReport, FulfillmentLoop, FulfillmentLoopConfig, LoopStats, LoopStatsSnapshot,
};

// Adapters
pub use infrastructure::host::{
    DryRunHost, HOST_THREAD_NAME, HostExecutor, RconConfig, RconError, RconHost,
};
pub use infrastructure::store::{StoreClient, StoreClientConfig};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FulfillmentConfig, HostMode};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
