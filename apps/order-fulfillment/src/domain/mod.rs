//! Domain Layer - Orders and delivery bookkeeping.
//!
//! This layer contains the order record read from the shop's store and the
//! tracker that remembers which orders were already handed off for
//! execution. It has no knowledge of HTTP, threads or the game host.

/// Order records and their lifecycle status.
pub mod order;

/// Delivery tracking (per-process deduplication of dispatched orders).
pub mod delivery;
