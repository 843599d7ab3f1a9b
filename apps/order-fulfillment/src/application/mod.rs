//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the fulfillment loop and the port interfaces that
//! define how it talks to the order store and the game host.

/// Port interfaces for external systems (order store, command host).
pub mod ports;

/// Application services (the polling fulfillment loop).
pub mod services;
