//! Order Store Adapter
//!
//! Reads pending orders from, and writes delivered acknowledgments to, a
//! PostgREST-style REST endpoint (`<base>/rest/v1/<table>`).

mod client;
mod wire;

pub use client::{StoreClient, StoreClientConfig};
pub use wire::{DecodedOrders, DeliveredUpdate, decode_orders};
