//! Application Services
//!
//! Long-running services that coordinate the ports. The fulfillment loop
//! polls the store on a fixed period and hands each new order to the host.

mod fulfillment_loop;
mod loop_stats;

pub use fulfillment_loop::{CycleReport, FulfillmentLoop, FulfillmentLoopConfig};
pub use loop_stats::{LoopStats, LoopStatsSnapshot};
