//! Configuration Module
//!
//! Configuration loading for the fulfillment service.

mod settings;

pub use settings::{
    ConfigError, Credentials, FulfillmentConfig, HostMode, HostSettings, RECOMMENDED_POLL_SECS,
    ServerSettings, StoreSettings,
};
