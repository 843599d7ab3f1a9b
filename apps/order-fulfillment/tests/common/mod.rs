//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use order_fulfillment::{
    CommandHost, DeliveryTracker, FulfillmentLoop, FulfillmentLoopConfig, HostError,
    HostExecutor, InMemoryDeliveryTracker, StoreClient, StoreClientConfig,
};
use parking_lot::Mutex;

pub const API_KEY: &str = "test-api-key";

/// One command as the host saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub command: String,
    pub thread: Option<String>,
}

/// Host that records every command and answers `true`.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.command.clone()).collect()
    }
}

impl CommandHost for RecordingHost {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn dispatch(&mut self, command: &str) -> Result<bool, HostError> {
        self.calls.lock().push(HostCall {
            command: command.to_string(),
            thread: std::thread::current().name().map(str::to_string),
        });
        Ok(true)
    }
}

pub type StoreLoop = FulfillmentLoop<StoreClient, StoreClient, HostExecutor>;

/// Fulfillment loop wired to a store at `base_url` and a recording host.
pub struct Harness {
    pub fulfillment: StoreLoop,
    pub host: RecordingHost,
    pub tracker: Arc<InMemoryDeliveryTracker>,
}

impl Harness {
    pub fn new(base_url: &str) -> Self {
        let store = Arc::new(
            StoreClient::new(&StoreClientConfig {
                base_url: base_url.to_string(),
                api_key: API_KEY.to_string(),
                table: "orders".to_string(),
                timeout: Duration::from_secs(5),
            })
            .unwrap(),
        );
        let host = RecordingHost::new();
        let executor = Arc::new(HostExecutor::spawn(host.clone()).unwrap());
        let tracker = Arc::new(InMemoryDeliveryTracker::new());
        let shared: Arc<dyn DeliveryTracker> = Arc::clone(&tracker) as Arc<dyn DeliveryTracker>;

        let fulfillment = FulfillmentLoop::new(
            FulfillmentLoopConfig {
                poll_interval: Duration::from_millis(50),
            },
            Arc::clone(&store),
            store,
            executor,
            shared,
        );

        Self {
            fulfillment,
            host,
            tracker,
        }
    }
}
