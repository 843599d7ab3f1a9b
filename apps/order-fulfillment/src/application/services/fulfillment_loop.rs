//! Fulfillment Loop Service
//!
//! Polls the order store on a fixed period and moves each new order through
//! `fetch → dedupe → execute → acknowledge`.
//!
//! # Cycle
//!
//! 1. Fetch pending orders (oldest first). A failed fetch skips the cycle.
//! 2. For each order, in store order: skip it if it is not pending or the
//!    tracker already holds its identifier, otherwise claim the identifier
//!    and submit the command to the host executor.
//! 3. Every submission gets an acknowledgment task that waits for the host
//!    answer and then marks the order delivered, whatever the answer was.
//!
//! The cycle returns once every order has been handed off. Acknowledgments
//! run on a [`TaskTracker`] and may interleave with later dispatches.
//!
//! # Delivery Semantics
//!
//! At least once across restarts, at most one dispatch attempt per order per
//! process. A failed acknowledgment is logged and dropped: the tracker entry
//! stays, so the order is not dispatched again by this process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::application::ports::{
    CommandExecutor, DispatchFault, DispatchTicket, FetchError, OrderSink, OrderSource,
    UpdateError,
};
use crate::domain::delivery::DeliveryTracker;
use crate::domain::order::OrderRecord;
use crate::infrastructure::metrics::{self, DispatchOutcome};

use super::loop_stats::LoopStats;

// =============================================================================
// Configuration
// =============================================================================

/// Fulfillment loop settings.
#[derive(Debug, Clone)]
pub struct FulfillmentLoopConfig {
    /// Time between the starts of two poll cycles.
    pub poll_interval: Duration,
}

impl Default for FulfillmentLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
        }
    }
}

// =============================================================================
// Cycle Report
// =============================================================================

/// What one successful poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Orders returned by the store.
    pub fetched: usize,
    /// Orders skipped because they were already dispatched.
    pub skipped_seen: usize,
    /// Orders skipped because they were not `paid` and undelivered.
    pub skipped_not_pending: usize,
    /// Orders handed to the host executor.
    pub dispatched: usize,
}

// =============================================================================
// Fulfillment Loop
// =============================================================================

/// Polling loop that fulfills paid orders exactly once per process.
pub struct FulfillmentLoop<S, K, E>
where
    S: OrderSource,
    K: OrderSink,
    E: CommandExecutor,
{
    config: FulfillmentLoopConfig,
    source: Arc<S>,
    sink: Arc<K>,
    executor: Arc<E>,
    tracker: Arc<dyn DeliveryTracker>,
    stats: Arc<LoopStats>,
    acks: TaskTracker,
}

impl<S, K, E> FulfillmentLoop<S, K, E>
where
    S: OrderSource + 'static,
    K: OrderSink + 'static,
    E: CommandExecutor + 'static,
{
    /// Create a loop over the given ports.
    #[must_use]
    pub fn new(
        config: FulfillmentLoopConfig,
        source: Arc<S>,
        sink: Arc<K>,
        executor: Arc<E>,
        tracker: Arc<dyn DeliveryTracker>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            executor,
            tracker,
            stats: Arc::new(LoopStats::new()),
            acks: TaskTracker::new(),
        }
    }

    /// Shared statistics handle.
    #[must_use]
    pub fn stats(&self) -> Arc<LoopStats> {
        Arc::clone(&self.stats)
    }

    /// Shared delivery tracker handle.
    #[must_use]
    pub fn tracker(&self) -> Arc<dyn DeliveryTracker> {
        Arc::clone(&self.tracker)
    }

    /// Acknowledgment tasks still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.acks.len()
    }

    /// Run poll cycles until `cancel` fires.
    ///
    /// The first cycle starts immediately. Each cycle is awaited before the
    /// next tick is taken, so cycles never overlap; a tick missed while a
    /// cycle was running is skipped. Cancellation is only observed between
    /// cycles and does not abort running acknowledgments; call
    /// [`drain`](Self::drain) to wait for them.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            "Fulfillment loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!(
                        in_flight = self.in_flight(),
                        "Fulfillment loop stopping"
                    );
                    break;
                }
                _ = interval.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    /// Run one cycle and absorb its failure.
    ///
    /// Returns `None` if the fetch failed; the error is logged and counted.
    pub async fn poll_once(&self) -> Option<CycleReport> {
        let started = Instant::now();
        let result = self.run_cycle().await;
        metrics::record_cycle_duration(started.elapsed());

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    consecutive_failures = self.stats.consecutive_fetch_failures(),
                    "Failed to fetch pending orders, retrying next cycle"
                );
                None
            }
        }
    }

    /// Fetch pending orders and hand every new one to the host.
    ///
    /// Returns once all orders of the cycle are submitted. Their
    /// acknowledgments continue in the background.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the store could not be read. The tracker is
    /// left untouched in that case.
    pub async fn run_cycle(&self) -> Result<CycleReport, FetchError> {
        self.stats.record_cycle();
        tracing::debug!("Polling order store");

        let orders = match self.source.fetch().await {
            Ok(orders) => orders,
            Err(e) => {
                self.stats.record_fetch_failure(e.to_string());
                metrics::record_fetch_failure(e.kind());
                return Err(e);
            }
        };
        self.stats.record_fetch_success();
        metrics::record_orders_fetched(orders.len());

        let mut report = CycleReport {
            fetched: orders.len(),
            ..CycleReport::default()
        };

        if orders.is_empty() {
            tracing::debug!("No pending orders");
            return Ok(report);
        }

        for order in orders {
            if !order.is_pending() {
                tracing::warn!(
                    order_id = %order.id,
                    status = %order.status,
                    delivered = order.delivered,
                    "Store returned an order that is not pending, skipping"
                );
                report.skipped_not_pending += 1;
                continue;
            }

            if !self.tracker.claim(&order.id) {
                tracing::warn!(
                    order_id = %order.id,
                    "Order already dispatched in this process, skipping"
                );
                report.skipped_seen += 1;
                continue;
            }

            self.dispatch(order);
            report.dispatched += 1;
        }

        metrics::set_tracked_orders(self.tracker.len());
        Ok(report)
    }

    /// Wait for every acknowledgment task spawned so far.
    pub async fn drain(&self) {
        self.acks.close();
        self.acks.wait().await;
        self.acks.reopen();
    }

    fn dispatch(&self, order: OrderRecord) {
        tracing::info!(
            order_id = %order.id,
            buyer = %order.buyer,
            product = %order.product,
            command = %order.command,
            "Dispatching order"
        );

        let ticket = self
            .executor
            .submit(&order)
            .unwrap_or_else(|fault| DispatchTicket::ready(Err(fault)));
        self.stats.record_dispatched();
        metrics::record_order_dispatched();

        let sink = Arc::clone(&self.sink);
        let stats = Arc::clone(&self.stats);
        self.acks.spawn(async move {
            let outcome = ticket.outcome().await;
            record_outcome(&stats, &order, &outcome);
            acknowledge(sink.as_ref(), &stats, &order.id).await;
        });
    }
}

fn record_outcome(stats: &LoopStats, order: &OrderRecord, outcome: &Result<bool, DispatchFault>) {
    match outcome {
        Ok(true) => {
            tracing::debug!(order_id = %order.id, "Host ran command");
            metrics::record_dispatch_outcome(DispatchOutcome::Success);
        }
        Ok(false) => {
            tracing::warn!(
                order_id = %order.id,
                command = %order.command,
                "Host reported command failure, acknowledging anyway"
            );
            stats.record_command_failure();
            metrics::record_dispatch_outcome(DispatchOutcome::Failure);
        }
        Err(fault) => {
            tracing::warn!(
                order_id = %order.id,
                error = %fault,
                "Command was not executed, acknowledging anyway"
            );
            stats.record_dispatch_fault();
            metrics::record_dispatch_outcome(DispatchOutcome::Fault);
        }
    }
}

async fn acknowledge<K: OrderSink + ?Sized>(sink: &K, stats: &LoopStats, order_id: &str) {
    match sink.acknowledge(order_id).await {
        Ok(()) => {
            stats.record_acknowledged();
            metrics::record_order_acknowledged();
            tracing::info!(order_id, "Order marked delivered");
        }
        Err(UpdateError::Status { status, body }) => {
            stats.record_ack_failure();
            metrics::record_ack_failure();
            tracing::warn!(order_id, status, body = %body, "Store rejected delivered update");
        }
        Err(e) => {
            stats.record_ack_failure();
            metrics::record_ack_failure();
            tracing::warn!(order_id, error = %e, "Failed to mark order delivered");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{MockOrderSink, MockOrderSource};
    use crate::domain::delivery::InMemoryDeliveryTracker;
    use crate::domain::order::OrderStatus;

    /// Executor that answers every submission immediately.
    struct FakeExecutor {
        submitted: Mutex<Vec<String>>,
        answer: Result<bool, DispatchFault>,
        refuse: bool,
    }

    impl FakeExecutor {
        fn answering(answer: Result<bool, DispatchFault>) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                answer,
                refuse: false,
            }
        }

        fn refusing() -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                answer: Ok(true),
                refuse: true,
            }
        }

        fn submitted(&self) -> Vec<String> {
            self.submitted.lock().clone()
        }
    }

    impl CommandExecutor for FakeExecutor {
        fn submit(&self, order: &OrderRecord) -> Result<DispatchTicket, DispatchFault> {
            if self.refuse {
                return Err(DispatchFault::ExecutorClosed);
            }
            self.submitted.lock().push(order.command.clone());
            Ok(DispatchTicket::ready(self.answer.clone()))
        }
    }

    /// Sink whose acknowledgment takes a while to land.
    struct SlowSink {
        delay: Duration,
        acked: Mutex<Vec<String>>,
    }

    impl SlowSink {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                acked: Mutex::new(Vec::new()),
            }
        }

        fn acked(&self) -> Vec<String> {
            self.acked.lock().clone()
        }
    }

    #[async_trait]
    impl OrderSink for SlowSink {
        async fn acknowledge(&self, order_id: &str) -> Result<(), UpdateError> {
            tokio::time::sleep(self.delay).await;
            self.acked.lock().push(order_id.to_string());
            Ok(())
        }
    }

    fn steve() -> OrderRecord {
        OrderRecord::paid("o1", "Steve", "VIP", "lp user Steve parent add vip")
    }

    fn source_returning(orders: Vec<OrderRecord>) -> MockOrderSource {
        let mut source = MockOrderSource::new();
        source.expect_fetch().returning(move || Ok(orders.clone()));
        source
    }

    fn sink_recording(acked: Arc<Mutex<Vec<String>>>) -> MockOrderSink {
        let mut sink = MockOrderSink::new();
        sink.expect_acknowledge().returning(move |id| {
            acked.lock().push(id.to_string());
            Ok(())
        });
        sink
    }

    fn build(
        source: MockOrderSource,
        sink: MockOrderSink,
        executor: Arc<FakeExecutor>,
    ) -> FulfillmentLoop<MockOrderSource, MockOrderSink, FakeExecutor> {
        FulfillmentLoop::new(
            FulfillmentLoopConfig::default(),
            Arc::new(source),
            Arc::new(sink),
            executor,
            Arc::new(InMemoryDeliveryTracker::new()),
        )
    }

    #[tokio::test]
    async fn dispatches_then_acknowledges() {
        let acked = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(
            source_returning(vec![steve()]),
            sink_recording(Arc::clone(&acked)),
            Arc::clone(&executor),
        );

        let report = fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(report.fetched, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(executor.submitted(), vec!["lp user Steve parent add vip"]);
        assert_eq!(*acked.lock(), vec!["o1"]);
        assert!(fulfillment.tracker().seen("o1"));
        assert_eq!(fulfillment.stats().snapshot().acknowledged, 1);
    }

    #[tokio::test]
    async fn empty_fetch_dispatches_nothing() {
        let mut sink = MockOrderSink::new();
        sink.expect_acknowledge().never();
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(source_returning(Vec::new()), sink, Arc::clone(&executor));

        let report = fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(report, CycleReport::default());
        assert!(executor.submitted().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_leaves_tracker_unchanged_and_next_cycle_runs() {
        let calls = AtomicUsize::new(0);
        let mut source = MockOrderSource::new();
        source.expect_fetch().returning(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FetchError::Status {
                    status: 500,
                    body: "internal".to_string(),
                })
            } else {
                Ok(vec![steve()])
            }
        });
        let acked = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(source, sink_recording(Arc::clone(&acked)), Arc::clone(&executor));

        assert!(fulfillment.poll_once().await.is_none());
        assert!(fulfillment.tracker().is_empty());
        assert_eq!(fulfillment.stats().consecutive_fetch_failures(), 1);

        let report = fulfillment.poll_once().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(report.dispatched, 1);
        assert_eq!(*acked.lock(), vec!["o1"]);
        assert_eq!(fulfillment.stats().consecutive_fetch_failures(), 0);
    }

    #[tokio::test]
    async fn order_returned_again_is_not_dispatched_twice() {
        let acked = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(
            source_returning(vec![steve(), steve()]),
            sink_recording(Arc::clone(&acked)),
            Arc::clone(&executor),
        );

        let first = fulfillment.run_cycle().await.unwrap();
        let second = fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(first.dispatched, 1);
        assert_eq!(first.skipped_seen, 1);
        assert_eq!(second.dispatched, 0);
        assert_eq!(second.skipped_seen, 2);
        assert_eq!(executor.submitted().len(), 1);
        assert_eq!(acked.lock().len(), 1);
    }

    #[tokio::test]
    async fn failed_command_is_still_acknowledged() {
        let acked = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(FakeExecutor::answering(Ok(false)));
        let fulfillment = build(
            source_returning(vec![steve()]),
            sink_recording(Arc::clone(&acked)),
            executor,
        );

        fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(*acked.lock(), vec!["o1"]);
        assert_eq!(fulfillment.stats().snapshot().command_failures, 1);
    }

    #[tokio::test]
    async fn dispatch_fault_is_still_acknowledged() {
        let acked = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(FakeExecutor::answering(Err(DispatchFault::HostUnavailable(
            "connection refused".to_string(),
        ))));
        let fulfillment = build(
            source_returning(vec![steve()]),
            sink_recording(Arc::clone(&acked)),
            executor,
        );

        fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(*acked.lock(), vec!["o1"]);
        assert!(fulfillment.tracker().seen("o1"));
        assert_eq!(fulfillment.stats().snapshot().dispatch_faults, 1);
    }

    #[tokio::test]
    async fn refused_submission_is_still_acknowledged() {
        let acked = Arc::new(Mutex::new(Vec::new()));
        let fulfillment = build(
            source_returning(vec![steve()]),
            sink_recording(Arc::clone(&acked)),
            Arc::new(FakeExecutor::refusing()),
        );

        let report = fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(report.dispatched, 1);
        assert_eq!(*acked.lock(), vec!["o1"]);
        assert_eq!(fulfillment.stats().snapshot().dispatch_faults, 1);
    }

    #[tokio::test]
    async fn acknowledgment_failure_does_not_stop_the_batch() {
        let mut sink = MockOrderSink::new();
        sink.expect_acknowledge()
            .withf(|id| id == "o1")
            .times(1)
            .returning(|_| {
                Err(UpdateError::Status {
                    status: 401,
                    body: "invalid api key".to_string(),
                })
            });
        sink.expect_acknowledge()
            .withf(|id| id == "o2")
            .times(1)
            .returning(|_| Ok(()));
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(
            source_returning(vec![steve(), OrderRecord::paid("o2", "Alex", "Kit", "give Alex diamond 1")]),
            sink,
            Arc::clone(&executor),
        );

        let report = fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(report.dispatched, 2);
        let stats = fulfillment.stats().snapshot();
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.ack_failures, 1);
        assert!(fulfillment.tracker().seen("o1"));
    }

    #[tokio::test]
    async fn non_pending_orders_are_skipped() {
        let mut sink = MockOrderSink::new();
        sink.expect_acknowledge().never();
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(
            source_returning(vec![
                steve().with_delivered(true),
                OrderRecord::paid("o2", "Alex", "Kit", "give Alex diamond 1")
                    .with_status(OrderStatus::Delivered),
            ]),
            sink,
            Arc::clone(&executor),
        );

        let report = fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        assert_eq!(report.skipped_not_pending, 2);
        assert!(executor.submitted().is_empty());
        assert!(fulfillment.tracker().is_empty());
    }

    #[tokio::test]
    async fn submissions_follow_store_order() {
        let orders = (1..=5)
            .map(|i| OrderRecord::paid(format!("o{i}"), "Steve", "Kit", format!("give Steve kit_{i}")))
            .collect();
        let acked = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(FakeExecutor::answering(Ok(true)));
        let fulfillment = build(
            source_returning(orders),
            sink_recording(Arc::clone(&acked)),
            Arc::clone(&executor),
        );

        fulfillment.run_cycle().await.unwrap();
        fulfillment.drain().await;

        let expected: Vec<String> = (1..=5).map(|i| format!("give Steve kit_{i}")).collect();
        assert_eq!(executor.submitted(), expected);
        assert_eq!(acked.lock().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_immediately_and_stops_on_cancel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut source = MockOrderSource::new();
        source.expect_fetch().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });
        let fulfillment = Arc::new(FulfillmentLoop::new(
            FulfillmentLoopConfig {
                poll_interval: Duration::from_secs(15),
            },
            Arc::new(source),
            Arc::new(MockOrderSink::new()),
            Arc::new(FakeExecutor::answering(Ok(true))),
            Arc::new(InMemoryDeliveryTracker::new()),
        ));
        let cancel = CancellationToken::new();

        let runner = {
            let fulfillment = Arc::clone(&fulfillment);
            let cancel = cancel.clone();
            tokio::spawn(async move { fulfillment.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        runner.await.unwrap();
        assert_eq!(fulfillment.stats().cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_lets_running_acknowledgment_finish() {
        let sink = Arc::new(SlowSink::new(Duration::from_millis(300)));
        let fulfillment = Arc::new(FulfillmentLoop::new(
            FulfillmentLoopConfig {
                poll_interval: Duration::from_secs(15),
            },
            Arc::new(source_returning(vec![steve()])),
            Arc::clone(&sink),
            Arc::new(FakeExecutor::answering(Ok(true))),
            Arc::new(InMemoryDeliveryTracker::new()),
        ));
        let cancel = CancellationToken::new();

        let runner = {
            let fulfillment = Arc::clone(&fulfillment);
            let cancel = cancel.clone();
            tokio::spawn(async move { fulfillment.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        runner.await.unwrap();

        assert_eq!(fulfillment.in_flight(), 1);
        assert!(sink.acked().is_empty());

        fulfillment.drain().await;

        assert_eq!(fulfillment.in_flight(), 0);
        assert_eq!(sink.acked(), vec!["o1"]);
        assert_eq!(fulfillment.stats().snapshot().acknowledged, 1);
    }
}
