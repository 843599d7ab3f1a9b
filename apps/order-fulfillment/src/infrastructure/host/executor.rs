//! Host Execution Context
//!
//! The host accepts commands from exactly one thread. [`HostExecutor`] owns
//! that thread and the [`CommandHost`] living on it; everything else talks
//! to it through an unbounded queue of [`HostJob`]s, which the thread runs
//! one at a time in the order they were queued.

use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::application::ports::{
    CommandExecutor, CommandHost, DispatchCompleter, DispatchFault, DispatchTicket,
};
use crate::domain::order::OrderRecord;

/// Name of the host thread.
pub const HOST_THREAD_NAME: &str = "order-fulfillment-host";

/// One command waiting for the host thread.
#[derive(Debug)]
struct HostJob {
    order_id: String,
    command: String,
    completer: DispatchCompleter,
}

/// [`CommandExecutor`] backed by a dedicated host thread.
#[derive(Debug)]
pub struct HostExecutor {
    jobs: mpsc::UnboundedSender<HostJob>,
    thread: JoinHandle<()>,
    host_name: &'static str,
}

impl HostExecutor {
    /// Move `host` onto a new host thread and start taking jobs.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchFault::Spawn`] if the thread cannot be started.
    pub fn spawn<H>(host: H) -> Result<Self, DispatchFault>
    where
        H: CommandHost + 'static,
    {
        let host_name = host.name();
        let (jobs, queue) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(HOST_THREAD_NAME.to_string())
            .spawn(move || run_host(host, queue))
            .map_err(|e| DispatchFault::Spawn(e.to_string()))?;

        tracing::info!(host = host_name, "Host execution context started");
        Ok(Self {
            jobs,
            thread,
            host_name,
        })
    }

    /// Adapter name of the host.
    #[must_use]
    pub const fn host_name(&self) -> &'static str {
        self.host_name
    }

    /// Close the queue and wait for the host thread to finish queued jobs.
    pub async fn shutdown(self) {
        let Self {
            jobs,
            thread,
            host_name,
        } = self;
        drop(jobs);

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => tracing::info!(host = host_name, "Host execution context stopped"),
            Ok(Err(_)) => tracing::error!(host = host_name, "Host thread panicked"),
            Err(e) => tracing::error!(host = host_name, error = %e, "Failed to join host thread"),
        }
    }
}

impl CommandExecutor for HostExecutor {
    fn submit(&self, order: &OrderRecord) -> Result<DispatchTicket, DispatchFault> {
        let (completer, ticket) = DispatchTicket::channel();
        self.jobs
            .send(HostJob {
                order_id: order.id.clone(),
                command: order.command.clone(),
                completer,
            })
            .map_err(|_| DispatchFault::ExecutorClosed)?;
        Ok(ticket)
    }
}

fn run_host<H: CommandHost>(mut host: H, mut queue: mpsc::UnboundedReceiver<HostJob>) {
    while let Some(job) = queue.blocking_recv() {
        let result = host.dispatch(&job.command).map_err(DispatchFault::from);
        if let Err(fault) = &result {
            tracing::warn!(
                order_id = %job.order_id,
                host = host.name(),
                error = %fault,
                "Host could not run command"
            );
        }
        job.completer.complete(result);
    }
    tracing::debug!(host = host.name(), "Host queue closed");
}
