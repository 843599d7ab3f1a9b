//! Command Executor Port (Driven Port)
//!
//! The game host only accepts commands on its own single-threaded execution
//! context. The fulfillment loop therefore never calls the host directly: it
//! submits a unit of work to a [`CommandExecutor`], which queues it onto that
//! context and hands back a [`DispatchTicket`]. Awaiting the ticket yields
//! the host's answer once the command has run.
//!
//! [`CommandHost`] is the host capability the executor drives. It is
//! synchronous on purpose: it is only ever called from the host context.

use tokio::sync::oneshot;

use crate::domain::order::OrderRecord;

// =============================================================================
// Errors
// =============================================================================

/// Error reported by a host adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host cannot accept commands right now.
    #[error("command host unavailable: {0}")]
    Unavailable(String),
}

/// A dispatch that never reached a host answer.
///
/// The order is still acknowledged: re-delivery would not fix it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchFault {
    /// The host capability reported it is unavailable.
    #[error("host unavailable: {0}")]
    HostUnavailable(String),

    /// The executor queue was closed before the work completed.
    #[error("host executor is closed")]
    ExecutorClosed,

    /// The host execution context could not be started.
    #[error("failed to start host execution context: {0}")]
    Spawn(String),
}

impl From<HostError> for DispatchFault {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Unavailable(reason) => Self::HostUnavailable(reason),
        }
    }
}

// =============================================================================
// Dispatch Ticket
// =============================================================================

/// Pending result of one submitted command.
#[derive(Debug)]
pub struct DispatchTicket {
    outcome: oneshot::Receiver<Result<bool, DispatchFault>>,
}

/// Completion side of a [`DispatchTicket`], owned by the host context.
#[derive(Debug)]
pub struct DispatchCompleter {
    tx: oneshot::Sender<Result<bool, DispatchFault>>,
}

impl DispatchTicket {
    /// Create a linked completer and ticket.
    #[must_use]
    pub fn channel() -> (DispatchCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (DispatchCompleter { tx }, Self { outcome: rx })
    }

    /// Create a ticket that is already resolved.
    #[must_use]
    pub fn ready(result: Result<bool, DispatchFault>) -> Self {
        let (completer, ticket) = Self::channel();
        completer.complete(result);
        ticket
    }

    /// Wait for the host's answer.
    ///
    /// `Ok(true)` means the host accepted and ran the command, `Ok(false)`
    /// that it reported failure. Neither says anything about the command's
    /// own side effects.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchFault`] reported by the executor, or
    /// [`DispatchFault::ExecutorClosed`] if the work was dropped unanswered.
    pub async fn outcome(self) -> Result<bool, DispatchFault> {
        self.outcome
            .await
            .unwrap_or(Err(DispatchFault::ExecutorClosed))
    }
}

impl DispatchCompleter {
    /// Resolve the linked ticket. A ticket nobody awaits is ignored.
    pub fn complete(self, result: Result<bool, DispatchFault>) {
        let _ = self.tx.send(result);
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Port for handing an order's command to the host execution context.
pub trait CommandExecutor: Send + Sync {
    /// Queue the order's command and return without waiting for it to run.
    ///
    /// Work submitted from one caller runs in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchFault`] if the work could not be queued.
    fn submit(&self, order: &OrderRecord) -> Result<DispatchTicket, DispatchFault>;
}

/// The host's command-dispatch capability, run as a console-level actor.
pub trait CommandHost: Send {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Run one command verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Unavailable`] if the host cannot take commands.
    fn dispatch(&mut self, command: &str) -> Result<bool, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_ticket_yields_result() {
        assert_eq!(DispatchTicket::ready(Ok(true)).outcome().await, Ok(true));
        assert_eq!(DispatchTicket::ready(Ok(false)).outcome().await, Ok(false));
    }

    #[tokio::test]
    async fn dropped_completer_reports_closed_executor() {
        let (completer, ticket) = DispatchTicket::channel();
        drop(completer);
        assert_eq!(ticket.outcome().await, Err(DispatchFault::ExecutorClosed));
    }

    #[tokio::test]
    async fn completer_resolves_from_another_thread() {
        let (completer, ticket) = DispatchTicket::channel();
        std::thread::spawn(move || completer.complete(Ok(true)));
        assert_eq!(ticket.outcome().await, Ok(true));
    }

    #[test]
    fn host_error_maps_to_fault() {
        let fault: DispatchFault = HostError::Unavailable("offline".to_string()).into();
        assert_eq!(fault, DispatchFault::HostUnavailable("offline".to_string()));
    }
}
