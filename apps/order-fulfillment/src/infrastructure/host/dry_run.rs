//! Dry-run host: logs commands instead of running them.

use crate::application::ports::{CommandHost, HostError};

/// [`CommandHost`] that accepts every command without side effects.
#[derive(Debug, Default)]
pub struct DryRunHost {
    dispatched: u64,
}

impl DryRunHost {
    /// Create a dry-run host.
    #[must_use]
    pub const fn new() -> Self {
        Self { dispatched: 0 }
    }

    /// Commands accepted so far.
    #[must_use]
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl CommandHost for DryRunHost {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn dispatch(&mut self, command: &str) -> Result<bool, HostError> {
        self.dispatched += 1;
        tracing::info!(command, "Dry run, command not executed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_command() {
        let mut host = DryRunHost::new();
        assert_eq!(host.dispatch("lp user Steve parent add vip"), Ok(true));
        assert_eq!(host.dispatch(""), Ok(true));
        assert_eq!(host.dispatched(), 2);
    }
}
