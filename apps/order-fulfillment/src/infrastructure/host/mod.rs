//! Command Host Adapters
//!
//! The host execution context ([`HostExecutor`]) and the host capabilities
//! it can drive:
//!
//! - [`RconHost`]: a Minecraft server's console over RCON
//! - [`DryRunHost`]: logs commands without running them

mod dry_run;
mod executor;
mod rcon;
mod reconnect;

pub use dry_run::DryRunHost;
pub use executor::{HOST_THREAD_NAME, HostExecutor};
pub use rcon::{MAX_COMMAND_BYTES, Packet, RconConfig, RconConnection, RconError, RconHost};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
