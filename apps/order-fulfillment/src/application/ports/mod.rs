//! Application Ports (Driven)
//!
//! Interfaces the fulfillment loop uses to reach external systems.
//!
//! - `OrderSource`: reads pending orders from the store
//! - `OrderSink`: writes the delivered acknowledgment back
//! - `CommandExecutor`: hands a command to the host's execution context
//! - `CommandHost`: the host capability itself, driven by an executor

mod command_executor_port;
mod order_sink_port;
mod order_source_port;

pub use command_executor_port::{
    CommandExecutor, CommandHost, DispatchCompleter, DispatchFault, DispatchTicket, HostError,
};
pub use order_sink_port::{OrderSink, UpdateError};
pub use order_source_port::{FetchError, OrderSource, ParseError};

#[cfg(test)]
pub use order_sink_port::MockOrderSink;
#[cfg(test)]
pub use order_source_port::MockOrderSource;
