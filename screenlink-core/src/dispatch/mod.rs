//! Inbound command handling.

mod dispatcher;

pub use dispatcher::CommandDispatcher;
