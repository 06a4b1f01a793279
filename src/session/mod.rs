//! Interactive execution session module
//!
//! The session owns one WebSocket connection to the execution service and
//! drives its whole lifecycle: connect, init, output streaming, stdin
//! forwarding, termination. Callers observe it exclusively through the
//! callback set bound at construction.

pub mod events;
pub mod executor;

pub use events::{ExecEvent, ExecutionCallbacks};
pub use executor::{InteractiveExecutor, SessionError, SessionOp, SessionState};
