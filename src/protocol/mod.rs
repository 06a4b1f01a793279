//! Wire protocol for the execution service
//!
//! JSON frames over a WebSocket, discriminated by a `type` field, plus the
//! registry of languages the service runs.

pub mod frame;
pub mod language;

// Re-export commonly used types
pub use frame::{Frame, SIGKILL, SourceFile, StreamKind};
pub use language::{LANGUAGES, Language};
