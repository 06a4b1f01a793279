//! Callback surface for interactive execution sessions

use std::sync::Arc;

use tokio::sync::mpsc;

/// Events produced by a session, in wire arrival order.
///
/// This is the channel-consumable mirror of [`ExecutionCallbacks`]; the CLI
/// select loop and the integration tests drive on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    /// Runtime acknowledged; the program is executing.
    Ready,
    /// A chunk of program output. `is_error` marks stderr.
    Output { text: String, is_error: bool },
    /// The program finished with the given exit code. Terminal.
    Exit { code: i32 },
    /// The session failed: a service-reported error or a dropped
    /// connection. Terminal.
    Error { message: String },
}

/// The four handlers a session invokes over its lifetime.
///
/// Handlers are bound at construction and called inline from the session's
/// reader task, so invocation order always matches wire arrival order.
/// Exactly one of `on_exit`/`on_error` fires per session, unless the caller
/// stops it first.
#[derive(Clone)]
pub struct ExecutionCallbacks {
    on_ready: Arc<dyn Fn() + Send + Sync>,
    on_output: Arc<dyn Fn(&str, bool) + Send + Sync>,
    on_exit: Arc<dyn Fn(i32) + Send + Sync>,
    on_error: Arc<dyn Fn(&str) + Send + Sync>,
}

impl ExecutionCallbacks {
    /// Build a callback set from four closures.
    pub fn new(
        on_ready: impl Fn() + Send + Sync + 'static,
        on_output: impl Fn(&str, bool) + Send + Sync + 'static,
        on_exit: impl Fn(i32) + Send + Sync + 'static,
        on_error: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_ready: Arc::new(on_ready),
            on_output: Arc::new(on_output),
            on_exit: Arc::new(on_exit),
            on_error: Arc::new(on_error),
        }
    }

    /// Build a callback set that forwards every invocation as an
    /// [`ExecEvent`] on an unbounded channel.
    ///
    /// Send failures are ignored: a dropped receiver just means nobody is
    /// watching the session anymore.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let ready_tx = event_tx.clone();
        let output_tx = event_tx.clone();
        let exit_tx = event_tx.clone();
        let error_tx = event_tx;

        let callbacks = Self::new(
            move || {
                let _ = ready_tx.send(ExecEvent::Ready);
            },
            move |text, is_error| {
                let _ = output_tx.send(ExecEvent::Output {
                    text: text.to_string(),
                    is_error,
                });
            },
            move |code| {
                let _ = exit_tx.send(ExecEvent::Exit { code });
            },
            move |message| {
                let _ = error_tx.send(ExecEvent::Error {
                    message: message.to_string(),
                });
            },
        );

        (callbacks, event_rx)
    }

    pub(crate) fn ready(&self) {
        (self.on_ready)();
    }

    pub(crate) fn output(&self, text: &str, is_error: bool) {
        (self.on_output)(text, is_error);
    }

    pub(crate) fn exit(&self, code: i32) {
        (self.on_exit)(code);
    }

    pub(crate) fn error(&self, message: &str) {
        (self.on_error)(message);
    }
}
