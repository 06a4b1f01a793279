//! Interactive execution session over one WebSocket connection

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::protocol::language;
use crate::protocol::{Frame, StreamKind};

use super::events::ExecutionCallbacks;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Session lifecycle states. Transitions are monotonic: a session never
/// moves backwards, and `Closed` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing started yet.
    Idle,
    /// `start()` accepted; connection in flight.
    Connecting,
    /// Init sent; waiting for the service to confirm a runtime.
    AwaitingRuntime,
    /// The program is executing; output flows and input may be sent.
    Running,
    /// `stop()` in progress; no further dispatch.
    Closing,
    /// Session over. A new executor is needed to run again.
    Closed,
}

/// Operations a caller can invoke on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Start,
    SendInput,
    Stop,
}

impl SessionState {
    /// The legal (state, operation) table. Every public operation checks it
    /// before any side effect: illegal `SendInput`/`Stop` are silent no-ops,
    /// an illegal `Start` is an explicit error.
    pub fn permits(self, op: SessionOp) -> bool {
        use SessionOp::*;
        use SessionState::*;

        match (self, op) {
            (Idle, Start) => true,
            (Running, SendInput) => true,
            (Idle | Connecting | AwaitingRuntime | Running, Stop) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// Errors `start()` can return. Everything after a successful `start()` is
/// reported through the session callbacks instead.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already active in state {0:?}; create a new executor to run again")]
    AlreadyRunning(SessionState),
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Outcome of dispatching one inbound frame.
enum Dispatch {
    Continue,
    Terminal,
}

/// An interactive execution session.
///
/// Owns exactly one WebSocket connection to the execution service for its
/// whole life. `start()` submits the program, the bound
/// [`ExecutionCallbacks`] receive everything the service sends back in wire
/// arrival order, and `send_input()`/`stop()` drive the running program.
/// One executor runs one program; construct a fresh one to run again.
pub struct InteractiveExecutor {
    core: Arc<SessionCore>,
}

/// State shared between the caller-facing handle and the reader task.
struct SessionCore {
    ws_url: String,
    connect_timeout: Duration,
    run_timeout_ms: u64,
    compile_timeout_ms: u64,
    callbacks: ExecutionCallbacks,
    state: StdMutex<SessionState>,
    /// Write half of the connection. `None` until connected and after close.
    writer: Mutex<Option<WsSink>>,
    /// Mirrors "write half installed and not closed" so `is_running()` can
    /// stay a synchronous query.
    transport_open: AtomicBool,
}

impl InteractiveExecutor {
    /// Create an executor bound to the given callbacks. No connection is
    /// opened until `start()`.
    pub fn new(config: &Config, callbacks: ExecutionCallbacks) -> Self {
        Self {
            core: Arc::new(SessionCore {
                ws_url: config.service.ws_url.clone(),
                connect_timeout: Duration::from_secs(config.service.connect_timeout_secs),
                run_timeout_ms: config.session.run_timeout_ms,
                compile_timeout_ms: config.session.compile_timeout_ms,
                callbacks,
                state: StdMutex::new(SessionState::Idle),
                writer: Mutex::new(None),
                transport_open: AtomicBool::new(false),
            }),
        }
    }

    /// Submit a program for execution.
    ///
    /// Returns immediately; connection progress, output and termination all
    /// arrive through the callbacks. Fails without side effects if the
    /// language key is unknown or the session has already been started.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, source: &str, language_key: &str) -> Result<(), SessionError> {
        let lang = language::resolve(language_key)
            .ok_or_else(|| SessionError::UnsupportedLanguage(language_key.to_string()))?;

        {
            let mut state = self.core.state_guard();
            if !state.permits(SessionOp::Start) {
                return Err(SessionError::AlreadyRunning(*state));
            }
            *state = SessionState::Connecting;
        }

        info!(
            "Starting {} session ({} {}, {} bytes of source)",
            lang.key,
            lang.wire_name,
            lang.version,
            source.len()
        );

        let init = Frame::init(
            lang.wire_name,
            lang.version,
            source,
            self.core.run_timeout_ms,
            self.core.compile_timeout_ms,
        );

        let core = self.core.clone();
        tokio::spawn(async move {
            core.connect_and_run(init).await;
        });

        Ok(())
    }

    /// Forward one line of stdin to the running program. A newline is
    /// appended. Outside the `Running` state this is a silent no-op;
    /// delivery is never guaranteed.
    pub async fn send_input(&self, text: &str) {
        self.core.send_input(text).await;
    }

    /// Terminate the session: best-effort SIGKILL to the remote process,
    /// then close the connection. Safe to call in any state and idempotent.
    /// Never produces a callback; callers synthesize their own notice.
    pub async fn stop(&self) {
        self.core.stop().await;
    }

    /// True while the program is executing and the connection is open.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.core.state_guard()
    }
}

impl Drop for InteractiveExecutor {
    fn drop(&mut self) {
        let state = *self.core.state_guard();
        if !matches!(state, SessionState::Idle | SessionState::Closed) {
            warn!(
                "Executor dropped in state {:?}; the service will reap the session on its own timeout",
                state
            );
        }
    }
}

impl SessionCore {
    /// Lock the state mutex, recovering from poisoning. The state is a bare
    /// enum, so a panicked holder cannot have left it inconsistent.
    fn state_guard(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_running(&self) -> bool {
        let state = *self.state_guard();
        state == SessionState::Running && self.transport_open.load(Ordering::SeqCst)
    }

    /// Connect, deliver init, then pump inbound frames until the session
    /// ends. Runs as a spawned task; all failures are reported through the
    /// callbacks.
    async fn connect_and_run(self: Arc<Self>, init: Frame) {
        // Serialized before connecting so nothing sits between the socket
        // opening and the init write. The service drops connections that
        // do not deliver init within its deadline.
        let init_text = match serde_json::to_string(&init) {
            Ok(text) => text,
            Err(e) => {
                self.fail_before_running(format!("Failed to encode init frame: {}", e));
                return;
            }
        };

        let connected =
            tokio::time::timeout(self.connect_timeout, connect_async(&self.ws_url)).await;
        let ws_stream = match connected {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                self.fail_before_running(format!(
                    "Failed to connect to execution service: {}",
                    e
                ));
                return;
            }
            Err(_) => {
                self.fail_before_running(format!(
                    "Connection to execution service timed out after {}s",
                    self.connect_timeout.as_secs()
                ));
                return;
            }
        };

        let (mut sink, stream) = ws_stream.split();

        if let Err(e) = sink.send(Message::Text(init_text)).await {
            if let Err(e) = sink.close().await {
                debug!("Error closing transport after failed init: {}", e);
            }
            self.fail_before_running(format!("Failed to send init frame: {}", e));
            return;
        }
        debug!("Init frame sent to {}", self.ws_url);

        // Install the write half, unless the caller stopped the session
        // while the connection was in flight. The writer lock is held
        // across the state check so `stop()` cannot slip in between; the
        // state guard is scoped so it never lives across an await.
        {
            let mut writer = self.writer.lock().await;
            let install = {
                let mut state = self.state_guard();
                if *state == SessionState::Connecting {
                    *state = SessionState::AwaitingRuntime;
                    true
                } else {
                    false
                }
            };
            if !install {
                debug!("Session stopped during connect; discarding transport");
                if let Err(e) = sink.close().await {
                    debug!("Error closing discarded transport: {}", e);
                }
                return;
            }
            *writer = Some(sink);
            self.transport_open.store(true, Ordering::SeqCst);
        }

        self.read_loop(stream).await;
    }

    /// Pump inbound messages. Frames are dispatched one at a time by this
    /// single task, which is what makes callback order equal wire order.
    async fn read_loop(&self, mut stream: WsSource) {
        let disconnect_detail = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match self.dispatch_text(&text) {
                    Dispatch::Continue => {}
                    Dispatch::Terminal => {
                        self.close_transport().await;
                        return;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("Close frame received: {:?}", frame);
                    break None;
                }
                Some(Ok(other)) => {
                    debug!("Ignoring non-text message: {:?}", other);
                }
                Some(Err(e)) => break Some(format!("Connection error: {}", e)),
                None => break None,
            }
        };

        self.handle_disconnect(disconnect_detail).await;
    }

    /// Parse and dispatch one inbound text frame according to the session
    /// state. Frames that are not legal in the current state are dropped
    /// with a warning; a terminal frame ends the session.
    fn dispatch_text(&self, text: &str) -> Dispatch {
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping unparseable frame: {}", e);
                return Dispatch::Continue;
            }
        };
        debug!("Received {} frame", frame.kind());

        match frame {
            Frame::Runtime { language, version } => {
                let accepted = {
                    let mut state = self.state_guard();
                    if *state == SessionState::AwaitingRuntime {
                        *state = SessionState::Running;
                        true
                    } else {
                        false
                    }
                };
                if accepted {
                    info!(
                        "Runtime ready: {} {}",
                        language.as_deref().unwrap_or("unknown"),
                        version.as_deref().unwrap_or("")
                    );
                    self.callbacks.ready();
                } else {
                    warn!("Dropping runtime frame in state {:?}", *self.state_guard());
                }
                Dispatch::Continue
            }
            Frame::Stage { stage } => {
                debug!("Stage: {}", stage);
                Dispatch::Continue
            }
            Frame::Data { stream, data } => {
                if stream == StreamKind::Stdin {
                    warn!("Dropping inbound stdin data frame");
                    return Dispatch::Continue;
                }
                // Empty chunks carry no output and produce no callback.
                if data.is_empty() {
                    return Dispatch::Continue;
                }
                let running = *self.state_guard() == SessionState::Running;
                if running {
                    self.callbacks.output(&data, stream == StreamKind::Stderr);
                } else {
                    warn!("Dropping data frame in state {:?}", *self.state_guard());
                }
                Dispatch::Continue
            }
            Frame::Exit { code, stage } => {
                let accepted = self.close_if_active();
                if accepted {
                    info!(
                        "Program exited with code {} (stage: {})",
                        code,
                        stage.as_deref().unwrap_or("run")
                    );
                    self.callbacks.exit(code);
                    Dispatch::Terminal
                } else {
                    warn!("Dropping exit frame in state {:?}", *self.state_guard());
                    Dispatch::Continue
                }
            }
            Frame::Error { message } => {
                let accepted = self.close_if_active();
                if accepted {
                    let message = if message.is_empty() {
                        "Unknown error".to_string()
                    } else {
                        message
                    };
                    warn!("Service reported error: {}", message);
                    self.callbacks.error(&message);
                    Dispatch::Terminal
                } else {
                    warn!("Dropping error frame in state {:?}", *self.state_guard());
                    Dispatch::Continue
                }
            }
            Frame::Init { .. } | Frame::Signal { .. } => {
                warn!("Dropping client-only {} frame sent by service", frame.kind());
                Dispatch::Continue
            }
        }
    }

    /// Transition to `Closed` if the session is still live (awaiting the
    /// runtime or running). Returns whether the transition happened; during
    /// `Closing` and after `Closed` nothing more is dispatched.
    fn close_if_active(&self) -> bool {
        let mut state = self.state_guard();
        if matches!(
            *state,
            SessionState::AwaitingRuntime | SessionState::Running
        ) {
            *state = SessionState::Closed;
            true
        } else {
            false
        }
    }

    async fn send_input(&self, text: &str) {
        // Checked and sent under the writer lock so a concurrent stop()
        // cannot close the transport between the check and the send.
        let mut writer = self.writer.lock().await;
        if !self.state_guard().permits(SessionOp::SendInput) {
            debug!("Ignoring input in state {:?}", *self.state_guard());
            return;
        }
        let Some(sink) = writer.as_mut() else {
            debug!("Ignoring input: no transport");
            return;
        };
        if let Err(e) = Self::send_frame(sink, &Frame::stdin_line(text)).await {
            warn!("Failed to send input: {}", e);
        }
    }

    async fn stop(&self) {
        {
            let mut state = self.state_guard();
            if !state.permits(SessionOp::Stop) {
                debug!("Stop ignored in state {:?}", *state);
                return;
            }
            *state = SessionState::Closing;
        }
        info!("Stopping session");

        self.transport_open.store(false, Ordering::SeqCst);
        {
            let mut writer = self.writer.lock().await;
            if let Some(mut sink) = writer.take() {
                // Best effort; the service has no reply frame for signal,
                // and the close below ends the session either way.
                if let Err(e) = Self::send_frame(&mut sink, &Frame::kill()).await {
                    debug!("Kill signal not delivered: {}", e);
                }
                if let Err(e) = sink.close().await {
                    debug!("Error closing transport: {}", e);
                }
            }
        }

        *self.state_guard() = SessionState::Closed;
        info!("Session closed");
    }

    async fn send_frame(sink: &mut WsSink, frame: &Frame) -> Result<()> {
        let json = serde_json::to_string(frame)?;
        sink.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Drop the write half and close it.
    async fn close_transport(&self) {
        self.transport_open.store(false, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        if let Some(mut sink) = writer.take() {
            if let Err(e) = sink.close().await {
                debug!("Error closing transport: {}", e);
            }
        }
    }

    /// The inbound stream ended or failed. Without a prior terminal frame
    /// that is abnormal termination and surfaces through `on_error`; after
    /// a terminal frame or a user stop the reader just cleans up.
    async fn handle_disconnect(&self, detail: Option<String>) {
        self.close_transport().await;

        let abnormal = {
            let mut state = self.state_guard();
            match *state {
                SessionState::Closing | SessionState::Closed => false,
                _ => {
                    *state = SessionState::Closed;
                    true
                }
            }
        };

        if abnormal {
            let message =
                detail.unwrap_or_else(|| "Connection closed unexpectedly".to_string());
            warn!("Session ended abnormally: {}", message);
            self.callbacks.error(&message);
        } else {
            debug!("Reader finished after close");
        }
    }

    /// A failure before the session reached the reader loop. Reports
    /// through `on_error` unless the caller already stopped the session.
    fn fail_before_running(&self, message: String) {
        error!("{}", message);
        let notify = {
            let mut state = self.state_guard();
            let was_stopped = matches!(*state, SessionState::Closing | SessionState::Closed);
            *state = SessionState::Closed;
            !was_stopped
        };
        if notify {
            self.callbacks.error(&message);
        }
    }
}
