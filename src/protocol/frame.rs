//! Wire frames for the execution service WebSocket protocol

use serde::{Deserialize, Serialize};

/// Signal number requesting forced termination of the remote process.
pub const SIGKILL: i32 = 9;

/// One source file submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub content: String,
}

/// Stream identifier carried by `data` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
    Stdin,
}

/// A single protocol frame, JSON-encoded, one per WebSocket text message.
///
/// The `type` field discriminates. Field names and defaults match what the
/// execution service sends and expects on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First client frame. The service drops connections that do not deliver
    /// it within one second of the socket opening.
    Init {
        language: String,
        version: String,
        files: Vec<SourceFile>,
        run_timeout: u64,
        compile_timeout: u64,
    },
    /// Runtime selected; the program is about to execute.
    Runtime {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    /// Pipeline stage marker ("compile", "run").
    Stage { stage: String },
    /// Program I/O. Server to client carries stdout/stderr, client to server
    /// carries stdin.
    Data { stream: StreamKind, data: String },
    /// Terminal: the program finished.
    Exit {
        #[serde(default)]
        code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },
    /// Client-initiated kill request. No reply frame is defined.
    Signal { signal: i32 },
    /// Terminal: the service aborted the session.
    Error {
        #[serde(default)]
        message: String,
    },
}

impl Frame {
    /// Build the init frame for a resolved language and source text.
    pub fn init(
        wire_language: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
        run_timeout: u64,
        compile_timeout: u64,
    ) -> Self {
        Frame::Init {
            language: wire_language.into(),
            version: version.into(),
            files: vec![SourceFile {
                content: source.into(),
            }],
            run_timeout,
            compile_timeout,
        }
    }

    /// Build a stdin data frame. The remote program reads line-oriented
    /// input, so a trailing newline is always appended.
    pub fn stdin_line(text: &str) -> Self {
        Frame::Data {
            stream: StreamKind::Stdin,
            data: format!("{}\n", text),
        }
    }

    /// Build the SIGKILL signal frame.
    pub fn kill() -> Self {
        Frame::Signal { signal: SIGKILL }
    }

    /// The frame's wire tag, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Init { .. } => "init",
            Frame::Runtime { .. } => "runtime",
            Frame::Stage { .. } => "stage",
            Frame::Data { .. } => "data",
            Frame::Exit { .. } => "exit",
            Frame::Signal { .. } => "signal",
            Frame::Error { .. } => "error",
        }
    }
}
