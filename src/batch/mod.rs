//! One-shot batch execution over the service's HTTP API
//!
//! No streaming and no interaction: the program plus its whole stdin go up
//! in one POST, the collected output comes back in one response.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::protocol::language;

/// Errors from the batch execution path.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Service returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Clone, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    version: &'a str,
    language: &'a str,
    stdin: &'a str,
}

/// Output of one pipeline stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StageOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// stdout and stderr interleaved, as the service captured them.
    #[serde(default)]
    pub output: String,
    /// Exit code; absent when the process died to a signal.
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}

/// Result of a batch execution.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchOutcome {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub run: StageOutput,
    /// Present only for compiled languages.
    #[serde(default)]
    pub compile: Option<StageOutput>,
}

impl BatchOutcome {
    /// The process exit code to mirror: a failed compile wins over the run
    /// stage, and a signaled process without a code maps to 1.
    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.compile.as_ref().and_then(|c| c.code) {
            if code != 0 {
                return code;
            }
        }
        self.run
            .code
            .unwrap_or(if self.run.signal.is_some() { 1 } else { 0 })
    }
}

/// Batch execution client
pub struct BatchClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl BatchClient {
    pub fn new(config: &Config) -> Self {
        // The service may legitimately use the whole compile and run
        // budget before answering.
        let timeout = Duration::from_millis(
            config.session.run_timeout_ms + config.session.compile_timeout_ms,
        ) + Duration::from_secs(10);

        Self {
            base_url: config.service.http_url.trim_end_matches('/').to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Execute a program and wait for the collected result.
    pub async fn execute(
        &self,
        source: &str,
        language_key: &str,
        stdin: &str,
    ) -> Result<BatchOutcome, BatchError> {
        let lang = language::resolve(language_key)
            .ok_or_else(|| BatchError::UnsupportedLanguage(language_key.to_string()))?;

        let url = format!("{}/api/execute", self.base_url);
        debug!("Submitting {} program to {}", lang.key, url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&ExecuteRequest {
                code: source,
                version: lang.version,
                language: lang.wire_name,
                stdin,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BatchError::Status { status, body });
        }

        let outcome: BatchOutcome = response.json().await?;

        info!(
            "Batch execution finished: {} {} exited with {:?}",
            outcome.language.as_deref().unwrap_or(lang.key),
            outcome.version.as_deref().unwrap_or(lang.version),
            outcome.run.code
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = ExecuteRequest {
            code: "print(input())",
            version: "3.10.0",
            language: "python",
            stdin: "42",
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "code": "print(input())",
                "version": "3.10.0",
                "language": "python",
                "stdin": "42",
            })
        );
    }

    #[test]
    fn test_parse_outcome_with_compile_stage() {
        let outcome: BatchOutcome = serde_json::from_str(
            r#"{
                "language": "c++",
                "version": "10.2.0",
                "compile": { "stdout": "", "stderr": "", "code": 0 },
                "run": { "stdout": "Hello World\n", "stderr": "", "code": 0 }
            }"#,
        )
        .unwrap();

        assert_eq!(outcome.run.stdout, "Hello World\n");
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_exit_code_prefers_failed_compile() {
        let outcome: BatchOutcome = serde_json::from_str(
            r#"{
                "compile": { "stderr": "main.cpp:1: error", "code": 1 },
                "run": { "stdout": "", "stderr": "", "code": 0 }
            }"#,
        )
        .unwrap();

        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_for_signaled_run() {
        let outcome: BatchOutcome = serde_json::from_str(
            r#"{ "run": { "stdout": "", "stderr": "", "code": null, "signal": "SIGKILL" } }"#,
        )
        .unwrap();

        assert_eq!(outcome.exit_code(), 1);
    }
}
