//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for ExecWire.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "execwire")]
#[command(about = "Run code on a remote execution service")]
#[command(long_about = "A client for a remote, sandboxed code execution service: \
interactive sessions with live output and stdin, or one-shot batch runs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a program interactively: stream its output, type into its stdin
    Run {
        /// Source file to execute
        #[arg(required_unless_present = "sample")]
        file: Option<PathBuf>,

        /// Language key (inferred from the file extension when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Run the built-in sample program for a language instead of a file
        #[arg(long, value_name = "LANGUAGE", conflicts_with_all = ["file", "language"])]
        sample: Option<String>,
    },

    /// Execute a program in one shot and print the collected result
    Submit {
        /// Source file to execute
        file: PathBuf,

        /// Language key (inferred from the file extension when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Text fed to the program's stdin
        #[arg(long)]
        stdin: Option<String>,
    },

    /// List supported languages and their pinned runtime versions
    Languages,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Reset configuration to defaults
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Adjust log level based on verbose flag
    pub fn effective_log_level(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.clone()
        }
    }
}
