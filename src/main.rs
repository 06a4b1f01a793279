use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use tokio::io::AsyncBufReadExt;

use execwire::batch::BatchClient;
use execwire::cli::{Cli, Commands};
use execwire::config::Config;
use execwire::init_logging;
use execwire::protocol::language::{self, LANGUAGES};
use execwire::session::{ExecEvent, ExecutionCallbacks, InteractiveExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load configuration
    let config = Config::load_or_default(&cli.config_file);

    // Initialize logging; the guard flushes the file appender on drop
    let guard = init_logging(&cli.effective_log_level(), &config.log);

    tracing::info!("ExecWire starting...");
    tracing::debug!("CLI arguments: {:?}", cli);

    let code = dispatch(&cli, &config).await?;

    drop(guard);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn dispatch(cli: &Cli, config: &Config) -> Result<i32> {
    match &cli.command {
        Commands::Run {
            file,
            language,
            sample,
        } => {
            let (source, key) =
                load_program(file.as_ref(), language.as_deref(), sample.as_deref())?;
            run_interactive(config, &source, &key).await
        }
        Commands::Submit {
            file,
            language,
            stdin,
        } => {
            let (source, key) = load_program(Some(file), language.as_deref(), None)?;
            run_submit(config, &source, &key, stdin.as_deref().unwrap_or("")).await
        }
        Commands::Languages => {
            println!("{:<10} {:<10} {}", "KEY", "WIRE NAME", "VERSION");
            for lang in LANGUAGES {
                println!("{:<10} {:<10} {}", lang.key, lang.wire_name, lang.version);
            }
            Ok(0)
        }
        Commands::Config { action } => {
            Config::handle_command(action, &cli.config_file)?;
            Ok(0)
        }
    }
}

/// Resolve the source text and language key for `run`/`submit`.
fn load_program(
    file: Option<&PathBuf>,
    language: Option<&str>,
    sample: Option<&str>,
) -> Result<(String, String)> {
    if let Some(key) = sample {
        let lang = language::resolve(key)
            .ok_or_else(|| anyhow!("Unsupported language: {}", key))?;
        return Ok((lang.sample.to_string(), lang.key.to_string()));
    }

    let path = file.ok_or_else(|| anyhow!("Provide a source file or --sample <language>"))?;
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path.display()))?;

    let key = match language {
        Some(key) => key.to_string(),
        None => {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .ok_or_else(|| {
                    anyhow!(
                        "Cannot infer language without a file extension; pass --language"
                    )
                })?;
            language::from_extension(ext)
                .ok_or_else(|| {
                    anyhow!("Unrecognized extension .{}; pass --language", ext)
                })?
                .key
                .to_string()
        }
    };

    Ok((source, key))
}

/// Drive one interactive session: program output to stdout (stderr chunks in
/// red), terminal stdin lines forwarded to the program, Ctrl-C stops it.
async fn run_interactive(config: &Config, source: &str, language_key: &str) -> Result<i32> {
    let (callbacks, mut events) = ExecutionCallbacks::channel();
    let executor = InteractiveExecutor::new(config, callbacks);
    executor.start(source, language_key)?;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ExecEvent::Ready) => {
                    eprintln!("{}", "Program running (Ctrl-C to stop)".dimmed());
                }
                Some(ExecEvent::Output { text, is_error }) => {
                    if is_error {
                        eprint!("{}", text.red());
                    } else {
                        print!("{}", text);
                        let _ = std::io::stdout().flush();
                    }
                }
                Some(ExecEvent::Exit { code }) => {
                    eprintln!("{}", format!("Program exited with code {}", code).dimmed());
                    return Ok(code);
                }
                Some(ExecEvent::Error { message }) => {
                    eprintln!("{}", format!("Error: {}", message).red());
                    return Ok(1);
                }
                None => {
                    // Callback side dropped without a terminal event.
                    return Ok(1);
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => executor.send_input(&line).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                executor.stop().await;
                eprintln!("{}", "Terminated".dimmed());
                return Ok(130);
            }
        }
    }
}

/// One-shot execution via the HTTP API.
async fn run_submit(
    config: &Config,
    source: &str,
    language_key: &str,
    stdin: &str,
) -> Result<i32> {
    let client = BatchClient::new(config);
    let outcome = client.execute(source, language_key, stdin).await?;

    if let Some(compile) = &outcome.compile {
        if !compile.stdout.is_empty() {
            print!("{}", compile.stdout);
        }
        if !compile.stderr.is_empty() {
            eprint!("{}", compile.stderr.red());
        }
    }
    print!("{}", outcome.run.stdout);
    if !outcome.run.stderr.is_empty() {
        eprint!("{}", outcome.run.stderr.red());
    }
    let _ = std::io::stdout().flush();

    Ok(outcome.exit_code())
}
