use anyhow::Result;
use clap::{Parser, Subcommand};
use secops_app::commands::{call, health, invoke, tools};
use secops_app::config::Config;
use secops_app::{bootstrap, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const AUDIT_FLUSH_LIMIT: Duration = Duration::from_secs(5);

/// Uniform structured interface over command-line security scanners
#[derive(Parser, Debug)]
#[command(name = "secops")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: ./secops.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered tools
    Tools {
        /// Print function-calling schemas as JSON instead
        #[arg(long)]
        schemas: bool,
    },
    /// Check that every tool binary resolves on PATH
    Health,
    /// Run one tool and print its result as JSON
    Invoke {
        /// Tool name, e.g. httpx_wrapper
        tool: String,

        /// Target (repeatable)
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Option as key=value (repeatable)
        #[arg(short, long = "option")]
        options: Vec<String>,

        /// Options as one JSON object
        #[arg(long = "options")]
        options_json: Option<String>,

        /// Timeout in seconds, replacing the tool default
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Serve JSON requests from stdin, one result per stdout line
    Call,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let log_level = if args.debug { "debug" } else { config.log_level.as_str() };
    logging::init(log_level, config.log_format)?;

    let dispatcher = bootstrap::build_dispatcher(&config)?;

    let status = match args.command {
        Command::Tools { schemas } => tools::run(dispatcher.registry(), schemas).map(|_| ExitCode::SUCCESS),
        Command::Health => health::run(dispatcher.registry()).map(|_| ExitCode::SUCCESS),
        Command::Invoke {
            tool,
            targets,
            options,
            options_json,
            timeout,
        } => match invoke::build_request(&tool, targets, &options, options_json.as_deref(), timeout) {
            Ok(request) => invoke::run(&dispatcher, request).await.map(|result| {
                if result.is_ok() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }),
            Err(e) => Err(e),
        },
        Command::Call => call::run(&dispatcher).await.map(|_| ExitCode::SUCCESS),
    };

    // Audit writes run detached; the runtime would cancel them on return.
    dispatcher.flush_audit(AUDIT_FLUSH_LIMIT).await;
    status
}
