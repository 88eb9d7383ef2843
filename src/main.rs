//! wfprules command line
//!
//! ```text
//! wfprules --permit 10.0.0.0/24
//! wfprules --block 192.168.1.5/32 172.16.0.0/16
//! wfprules --block --weight 100 10.0.0.0/8
//! wfprules --permit --dry-run 10.0.0.0/24     # print the filters, touch nothing
//! ```
//!
//! Rules stay active until SIGINT/SIGTERM (or console close on Windows),
//! then the session is closed and the engine removes them.

use clap::{ArgGroup, Parser};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use wfprules::config::{self, AppConfig};
use wfprules::core::engine::Engine;
use wfprules::core::memory::{InstalledFilter, MemoryEngine};
use wfprules::core::registrar::Namespace;
use wfprules::{Action, Error, Firewall, Result};

#[cfg(windows)]
type NativeEngine = wfprules::core::wfp::WfpEngine;
#[cfg(not(windows))]
type NativeEngine = MemoryEngine;

#[derive(Parser)]
#[allow(clippy::struct_excessive_bools)]
#[command(name = "wfprules", version)]
#[command(about = "Hard permit/block filters for IPv4 networks, active until terminated", long_about = None)]
#[command(group(ArgGroup::new("action").required(true).args(["permit", "block"])))]
struct Cli {
    /// Permit outbound connections to the networks
    #[arg(short, long)]
    permit: bool,
    /// Block outbound connections to the networks
    #[arg(short, long)]
    block: bool,
    /// Networks in CIDR notation, e.g. 10.0.0.0/24
    #[arg(required = true, value_name = "CIDR")]
    networks: Vec<String>,
    /// Weight of the first filter; each following network gets one more
    #[arg(short, long, value_name = "BASE")]
    weight: Option<u64>,
    /// JSON config file (default: config.json in the platform config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Apply against an in-memory engine, print the filters as JSON and exit
    #[arg(long)]
    dry_run: bool,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct DryRunReport<'a> {
    namespace: &'a Namespace,
    filters: Vec<InstalledFilter>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(weight) = cli.weight {
        config.weight_base = weight;
    }
    let action = if cli.permit {
        Action::Permit
    } else {
        Action::Block
    };

    if cli.dry_run {
        return dry_run(&config, action, &cli.networks);
    }
    enforce(native_engine()?, &config, action, &cli.networks)
}

#[cfg(windows)]
fn native_engine() -> Result<NativeEngine> {
    Ok(NativeEngine::new())
}

#[cfg(not(windows))]
fn native_engine() -> Result<NativeEngine> {
    Err(Error::Unsupported(
        "the native filtering engine is only available on Windows; use --dry-run".to_string(),
    ))
}

fn enforce<E: Engine>(engine: E, config: &AppConfig, action: Action, networks: &[String]) -> Result<()> {
    let (firewall, _) = Firewall::launch(engine, config, action, networks)?;

    for network in networks {
        println!("{} rule for {network} successfully added", action.display_name());
    }
    println!("Rules will remain active until a termination signal is received");
    println!("Waiting for termination signal...");

    wait_for_termination()?;
    println!("Termination signal received.");

    if let Err(e) = firewall.shutdown() {
        warn!("{e}");
    }
    Ok(())
}

fn dry_run(config: &AppConfig, action: Action, networks: &[String]) -> Result<()> {
    let engine = MemoryEngine::new();
    let (firewall, _) = Firewall::launch(engine.clone(), config, action, networks)?;

    let report = DryRunReport {
        namespace: firewall.namespace(),
        filters: engine.filters(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    firewall.shutdown()
}

fn wait_for_termination() -> io::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(termination_signal())
}

#[cfg(unix)]
async fn termination_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(windows)]
async fn termination_signal() -> io::Result<()> {
    use tokio::signal::windows::{ctrl_close, ctrl_shutdown};

    let mut close = ctrl_close()?;
    let mut shutdown = ctrl_shutdown()?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = close.recv() => Ok(()),
        _ = shutdown.recv() => Ok(()),
    }
}

#[cfg(not(any(unix, windows)))]
async fn termination_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn report(e: &Error) {
    eprintln!("Error: {e}");
    if let Some(status) = e.status() {
        let translation = status.translate();
        eprintln!("  {}", translation.user_message);
        for suggestion in &translation.suggestions {
            eprintln!("  - {suggestion}");
        }
        if let Some(url) = &translation.help_url {
            eprintln!("  See: {url}");
        }
    }
}
