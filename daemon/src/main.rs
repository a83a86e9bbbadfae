//! SiteHound daemon: multi-site control channel scanner bridge
//!
//! Reads a site configuration, then drives one receiver across the
//! configured sites. Retune requests and status reports go to stdout as
//! NDJSON; lock results, activity events and operator commands are read
//! from stdin. Logs go to stderr (`RUST_LOG` overrides the default level).

mod bridge;

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use embassy_futures::select::select;
use env_logger::{Builder, Target};
use log::LevelFilter;

use sitehound::config;
use sitehound::mode::ScanMode;
use sitehound::protocol::VERSION;
use sitehound::runtime::{self, ScanContext};
use sitehound::scheduler::Scanner;

use bridge::{StdoutTuner, OUTPUT_QUEUE_DEPTH};

/// Shared between the scan loop and the stdin thread.
static CONTEXT: ScanContext = ScanContext::new();

#[derive(Parser, Debug)]
#[command(name = "sitehound-daemon", version, about = "Multi-site P25 control channel scanner")]
struct Args {
    /// Site configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Override the configured scanning mode (fast, priority, thorough)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ScanMode>,

    /// Seconds between status reports on stdout, 0 to disable
    #[arg(long, default_value_t = 30)]
    status_interval: u64,
}

fn parse_mode(name: &str) -> Result<ScanMode, String> {
    ScanMode::from_name(name).ok_or_else(|| format!("unknown scanning mode '{name}'"))
}

fn init_logger() {
    Builder::new()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[embassy_executor::main]
async fn main(_spawner: embassy_executor::Spawner) {
    init_logger();
    let args = Args::parse();

    // Boxed so the scan state lives on the heap, not in the task arena
    let code = match Box::pin(run(args)).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<()> {
    log::info!("SiteHound v{} starting", VERSION);

    let raw = std::fs::read(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let cfg = config::load(&raw).with_context(|| format!("loading {}", args.config.display()))?;
    let mode = args.mode.unwrap_or(cfg.mode);
    let scanner = Scanner::new(cfg.registry, mode);

    // ── Channels ─────────────────────────────────────────────────────

    let (output_tx, output_rx) = mpsc::sync_channel::<bridge::Line>(OUTPUT_QUEUE_DEPTH);

    // ── Output thread ────────────────────────────────────────────────

    let output = thread::Builder::new()
        .name("output".into())
        .spawn(move || bridge::output_thread(output_rx))?;
    log::info!("Output thread spawned");

    // ── Command thread ───────────────────────────────────────────────

    let cmd_output_tx = output_tx.clone();
    thread::Builder::new()
        .name("command".into())
        .spawn(move || bridge::command_thread(&CONTEXT, cmd_output_tx))?;
    log::info!("Command thread spawned");

    // ── Scan loop + status reporter ──────────────────────────────────

    let mut tuner = StdoutTuner::new(output_tx.clone());
    let reporter = bridge::status_reporter(&CONTEXT, args.status_interval, output_tx.clone());
    let status = match select(runtime::run_scanner(&CONTEXT, scanner, &mut tuner), reporter).await {
        embassy_futures::select::Either::First(status) => status,
        embassy_futures::select::Either::Second(()) => anyhow::bail!("status reporter exited"),
    };

    if let Some(line) = bridge::status_line(&status) {
        let _ = output_tx.send(line);
    }
    // Empty line ends the output thread once everything queued is written
    let _ = output_tx.send(bridge::Line::new());
    let _ = output.join();
    Ok(())
}
