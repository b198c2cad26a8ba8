//! Command-line front ends for `ttytee` and `fakepty`

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::{probe, run_with_config, signal, TeeConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "This utility creates multiple PTYs connected to the same TTY.",
    after_help = "PTYs are passed as positional arguments, without a flag.",
    override_usage = "ttytee -t <TTY> <PTY>..."
)]
pub struct Args {
    /// TTY to copy
    #[arg(short, long)]
    pub tty: PathBuf,

    /// Overwrite PTYs if they already exist
    #[arg(short, long)]
    pub overwrite: bool,

    /// Paths at which to publish the PTYs
    #[arg(required = true, num_args = 1..)]
    pub ptys: Vec<PathBuf>,

    /// Bytes buffered per direction per iteration
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Minimum milliseconds between loop iterations
    #[arg(long, default_value = "10")]
    pub pacing_ms: u64,

    /// Maximum milliseconds to wait for readiness
    #[arg(long, default_value = "1000")]
    pub poll_timeout_ms: u64,

    /// Log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Path to log file (stderr if not specified)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn to_config(&self) -> TeeConfig {
        TeeConfig::new(&self.tty, &self.ptys)
            .overwrite(self.overwrite)
            .buffer_size(self.buffer_size)
            .pacing_floor(Duration::from_millis(self.pacing_ms))
            .poll_timeout(Duration::from_millis(self.poll_timeout_ms))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Publish a single PTY and print what arrives on it")]
pub struct ProbeArgs {
    /// Path at which to publish the PTY
    pub pty: PathBuf,

    /// Milliseconds between heartbeat lines
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// Set up the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

/// `ttytee` entry point
pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level, args.log_file.as_deref())?;

    println!("path: {}", args.tty.display());
    println!(
        "Overwrite {}",
        if args.overwrite { "enabled" } else { "disabled" }
    );
    for (i, pty) in args.ptys.iter().enumerate() {
        println!("pty {}: {}", i, pty.display());
    }

    run_with_config(args.to_config())
        .with_context(|| format!("Failed to tee {}", args.tty.display()))
}

/// `fakepty` entry point
pub fn run_probe() -> Result<()> {
    let args = ProbeArgs::parse();
    init_logging(args.log_level, None)?;

    let stop = signal::install()?;
    probe::run_probe(&args.pty, Duration::from_millis(args.interval_ms), stop)
        .with_context(|| format!("Failed to run probe on {}", args.pty.display()))
}
