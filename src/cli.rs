//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Every flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "understudy",
    version,
    about = "HTTP fallback proxy that tries a local origin before forwarding",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        understudy run --root ./public --upstream http://fallback:8080\n  \
        understudy run -c understudy.yaml     Start with a config file\n  \
        understudy validate understudy.yaml   Check a config without starting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        understudy run --root ./public --upstream http://fallback:8080\n  \
        understudy run -c understudy.yaml -p 8080 --pretty    Local dev mode\n  \
        understudy run -c understudy.yaml --timeout 5000      Tighter upstream budget")]
pub struct RunArgs {
    /// Config file path (.yaml, .json)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Fallback policy --
    /// Base URI of the fallback upstream
    #[arg(short, long, env = "PROXY_TARGET", help_heading = "Fallback Policy")]
    pub upstream: Option<String>,

    /// Document root served by the local origin
    #[arg(short, long, env = "ORIGIN_ROOT", help_heading = "Fallback Policy")]
    pub root: Option<PathBuf>,

    /// Directory for spooled request bodies (default: system temp dir)
    #[arg(long, env = "REQUEST_BODY_CACHE", help_heading = "Fallback Policy")]
    pub body_cache: Option<PathBuf>,

    /// Status codes classified as "cannot serve locally"
    #[arg(
        long,
        env = "UNSERVED_CODES",
        value_delimiter = ',',
        help_heading = "Fallback Policy"
    )]
    pub unserved: Option<Vec<u16>>,

    /// Status codes letting the cheap probe skip the trial
    #[arg(
        long,
        env = "PROBE_UNSERVED_CODES",
        value_delimiter = ',',
        help_heading = "Fallback Policy"
    )]
    pub probe_unserved: Option<Vec<u16>>,

    /// Client-facing hostname for redirect rewriting (fallback when
    /// the request carries no Host header)
    #[arg(long, env = "SERVER_NAME", help_heading = "Fallback Policy")]
    pub server_name: Option<String>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Upstream request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", help_heading = "Tuning")]
    pub timeout: Option<u64>,

    /// Max request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 33_554_432,
        help_heading = "Tuning"
    )]
    pub max_body: usize,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "understudy.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:3000")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
