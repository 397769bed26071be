//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LibApps space availability and hours proxy
#[derive(Parser, Debug)]
#[command(name = "libtools")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "LIBTOOLS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "LIBTOOLS_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "LIBTOOLS_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LIBTOOLS_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LIBTOOLS_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the proxy server (default)
    Serve,

    /// Load and validate configuration, then print the site table
    Check,

    /// Exchange client credentials once and report the token lifetime
    Token,
}
