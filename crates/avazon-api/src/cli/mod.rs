//! CLI definitions for the `avazon` binary.

pub mod token;

use clap::{Parser, Subcommand};

use avazon_infra::crypto::token::DEFAULT_TOKEN_TTL_MINS;

/// Avatar creation backend.
#[derive(Parser)]
#[command(name = "avazon", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// More log output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "AVAZON_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP/WebSocket server.
    Serve {
        /// Port to listen on (overrides `[server] port`).
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// Issue an access token for a user.
    Token {
        user_id: String,

        /// Token lifetime in minutes.
        #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_MINS)]
        ttl_mins: i64,
    },
}

impl Cli {
    /// Default log filter for the chosen verbosity. `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info,tower_http=warn",
            1 => "info,avazon=debug,tower_http=debug",
            _ => "trace",
        }
    }
}
