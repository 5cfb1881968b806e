//! Blobdock CLI - HTTP front end for an Azure Blob Storage container

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::ServeCommand;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

/// Crates logged at the requested level; everything else stays at `warn`.
const LOCAL_TARGETS: &[&str] = &["blobdock_cli", "blobdock_core", "blobdock_storage", "tower_http"];

const QUIET_TARGETS: &[&str] = &[
    "azure_core",
    "azure_identity",
    "azure_storage",
    "azure_storage_blobs",
    "h2",
    "hyper",
    "reqwest",
    "rustls",
    "tower",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Single line per event, no target
    Compact,
    /// Default fmt output with module targets
    Full,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "BLOBDOCK_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format
    #[arg(
        long,
        value_enum,
        default_value_t = LogFormat::Compact,
        env = "BLOBDOCK_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve(ServeCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces the
/// default filter entirely.
fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?,
        Err(_) => EnvFilter::try_new(default_directives(level))
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", level, e))?,
    };

    let fmt_layer = match format {
        LogFormat::Full => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn default_directives(level: &str) -> String {
    LOCAL_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("blobdock_cli=debug,"));
        assert!(directives.contains("blobdock_storage=debug"));
        assert!(directives.contains("azure_core=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::parse_from(["blobdock", "--log-format", "full", "serve", "--backend", "memory"]);
        assert_eq!(cli.log_format, LogFormat::Full);
        assert!(matches!(cli.command, Commands::Serve(_)));
    }
}
