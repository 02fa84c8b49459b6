use anyhow::Result;
use capifyd::{config::CapifyConfig, rest, AppContext};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "capifyd",
    about = "Capify relay daemon — forwards GTM-originated events to Meta's Conversions API",
    version
)]
struct Args {
    /// REST server port
    #[arg(long, env = "CAPIFYD_PORT")]
    port: Option<u16>,

    /// Data directory for config, SQLite database, and the delivery log
    #[arg(long, env = "CAPIFYD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CAPIFYD_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0
    /// to accept relay traffic from the network)
    #[arg(long, env = "CAPIFYD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "CAPIFYD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging setup ────────────────────────────────────────────────────────
    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format =
        std::env::var("CAPIFYD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "capifyd starting");

    let config = CapifyConfig::new(args.port, args.data_dir, args.log, args.bind_address);
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        graph_base_url = %config.meta.graph_base_url,
        "config loaded"
    );

    let ctx = Arc::new(AppContext::new(config).await?);
    rest::start_rest_server(ctx).await
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let Some(path) = log_file else {
        if log_format == "json" {
            tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        } else {
            tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        }
        return None;
    };

    let (dir, filename) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(filename)) if !dir.as_os_str().is_empty() => {
            (dir.to_path_buf(), filename.to_owned())
        }
        _ => (std::path::PathBuf::from("."), path.as_os_str().to_owned()),
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!(
            "warning: could not create log directory {}: {e}; logging to stdout only",
            dir.display()
        );
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(EnvFilter::new(log_level))
            .with(fmt::layer().json().with_writer(non_blocking))
            .with(fmt::layer().compact())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(EnvFilter::new(log_level))
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .with(fmt::layer().compact())
            .init();
    }
    Some(guard)
}
