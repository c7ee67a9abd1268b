use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pkgsearch::config::AppConfig;
use pkgsearch::http::HttpServer;
use pkgsearch::ratelimit::RateLimiter;

/// Package search API service.
#[derive(Debug, Parser)]
#[command(name = "pkgsearch", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address, overrides the configuration file
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Requests per client per window, overrides the configuration file
    #[arg(long)]
    limit: Option<u32>,

    /// Window length such as "60s" or "1m", overrides the configuration file
    #[arg(long, value_parser = humantime::parse_duration)]
    window: Option<Duration>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

impl Args {
    /// Overlay command line values onto the loaded configuration.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if let Some(limit) = self.limit {
            config.rate_limiting.limit = limit;
        }
        if let Some(window) = self.window {
            config.rate_limiting.window = window;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pkgsearch=info,tower_http=info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true);
    match args.log_format {
        LogFormat::Pretty => subscriber.with_target(false).init(),
        LogFormat::Json => subscriber.json().init(),
    }

    info!("Starting pkgsearch API service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);
    info!(
        http_addr = %config.server.http_addr,
        limit = config.rate_limiting.limit,
        window = ?config.rate_limiting.window,
        "Configuration loaded"
    );

    let rate_limiter = Arc::new(RateLimiter::with_config(
        config.rate_limiting.limiter_config()?,
    )?);

    let http_server = HttpServer::new(config.server.http_addr, Arc::clone(&rate_limiter));
    let served = http_server.serve_with_shutdown(shutdown_signal()).await;

    // Stop reclamation even if the server failed
    rate_limiter.shutdown().await;
    served?;

    info!("pkgsearch API service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "pkgsearch",
            "--http-addr",
            "0.0.0.0:9999",
            "--limit",
            "25",
            "--window",
            "30s",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.http_addr, "0.0.0.0:9999".parse().unwrap());
        assert_eq!(config.rate_limiting.limit, 25);
        assert_eq!(config.rate_limiting.window, Duration::from_secs(30));
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_cli_without_overrides_keeps_config() {
        let args = Args::parse_from(["pkgsearch", "--log-format", "json"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.rate_limiting.limit, 60);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
