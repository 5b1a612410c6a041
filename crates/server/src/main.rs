use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use conflux_config::OrchestratorConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "conflux-server", about = "Multi-source query orchestrator")]
struct Cli {
    /// Path to a config file (toml/yaml/json). Defaults to the standard
    /// search order (`./conflux.toml`, then `~/.config/conflux/`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind to, overriding `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overriding `server.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CONFLUX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    log_format_json: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_format_json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

fn load_config(cli: &Cli) -> OrchestratorConfig {
    let mut config = match &cli.config {
        Some(path) => conflux_config::load_config(path).unwrap_or_else(|error| {
            tracing::warn!(path = %path.display(), %error, "failed to load config, using defaults");
            OrchestratorConfig::default()
        }),
        None => conflux_config::discover_and_load(),
    };
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = load_config(&cli);
    let validation = conflux_config::validate(&config);
    for diagnostic in &validation.diagnostics {
        tracing::warn!(path = %diagnostic.path, severity = %diagnostic.severity, "{}", diagnostic.message);
    }
    if validation.has_errors() {
        anyhow::bail!("configuration is invalid, see warnings above");
    }

    #[cfg(feature = "metrics")]
    let metrics = std::sync::Arc::new(conflux_metrics::init_metrics(conflux_metrics::MetricsRecorderConfig {
        enabled: true,
        global_labels: Vec::new(),
    })?);

    let state = conflux_server::AppState::build(
        &config,
        #[cfg(feature = "metrics")]
        metrics,
    );
    let router = conflux_server::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    conflux_server::serve(router, addr).await
}
