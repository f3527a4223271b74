//! Telegram reminder bot.

use clap::Parser;
use nudge::channels::telegram::TelegramAdapter;
use nudge::channels::traits::ChannelAdapter;
use nudge::channels::{ChannelSink, run_runtime};
use nudge::{CommandHandler, NudgeConfig, ReminderEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Nudge: schedule reminders from a Telegram chat.
#[derive(Parser)]
#[command(name = "nudge-bot", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Telegram bot token; overrides `telegram.bot_token`.
    #[arg(long, env = "NUDGE_TELEGRAM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Write a default config file to the config path and exit.
    #[arg(long)]
    init_config: bool,
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nudge=info,warn"))
}

/// Install stderr logging plus an optional daily-rotated file layer.
///
/// The returned guard must outlive the runtime or buffered file lines are lost.
fn init_tracing(config: &NudgeConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(default_filter());

    let Some(log_dir) = config.logging.directory.as_ref() else {
        tracing_subscriber::registry().with(terminal_layer).init();
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        tracing_subscriber::registry().with(terminal_layer).init();
        tracing::warn!("cannot create log directory {}: {e}", log_dir.display());
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "nudge-bot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_line_number(true)
        .with_writer(non_blocking)
        .with_filter(default_filter());

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();
    Some(guard)
}

fn load_config(cli: &Cli) -> anyhow::Result<NudgeConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| Some(NudgeConfig::default_config_path()).filter(|p| p.exists()));
    let mut config = match path {
        Some(path) => NudgeConfig::from_file(&path)?,
        None => NudgeConfig::default(),
    };
    if let Some(token) = cli.token.as_ref().filter(|t| !t.trim().is_empty()) {
        config.telegram.bot_token = token.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.init_config {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(NudgeConfig::default_config_path);
        NudgeConfig::default().save_to_file(&path)?;
        println!("wrote default config to {}", path.display());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let _log_guard = init_tracing(&config);

    tracing::info!("nudge-bot v{} starting", env!("CARGO_PKG_VERSION"));

    let adapter: Arc<dyn ChannelAdapter> = Arc::new(TelegramAdapter::new(&config.telegram));
    match adapter.health_check().await {
        Ok(true) => tracing::info!("telegram token accepted"),
        Ok(false) => tracing::warn!("telegram health check failed"),
        Err(e) => tracing::warn!("telegram health check errored: {e}"),
    }

    let sink = Arc::new(ChannelSink::new(Arc::clone(&adapter)));
    let engine = ReminderEngine::new(sink).with_delivery(config.delivery.clone());
    let handler = CommandHandler::new(engine.clone());

    let result = tokio::select! {
        result = run_runtime(config, adapter, handler) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    };

    engine.shutdown().await;
    tracing::info!("nudge-bot stopped");
    result
}
