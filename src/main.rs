mod gateway;

use clap::{Parser, Subcommand};
use nudge_channels::telegram::TelegramChannel;
use nudge_core::{
    config::{self, BotConfig},
    phrases::Phrasebook,
    shellexpand,
};
use nudge_memory::Store;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "nudge",
    version,
    about = "Nudge: a Telegram bot that keeps reminding you about your task"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and restore reminders that were running at last shutdown.
    Start,
    /// Show configuration and stored state.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let _log_guard = init_logging(&cfg.bot)?;

            let phrases = Phrasebook::load(&cfg.bot)?;
            tracing::info!(
                "phrasebook loaded: {} species, {} generic reminders",
                phrases.species.len(),
                phrases.reminders.generic.len()
            );

            let tg = match cfg.channel.telegram {
                Some(ref tg) if tg.enabled => tg.clone(),
                _ => {
                    anyhow::bail!("Telegram is not enabled. Enable [channel.telegram] in config.toml.")
                }
            };
            if tg.bot_token.is_empty() {
                anyhow::bail!(
                    "Telegram is enabled but bot_token is empty. \
                     Set it in config.toml or {} env var.",
                    config::BOT_TOKEN_ENV
                );
            }
            let channel = Arc::new(TelegramChannel::new(tg));

            let store = Store::new(&cfg.memory).await?;

            println!("{}: starting...", cfg.bot.name);
            let gw = Arc::new(gateway::Gateway::new(
                channel,
                store,
                Arc::new(phrases),
                gateway::DelayRange::from_config(&cfg.scheduler),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            println!("{}: status check\n", cfg.bot.name);
            println!("Config: {}", cli.config);
            println!("Language: {}", cfg.bot.language);
            if !cfg.bot.phrases_path.is_empty() {
                println!("Phrasebook: {}", cfg.bot.phrases_path);
            }
            println!(
                "Reminder interval: {}-{} minutes",
                cfg.scheduler.min_interval_minutes, cfg.scheduler.max_interval_minutes
            );
            println!();

            match cfg.channel.telegram {
                Some(ref tg) => println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                ),
                None => println!("  telegram: not configured"),
            }

            let db_path = shellexpand(&cfg.memory.db_path);
            if Path::new(&db_path).exists() {
                let store = Store::new(&cfg.memory).await?;
                let (users, ongoing) = store.stats().await?;
                println!("  database: {db_path}");
                println!("  users: {users}");
                println!("  ongoing markers: {ongoing}");
            } else {
                println!("  database: {db_path} (not created yet)");
            }
        }
    }

    Ok(())
}

/// Console logging filtered by `RUST_LOG` (falling back to `bot.log_level`),
/// plus a daily-rotated file under `{data_dir}/logs` when `bot.log_file` is set.
///
/// The returned guard must live as long as the process, or buffered file lines are lost.
fn init_logging(bot: &BotConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&bot.log_level))?;

    let (file_layer, guard) = if bot.log_file {
        let log_dir = Path::new(&shellexpand(&bot.data_dir)).join("logs");
        std::fs::create_dir_all(&log_dir)?;
        let appender = tracing_appender::rolling::daily(&log_dir, "nudge.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
