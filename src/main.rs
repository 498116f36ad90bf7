use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::{Error, Result};
use log::info;

use trine::bot::Bot;
use trine::config::{ApiCredentials, Config};
use trine::exchange::client::BinanceClient;
use trine::exchange::ExchangeApi;
use trine::notify::SlackNotifier;
use trine::utils::logger::setup_logger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single detection pass and print the best chains
    Scan,
    /// Scan and execute continuously
    Run,
    /// Send slack message
    Slack { message: String },
    /// Send slack error message
    SlackError { message: String },
}

async fn run(bot: &Bot) -> Result<(), Error> {
    let set = bot.init().await?;
    bot.run(&set).await
}

async fn scan_once(bot: &Bot) -> Result<(), Error> {
    let set = bot.init().await?;
    let ranked = bot.scan_once(&set).await?;
    if ranked.is_empty() {
        println!("No feasible chain this pass");
        return Ok(());
    }
    for vtc in ranked.iter().take(10) {
        println!("{vtc}");
    }
    Ok(())
}

async fn send_slack_message(message: &str) -> Result<(), Error> {
    let notifier = SlackNotifier::new()?;
    notifier.send(message).await?;
    Ok(())
}

async fn send_slack_error_message(message: &str) -> Result<(), Error> {
    let notifier = SlackNotifier::new()?;
    notifier.send_error(message).await?;
    Ok(())
}

fn build_bot(config_path: &Path) -> Result<Bot, Error> {
    let config = Config::load(config_path)?;
    info!("Loaded configuration from {}", config_path.display());
    let credentials = ApiCredentials::from_env()?;
    let client = BinanceClient::new(credentials, config.http_base.as_deref())?;
    Ok(Bot::new(Arc::new(client) as Arc<dyn ExchangeApi>, config))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    setup_logger()?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Scan) => {
            scan_once(&build_bot(&cli.config)?).await?;
        }
        Some(Commands::Slack { message }) => {
            send_slack_message(&message).await?;
        }
        Some(Commands::SlackError { message }) => {
            send_slack_error_message(&message).await?;
        }
        Some(Commands::Run) | None => {
            run(&build_bot(&cli.config)?).await?;
        }
    }

    Ok(())
}
