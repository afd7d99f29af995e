pub mod bot;
pub mod cli;
pub mod core;
pub mod portfolio;
pub mod preferences;
pub mod prism;
pub mod providers;
pub mod store;
pub mod tracker;

use crate::bot::Bot;
use crate::cli::{report, ui};
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Run,
    Prices,
    ClearCache,
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;

    match command {
        AppCommand::Run => {
            info!("PRISM bot starting...");
            let mut bot = Bot::from_config(config)?.with_progress(true);
            bot.run().await?;
            ui::print_separator();
            println!("{}", bot.summary());
        }
        AppCommand::Prices => {
            let bot = Bot::from_config(config)?.with_progress(true);
            let prices = bot.prewarm().await;
            println!("{}", report::price_table(&bot.config().stocks, &prices));
        }
        AppCommand::ClearCache => {
            let bot = Bot::from_config(config)?;
            let cache = bot.fetcher().cache();
            let entries = cache.stats().historical_entries;
            cache.clear();
            println!(
                "Cleared {} cached historical prices",
                ui::style_text(&entries.to_string(), ui::StyleType::TotalValue)
            );
        }
    }
    Ok(())
}
