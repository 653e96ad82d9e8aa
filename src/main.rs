mod config;
mod services;
mod utils;

use std::env;
use std::process;
use std::sync::Arc;

use teloxide::prelude::*;

use crate::config::Settings;
use crate::services::browser::BrowserSession;
use crate::services::profiles::ProfileStore;
use crate::services::{queue, telegram};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("promptrelay {} - Telegram bot relaying prompts into a browser-driven chat composer", VERSION);
    println!();
    println!("USAGE:");
    println!("    promptrelay [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help              Print help information");
    println!("    -v, --version           Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    ~/.promptrelay/settings.json     Bot and browser settings");
    println!("    ~/.promptrelay/profiles.txt      Newline-separated profile identifiers");
    println!("    ~/.promptrelay/moodboards.json   Alias → profile identifier map");
    println!();
    println!("ENVIRONMENT:");
    println!("    TELOXIDE_TOKEN          Telegram bot token (overrides settings)");
    println!("    PROMPTRELAY_EMAIL       Login email for the automated browser");
    println!("    PROMPTRELAY_PASSWORD    Login password for the automated browser");
}

fn print_version() {
    println!("promptrelay {}", VERSION);
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-v" | "--version" => {
                print_version();
                return;
            }
            _ => {
                eprintln!("Unknown option: {}", args[1]);
                eprintln!("Use --help for usage information");
                return;
            }
        }
    }

    dotenvy::dotenv().ok();
    let settings = Settings::load();

    let Some(token) = settings.token() else {
        eprintln!("Error: no Telegram bot token configured.");
        eprintln!("Set TELOXIDE_TOKEN or telegram_token in ~/.promptrelay/settings.json");
        process::exit(1);
    };

    println!("promptrelay {} starting", VERSION);

    let store = Arc::new(ProfileStore::load(
        &settings.profiles_path(),
        &settings.moodboards_path(),
    ));

    // A failed browser setup leaves the bot running but unable to submit;
    // every queued job then reports the condition to its chat.
    let session = match BrowserSession::start(&settings).await {
        Ok(session) => {
            println!("  ✓ Browser session ready");
            Some(session)
        }
        Err(e) => {
            println!("  ⚠ Browser setup failed: {e}");
            println!("  ⚠ Prompt submission is disabled for this run");
            None
        }
    };

    let bot = Bot::new(token);
    let (jobs_tx, jobs_rx) = queue::channel();
    let worker = tokio::spawn(queue::run(
        bot.clone(),
        jobs_rx,
        session,
        store.clone(),
        settings.clone(),
    ));

    telegram::run_bot(bot, jobs_tx, store).await;

    worker.abort();
}
