use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use transtype::commands::{self, SettingsUpdate};
use transtype::network::DeepSeekClient;
use transtype::settings::{FileSettingsStore, Mode};

/// Caret-anchored translation and touch-up suggestions
#[derive(Parser, Debug)]
#[command(name = "transtype")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file to use instead of the platform config directory
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Keep the API key in the settings file instead of the OS keychain
    #[arg(long, global = true)]
    no_keychain: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Show whether the assistant is ready to make requests
    Status,
    /// Inspect or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Send text to the model once and print the result
    Translate {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Type TEXT into a headless field, wait for the suggestion and accept it
    Preview {
        #[arg(value_name = "TEXT")]
        text: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        mode: Option<Mode>,
        #[arg(long, value_name = "LANGUAGE")]
        target_lang: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
    },
    Reset,
}

fn open_store(cli: &Cli) -> Result<FileSettingsStore> {
    let store = match &cli.config {
        Some(path) => FileSettingsStore::new(path),
        None => FileSettingsStore::at_default_location()
            .context("could not determine the settings location")?,
    };
    Ok(if cli.no_keychain {
        store.without_secure_storage()
    } else {
        store
    })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(init_err) = transtype::init_logging() {
        eprintln!("logging bootstrap failed: {init_err}");
    }
    transtype::init_rustls_crypto_provider();

    let store = open_store(&cli)?;
    match cli.command {
        CliCommand::Status => print_json(&commands::app_status(&store)?),
        CliCommand::Settings { action } => match action {
            SettingsAction::Show => print_json(&commands::get_settings(&store)?),
            SettingsAction::Set {
                api_key,
                mode,
                target_lang,
                system_prompt,
                temperature,
            } => {
                let update = SettingsUpdate {
                    api_key,
                    mode,
                    target_lang,
                    system_prompt,
                    temperature,
                };
                if update.is_empty() {
                    anyhow::bail!("nothing to update; pass at least one setting flag");
                }
                print_json(&commands::save_settings(&store, update)?)
            }
            SettingsAction::Reset => print_json(&commands::reset_settings(&store)?),
        },
        CliCommand::Translate { text } => {
            let client = DeepSeekClient::new().context("failed to build HTTP client")?;
            let translated = commands::translate_text(&client, &store, &text).await?;
            println!("{translated}");
            Ok(())
        }
        CliCommand::Preview { text } => {
            let client = DeepSeekClient::new().context("failed to build HTTP client")?;
            let report = commands::preview_text(Arc::new(client), Arc::new(store), &text).await?;
            print_json(&report)
        }
    }
}
