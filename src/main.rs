//! `profile-buttons` command line front end.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use profile_buttons_lib::commands;
use profile_buttons_lib::config::load_config;
use profile_buttons_lib::notify::LogSink;
use profile_buttons_lib::AppState;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "profile-buttons")]
#[command(about = "Manage the ordered action buttons of NFC profiles")]
struct Cli {
    /// Config file
    #[arg(short, long, value_name = "PATH", default_value = "profile_buttons.json")]
    config: PathBuf,

    /// Act with the elevated (admin) access mode
    #[arg(long)]
    admin: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a profile's buttons in display order
    List { profile_id: String },
    /// Append a button
    Add {
        profile_id: String,
        label: String,
        /// link, email, call or google_review
        #[arg(short = 't', long = "type", default_value = "link")]
        action_type: String,
        value: String,
    },
    /// Delete a button
    Delete { button_id: String },
    /// Persist a new order given every button id
    Reorder {
        profile_id: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Move the button at rank FROM to rank TO
    Move { profile_id: String, from: usize, to: usize },
    /// Renumber stored positions to 0..n
    Repair { profile_id: String },
    /// Record a press and print the button's target
    Click { profile_id: String, button_id: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

fn init_logging(log_dir: Option<&PathBuf>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    match log_dir {
        Some(dir) => rolling_logger::init_logger(dir, "ProfileButtons")?,
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_max_level(if verbose {
                    tracing::Level::DEBUG
                } else {
                    tracing::Level::WARN
                })
                .try_init()
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

async fn run(state: &AppState, command: Command, admin: bool) -> Result<(), String> {
    match command {
        Command::List { profile_id } => {
            print_json(&commands::list_buttons(state, &profile_id, admin).await?)
        }
        Command::Add {
            profile_id,
            label,
            action_type,
            value,
        } => print_json(&commands::add_button(state, &profile_id, label, &action_type, value, admin).await?),
        Command::Delete { button_id } => {
            commands::delete_button(state, &button_id, admin).await?;
            println!("deleted {}", button_id);
            Ok(())
        }
        Command::Reorder { profile_id, ids } => {
            print_json(&commands::reorder_buttons(state, &profile_id, ids, admin).await?)
        }
        Command::Move { profile_id, from, to } => {
            print_json(&commands::move_button(state, &profile_id, from, to, admin).await?)
        }
        Command::Repair { profile_id } => {
            let count = commands::repair_buttons(state, &profile_id, admin).await?;
            println!("{} buttons renumbered", count);
            Ok(())
        }
        Command::Click { profile_id, button_id } => {
            println!("{}", commands::click_button(state, &profile_id, &button_id).await?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    config.apply_env();
    init_logging(config.log_dir.as_ref(), cli.verbose)?;
    log::info!("profile-buttons starting with {}", cli.config.display());

    let state = AppState::from_config(&config, Arc::new(LogSink))?;
    if let Err(e) = run(&state, cli.command, cli.admin).await {
        let _ = rolling_logger::error(&e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
