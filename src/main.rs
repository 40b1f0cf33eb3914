// EventListing - live event list with RSVP and calendar export
// Main entry point for the command-line front end

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventlisting::command_handlers::{CommandHandlers, FIRST_SNAPSHOT_TIMEOUT};
use eventlisting::models::{CategoryFilter, ALL_CATEGORIES};
use eventlisting::utils::logging::{init_logging, log_error_with_context};
use eventlisting::{AppConfig, AppError, EventListing};
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "eventlisting")]
#[command(about = "Browse live events, RSVP and save them to your calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current event list once
    List {
        /// Only show this category ("All" shows everything)
        #[arg(short, long, default_value = ALL_CATEGORIES)]
        category: String,
    },
    /// Keep printing the list as it changes, until Ctrl-C
    Watch {
        /// Only show this category ("All" shows everything)
        #[arg(short, long, default_value = ALL_CATEGORIES)]
        category: String,
    },
    /// Print the category choices for --category
    Categories,
    /// Toggle your RSVP for an event
    Rsvp { id: String },
    /// Save an event to the device calendar
    Export { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to read configuration")?;

    let outcome = match cli.command {
        Commands::Watch { category } => watch(&config, CategoryFilter::parse(&category)).await,
        command => run_once(&config, command).await,
    };

    if let Err(ref e) = outcome {
        log_error_with_context(e, "command");
        println!("{}", e.notice());
        std::process::exit(1);
    }
    Ok(())
}

async fn run_once(config: &AppConfig, command: Commands) -> Result<(), AppError> {
    let app = Arc::new(EventListing::open(config).await?);
    let handlers = CommandHandlers::new(app.clone());
    let result = run_command(&handlers, command).await;
    app.close();
    result
}

async fn run_command(handlers: &CommandHandlers, command: Commands) -> Result<(), AppError> {
    handlers.load(FIRST_SNAPSHOT_TIMEOUT).await?;

    match command {
        Commands::List { category } => {
            for line in handlers.list_lines(&CategoryFilter::parse(&category)) {
                println!("{}", line);
            }
        }
        Commands::Categories => {
            for line in handlers.category_lines() {
                println!("{}", line);
            }
        }
        Commands::Rsvp { id } => println!("{}", handlers.rsvp(&id).await?),
        Commands::Export { id } => println!("{}", handlers.export(&id).await?),
        Commands::Watch { .. } => {}
    }
    Ok(())
}

async fn watch(config: &AppConfig, filter: CategoryFilter) -> Result<(), AppError> {
    let (app, notices) = EventListing::open_with_notices(config).await?;
    let handlers = CommandHandlers::new(Arc::new(app));

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
        }
        ctrl_c.cancel();
    });

    handlers
        .watch(&filter, notices, shutdown, |line| println!("{}", line))
        .await
}
