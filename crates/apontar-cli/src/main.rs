//! Apontar CLI - raise and follow up quality findings from the terminal.

mod cli;
mod commands;
mod error;


use apontar_core::config::AppConfig;
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{load_catalog, open_reconciler, resolve_actor};
use crate::commands::completions::run_completions;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::log::run_log;
use crate::commands::new_id::run_new_id;
use crate::commands::studies::run_studies;
use crate::commands::update::run_update;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "apontar=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = AppConfig::from_env()?;
    let reconciler = open_reconciler(&config)?;

    match cli.command {
        Commands::Add(args) => {
            let actor = resolve_actor(cli.actor.as_deref(), &config)?;
            let catalog = load_catalog(&config, &reconciler).await?;
            run_add(&args, &actor, &reconciler, catalog.as_ref()).await?;
        }
        Commands::Update {
            id,
            status,
            assignments,
            reason,
        } => {
            let actor = resolve_actor(cli.actor.as_deref(), &config)?;
            run_update(&id, status, &assignments, &reason, &actor, &reconciler).await?;
        }
        Commands::List {
            status,
            limit,
            json,
        } => run_list(status, limit, json, &reconciler).await?,
        Commands::Log { id, limit, json } => {
            run_log(id.as_deref(), limit, json, &reconciler).await?;
        }
        Commands::Export {
            format,
            status,
            output,
        } => run_export(format, status, output.as_deref(), &reconciler).await?,
        Commands::NewId => run_new_id(&reconciler).await?,
        Commands::Studies { json } => {
            let catalog = load_catalog(&config, &reconciler).await?;
            run_studies(catalog.as_ref(), json)?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
