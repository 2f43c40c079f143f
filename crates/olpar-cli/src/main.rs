//! Olpar CLI - Command-line interface for Olpar360 field audits
//!
//! Browse, capture and export audit records and manage operator profiles
//! against the same stores the field app uses.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, RecordCommands, UserCommands};
use crate::commands::common::Context;
use crate::commands::{completions, export, records, session, status, users, watch};
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

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("olpar=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return completions::run_completions(*shell, output.as_deref());
    }

    let context = Context::open(cli.data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Records { command } => run_records(&context, command).await?,
        Commands::Users { command } => run_users(&context, command).await?,
        Commands::Login { user_id, pin } => session::run_login(&context, &user_id, &pin).await?,
        Commands::Logout => session::run_logout(&context)?,
        Commands::Whoami => session::run_whoami(&context)?,
        Commands::Status { json } => status::run_status(&context, json).await?,
        Commands::Export { format, output } => {
            export::run_export(&context, format, output.as_deref()).await?;
        }
        Commands::Watch { collection } => watch::run_watch(&context, collection).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn run_records(context: &Context, command: RecordCommands) -> Result<(), CliError> {
    match command {
        RecordCommands::List {
            auditor,
            mine,
            limit,
            json,
        } => records::run_list(context, auditor.as_deref(), mine, limit, json).await,
        RecordCommands::Show { id, json } => records::run_show(context, &id, json).await,
        RecordCommands::Capture(args) => records::run_capture(context, args).await.map(|_| ()),
        RecordCommands::Edit(args) => records::run_edit(context, args).await.map(|_| ()),
        RecordCommands::Status { id, status } => {
            records::run_set_status(context, &id, status).await
        }
        RecordCommands::Verify { id } => records::run_verify(context, &id).await,
        RecordCommands::Link { id, base_url } => records::run_link(context, &id, &base_url).await,
        RecordCommands::Move { id, lat, lng } => records::run_move(context, &id, lat, lng).await,
        RecordCommands::Delete { id } => records::run_delete(context, &id).await,
    }
}

async fn run_users(context: &Context, command: UserCommands) -> Result<(), CliError> {
    match command {
        UserCommands::List { json } => users::run_list(context, json).await,
        UserCommands::Add {
            name,
            pin,
            role,
            color,
        } => users::run_add(context, &name, &pin, role, color)
            .await
            .map(|_| ()),
        UserCommands::Edit {
            id,
            name,
            pin,
            role,
            color,
        } => users::run_edit(context, &id, name, pin, role, color)
            .await
            .map(|_| ()),
        UserCommands::Remove { id } => users::run_remove(context, &id).await,
    }
}
