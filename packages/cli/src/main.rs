mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, init, normalize, text, CheckArgs, InitArgs, NormalizeArgs, TextArgs};
use tracing_subscriber::EnvFilter;

/// Scribe CLI - inspect and normalize persisted rich-text documents
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default scribe.config.json
    Init(InitArgs),

    /// Import a document and verify its structure
    Check(CheckArgs),

    /// Run every behavior transform over a document and export the result
    Normalize(NormalizeArgs),

    /// Print a document's plain text
    Text(TextArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SCRIBE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| match cli.command {
            Command::Init(args) => init(args, &cwd),
            Command::Check(args) => check(args, &cwd),
            Command::Normalize(args) => normalize(args, &cwd),
            Command::Text(args) => text(args, &cwd),
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
