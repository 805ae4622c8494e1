//! Command-line interface for the Lexicon knowledge base.
//!
//! Commands:
//! - write: Create an entry from a text file
//! - edit: Replace an entry's text
//! - read: Show an entry
//! - list: List or search entries
//! - format: Format a text file locally and print the HTML
//!
//! Configuration via environment:
//! - LEXICON_URL: Base URL of the lexicon server (default: http://localhost:3000)

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    edit::EditArgs, format::FormatArgs, list::ListArgs, read::ReadArgs, write::WriteArgs,
};

/// Lexicon CLI
///
/// Write and read knowledge-base entries from the command line. JSON output
/// by default, --human for formatted output.
#[derive(Parser)]
#[command(name = "lexicon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// Lexicon server URL
    #[arg(
        long,
        env = "LEXICON_URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new entry
    Write(WriteArgs),

    /// Replace the text of an existing entry
    Edit(EditArgs),

    /// Read an entry
    Read(ReadArgs),

    /// List or search entries
    List(ListArgs),

    /// Format text locally without contacting the server
    Format(FormatArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let client = match commands::build_client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let url = cli.url.trim_end_matches('/');

    let result = match cli.command {
        Commands::Write(args) => commands::write::execute(&client, url, cli.human, args).await,
        Commands::Edit(args) => commands::edit::execute(&client, url, cli.human, args).await,
        Commands::Read(args) => commands::read::execute(&client, url, cli.human, args).await,
        Commands::List(args) => commands::list::execute(&client, url, cli.human, args).await,
        Commands::Format(args) => commands::format::execute(cli.human, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
