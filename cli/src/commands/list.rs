//! LIST command - List or search entries.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use lexicon_core::EntrySummary;
use serde::Serialize;

use super::{HumanReadable, make_request, output};

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Only entries whose title or text contains this
    #[arg(short, long)]
    pub query: Option<String>,
}

/// Entries returned by the server, ordered by title.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct EntryList(pub Vec<EntrySummary>);

impl HumanReadable for EntryList {
    fn print_human(&self) {
        println!("{}", "Entries".green().bold());
        println!("{}", "=".repeat(60));

        if self.0.is_empty() {
            println!("  {}", "(No entries)".dimmed());
            return;
        }

        for entry in &self.0 {
            let title = format!("{:<52}", entry.title);
            println!("  {} {}", title.bold(), entry.slug.as_str().dimmed());
        }
        println!();
        println!("  {} {}", "Total:".cyan(), self.0.len());
    }
}

/// Execute the list command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: ListArgs,
) -> Result<()> {
    let url = format!("{}/entries", base_url);
    let mut request = client.get(&url);
    if let Some(query) = args.query.as_deref() {
        request = request.query(&[("q", query)]);
    }

    let entries: Vec<EntrySummary> = make_request(request).await?;

    output(&EntryList(entries), human)
}
