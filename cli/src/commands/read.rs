//! READ command - Show an entry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, format_timestamp, make_request, output};

/// Arguments for the read command.
#[derive(Args)]
pub struct ReadArgs {
    /// Slug of the entry
    pub slug: String,
}

/// An entry as returned by the server.
#[derive(Debug, Deserialize, Serialize)]
pub struct EntryResponse {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl HumanReadable for EntryResponse {
    fn print_human(&self) {
        println!("{}", self.title.green().bold());
        println!("{}", "=".repeat(self.title.chars().count().max(3)));
        println!("  {} {}", "Slug:".cyan(), self.slug);
        println!("  {} {}", "Created:".cyan(), format_timestamp(&self.created));
        if self.updated != self.created {
            println!("  {} {}", "Updated:".cyan(), format_timestamp(&self.updated));
        }
        println!();
        println!("{}", self.body);
    }
}

/// Execute the read command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: ReadArgs,
) -> Result<()> {
    let url = format!("{}/entries/{}", base_url, args.slug);

    let response: EntryResponse = make_request(client.get(&url)).await?;

    output(&response, human)
}
