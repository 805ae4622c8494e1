//! WRITE command - Create a new entry.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, make_request, output, read_input};

/// Arguments for the write command.
#[derive(Args)]
pub struct WriteArgs {
    /// Title of the new entry
    pub title: String,

    /// File holding the entry text (- for stdin)
    pub file: String,
}

/// Request body for creating an entry.
#[derive(Serialize)]
struct CreateEntryRequest<'a> {
    title: &'a str,
    text: &'a str,
}

/// Response for an accepted write.
#[derive(Debug, Deserialize, Serialize)]
pub struct AcceptedResponse {
    pub title: String,
    pub slug: String,
    pub url: String,
    pub link_queued: bool,
}

impl HumanReadable for AcceptedResponse {
    fn print_human(&self) {
        println!("{}", "Entry saved.".green().bold());
        println!();
        println!("  {} {}", "Title:".cyan(), self.title);
        println!("  {} {}", "Slug:".cyan(), self.slug);
        println!("  {} {}", "URL:".cyan(), self.url);
        if self.link_queued {
            println!("  {}", "Cross-linking queued".dimmed());
        } else {
            println!("  {}", "Cross-linking already pending".dimmed());
        }
    }
}

/// Execute the write command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: WriteArgs,
) -> Result<()> {
    let text = read_input(&args.file)?;
    let url = format!("{}/entries", base_url);

    let request = CreateEntryRequest {
        title: &args.title,
        text: &text,
    };
    let response: AcceptedResponse = make_request(client.post(&url).json(&request)).await?;

    output(&response, human)
}
