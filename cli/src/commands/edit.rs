//! EDIT command - Replace the text of an existing entry.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::write::AcceptedResponse;
use super::{make_request, output, read_input};

/// Arguments for the edit command.
#[derive(Args)]
pub struct EditArgs {
    /// Slug of the entry to edit
    pub slug: String,

    /// File holding the new text (- for stdin)
    pub file: String,
}

#[derive(Serialize)]
struct UpdateEntryRequest<'a> {
    text: &'a str,
}

/// Execute the edit command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: EditArgs,
) -> Result<()> {
    let text = read_input(&args.file)?;
    let url = format!("{}/entries/{}", base_url, args.slug);

    let response: AcceptedResponse =
        make_request(client.put(&url).json(&UpdateEntryRequest { text: &text })).await?;

    output(&response, human)
}
