//! FORMAT command - Format text locally.
//!
//! Runs the same formatter the server applies to incoming text, without a
//! server round trip.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{HumanReadable, output, read_input};

/// Arguments for the format command.
#[derive(Args)]
pub struct FormatArgs {
    /// File to format (- for stdin)
    pub file: String,
}

/// Formatted output.
#[derive(Debug, Serialize)]
pub struct FormatOutput {
    pub html: String,
}

impl HumanReadable for FormatOutput {
    fn print_human(&self) {
        println!("{}", self.html);
    }
}

/// Execute the format command.
pub fn execute(human: bool, args: FormatArgs) -> Result<()> {
    let text = read_input(&args.file)?;
    let html = lexicon_linker::format(&text);

    output(&FormatOutput { html }, human)
}
