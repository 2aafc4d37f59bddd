//! citesync CLI: enrich Zotero records saved from Substack and LinkedIn.
//!
//! Cleans tracking parameters from record URLs and fills in title, date,
//! authors and publication from the pages' structured data, either in one
//! batch pass or continuously from the streaming API.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
