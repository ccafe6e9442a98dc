//! RecipeFinder CLI: recipe recommendations from what's in your fridge.
//!
//! Interprets a free-form request, searches a recipe site, and returns the
//! best matching recipes as markdown.

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
