//! berclean CLI: clean and validate residential energy certificate datasets.
//!
//! Reads a certificate CSV in chunks, derives and corrects columns, and
//! splits rows into a cleaned file and an excluded file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
