//! # Cabal Command-Line Entry Point
//!
//! ## Application Flow
//!
//! ```text
//! main()
//!   │
//!   ├─> Initialise logging (files + stderr, console only if that fails)
//!   ├─> Parse CLI arguments (clap)
//!   └─> Load the root, apply filters, print the requested aggregate
//! ```
//!
//! ## Examples
//!
//! ```bash
//! cabal --root ./aigua summary
//! cabal --root ./aigua --from 2023-01-01 --usage Residencial top-sections -n 10
//! cabal --root ./aigua --district 1 export --output district1.csv
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Command output goes to stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    if let Err(e) = cabal::logging::init() {
        cabal::logging::init_console();
        tracing::warn!("File logging unavailable: {e:#}");
    }

    let cli = cli::Cli::parse();
    cli::run(cli)
}
