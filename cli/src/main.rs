//! OBIBuf CLI
//!
//! Command-line interface for the protocol admission engine.
//!
//! # Usage
//!
//! ```bash
//! obibuf validate message.bin
//! obibuf normalize "%2e%2e%2fetc%2fpasswd"
//! obibuf equivalent "%2e%2e%2f" "../"
//! obibuf export --format yaml
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "obibuf")]
#[command(author = "OBINexus")]
#[command(version)]
#[command(about = "OBIBuf protocol admission engine", long_about = None)]
struct Cli {
    /// Disable zero-trust enforcement (admits recovery skips)
    #[arg(long, global = true)]
    no_zero_trust: bool,

    /// Output format for structured reports
    #[arg(long, short, global = true, default_value = "text")]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a message file against the protocol grammar
    Validate {
        /// Path to the raw message bytes
        file: String,
    },
    /// Apply USCN normalization to an input string
    Normalize {
        /// Raw input
        input: String,
    },
    /// Check whether two inputs share a canonical form
    Equivalent {
        /// First input
        a: String,
        /// Second input
        b: String,
    },
    /// Export the compiled DFA specification
    Export {
        /// Target format: yaml, json or c-header
        #[arg(long, default_value = "yaml")]
        format: String,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let zero_trust = !cli.no_zero_trust;

    let result = match cli.command {
        Commands::Validate { file } => commands::validate(&file, zero_trust, cli.output),
        Commands::Normalize { input } => commands::normalize(&input, cli.output),
        Commands::Equivalent { a, b } => commands::equivalent(&a, &b, cli.output),
        Commands::Export { format } => commands::export(&format, zero_trust),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
