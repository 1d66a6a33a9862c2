//! keyreg CLI - offline inspection of WebAuthn registration responses.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "keyreg")]
#[command(author, version, about = "Inspect and verify WebAuthn registration responses", long_about = None)]
#[command(after_help = "Exit codes:\n  0   Success\n  1   General error\n  64  Usage error (bad --challenge or --origin)\n  65  Malformed response or verification failed\n  66  Response file unreadable")]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a saved credential response and print its contents
    Inspect {
        /// Path to the JSON body sent to /webauthn/response
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print machine-readable JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Run the full validation and attestation check on a saved response
    Verify {
        /// Path to the JSON body sent to /webauthn/response
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// base64url challenge the response must be bound to
        #[arg(long)]
        challenge: String,

        /// Expected client data origin
        #[arg(long, default_value = "http://localhost:3000")]
        origin: String,

        /// Relying Party ID
        #[arg(long, default_value = "localhost")]
        rp_id: String,

        /// Accept "none" attestation
        #[arg(long)]
        allow_none: bool,

        /// Only report through the exit code
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "keyreg=debug,keyreg_core=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Inspect { file, json } => commands::inspect::execute(&file, json),
        Commands::Verify {
            file,
            challenge,
            origin,
            rp_id,
            allow_none,
            quiet,
        } => commands::verify::execute(
            &file,
            commands::verify::Options {
                challenge,
                origin,
                rp_id,
                allow_none,
                quiet,
            },
        ),
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = &exit.message {
        eprintln!("error: {message}");
    }
    process::exit(exit.code);
}
