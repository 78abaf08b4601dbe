//! Docsign CLI
//!
//! Signs PDFs with a captured handwritten signature embedded as a biometric
//! signed attribute, verifies signed PDFs and encodes captures on their own.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{EncodeArgs, SignArgs, VerifyArgs};

#[derive(Parser, Debug)]
#[command(name = "docsign")]
#[command(version, about = "Biometric PDF signing")]
struct Args {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with signing defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a PDF with a capture, key and certificate chain
    Sign(SignArgs),
    /// Check every signature embedded in a PDF
    ///
    /// Byte-range digests are recomputed for every signature. Signature
    /// values are verified for ECDSA P-256 keys only; RSA signatures are
    /// reported as unchecked and make the command fail.
    Verify(VerifyArgs),
    /// Encode capture JSON into a biometric data block
    EncodeBdb(EncodeArgs),
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // stdout carries reports, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level(args.verbose).into()))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Sign(sign) => commands::sign(sign, args.config.as_deref()).await,
        Command::Verify(verify) => commands::verify(verify),
        Command::EncodeBdb(encode) => commands::encode_bdb(encode, args.config.as_deref()),
    }
}
