//! Bastion demo CLI
//!
//! Runs the hybrid encryption, audit ledger and anchoring scenarios against
//! real Bastion components. Anchoring uses the in-memory ledger client.
//!
//! Usage:
//!   cargo run -p bastion-demo -- run-all
//!   cargo run -p bastion-demo -- encryption --simulated
//!   cargo run -p bastion-demo -- audit --data-dir /tmp/bastion
//!   cargo run -p bastion-demo -- --config bastion.toml anchoring

mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bastion_contracts::error::BastionResult;
use bastion_core::config::{BastionConfig, KemBackend};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Bastion: post-quantum hybrid encryption with an anchored audit ledger.
#[derive(Parser)]
#[command(
    name = "bastion-demo",
    about = "Bastion hybrid PQC + audit ledger demo",
    long_about = "Runs Bastion demo scenarios showing ML-KEM hybrid encryption,\n\
                  signed Agent State Records, Merkle batching, and anchoring."
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the simulated KEM backend (NOT quantum resistant).
    #[arg(long, global = true)]
    simulated: bool,

    /// Directory for records and the batch cache; overrides the config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: keygen, encrypt, wire round trip, decrypt, tamper.
    Encryption,
    /// Scenario 2: signed records, auto-sealed batch, inclusion proofs.
    Audit,
    /// Scenario 3: anchoring with retries, proofs, on-chain verification.
    Anchoring,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Command::RunAll => run_all(&config).await,
            Command::Encryption => scenarios::encryption::run_scenario(&config),
            Command::Audit => scenarios::audit::run_scenario(&config),
            Command::Anchoring => scenarios::anchoring::run_scenario(&config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> BastionResult<BastionConfig> {
    let mut config = match &cli.config {
        Some(path) => BastionConfig::from_file(path)?,
        None => BastionConfig::default(),
    };

    if cli.simulated {
        config.pqc.backend = KemBackend::Simulated;
    }
    if let Some(dir) = &cli.data_dir {
        config.ledger.storage_root = dir.join("asr");
        config.anchor.cache_root = dir.join("asr").join("blockchain_cache");
    }
    config.validate()?;
    Ok(config)
}

async fn run_all(config: &BastionConfig) -> BastionResult<()> {
    scenarios::encryption::run_scenario(config)?;
    scenarios::audit::run_scenario(config)?;
    scenarios::anchoring::run_scenario(config).await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Bastion: Hybrid PQC + Anchored Audit Ledger");
    println!("===========================================");
    println!();
    println!("Pipeline:");
    println!("  [1] ML-KEM encapsulation -> HKDF-SHA256 -> AES-256-GCM");
    println!("  [2] Every security event becomes a signed Agent State Record");
    println!("  [3] Records are sealed into batches summarised by a Merkle root");
    println!("  [4] Roots are anchored externally; any record can be proven later");
    println!();
}
