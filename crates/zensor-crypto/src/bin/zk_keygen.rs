//! Groth16 key generation for the zensor membership circuit.
//!
//! Usage:
//!   zk-keygen generate --depth 16 --output ./zk-keys
//!   zk-keygen info --keys-dir ./zk-keys

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zensor_crypto::groth16::{KEY_METADATA_FILE, PROVING_KEY_FILE, VERIFYING_KEY_FILE};
use zensor_crypto::{MembershipKeys, CIRCUIT_VERSION};
use zensor_types::DEFAULT_TREE_DEPTH;

#[derive(Parser)]
#[command(name = "zk-keygen")]
#[command(about = "Generate Groth16 proving and verifying keys for zensor membership proofs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate new proving and verifying keys.
    Generate {
        /// Output directory for keys.
        #[arg(short, long, default_value = "./zk-keys")]
        output: PathBuf,

        /// Membership tree depth the circuit is built for.
        #[arg(short, long, default_value_t = DEFAULT_TREE_DEPTH)]
        depth: usize,

        /// Deterministic setup seed. Development only.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Load keys and print their depth and fingerprint.
    Info {
        /// Directory containing keys.
        #[arg(short, long, default_value = "./zk-keys")]
        keys_dir: PathBuf,

        /// Fail unless the verifying key hash equals this value.
        #[arg(short, long)]
        expected_hash: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { output, depth, seed } => generate(&output, depth, seed),
        Commands::Info {
            keys_dir,
            expected_hash,
        } => info(&keys_dir, expected_hash),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn generate(output: &PathBuf, depth: usize, seed: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    println!("zensor ZK Key Generator v{}", CIRCUIT_VERSION);
    println!("==============================");
    println!("Tree depth: {}", depth);
    println!();

    println!("Running trusted setup (circuit-specific)...");
    let keys = match seed {
        Some(seed) => {
            println!("WARNING: seeded setup, do not use these keys in production");
            MembershipKeys::from_seed(depth, seed)?
        }
        None => MembershipKeys::setup(depth, &mut rand::rngs::OsRng)?,
    };
    println!("Setup complete.");
    println!();

    keys.save(output)?;
    println!("Proving key: {}", output.join(PROVING_KEY_FILE).display());
    println!("Verifying key: {}", output.join(VERIFYING_KEY_FILE).display());
    println!("Metadata: {}", output.join(KEY_METADATA_FILE).display());
    println!("VK hash: {}", keys.fingerprint()?);
    Ok(())
}

fn info(keys_dir: &PathBuf, expected_hash: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    println!("zensor ZK Keys Info");
    println!("===================");
    println!("Directory: {}", keys_dir.display());
    println!();

    let keys = MembershipKeys::load(keys_dir)?;
    let fingerprint = keys.fingerprint()?;
    println!("Circuit version: {}", CIRCUIT_VERSION);
    println!("Tree depth: {}", keys.depth());
    println!("VK hash: {}", fingerprint);

    if let Some(expected) = expected_hash {
        if !zensor_crypto::constant_time_eq(expected.as_bytes(), fingerprint.as_bytes()) {
            return Err(format!("VK hash mismatch, expected {}", expected).into());
        }
        println!("Hash match: OK");
    }
    Ok(())
}
