//! heim: heimdall CLI client
//!
//! Inspect and poke a running heimdalld.

use std::time::Duration;

use clap::{Parser, Subcommand};
use heimdall::client::RemoteAdmission;
use heimdall::{AdmissionControl, HolderId};

/// Heimdall CLI client
#[derive(Parser)]
#[command(name = "heim")]
#[command(version = heimdall::PKG_VERSION)]
#[command(about = "Heimdall admission daemon client")]
struct Args {
    /// Daemon address
    #[arg(short, long, env = "HEIMDALL_ADDRESS", default_value = "127.0.0.1:9742")]
    address: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show slot occupancy
    Status,

    /// Take a slot by hand
    Acquire {
        /// Holder id (e.g. "session:job")
        holder: String,
        /// Operation tag recorded with the slot
        #[arg(default_value = "manual")]
        tag: String,
    },

    /// Give a slot back
    Release {
        /// Holder id
        holder: String,
    },

    /// Reclaim abandoned slots
    Sweep {
        /// Reclaim slots older than this many seconds
        #[arg(long, default_value_t = heimdall::DEFAULT_STALE_AFTER.as_secs())]
        max_age: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let client = RemoteAdmission::connect(&args.address).await?;

    match args.command {
        Command::Status => {
            let status = client.status().await?;
            println!("slots: {}/{}", status.current_slots, status.max_slots);
            match status.oldest_slot_age_secs {
                Some(age) => println!("oldest: {age}s"),
                None => println!("oldest: -"),
            }
        }

        Command::Acquire { holder, tag } => {
            let holder = HolderId::new(holder)?;
            let result = client.acquire(&holder, &tag).await?;
            if result.granted {
                println!(
                    "granted ({}/{} slots in use)",
                    result.current_slots, result.max_slots
                );
            } else {
                println!(
                    "denied ({}/{} slots in use), retry in about {}s",
                    result.current_slots,
                    result.max_slots,
                    result.estimated_wait_secs.unwrap_or_default()
                );
            }
        }

        Command::Release { holder } => {
            let holder = HolderId::new(holder)?;
            client.release(&holder).await?;
            println!("released {holder}");
        }

        Command::Sweep { max_age } => {
            let count = client.cleanup_stale(Duration::from_secs(max_age)).await?;
            println!("reclaimed {count} slot(s)");
        }
    }

    Ok(())
}
