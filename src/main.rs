//! PoW Ledger CLI Application
//!
//! A command-line interface for interacting with the ledger.

use clap::{Parser, Subcommand};
use pow_ledger::cli::{self, AppState};
use pow_ledger::core::{LedgerConfig, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A minimal append-only proof-of-work ledger", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, default_value = ".ledger_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ledger
    Init {
        /// Mining difficulty (number of leading zero hex characters)
        #[arg(short, long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: usize,

        /// Reward paid for each mined block
        #[arg(short, long, default_value_t = DEFAULT_MINING_REWARD)]
        reward: u64,

        /// Fixed genesis timestamp (Unix millis) so replicas share a genesis block
        #[arg(long)]
        genesis_timestamp: Option<i64>,

        /// Replace an existing ledger
        #[arg(long)]
        force: bool,
    },

    /// Queue a transfer for the next block
    Send {
        /// Sender's address
        #[arg(short, long)]
        from: String,

        /// Recipient's address
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u64,
    },

    /// Mine new blocks
    Mine {
        /// Miner's address for receiving rewards
        #[arg(short, long)]
        address: String,

        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Show the balance of an address
    Balance {
        #[arg(short, long)]
        address: String,
    },

    /// Display ledger information
    Chain {
        #[command(subcommand)]
        action: Option<ChainCommands>,
    },

    /// Validate the ledger
    Validate,

    /// Show pending transactions
    Pending,

    /// Export ledger to file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import ledger from file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run a walkthrough on an in-process network of nodes
    Demo {
        #[arg(short, long, default_value = "2")]
        difficulty: usize,
    },
}

#[derive(Subcommand)]
enum ChainCommands {
    /// Show detailed info
    Info,

    /// List recent blocks
    Blocks {
        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle init command separately (doesn't need full state)
    if let Commands::Init {
        difficulty,
        reward,
        genesis_timestamp,
        force,
    } = cli.command
    {
        let config = LedgerConfig {
            difficulty,
            mining_reward: reward,
            genesis_timestamp,
        };
        return cli::cmd_init(&cli.data_dir, config, force);
    }

    // The demo runs on its own in-memory network
    if let Commands::Demo { difficulty } = cli.command {
        let rt = tokio::runtime::Runtime::new()?;
        return rt.block_on(cli::cmd_demo(difficulty));
    }

    // Initialize application state
    let mut state = AppState::new(cli.data_dir.clone())?;

    // Process commands
    match cli.command {
        Commands::Init { .. } | Commands::Demo { .. } => unreachable!(),

        Commands::Send { from, to, amount } => {
            cli::cmd_send(&mut state, &from, &to, amount)?;
        }

        Commands::Mine { address, count } => {
            cli::cmd_mine(&mut state, &address, count)?;
        }

        Commands::Balance { address } => {
            cli::cmd_balance(&state, &address)?;
        }

        Commands::Chain { action } => match action {
            None | Some(ChainCommands::Info) => {
                cli::cmd_chain_info(&state)?;
            }
            Some(ChainCommands::Blocks { count }) => {
                cli::cmd_chain_blocks(&state, count)?;
            }
        },

        Commands::Validate => {
            cli::cmd_validate(&state)?;
        }

        Commands::Pending => {
            cli::cmd_pending(&state)?;
        }

        Commands::Export { output } => {
            cli::cmd_export(&state, &output)?;
        }

        Commands::Import { input } => {
            cli::cmd_import(&mut state, &input)?;
        }
    }

    Ok(())
}
