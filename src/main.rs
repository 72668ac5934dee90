use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use utxo_ledger::{factory, Address, BlockChain, ChainConfig, ChainError, SledStore, WalletStore};

/// Local UTXO ledger
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the proof-of-work difficulty
    #[arg(long)]
    difficulty: Option<u8>,

    /// Override the database directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chain management
    Chain {
        #[command(subcommand)]
        action: ChainAction,
    },
    /// Balance of an address
    Balance {
        #[arg(long)]
        address: String,
    },
    /// Send value between two addresses and mine the block carrying it
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Wallet management
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Delete the chain database
    Purge,
}

#[derive(Subcommand, Debug)]
enum ChainAction {
    /// Create a chain whose genesis reward goes to ADDRESS
    Create {
        #[arg(long)]
        address: String,
    },
    /// Print every block from head to genesis
    Show,
    /// Rebuild the UTXO index from chain history
    Reindex,
}

#[derive(Subcommand, Debug)]
enum WalletAction {
    /// Generate a new keypair
    New,
    /// List the addresses held in the wallet file
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => ChainConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ChainConfig::default(),
    };
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    config.validate()?;

    match cli.command {
        Command::Chain { action } => match action {
            ChainAction::Create { address } => create_chain(config, &address),
            ChainAction::Show => show_chain(config),
            ChainAction::Reindex => reindex(config),
        },
        Command::Balance { address } => balance(config, &address),
        Command::Send { from, to, amount } => send(config, &from, &to, amount),
        Command::Wallet { action } => match action {
            WalletAction::New => new_wallet(config),
            WalletAction::List => list_wallets(config),
        },
        Command::Purge => purge(config),
    }
}

fn open_chain(config: ChainConfig) -> Result<BlockChain<SledStore>> {
    let store = SledStore::open(&config.data_dir)?;
    match BlockChain::open(store, config) {
        Err(ChainError::NotFound) => {
            bail!("no blockchain found, use `chain create` to make one")
        }
        other => Ok(other?),
    }
}

fn create_chain(config: ChainConfig, address: &str) -> Result<()> {
    let origin = Address::parse(address)?;
    let store = SledStore::open(&config.data_dir)?;
    let chain = match BlockChain::seed(store, &origin, config) {
        Err(ChainError::AlreadyExists) => {
            bail!("blockchain already exists, use `chain show` to inspect it")
        }
        other => other?,
    };
    println!("Genesis block: {}", hex::encode(chain.head()));
    chain.close()?;
    Ok(())
}

fn show_chain(config: ChainConfig) -> Result<()> {
    let chain = open_chain(config)?;
    for block in chain.iter() {
        let block = block?;
        println!("Height:      {}", block.height);
        println!("Hash:        {}", hex::encode(block.hash));
        println!("Prev. hash:  {}", hex::encode(block.header.prev_hash));
        println!("Merkle root: {}", hex::encode(block.header.merkle_root));
        println!("Timestamp:   {}", block.header.timestamp);
        println!("Difficulty:  {}", block.header.pow.difficulty);
        println!("Nonce:       {}", block.header.pow.nonce);
        println!("Origin:      {}", block.origin);
        println!("PoW:         {}", block.validate()?);
        println!("Merkle:      {}", block.check_merkle_root()?);
        for txn in &block.transactions {
            println!("{txn}");
        }
        println!();
    }
    chain.close()?;
    Ok(())
}

fn reindex(config: ChainConfig) -> Result<()> {
    let chain = open_chain(config)?;
    let entries = chain.utxos().reindex()?;
    println!("Done! There are {entries} transactions in the UTXO set.");
    chain.close()?;
    Ok(())
}

fn balance(config: ChainConfig, address: &str) -> Result<()> {
    let address = Address::parse(address)?;
    let chain = open_chain(config)?;
    let balance = chain.utxos().balance(&address.pubkey_hash)?;
    println!("Balance of {address}: {balance}");
    chain.close()?;
    Ok(())
}

fn send(config: ChainConfig, from: &str, to: &str, amount: u64) -> Result<()> {
    let from_addr = Address::parse(from).context("sender address")?;
    let to_addr = Address::parse(to).context("recipient address")?;

    let wallets = WalletStore::open(&config.wallet_file)?;
    let wallet = wallets.wallet(from)?;
    let reward = config.block_reward;

    let mut chain = open_chain(config)?;
    let transfer = factory::new_transfer(&chain, wallet, &to_addr, amount)?;
    let coinbase = factory::new_coinbase(&from_addr, reward)?;
    let block = chain.add_block(vec![coinbase, transfer], &from_addr)?;

    info!(height = block.height, "transfer confirmed");
    println!("Success! Sent {amount} from {from_addr} to {to_addr} in block {}", hex::encode(block.hash));
    chain.close()?;
    Ok(())
}

fn new_wallet(config: ChainConfig) -> Result<()> {
    let mut wallets = WalletStore::open(&config.wallet_file)?;
    let address = wallets.create_wallet(config.address_prefix);
    wallets.save()?;
    println!("New address: {address}");
    Ok(())
}

fn list_wallets(config: ChainConfig) -> Result<()> {
    let wallets = WalletStore::open(&config.wallet_file)?;
    for address in wallets.addresses() {
        println!("{address}");
    }
    Ok(())
}

fn purge(config: ChainConfig) -> Result<()> {
    if config.data_dir.exists() {
        fs::remove_dir_all(&config.data_dir)
            .with_context(|| format!("removing {}", config.data_dir.display()))?;
        println!("Removed {}", config.data_dir.display());
    } else {
        println!("Nothing to purge at {}", config.data_dir.display());
    }
    Ok(())
}
