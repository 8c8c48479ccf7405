//! CLI commands for the ledger
//!
//! Implements all command handlers for the CLI interface.

use crate::core::{Block, Ledger, LedgerConfig, LedgerError, Transaction};
use crate::mining::Miner;
use crate::network::{LocalNetwork, Node, REQUEST_TIMEOUT};
use crate::storage::{Storage, StorageConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub ledger: Ledger,
    pub storage: Storage,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize application state
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;

        // Load or create ledger
        let ledger = if storage.exists() {
            log::debug!("Loading ledger from {:?}", data_dir);
            storage.load()?
        } else {
            println!("🆕 Creating new ledger...");
            let ledger = Ledger::new(LedgerConfig::default())?;
            storage.save(&ledger)?;
            ledger
        };

        Ok(Self {
            ledger,
            storage,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.ledger)?;
        Ok(())
    }
}

fn open_storage(data_dir: &Path) -> CliResult<Storage> {
    Ok(Storage::new(StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    })?)
}

/// First 16 characters of a hash, or all of it when shorter
fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Initialize a new ledger
pub fn cmd_init(data_dir: &Path, config: LedgerConfig, force: bool) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() {
        if !force {
            println!("⚠️  Ledger already exists at {:?}", data_dir);
            println!("   Use --force to reinitialize (this will delete existing data)");
            return Ok(());
        }
        storage.delete()?;
    }

    let ledger = Ledger::new(config)?;
    storage.save(&ledger)?;

    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔧 Difficulty: {}", ledger.difficulty());
    println!("   🎁 Mining reward: {}", ledger.mining_reward());
    println!("   🧱 Genesis block hash: {}", ledger.genesis_block().hash);

    Ok(())
}

/// Queue a transfer for the next mined block
pub fn cmd_send(state: &mut AppState, from: &str, to: &str, amount: u64) -> CliResult<()> {
    let tx = Transaction::new(from, to, amount);
    state.ledger.queue_transaction(tx)?;
    state.save()?;

    println!("📤 Transaction queued:");
    println!("   From: {}", from);
    println!("   To: {}", to);
    println!("   Amount: {} coins", amount);
    println!("\n   It will be included in the next mined block.");

    Ok(())
}

/// Mine new blocks
pub fn cmd_mine(state: &mut AppState, address: &str, count: u32) -> CliResult<()> {
    let miner = Miner::new(address);

    println!("⛏️  Mining {} block(s) for address: {}", count, address);
    println!("   Current difficulty: {}", state.ledger.difficulty());

    for _ in 0..count {
        let (block, stats) = miner.mine_block(&mut state.ledger)?;

        println!("\n   Block {} mined!", state.ledger.height());
        println!("   ├─ Hash: {}", short(&block.hash));
        println!("   ├─ Transactions: {}", block.tx_count());
        println!("   ├─ Time: {}ms", stats.time_ms);
        println!("   ├─ Attempts: {}", stats.hash_attempts);
        println!("   └─ Hash rate: {:.2} H/s", stats.hash_rate);

        // Save after each block
        state.save()?;
    }

    let balance = state.ledger.get_balance(address)?;
    println!("\n💰 Balance for miner: {} coins", balance);
    println!("   (the reward for the last block is paid in the next one)");

    Ok(())
}

/// Show the balance of an address
pub fn cmd_balance(state: &AppState, address: &str) -> CliResult<()> {
    let balance = state.ledger.get_balance(address)?;

    println!("💰 Balance for {}", address);
    println!("   Total: {} coins", balance);

    Ok(())
}

/// Display ledger info
pub fn cmd_chain_info(state: &AppState) -> CliResult<()> {
    let stats = state.ledger.stats();

    println!("⛓️  Ledger Info");
    println!("   ├─ Height: {}", stats.height);
    println!("   ├─ Total blocks: {}", stats.total_blocks);
    println!("   ├─ Total transactions: {}", stats.total_transactions);
    println!("   ├─ Total issued: {}", stats.total_issued);
    println!("   ├─ Pending transactions: {}", stats.pending_transactions);
    println!("   ├─ Difficulty: {}", stats.difficulty);
    println!("   └─ Latest hash: {}", stats.latest_hash);

    Ok(())
}

/// List recent blocks
pub fn cmd_chain_blocks(state: &AppState, count: u32) -> CliResult<()> {
    let height = state.ledger.height();
    let start = height.saturating_sub(count.saturating_sub(1) as u64);

    println!("🧱 Recent blocks:");
    for i in (start..=height).rev() {
        if let Some(block) = state.ledger.get_block(i) {
            println!(
                "   #{} | {} | {} tx | nonce {} | {}",
                i,
                short(&block.hash),
                block.tx_count(),
                block.nonce,
                format_timestamp(block.timestamp)
            );
        }
    }

    Ok(())
}

/// Validate the ledger; fails when the local chain is corrupt
pub fn cmd_validate(state: &AppState) -> CliResult<()> {
    println!("🔍 Validating ledger...");

    if state.ledger.is_valid() {
        println!("✅ Ledger is valid!");
        println!("   {} blocks verified", state.ledger.len());
        return Ok(());
    }

    println!("❌ Ledger validation FAILED!");
    println!("   The chain may have been tampered with.");
    Err(LedgerError::CorruptLocalState.into())
}

/// Show the pending pool
pub fn cmd_pending(state: &AppState) -> CliResult<()> {
    let pending = state.ledger.pending_transactions();

    println!("📬 Pending Transactions: {}", pending.len());
    for tx in pending {
        println!(
            "   └─ {} -> {}: {} coins",
            tx.from.as_deref().unwrap_or("(reward)"),
            tx.to,
            tx.amount
        );
    }

    Ok(())
}

/// Export ledger to file
pub fn cmd_export(state: &AppState, path: &Path) -> CliResult<()> {
    crate::storage::save_to_file(&state.ledger, path)?;
    println!("📦 Ledger exported to {:?}", path);
    Ok(())
}

/// Import ledger from file
pub fn cmd_import(state: &mut AppState, path: &Path) -> CliResult<()> {
    let ledger = crate::storage::load_from_file(path)?;

    if !ledger.is_valid() {
        println!("❌ Imported ledger is invalid!");
        return Err(LedgerError::CorruptLocalState.into());
    }

    state.ledger = ledger;
    state.save()?;

    println!("📥 Ledger imported from {:?}", path);
    println!("   Height: {}", state.ledger.height());

    Ok(())
}

const DEMO_MINER: &str = "miner-address";

/// Two mining rounds on a pair of in-process nodes, then a late joiner
/// catching up through consensus.
pub async fn cmd_demo(difficulty: usize) -> CliResult<()> {
    let config = LedgerConfig {
        difficulty,
        genesis_timestamp: Some(chrono::Utc::now().timestamp_millis()),
        ..Default::default()
    };
    let network = LocalNetwork::new();

    println!("🌐 Creating ledger on nodes node-a and node-b...");
    let node_a = spawn_node(&network, "node-a", &config)?;
    let node_b = spawn_node(&network, "node-b", &config)?;

    println!("\n📤 Creating transactions on node-a...");
    node_a
        .submit_transaction(Transaction::new("address1", "address2", 100))
        .await?;
    node_a
        .submit_transaction(Transaction::new("address2", "address1", 50))
        .await?;

    println!("⛏️  Mining on node-a...");
    print_mined(&node_a, node_a.mine(DEMO_MINER).await?);
    wait_for_len(&node_b, node_a.chain_len().await).await;
    println!("💰 Miner balance: {}", node_a.balance(DEMO_MINER).await?);

    println!("\n📤 Creating more transactions on node-a...");
    node_a
        .submit_transaction(Transaction::new("address1", "address2", 200))
        .await?;
    node_a
        .submit_transaction(Transaction::new("address2", "address1", 100))
        .await?;

    println!("⛏️  Mining again on node-a...");
    print_mined(&node_a, node_a.mine(DEMO_MINER).await?);
    wait_for_len(&node_b, node_a.chain_len().await).await;
    println!("💰 Miner balance: {}", node_b.balance(DEMO_MINER).await?);

    println!("\n🆕 node-c joins late and syncs with its peers...");
    let node_c = spawn_node(&network, "node-c", &config)?;
    let adopted = node_c.sync_with_peers().await;
    println!(
        "   {} (chain length {})",
        if adopted {
            "Adopted the longest chain"
        } else {
            "Kept its own chain"
        },
        node_c.chain_len().await
    );

    for node in [&node_a, &node_b, &node_c] {
        let ledger = node.ledger();
        let ledger = ledger.read().await;
        println!(
            "🔍 {}: {} blocks, valid: {}, tip {}",
            node.id(),
            ledger.len(),
            ledger.is_valid(),
            short(&ledger.latest_block().hash)
        );
    }

    let ledger = node_a.ledger();
    let ledger = ledger.read().await;
    println!("\n{}", serde_json::to_string_pretty(&*ledger)?);

    Ok(())
}

fn spawn_node(network: &LocalNetwork, id: &str, config: &LedgerConfig) -> CliResult<Arc<Node>> {
    let (transport, inbox) = network.join(id);
    let ledger = Ledger::new(config.clone())?.with_transport(transport);
    let node = Arc::new(Node::new(id, ledger));
    tokio::spawn(Arc::clone(&node).run(inbox));
    Ok(node)
}

fn print_mined(node: &Node, mined: Option<(Block, crate::mining::MiningStats)>) {
    match mined {
        Some((block, stats)) => println!(
            "   {} mined {} in {}ms ({} attempts)",
            node.id(),
            short(&block.hash),
            stats.time_ms,
            stats.hash_attempts
        ),
        None => println!("   {} lost the race; block discarded", node.id()),
    }
}

/// Give a peer time to apply a broadcast block
async fn wait_for_len(node: &Node, len: usize) {
    let deadline = tokio::time::Instant::now() + REQUEST_TIMEOUT;
    while node.chain_len().await < len {
        if tokio::time::Instant::now() >= deadline {
            log::warn!("{} did not reach length {} in time", node.id(), len);
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init(dir: &Path) -> AppState {
        cmd_init(dir, LedgerConfig::with_difficulty(1), false).unwrap();
        AppState::new(dir.to_path_buf()).unwrap()
    }

    #[test]
    fn test_send_mine_balance() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init(temp_dir.path());

        cmd_send(&mut state, "alice", "bob", 30).unwrap();
        cmd_mine(&mut state, "miner", 2).unwrap();

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.ledger.len(), 3);
        assert_eq!(reloaded.ledger.get_balance("bob").unwrap(), 30);
        assert_eq!(reloaded.ledger.get_balance("alice").unwrap(), -30);
        assert_eq!(reloaded.ledger.get_balance("miner").unwrap(), 100);
        assert!(cmd_validate(&reloaded).is_ok());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init(temp_dir.path());
        cmd_mine(&mut state, "miner", 1).unwrap();

        cmd_init(temp_dir.path(), LedgerConfig::with_difficulty(1), false).unwrap();
        assert_eq!(AppState::new(temp_dir.path().to_path_buf()).unwrap().ledger.len(), 2);

        cmd_init(temp_dir.path(), LedgerConfig::with_difficulty(2), true).unwrap();
        let state = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(state.ledger.len(), 1);
        assert_eq!(state.ledger.difficulty(), 2);
    }

    #[test]
    fn test_init_rejects_bad_difficulty() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(cmd_init(temp_dir.path(), LedgerConfig::with_difficulty(0), false).is_err());
    }

    #[test]
    fn test_validate_reports_tampering() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init(temp_dir.path());
        cmd_send(&mut state, "alice", "bob", 30).unwrap();
        cmd_mine(&mut state, "miner", 1).unwrap();

        let mut chain = state.ledger.chain().to_vec();
        chain[1].transactions[0].amount = 3000;
        state.ledger.replace_chain(chain);
        assert!(cmd_validate(&state).is_err());
        assert!(cmd_balance(&state, "bob").is_err());
    }

    #[test]
    fn test_import_refuses_invalid_chain() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init(temp_dir.path());
        cmd_send(&mut state, "alice", "bob", 30).unwrap();
        cmd_mine(&mut state, "miner", 1).unwrap();

        let export = temp_dir.path().join("export.json");
        cmd_export(&state, &export).unwrap();
        let text = fs::read_to_string(&export).unwrap();
        fs::write(&export, text.replace("\"amount\": 30", "\"amount\": 3000")).unwrap();

        let other_dir = tempfile::tempdir().unwrap();
        let mut other = init(other_dir.path());
        assert!(cmd_import(&mut other, &export).is_err());
        assert_eq!(other.ledger.len(), 1);
    }

    #[test]
    fn test_export_import() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init(temp_dir.path());
        cmd_mine(&mut state, "miner", 2).unwrap();

        let export = temp_dir.path().join("export.json");
        cmd_export(&state, &export).unwrap();

        let other_dir = tempfile::tempdir().unwrap();
        let mut other = init(other_dir.path());
        cmd_import(&mut other, &export).unwrap();
        assert_eq!(other.ledger.chain(), state.ledger.chain());
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short(&"f".repeat(64)).len(), 16);
    }

    #[tokio::test]
    async fn test_demo_runs() {
        cmd_demo(1).await.unwrap();
    }
}
