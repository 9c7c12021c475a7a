// src/main.rs
//
// Minimal demo node that wires up the core library:
//
// - RocksDB-backed storage
// - the full proof-of-block-stake validity predicate
// - heaviest-accumulated-work fork choice
// - Prometheus metrics exporter on /metrics
// - an in-memory transaction pool
// - a block creator solving against a single demo stake source
// - a null gateway (no networking)

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pobs_core::{
    BlockCreator, ChainConfig, ConsensusEngine, DefaultBlockValidator, DefaultForkChoice, Gateway,
    HeaviestChainForkChoice, ImportOutcome, MempoolTransactionPool, MetricsRegistry, NullGateway,
    RocksDbStateStore, StakeSource, StateStore, run_prometheus_http_server,
};
use pobs_core::creator::unlock_hash_condition_for;
use pobs_core::crypto::generate_keypair;
use pobs_core::types::block::{Block, BlockId, Header, PobsProof};
use pobs_core::types::currency::Currency;
use pobs_core::types::hash::Hash;
use pobs_core::types::index::AccumulatedWork;
use pobs_core::types::transaction::{BlockStakeOutput, Transaction};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "pobs_core=info".to_string()))
        .init();

    if let Err(err) = run_node().await {
        tracing::error!(%err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    // For now, just use defaults. Later you can load from a file/CLI/env.
    let cfg = ChainConfig::default();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics =
        Arc::new(MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?);

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    // ---------------------------
    // Demo stake keypair + genesis
    // ---------------------------

    let (stake_secret, stake_public) = generate_keypair(*b"demo-stake-source-seed-bytes-001");
    let stake_value = 1_000_000u64;

    // ---------------------------
    // Storage backend (RocksDB)
    // ---------------------------

    let mut store = RocksDbStateStore::open(&cfg.storage)
        .map_err(|e| format!("failed to open RocksDB store at {}: {e:?}", cfg.storage.path))?;

    if store.tip().map_err(|e| format!("failed to read store tip: {e:?}"))?.is_none() {
        let (genesis, _output_id) = build_genesis(&stake_public, stake_value);
        store
            .apply_block(&genesis, cfg.consensus.genesis_target, AccumulatedWork::zero().add_block(cfg.consensus.genesis_target), cfg.consensus.maturity_delay)
            .map_err(|e| format!("failed to apply genesis block: {e:?}"))?;
        tracing::info!(block_id = %genesis.id(), "initialized genesis block");
    }

    // ---------------------------
    // Validator, fork choice, engine
    // ---------------------------

    let validator = DefaultBlockValidator::new(cfg.consensus.clone());
    let fork_choice: DefaultForkChoice = HeaviestChainForkChoice;

    let mut engine: ConsensusEngine<_, _, _> =
        ConsensusEngine::new(cfg.consensus.clone(), store, validator, fork_choice)
            .map_err(|e| format!("failed to start consensus engine: {e:?}"))?;

    // ---------------------------
    // Transaction pool, block creator, gateway
    // ---------------------------

    let mut pool = MempoolTransactionPool::new();
    let genesis_output_id = {
        let (_genesis, output_id) = build_genesis(&stake_public, stake_value);
        output_id
    };
    let stake_sources = vec![StakeSource {
        output_id: genesis_output_id,
        secret_key: stake_secret,
        public_key: stake_public,
    }];
    let mut creator = BlockCreator::new(cfg.consensus.clone(), unlock_hash_condition_for(&stake_public));
    creator.search_window_secs = cfg.creator.search_window_secs;
    let gateway = NullGateway;

    tracing::info!(target_block_time_secs = cfg.consensus.target_block_time_secs, "starting node");

    // ---------------------------
    // Main loop: solve, import, broadcast
    // ---------------------------

    loop {
        let now = current_unix_timestamp();

        match engine.store().tip() {
            Ok(Some(_)) => {}
            Ok(None) => return Err("consensus engine lost its tip".to_string()),
            Err(e) => return Err(format!("failed to read tip: {e:?}")),
        }

        match engine.process_due_blocks(now) {
            Ok(changes) if !changes.is_empty() => {
                if let Ok(tip) = engine.tip() {
                    metrics.consensus.tip_height.set(tip.height.0 as i64);
                }
                tracing::info!(count = changes.len(), "applied previously-deferred blocks now due");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "failed to process due blocks"),
        }

        let solve_start = std::time::Instant::now();
        let solved = creator.try_create_block(engine.store(), &mut pool, &stake_sources, now);
        metrics.creator.solve_attempt_seconds.observe(solve_start.elapsed().as_secs_f64());

        match solved {
            Ok(Some(block)) => {
                let block_id = block.id();
                let validate_start = std::time::Instant::now();
                match engine.import_block(block.clone(), now) {
                    Ok(ImportOutcome::Accepted(_)) => {
                        metrics.consensus.blocks_accepted.inc();
                        metrics.creator.blocks_produced.inc();
                        if let Ok(tip) = engine.tip() {
                            metrics.consensus.tip_height.set(tip.height.0 as i64);
                        }
                        gateway.broadcast_block(&block);
                        tracing::info!(height = block.header.height, %block_id, "produced and imported block");
                    }
                    Ok(ImportOutcome::Buffered) => {
                        tracing::warn!(%block_id, "self-produced block buffered as an orphan");
                    }
                    Ok(ImportOutcome::Deferred) => {
                        tracing::warn!(%block_id, "self-produced block has a not-yet-due timestamp; parked");
                    }
                    Err(e) => {
                        metrics.consensus.blocks_rejected.inc();
                        tracing::error!(error = ?e, %block_id, "self-produced block failed validation");
                    }
                }
                metrics.consensus.block_validation_seconds.observe(validate_start.elapsed().as_secs_f64());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = ?e, "block creator iteration failed");
            }
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Builds a deterministic genesis block funding `owner_pk` with a single
/// block-stake output of `stake_value`, so the demo node has an
/// immediately usable stake source.
fn build_genesis(owner_pk: &pobs_core::crypto::PublicKey, stake_value: u64) -> (Block, pobs_core::types::transaction::BlockStakeOutputId) {
    let (_sk, genesis_pk) = generate_keypair(*b"demo-genesis-block-signer-seed-b");
    let header = Header {
        parent_id: BlockId(Hash::ZERO),
        height: 0,
        timestamp: 0,
        pobs: PobsProof {
            block_stake_output_id: pobs_core::types::transaction::BlockStakeOutputId(Hash::ZERO),
            creation_block_height: 0,
            creation_tx_index: 0,
            creation_output_index: 0,
            public_key: genesis_pk,
            signature: pobs_core::crypto::Signature([0u8; 64]),
        },
    };
    let tx = Transaction {
        version: pobs_core::TransactionVersion::default(),
        coin_inputs: vec![],
        coin_outputs: vec![],
        block_stake_inputs: vec![],
        block_stake_outputs: vec![BlockStakeOutput { value: Currency::from_u64(stake_value), condition: unlock_hash_condition_for(owner_pk) }],
        miner_fees: vec![],
        arbitrary_data: vec![],
    };
    let output_id = tx.block_stake_output_id(0);
    let block = Block { header, miner_payouts: vec![], transactions: vec![tx] };
    (block, output_id)
}

/// Returns the current wall-clock time as seconds since Unix epoch.
fn current_unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_else(|_| Duration::from_secs(0)).as_secs()
}
