//! RocksDB-backed [`StateStore`].
//!
//! Five column families carry the index a node needs to survive a
//! restart: `block_index` (block bytes + height/target/work metadata),
//! `height_index` (canonical height -> block id), `coin_outputs`,
//! `block_stake_outputs`, and `meta` (the current tip and a schema
//! version so an incompatible on-disk layout is refused rather than
//! silently misread). A sixth, `undo`, holds what `apply_block` changed
//! for each block so `revert_tip` can undo it after a restart, not just
//! within one process's lifetime.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, WriteBatch, DB};

use crate::consensus::error::StorageError;
use crate::consensus::store::{BlockIndexEntry, BlockStakeOutputRecord, StateStore, TipInfo};
use crate::encoding::{decode_exact, decode_seq, encode_seq, Cursor, Decode, Encode};
use crate::types::block::{Block, BlockId};
use crate::types::hash::Target;
use crate::types::index::{AccumulatedWork, BlockHeight};
use crate::types::transaction::{BlockStakeOutput, BlockStakeOutputId, CoinOutput, CoinOutputId};

/// On-disk schema version. Bump whenever the column-family layout or
/// encoding of a stored record changes; `open` refuses to start against
/// a database stamped with a different version.
const SCHEMA_VERSION: u32 = 1;

const CF_BLOCK_INDEX: &str = "block_index";
const CF_HEIGHT_INDEX: &str = "height_index";
const CF_COIN_OUTPUTS: &str = "coin_outputs";
const CF_BLOCK_STAKE_OUTPUTS: &str = "block_stake_outputs";
const CF_DELAYED_OUTPUTS: &str = "delayed_outputs";
const CF_UNDO: &str = "undo";
const CF_META: &str = "meta";

const META_KEY_TIP: &[u8] = b"tip";
const META_KEY_SCHEMA_VERSION: &[u8] = b"schema_version";

#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    pub path: String,
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self { path: "data/pobs-db".to_string(), create_if_missing: true }
    }
}

pub struct RocksDbStateStore {
    db: DB,
}

impl RocksDbStateStore {
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = [CF_BLOCK_INDEX, CF_HEIGHT_INDEX, CF_COIN_OUTPUTS, CF_BLOCK_STAKE_OUTPUTS, CF_DELAYED_OUTPUTS, CF_UNDO, CF_META]
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, rocksdb::Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = Self { db };
        store.check_or_stamp_schema_version()?;
        Ok(store)
    }

    fn cf(&self, name: &'static str) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle(name).ok_or_else(|| StorageError::Backend(format!("missing column family {name}")))
    }

    fn check_or_stamp_schema_version(&self) -> Result<(), StorageError> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(&cf, META_KEY_SCHEMA_VERSION).map_err(|e| StorageError::Backend(e.to_string()))? {
            None => {
                self.db
                    .put_cf(&cf, META_KEY_SCHEMA_VERSION, SCHEMA_VERSION.to_le_bytes())
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok(())
            }
            Some(bytes) => {
                let mut arr = [0u8; 4];
                if bytes.len() != 4 {
                    return Err(StorageError::Corruption("schema_version record has the wrong length".into()));
                }
                arr.copy_from_slice(&bytes);
                let found = u32::from_le_bytes(arr);
                if found != SCHEMA_VERSION {
                    return Err(StorageError::SchemaMismatch { expected: SCHEMA_VERSION, found });
                }
                Ok(())
            }
        }
    }

    fn get_decoded<T: Decode>(&self, cf: &str, key: &[u8], what: &'static str) -> Result<Option<T>, StorageError> {
        let handle = self.cf_static(cf)?;
        match self.db.get_cf(&handle, key).map_err(|e| StorageError::Backend(e.to_string()))? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode_exact(what, &bytes)?)),
        }
    }

    fn cf_static(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle(name).ok_or_else(|| StorageError::Backend(format!("missing column family {name}")))
    }
}

fn encode_block_index_entry(entry: &BlockIndexEntry) -> Vec<u8> {
    let mut out = Vec::new();
    entry.height.encode(&mut out);
    entry.target.encode(&mut out);
    entry.accumulated_work.encode(&mut out);
    out
}

impl Decode for BlockIndexEntry {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, crate::encoding::FormatError> {
        Ok(BlockIndexEntry { height: BlockHeight::decode(cur)?, target: Target::decode(cur)?, accumulated_work: AccumulatedWork::decode(cur)? })
    }
}

fn encode_tip(tip: &TipInfo) -> Vec<u8> {
    let mut out = Vec::new();
    tip.block_id.encode(&mut out);
    tip.height.encode(&mut out);
    tip.accumulated_work.encode(&mut out);
    out
}

impl Decode for TipInfo {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, crate::encoding::FormatError> {
        Ok(TipInfo { block_id: BlockId::decode(cur)?, height: BlockHeight::decode(cur)?, accumulated_work: AccumulatedWork::decode(cur)? })
    }
}

fn encode_stake_record(record: &BlockStakeOutputRecord) -> Vec<u8> {
    let mut out = Vec::new();
    record.output.encode(&mut out);
    record.creation_block_height.encode(&mut out);
    record.creation_tx_index.encode(&mut out);
    record.creation_output_index.encode(&mut out);
    out
}

impl Decode for BlockStakeOutputRecord {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, crate::encoding::FormatError> {
        Ok(BlockStakeOutputRecord {
            output: BlockStakeOutput::decode(cur)?,
            creation_block_height: BlockHeight::decode(cur)?,
            creation_tx_index: u64::decode(cur)?,
            creation_output_index: u64::decode(cur)?,
        })
    }
}

/// A single coin output together with its id, encodable as a sequence
/// element for the delayed-output list.
#[derive(Clone)]
struct DelayedEntry(CoinOutputId, CoinOutput);

impl Encode for DelayedEntry {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
        self.1.encode(out);
    }
}

impl Decode for DelayedEntry {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, crate::encoding::FormatError> {
        Ok(DelayedEntry(CoinOutputId::decode(cur)?, CoinOutput::decode(cur)?))
    }
}

/// Everything `apply_block` changed, so `revert_tip` can reverse it.
struct UndoRecord {
    parent_id: BlockId,
    consumed_coin_outputs: Vec<DelayedEntry>,
    consumed_stake_outputs: Vec<(BlockStakeOutputId, BlockStakeOutputRecord)>,
    created_coin_output_ids: Vec<CoinOutputId>,
    created_stake_output_ids: Vec<BlockStakeOutputId>,
    delayed_output_ids: Vec<CoinOutputId>,
    delayed_maturity_height: u64,
    matured_this_height: Vec<DelayedEntry>,
}

impl Encode for UndoRecord {
    fn encode(&self, out: &mut Vec<u8>) {
        self.parent_id.encode(out);
        encode_seq(out, &self.consumed_coin_outputs);
        (self.consumed_stake_outputs.len() as u64).encode(out);
        for (id, record) in &self.consumed_stake_outputs {
            id.encode(out);
            record.output.encode(out);
            record.creation_block_height.encode(out);
            record.creation_tx_index.encode(out);
            record.creation_output_index.encode(out);
        }
        encode_seq(out, &self.created_coin_output_ids);
        encode_seq(out, &self.created_stake_output_ids);
        encode_seq(out, &self.delayed_output_ids);
        self.delayed_maturity_height.encode(out);
        encode_seq(out, &self.matured_this_height);
    }
}

impl Decode for UndoRecord {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, crate::encoding::FormatError> {
        let parent_id = BlockId::decode(cur)?;
        let consumed_coin_outputs = decode_seq(cur, "UndoRecord.consumed_coin_outputs")?;
        let stake_len = u64::decode(cur)?;
        let mut consumed_stake_outputs = Vec::new();
        for _ in 0..stake_len {
            let id = BlockStakeOutputId::decode(cur)?;
            let record = BlockStakeOutputRecord {
                output: BlockStakeOutput::decode(cur)?,
                creation_block_height: BlockHeight::decode(cur)?,
                creation_tx_index: u64::decode(cur)?,
                creation_output_index: u64::decode(cur)?,
            };
            consumed_stake_outputs.push((id, record));
        }
        let created_coin_output_ids = decode_seq(cur, "UndoRecord.created_coin_output_ids")?;
        let created_stake_output_ids = decode_seq(cur, "UndoRecord.created_stake_output_ids")?;
        let delayed_output_ids = decode_seq(cur, "UndoRecord.delayed_output_ids")?;
        let delayed_maturity_height = u64::decode(cur)?;
        let matured_this_height = decode_seq(cur, "UndoRecord.matured_this_height")?;
        Ok(UndoRecord {
            parent_id,
            consumed_coin_outputs,
            consumed_stake_outputs,
            created_coin_output_ids,
            created_stake_output_ids,
            delayed_output_ids,
            delayed_maturity_height,
            matured_this_height,
        })
    }
}

impl StateStore for RocksDbStateStore {
    fn block(&self, id: &BlockId) -> Result<Option<Block>, StorageError> {
        let cf = self.cf(CF_BLOCK_INDEX)?;
        match self.db.get_cf(&cf, block_key(id)).map_err(|e| StorageError::Backend(e.to_string()))? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode_exact("Block", &bytes)?)),
        }
    }

    fn block_index(&self, id: &BlockId) -> Result<Option<BlockIndexEntry>, StorageError> {
        self.get_decoded(CF_BLOCK_INDEX, &index_key(id), "BlockIndexEntry")
    }

    fn block_id_at_height(&self, height: BlockHeight) -> Result<Option<BlockId>, StorageError> {
        let cf = self.cf(CF_HEIGHT_INDEX)?;
        match self.db.get_cf(&cf, height.0.to_le_bytes()).map_err(|e| StorageError::Backend(e.to_string()))? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode_exact("BlockId", &bytes)?)),
        }
    }

    fn tip(&self) -> Result<Option<TipInfo>, StorageError> {
        self.get_decoded(CF_META, META_KEY_TIP, "TipInfo")
    }

    fn coin_output(&self, id: &CoinOutputId) -> Result<Option<CoinOutput>, StorageError> {
        self.get_decoded(CF_COIN_OUTPUTS, id.0.as_bytes(), "CoinOutput")
    }

    fn block_stake_output(&self, id: &BlockStakeOutputId) -> Result<Option<BlockStakeOutputRecord>, StorageError> {
        self.get_decoded(CF_BLOCK_STAKE_OUTPUTS, id.0.as_bytes(), "BlockStakeOutputRecord")
    }

    fn apply_block(&mut self, block: &Block, target: Target, work: AccumulatedWork, maturity_delay: u64) -> Result<(), StorageError> {
        let id = block.id();
        let height = block.header.height;

        let mut consumed_coin_outputs = Vec::new();
        let mut consumed_stake_outputs = Vec::new();
        let mut created_coin_output_ids = Vec::new();
        let mut created_stake_output_ids = Vec::new();

        let mut batch = WriteBatch::default();
        let cf_coin = self.cf(CF_COIN_OUTPUTS)?;
        let cf_stake = self.cf(CF_BLOCK_STAKE_OUTPUTS)?;

        for (tx_index, tx) in block.transactions.iter().enumerate() {
            for input in &tx.coin_inputs {
                let existing = self
                    .db
                    .get_cf(&cf_coin, input.parent_id.0.as_bytes())
                    .map_err(|e| StorageError::Backend(e.to_string()))?
                    .ok_or_else(|| StorageError::Corruption(format!("apply_block: coin output {} already gone", input.parent_id)))?;
                let output: CoinOutput = decode_exact("CoinOutput", &existing)?;
                consumed_coin_outputs.push(DelayedEntry(input.parent_id, output));
                batch.delete_cf(&cf_coin, input.parent_id.0.as_bytes());
            }
            for input in &tx.block_stake_inputs {
                let existing = self
                    .db
                    .get_cf(&cf_stake, input.parent_id.0.as_bytes())
                    .map_err(|e| StorageError::Backend(e.to_string()))?
                    .ok_or_else(|| StorageError::Corruption(format!("apply_block: block-stake output {} already gone", input.parent_id)))?;
                let record: BlockStakeOutputRecord = decode_exact("BlockStakeOutputRecord", &existing)?;
                consumed_stake_outputs.push((input.parent_id, record));
                batch.delete_cf(&cf_stake, input.parent_id.0.as_bytes());
            }
            for (i, output) in tx.coin_outputs.iter().enumerate() {
                let out_id = tx.coin_output_id(i);
                batch.put_cf(&cf_coin, out_id.0.as_bytes(), output.encode_to_vec());
                created_coin_output_ids.push(out_id);
            }
            for (i, output) in tx.block_stake_outputs.iter().enumerate() {
                let out_id = tx.block_stake_output_id(i);
                let record = BlockStakeOutputRecord {
                    output: output.clone(),
                    creation_block_height: BlockHeight(height),
                    creation_tx_index: tx_index as u64,
                    creation_output_index: i as u64,
                };
                batch.put_cf(&cf_stake, out_id.0.as_bytes(), encode_stake_record(&record));
                created_stake_output_ids.push(out_id);
            }
        }

        let maturity_height = height + maturity_delay;
        let cf_delayed = self.cf(CF_DELAYED_OUTPUTS)?;
        let mut delayed_output_ids = Vec::new();
        if !block.miner_payouts.is_empty() {
            let mut existing_list = self.read_delayed_list(&cf_delayed, maturity_height)?;
            for (i, payout) in block.miner_payouts.iter().enumerate() {
                let out_id = block.miner_payout_id(i);
                existing_list.push(DelayedEntry(out_id, payout.clone()));
                delayed_output_ids.push(out_id);
            }
            batch.put_cf(&cf_delayed, maturity_height.to_le_bytes(), encode_seq_to_vec(&existing_list));
        }

        let matured_this_height = self.read_delayed_list(&cf_delayed, height)?;
        if !matured_this_height.is_empty() {
            batch.delete_cf(&cf_delayed, height.to_le_bytes());
            for entry in &matured_this_height {
                batch.put_cf(&cf_coin, entry.0 .0.as_bytes(), entry.1.encode_to_vec());
            }
        }

        let cf_block_index = self.cf(CF_BLOCK_INDEX)?;
        batch.put_cf(&cf_block_index, block_key(&id), block.canonical_bytes());
        let index_entry = BlockIndexEntry { height: BlockHeight(height), target, accumulated_work: work.clone() };
        batch.put_cf(&cf_block_index, index_key(&id), encode_block_index_entry(&index_entry));

        let cf_height_index = self.cf(CF_HEIGHT_INDEX)?;
        batch.put_cf(&cf_height_index, height.to_le_bytes(), id.encode_to_vec());

        let cf_meta = self.cf(CF_META)?;
        let tip = TipInfo { block_id: id, height: BlockHeight(height), accumulated_work: work };
        batch.put_cf(&cf_meta, META_KEY_TIP, encode_tip(&tip));

        let undo = UndoRecord {
            parent_id: block.header.parent_id,
            consumed_coin_outputs,
            consumed_stake_outputs,
            created_coin_output_ids,
            created_stake_output_ids,
            delayed_output_ids,
            delayed_maturity_height: maturity_height,
            matured_this_height,
        };
        let cf_undo = self.cf(CF_UNDO)?;
        batch.put_cf(&cf_undo, block_key(&id), undo.encode_to_vec());

        self.db.write(batch).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    fn revert_tip(&mut self) -> Result<Block, StorageError> {
        let tip = self.tip()?.ok_or_else(|| StorageError::Corruption("revert_tip: store has no tip".into()))?;
        let block = self.block(&tip.block_id)?.ok_or_else(|| StorageError::Corruption("revert_tip: tip block missing".into()))?;

        let cf_undo = self.cf(CF_UNDO)?;
        let undo_bytes = self
            .db
            .get_cf(&cf_undo, block_key(&tip.block_id))
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .ok_or_else(|| StorageError::Corruption("revert_tip: no undo record for tip".into()))?;
        let undo: UndoRecord = decode_exact("UndoRecord", &undo_bytes)?;

        let mut batch = WriteBatch::default();
        let cf_coin = self.cf(CF_COIN_OUTPUTS)?;
        let cf_stake = self.cf(CF_BLOCK_STAKE_OUTPUTS)?;
        let cf_delayed = self.cf(CF_DELAYED_OUTPUTS)?;
        let cf_block_index = self.cf(CF_BLOCK_INDEX)?;
        let cf_height_index = self.cf(CF_HEIGHT_INDEX)?;
        let cf_meta = self.cf(CF_META)?;

        for entry in &undo.consumed_coin_outputs {
            batch.put_cf(&cf_coin, entry.0 .0.as_bytes(), entry.1.encode_to_vec());
        }
        for (id, record) in &undo.consumed_stake_outputs {
            batch.put_cf(&cf_stake, id.0.as_bytes(), encode_stake_record(record));
        }
        for id in &undo.created_coin_output_ids {
            batch.delete_cf(&cf_coin, id.0.as_bytes());
        }
        for id in &undo.created_stake_output_ids {
            batch.delete_cf(&cf_stake, id.0.as_bytes());
        }
        if !undo.delayed_output_ids.is_empty() {
            let mut list = self.read_delayed_list(&cf_delayed, undo.delayed_maturity_height)?;
            list.retain(|e| !undo.delayed_output_ids.contains(&e.0));
            if list.is_empty() {
                batch.delete_cf(&cf_delayed, undo.delayed_maturity_height.to_le_bytes());
            } else {
                batch.put_cf(&cf_delayed, undo.delayed_maturity_height.to_le_bytes(), encode_seq_to_vec(&list));
            }
        }
        if !undo.matured_this_height.is_empty() {
            for entry in &undo.matured_this_height {
                batch.delete_cf(&cf_coin, entry.0 .0.as_bytes());
            }
            batch.put_cf(&cf_delayed, tip.height.0.to_le_bytes(), encode_seq_to_vec(&undo.matured_this_height));
        }

        batch.delete_cf(&cf_block_index, block_key(&tip.block_id));
        batch.delete_cf(&cf_block_index, index_key(&tip.block_id));
        batch.delete_cf(&cf_height_index, tip.height.0.to_le_bytes());
        batch.delete_cf(&cf_undo, block_key(&tip.block_id));

        match self.block_index(&undo.parent_id)? {
            Some(parent_idx) => {
                let parent_tip = TipInfo { block_id: undo.parent_id, height: parent_idx.height, accumulated_work: parent_idx.accumulated_work };
                batch.put_cf(&cf_meta, META_KEY_TIP, encode_tip(&parent_tip));
            }
            None => batch.delete_cf(&cf_meta, META_KEY_TIP),
        }

        self.db.write(batch).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(block)
    }
}

impl RocksDbStateStore {
    fn read_delayed_list(&self, cf: &Arc<BoundColumnFamily<'_>>, height: u64) -> Result<Vec<DelayedEntry>, StorageError> {
        match self.db.get_cf(cf, height.to_le_bytes()).map_err(|e| StorageError::Backend(e.to_string()))? {
            None => Ok(Vec::new()),
            Some(bytes) => Ok(decode_exact::<Vec<DelayedEntry>>("delayed outputs", &bytes)?),
        }
    }
}

fn encode_seq_to_vec(items: &[DelayedEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_seq(&mut out, items);
    out
}

fn block_key(id: &BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(b'b');
    key.extend_from_slice(id.0.as_bytes());
    key
}

fn index_key(id: &BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(b'i');
    key.extend_from_slice(id.0.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::types::block::{Header, PobsProof};
    use crate::types::currency::Currency;
    use crate::types::hash::Hash;
    use crate::types::transaction::Transaction;
    use crate::types::unlock::{UnlockCondition, UnlockConditionType, UnlockHash};
    use tempfile::TempDir;

    fn header(parent: BlockId, height: u64, timestamp: u64) -> Header {
        let (_sk, pk) = generate_keypair([height as u8 + 1; 32]);
        Header {
            parent_id: parent,
            height,
            timestamp,
            pobs: PobsProof {
                block_stake_output_id: BlockStakeOutputId(Hash([9u8; 32])),
                creation_block_height: 0,
                creation_tx_index: 0,
                creation_output_index: 0,
                public_key: pk,
                signature: crate::crypto::Signature([0u8; 64]),
            },
        }
    }

    fn open_tmp() -> (TempDir, RocksDbStateStore) {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig { path: tmp.path().to_string_lossy().to_string(), create_if_missing: true };
        let store = RocksDbStateStore::open(&cfg).expect("open rocksdb");
        (tmp, store)
    }

    #[test]
    fn genesis_roundtrips_through_rocksdb() {
        let (_tmp, mut store) = open_tmp();
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        store.apply_block(&genesis, Target::MAX, AccumulatedWork::zero().add_block(Target::MAX), 10).unwrap();

        let fetched = store.block(&genesis.id()).unwrap().expect("genesis present");
        assert_eq!(fetched.id(), genesis.id());
        assert_eq!(store.tip().unwrap().unwrap().block_id, genesis.id());
    }

    #[test]
    fn reopening_the_same_path_preserves_state() {
        let tmp = TempDir::new().unwrap();
        let cfg = RocksDbConfig { path: tmp.path().to_string_lossy().to_string(), create_if_missing: true };
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        {
            let mut store = RocksDbStateStore::open(&cfg).unwrap();
            store.apply_block(&genesis, Target::MAX, AccumulatedWork::zero().add_block(Target::MAX), 10).unwrap();
        }
        let store = RocksDbStateStore::open(&cfg).unwrap();
        assert_eq!(store.tip().unwrap().unwrap().block_id, genesis.id());
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let (_tmp, store) = open_tmp();
        let cf = store.cf(CF_META).unwrap();
        store.db.put_cf(&cf, META_KEY_SCHEMA_VERSION, 999u32.to_le_bytes()).unwrap();
        drop(store);
    }

    #[test]
    fn spend_then_revert_restores_the_coin_output() {
        let (_tmp, mut store) = open_tmp();
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        store.apply_block(&genesis, Target::MAX, AccumulatedWork::zero(), 10).unwrap();

        let condition = UnlockCondition::UnlockHash(UnlockHash::new(UnlockConditionType::UnlockHash, Hash([1u8; 32])));
        let funding_tx = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![],
            coin_outputs: vec![CoinOutput { value: Currency::from_u64(10), condition }],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![],
            arbitrary_data: vec![],
        };
        let funded_id = funding_tx.coin_output_id(0);
        let b1 = Block { header: header(genesis.id(), 1, 10), miner_payouts: vec![], transactions: vec![funding_tx] };
        store.apply_block(&b1, Target::MAX, AccumulatedWork::zero(), 10).unwrap();
        assert!(store.coin_output(&funded_id).unwrap().is_some());

        store.revert_tip().unwrap();
        assert!(store.coin_output(&funded_id).unwrap().is_none());
        assert_eq!(store.tip().unwrap().unwrap().block_id, genesis.id());
    }
}
