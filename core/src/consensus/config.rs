//! Chain-wide consensus parameters.
//!
//! Every numeric rule the validator and difficulty-retarget logic apply
//! is a field here rather than a literal buried in the algorithm, so a
//! network can be reconfigured (testnet vs. mainnet vs. a local devnet)
//! without touching consensus code.

use crate::types::currency::Currency;
use crate::types::hash::Target;
use crate::types::version::TransactionVersion;

/// Consensus configuration parameters.
///
/// Mirrors the teacher's [`crate::consensus::config`]'s split of
/// protocol-level knobs from implementation-level limits, expanded to
/// the full set of constants a proof-of-block-stake chain needs.
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Target average seconds between blocks.
    pub target_block_time_secs: u64,

    /// Number of past blocks the difficulty retarget window covers.
    pub target_window_size: u64,

    /// Clamp on how much the target may change in one retarget: the new
    /// target is restricted to `[parent_target / max_adjustment_factor,
    /// parent_target * max_adjustment_factor]`.
    pub max_adjustment_factor: u64,

    /// Number of past block ids mixed into the stake modifier.
    pub stake_modifier_window: u64,

    /// Number of confirmations a delayed output must accumulate before it
    /// is spendable. Applies only to miner payouts (block subsidy and
    /// fees); ordinary transaction outputs mature immediately, and PoBS
    /// stake-output eligibility is governed solely by
    /// `blockstake_aging_secs`, not this field.
    pub maturity_delay: u64,

    /// How far into the future (relative to the local clock) a block's
    /// timestamp may be and still be accepted immediately; blocks beyond
    /// this are buffered rather than rejected outright.
    pub future_threshold_secs: u64,

    /// A second, larger future-timestamp bound: a block whose timestamp
    /// is beyond this is rejected outright rather than buffered, since
    /// no honest clock skew explains it. Must be `>=
    /// future_threshold_secs`.
    pub extreme_future_threshold_secs: u64,

    /// Minimum age, in seconds, a block-stake output must have (measured
    /// from the timestamp of the block that created it to the timestamp
    /// of the block spending it as a PoBS stake source) before it may be
    /// used to solve the lottery. This is the sole eligibility rule for
    /// PoBS stake sources; `maturity_delay` plays no part in it. The
    /// output spent at input 0 of transaction 0 of a block — the
    /// creator re-staking its own block-stake output in the same block
    /// it used it to solve the lottery — is exempt, since otherwise no
    /// block-stake output could ever be reused.
    pub blockstake_aging_secs: u64,

    /// Number of preceding blocks' timestamps the median-timestamp rule
    /// considers when rejecting a block that is not newer than its
    /// recent history.
    pub median_timestamp_window: u64,

    /// Upper bound on a block's serialized size.
    pub block_size_limit_bytes: u64,

    /// Upper bound on a transaction's `arbitrary_data` payload.
    pub arbitrary_data_size_limit_bytes: u64,

    /// Block subsidy paid to the block creator, before transaction fees.
    pub block_creation_reward: Currency,

    /// Height at which [`crate::types::unlock::UnlockConditionType::AtomicSwapLegacy`]
    /// conditions stop being accepted in new transactions. Existing
    /// outputs locked under the condition remain spendable; see `DESIGN.md`
    /// for why this is a configuration input rather than a hardcoded
    /// constant.
    pub atomic_swap_legacy_cutover_height: u64,

    /// Soft cap on the number of transactions the creator packs into one
    /// proposed block.
    pub max_block_transactions: usize,

    /// Whether a block with zero transactions is accepted. A PoBS chain
    /// produces blocks on a timer regardless of mempool contents, so
    /// this defaults to `true`; set to `false` only for networks that
    /// want to treat an empty block as wasted stake.
    pub allow_empty_blocks: bool,

    /// Difficulty target assigned to the genesis block, before any
    /// retarget has had a chance to run.
    pub genesis_target: Target,

    /// Minimum `miner_fees` total a transaction must carry to be
    /// accepted into a block.
    pub min_miner_fee: Currency,

    /// Non-baseline transaction versions this node accepts, in addition
    /// to [`TransactionVersion::BASELINE`]. Populated from registered
    /// plugins' [`crate::consensus::plugin::ConsensusPlugin::supported_transaction_versions`]
    /// at engine construction time (§4.4: "Plugins may veto admission of
    /// transactions of unknown versions" — the inverse formulation: a
    /// version not on this list, and not baseline, is always vetoed).
    pub accepted_transaction_versions: Vec<TransactionVersion>,

    /// Maximum number of orphan blocks buffered waiting on a parent
    /// before the oldest are evicted (§4.7: "until a configurable depth
    /// limit is exceeded"). Bounds memory consumed by a peer flooding
    /// disconnected blocks.
    pub max_orphan_pool_size: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            target_block_time_secs: 120,
            target_window_size: 1_000,
            max_adjustment_factor: 4,
            stake_modifier_window: 20,
            maturity_delay: 144,
            future_threshold_secs: 3 * 60 * 60,
            extreme_future_threshold_secs: 5 * 60 * 60,
            blockstake_aging_secs: 1 << 17,
            median_timestamp_window: 11,
            block_size_limit_bytes: 2_000_000,
            arbitrary_data_size_limit_bytes: 83,
            block_creation_reward: Currency::from_u64(10),
            atomic_swap_legacy_cutover_height: 0,
            max_block_transactions: 10_000,
            allow_empty_blocks: true,
            genesis_target: Target::MAX,
            min_miner_fee: Currency::zero(),
            accepted_transaction_versions: Vec::new(),
            max_orphan_pool_size: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_retarget_bounds() {
        let cfg = ConsensusConfig::default();
        assert!(cfg.max_adjustment_factor >= 1);
        assert!(cfg.target_window_size > 0);
    }

    #[test]
    fn extreme_future_threshold_is_not_tighter_than_future_threshold() {
        let cfg = ConsensusConfig::default();
        assert!(cfg.extreme_future_threshold_secs >= cfg.future_threshold_secs);
    }
}
