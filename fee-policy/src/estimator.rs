use std::collections::HashMap;

use log::debug;

use crate::codec;
use crate::entry::{ConfirmableEntry, EntryId};
use crate::error::{EstimatorError, Result};
use crate::fee_rate::FeeRate;
use crate::tx_confirm_stat::TxConfirmStat;

/// Longest confirmation horizon the estimator tracks. A request for
/// `estimate_fee`/`estimate_priority` beyond this many blocks is answered
/// without consulting the buckets at all.
pub const MAX_BLOCK_CONFIRMS: usize = 25;

/// Per-block decay applied to every moving average; keeps recent blocks
/// weighted more heavily than old ones without discarding history outright.
pub const DEFAULT_DECAY: f64 = 0.998;

/// A confirmation-rate window below this is not considered reliable enough
/// to answer a request.
pub const MIN_SUCCESS_PCT: f64 = 0.85;

/// Minimum decayed tx count (per effective EMA window) in the fee-rate
/// buckets under consideration before `estimate_median` will trust them.
pub const SUFFICIENT_FEETXS: f64 = 1.0;

/// Same threshold for the priority buckets; priority-qualified transactions
/// are rarer, hence the lower bar.
pub const SUFFICIENT_PRITXS: f64 = 0.1;

/// Priority below which a transaction is classified "low priority" when
/// deciding which statistic a confirmed sample belongs in.
pub const MIN_PRIORITY_VAL: f64 = 1e8;

/// On-disk format version this build writes, and the minimum version it
/// still understands how to read (anything below 100000 is the legacy
/// layout).
const VERSION_WRITTEN: i32 = 149_900;
const MODERN_VERSION_FLOOR: i32 = 100_000;

fn default_fee_buckets() -> Vec<f64> {
    // 0 (sentinel low bucket), 1000..1e6 spaced by a factor of 10^(1/12),
    // then 1e16 as the sentinel top bucket.
    let mut buckets = vec![0.0];
    let ratio = 10f64.powf(1.0 / 12.0);
    let mut b = 1000.0;
    for _ in 0..37 {
        buckets.push(b);
        b *= ratio;
    }
    buckets.push(1e16);
    buckets
}

fn default_priority_buckets() -> Vec<f64> {
    // 1e5..1e16 spaced by a factor of 10, then 1e99 as the sentinel top
    // bucket.
    let mut buckets: Vec<f64> = (5..=16).map(|exp| 10f64.powi(exp)).collect();
    buckets.push(1e99);
    buckets
}

/// Fee classification used to route a confirmed transaction's sample.
enum FeeCategory {
    Zero,
    Low,
    High,
}

fn classify_fee(fee: u64, fee_rate: FeeRate, min_relay_fee: FeeRate) -> FeeCategory {
    if fee == 0 {
        FeeCategory::Zero
    } else if fee_rate <= min_relay_fee {
        FeeCategory::Low
    } else {
        FeeCategory::High
    }
}

/// Mempool-residency bookkeeping, supplementary to the confirmation-time
/// sampling in `process_transaction`/`process_block`. Neither
/// `record`/`estimate_median` nor the routing rule above consult this map;
/// it exists so a caller can ask "is this transaction still one we're
/// watching" and so a future eviction-aware sampling pass has the data it
/// needs without re-deriving it from the entry. TxConfirmStat's model (§4.1)
/// has no path for recording "never confirmed" samples, so `drop_tx`
/// currently just stops tracking (it does not feed anything back into the
/// statistics).
struct TrackedTx {
    entry_height: u64,
}

/// Fee-rate and priority confirmation-time estimator.
///
/// Not thread-safe: callers serialize their own access, per design.
///
/// Call [`process_block`](Self::process_block) once per connected block with
/// the transactions it confirmed; [`estimate_fee`](Self::estimate_fee) and
/// [`estimate_priority`](Self::estimate_priority) then answer "what do I need
/// to confirm within N blocks?" from the accumulated statistics.
/// [`track_tx`](Self::track_tx)/[`drop_tx`](Self::drop_tx) are optional
/// mempool-residency bookkeeping alongside the confirmation path.
pub struct BlockPolicyEstimator {
    fee_stats: TxConfirmStat,
    pri_stats: TxConfirmStat,
    best_seen_height: u64,
    min_relay_fee: FeeRate,
    tracked: HashMap<EntryId, TrackedTx>,
}

impl BlockPolicyEstimator {
    pub fn new(min_relay_fee: FeeRate) -> Self {
        BlockPolicyEstimator {
            fee_stats: TxConfirmStat::initialize(
                &default_fee_buckets(),
                MAX_BLOCK_CONFIRMS,
                DEFAULT_DECAY,
                "FeeRate",
            ),
            pri_stats: TxConfirmStat::initialize(
                &default_priority_buckets(),
                MAX_BLOCK_CONFIRMS,
                DEFAULT_DECAY,
                "Priority",
            ),
            best_seen_height: 0,
            min_relay_fee,
            tracked: HashMap::new(),
        }
    }

    pub fn best_seen_height(&self) -> u64 {
        self.best_seen_height
    }

    /// Notes that `id` has entered the mempool at `height`. Purely
    /// informational bookkeeping; see [`TrackedTx`].
    pub fn track_tx(&mut self, id: EntryId, height: u64) {
        self.tracked.insert(id, TrackedTx { entry_height: height });
    }

    /// Stops tracking a transaction that left the mempool without
    /// confirming (conflicted, replaced, expired, evicted).
    pub fn drop_tx(&mut self, id: &EntryId) {
        self.tracked.remove(id);
    }

    /// Height at which `id` was last `track_tx`'d, if it's still tracked.
    pub fn tracked_since(&self, id: &EntryId) -> Option<u64> {
        self.tracked.get(id).map(|t| t.entry_height)
    }

    /// Samples one confirmed transaction into whichever statistic its fee
    /// and priority route it to. Ignored unless `entry.was_clear_at_entry()`
    /// (an entry with unconfirmed mempool ancestors would bias the sample).
    fn process_transaction(&mut self, block_height: u64, entry: &dyn ConfirmableEntry) {
        if !entry.was_clear_at_entry() {
            return;
        }
        if block_height <= entry.height() {
            // reorg anomaly: entry claims to have arrived at or after the
            // block confirming it.
            return;
        }
        let blocks_to_confirm = (block_height - entry.height()) as usize;

        let fee_rate = FeeRate::calculate(entry.fee(), entry.tx_size());
        let pri = entry.priority_at(block_height);

        let fee_category = classify_fee(entry.fee(), fee_rate, self.min_relay_fee);
        let pri_is_high = pri >= MIN_PRIORITY_VAL;

        match (fee_category, pri_is_high) {
            (FeeCategory::High, false) => {
                self.fee_stats.record(blocks_to_confirm, fee_rate.as_f64());
            }
            (FeeCategory::Zero, _) | (FeeCategory::Low, true) => {
                self.pri_stats.record(blocks_to_confirm, pri);
            }
            // (high, high) or (low, low): ambiguous attribution, dropped.
            _ => {}
        }
    }

    /// Feeds every transaction confirmed in the block at `height`, then
    /// folds the block's accumulators into the decayed moving averages and
    /// advances `best_seen_height`.
    ///
    /// A `height` that doesn't strictly exceed the last processed height is
    /// a side-chain or reorg replay of a block already accounted for, and is
    /// ignored entirely.
    pub fn process_block(&mut self, height: u64, entries: &[&dyn ConfirmableEntry]) {
        if height <= self.best_seen_height {
            debug!(
                "ignoring process_block at height {} <= best_seen_height {}",
                height, self.best_seen_height
            );
            return;
        }
        self.best_seen_height = height;

        self.fee_stats.clear_current();
        self.pri_stats.clear_current();
        for entry in entries {
            self.process_transaction(height, *entry);
        }
        self.fee_stats.update_moving_averages();
        self.pri_stats.update_moving_averages();
    }

    /// Estimated fee-rate needed to confirm within `confirm_target` blocks,
    /// or `FeeRate::ZERO` if there isn't enough data.
    pub fn estimate_fee(&self, confirm_target: usize) -> FeeRate {
        if confirm_target == 0 || confirm_target > self.fee_stats.max_confirms() {
            return FeeRate::ZERO;
        }
        let median = self
            .fee_stats
            .estimate_median(confirm_target, SUFFICIENT_FEETXS, MIN_SUCCESS_PCT);
        if median < 0.0 {
            FeeRate::ZERO
        } else {
            FeeRate::from_f64(median).unwrap_or(FeeRate::ZERO)
        }
    }

    /// Estimated priority needed to confirm within `confirm_target` blocks
    /// without paying a fee, or `-1.0` if there isn't enough data.
    pub fn estimate_priority(&self, confirm_target: usize) -> f64 {
        if confirm_target == 0 || confirm_target > self.pri_stats.max_confirms() {
            return -1.0;
        }
        self.pri_stats
            .estimate_median(confirm_target, SUFFICIENT_PRITXS, MIN_SUCCESS_PCT)
    }

    pub fn serialize<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        codec::write_i32(w, VERSION_WRITTEN)?;
        codec::write_i32(w, VERSION_WRITTEN)?;
        codec::write_i32(w, self.best_seen_height as i32)?;
        self.fee_stats.serialize(w)?;
        self.pri_stats.serialize(w)?;
        Ok(())
    }

    pub fn deserialize<R: std::io::Read>(
        r: &mut R,
        min_relay_fee: FeeRate,
    ) -> Result<BlockPolicyEstimator> {
        let version_required = codec::read_i32(r)?;
        let _version_written = codec::read_i32(r)?;
        if version_required > VERSION_WRITTEN {
            return Err(EstimatorError::CorruptEstimatesFile(format!(
                "fee estimates file requires version {} but this build understands up to {}",
                version_required, VERSION_WRITTEN
            )));
        }
        let legacy = version_required < MODERN_VERSION_FLOOR;
        let best_seen_height = codec::read_i32(r)?;
        if best_seen_height < 0 {
            return Err(EstimatorError::CorruptEstimatesFile(format!(
                "negative best_seen_height {}",
                best_seen_height
            )));
        }

        let fee_stats = TxConfirmStat::deserialize(r, legacy, "FeeRate")?;
        let pri_stats = TxConfirmStat::deserialize(r, legacy, "Priority")?;

        Ok(BlockPolicyEstimator {
            fee_stats,
            pri_stats,
            best_seen_height: best_seen_height as u64,
            min_relay_fee,
            tracked: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEntry {
        fee: u64,
        size: u64,
        priority: f64,
        height: u64,
        clear: bool,
    }

    impl ConfirmableEntry for StubEntry {
        fn fee(&self) -> u64 {
            self.fee
        }
        fn tx_size(&self) -> u64 {
            self.size
        }
        fn priority_at(&self, _height: u64) -> f64 {
            self.priority
        }
        fn height(&self) -> u64 {
            self.height
        }
        fn was_clear_at_entry(&self) -> bool {
            self.clear
        }
    }

    fn id(n: u8) -> EntryId {
        let mut out = [0u8; 32];
        out[0] = n;
        out
    }

    fn estimator() -> BlockPolicyEstimator {
        BlockPolicyEstimator::new(FeeRate::from_f64(1000.0).unwrap())
    }

    #[test]
    fn insufficient_data_returns_sentinels() {
        let est = estimator();
        assert_eq!(est.estimate_fee(6), FeeRate::ZERO);
        assert_eq!(est.estimate_priority(6), -1.0);
    }

    #[test]
    fn out_of_range_target_returns_sentinels() {
        let est = estimator();
        assert_eq!(est.estimate_fee(0), FeeRate::ZERO);
        assert_eq!(est.estimate_fee(MAX_BLOCK_CONFIRMS + 1), FeeRate::ZERO);
    }

    /// Scenario A: 30 blocks of a single high-fee, low-priority entry two
    /// blocks deep should converge `estimate_fee(3)` near the fee-rate paid.
    #[test]
    fn converges_on_a_steady_fee_rate() {
        // `estimate_median`'s sample-count threshold is
        // `sufficient_tx / (1 - decay)` = `1.0 / 0.002` = 500 (see
        // tx_confirm_stat.rs). A single tx per block never gets there (30
        // blocks of decayed EMA sums to ~29), so feed enough transactions
        // per block to cross it, the way the original functional test this
        // is grounded on does.
        let mut est = estimator();
        for height in 1000..1030u64 {
            let entries: Vec<StubEntry> = (0..20)
                .map(|_| StubEntry {
                    fee: 10_000,
                    size: 1000,
                    priority: 0.0,
                    height: height - 2,
                    clear: true,
                })
                .collect();
            let refs: Vec<&dyn ConfirmableEntry> =
                entries.iter().map(|e| e as &dyn ConfirmableEntry).collect();
            est.process_block(height, &refs);
        }
        let fee = est.estimate_fee(3);
        assert!(fee.as_f64() > 0.0);
        assert_eq!(est.estimate_fee(30), FeeRate::ZERO);
    }

    #[test]
    fn reorg_height_is_ignored() {
        let mut est = estimator();
        let entry = StubEntry {
            fee: 1000,
            size: 500,
            priority: 0.0,
            height: 990,
            clear: true,
        };
        est.process_block(1000, &[&entry]);
        assert_eq!(est.best_seen_height(), 1000);
        est.process_block(999, &[&entry]);
        assert_eq!(est.best_seen_height(), 1000);
        est.process_block(1000, &[&entry]);
        assert_eq!(est.best_seen_height(), 1000);
    }

    #[test]
    fn drop_tx_leaves_no_trace() {
        let mut est = estimator();
        let eid = id(9);
        est.track_tx(eid, 0);
        assert!(est.tracked.contains_key(&eid));
        est.drop_tx(&eid);
        assert!(!est.tracked.contains_key(&eid));
    }

    #[test]
    fn ambiguous_classification_is_dropped() {
        let mut est = estimator();
        // high fee, high priority: neither stat should gain a sample.
        let entry = StubEntry {
            fee: 10_000,
            size: 1000,
            priority: 1e12,
            height: 0,
            clear: true,
        };
        est.process_block(5, &[&entry]);
        assert_eq!(est.estimate_fee(5), FeeRate::ZERO);
        assert_eq!(est.estimate_priority(5), -1.0);
    }

    #[test]
    fn serialize_round_trip() {
        let mut est = estimator();
        for height in 1..=10u64 {
            let entry = StubEntry {
                fee: 0,
                size: 250,
                priority: 2e8,
                height: height - 1,
                clear: true,
            };
            est.process_block(height, &[&entry]);
        }
        let mut buf = Vec::new();
        est.serialize(&mut buf).unwrap();
        let mut cursor = &buf[..];
        let back =
            BlockPolicyEstimator::deserialize(&mut cursor, FeeRate::from_f64(1000.0).unwrap())
                .unwrap();
        assert_eq!(back.best_seen_height(), est.best_seen_height());
        assert_eq!(back.estimate_priority(3), est.estimate_priority(3));
    }
}
