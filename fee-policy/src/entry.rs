/// Opaque identifier used to track a transaction between mempool entry and
/// confirmation (or eviction). Callers typically use the transaction hash.
pub type EntryId = [u8; 32];

/// The estimator's view of a confirmed transaction. Real transaction and
/// mempool-entry types live outside this crate; anything that can answer
/// these five questions can be fed to [`crate::estimator::BlockPolicyEstimator`].
pub trait ConfirmableEntry {
    /// Absolute fee paid, in the smallest unit of the chain's native token.
    fn fee(&self) -> u64;

    /// Serialized transaction size in bytes, used to turn `fee` into a
    /// fee-rate.
    fn tx_size(&self) -> u64;

    /// Priority value as of `height`, for chains that size transactions into
    /// blocks partly by priority rather than fee-rate alone. Entries that
    /// never use the priority pathway can return `0.0`.
    fn priority_at(&self, height: u64) -> f64;

    /// Chain tip height at which this entry was first seen in the mempool.
    fn height(&self) -> u64;

    /// Whether this entry had no unconfirmed mempool ancestors at the time
    /// it entered the mempool. Required for unbiased sampling (an entry
    /// whose inputs were themselves unconfirmed inherits its ancestors'
    /// wait time, which would bias the bucket it's recorded into).
    fn was_clear_at_entry(&self) -> bool;
}
