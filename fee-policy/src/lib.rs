//! Fee-rate and priority confirmation-time estimation.
//!
//! [`BlockPolicyEstimator`] buckets confirmed transactions by fee-rate and
//! priority, decays the counts block over block, and answers "what fee-rate
//! (or priority) does a transaction need to confirm within N blocks with
//! probability P?" [`ConfirmableEntry`] is the minimal view of a transaction
//! this crate needs; concrete mempool/transaction types live elsewhere.

mod codec;
mod entry;
mod error;
mod estimator;
mod fee_rate;
mod tx_confirm_stat;

pub use entry::{ConfirmableEntry, EntryId};
pub use error::{EstimatorError, Result};
pub use estimator::{
    BlockPolicyEstimator, DEFAULT_DECAY, MAX_BLOCK_CONFIRMS, MIN_PRIORITY_VAL, MIN_SUCCESS_PCT,
    SUFFICIENT_FEETXS, SUFFICIENT_PRITXS,
};
pub use fee_rate::FeeRate;
