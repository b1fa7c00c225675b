use std::cmp::Ordering;
use std::fmt;

/// Fee paid per kilobyte of transaction size, in the chain's smallest token
/// unit. Wraps `f64` rather than a fixed-point integer so it composes
/// directly with the estimator's decayed moving averages; `Ord` is provided
/// via `partial_cmp` since legitimate fee-rates are always finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FeeRate(f64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0.0);

    /// `None` for non-finite input; callers that compute a rate from
    /// `fee / size` with `size == 0` would otherwise produce `inf` or `NaN`.
    pub fn from_f64(v: f64) -> Option<FeeRate> {
        if v.is_finite() {
            Some(FeeRate(v))
        } else {
            None
        }
    }

    /// Fee-rate for `fee` (smallest token unit) paid by a `size`-byte
    /// transaction. Returns `ZERO` for a zero-size transaction rather than
    /// dividing by zero.
    pub fn calculate(fee: u64, size: u64) -> FeeRate {
        if size == 0 {
            return FeeRate::ZERO;
        }
        FeeRate((fee as f64 * 1000.0) / size as f64)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl Eq for FeeRate {}

impl Ord for FeeRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).expect("FeeRate is always finite")
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} shannon/kB", self.0)
    }
}
