use log::debug;

use crate::codec::{self};
use crate::error::{EstimatorError, Result};

/// Per-category (fee-rate or priority) bucketed confirmation statistics.
///
/// Buckets are a sorted sequence of upper bounds on a continuous quantity
/// (`buckets[K-1]` acts as the sentinel top bucket); `record` classifies a
/// sample into its bucket and `update_moving_averages` folds the current
/// block's accumulators into decayed running averages. `estimate_median`
/// answers "what value do I need to confirm within `target` blocks with
/// probability `min_success`?".
///
/// TODO support replaying unconfirmed/evicted mempool samples through a
/// dedicated failure bucket; tracked separately in `estimator::track_tx`.
pub struct TxConfirmStat {
    /// Bucket upper bounds, strictly increasing; `buckets[K-1]` is the
    /// sentinel top bucket (values at or above it saturate into it).
    buckets: Vec<f64>,
    decay: f64,
    max_confirms: usize,
    label: String,

    /// `conf_avg[y][x]`: decayed count of txs in bucket `x` confirmed in
    /// <= `y + 1` blocks.
    conf_avg: Vec<Vec<f64>>,
    /// `tx_ct_avg[x]`: decayed count of txs sampled into bucket `x`.
    tx_ct_avg: Vec<f64>,
    /// `avg[x]`: decayed sum of sampled values (fee-rate or priority) in
    /// bucket `x`.
    avg: Vec<f64>,

    cur_block_conf: Vec<Vec<f64>>,
    cur_block_tx_ct: Vec<f64>,
    cur_block_val: Vec<f64>,
}

impl TxConfirmStat {
    /// Allocates all tables to zero. `buckets` must have at least 2 strictly
    /// increasing entries, `max_confirms` must be at least 1, and `decay`
    /// must lie strictly between 0 and 1 (these are programming errors, not
    /// runtime data conditions, so they're asserted rather than returned as
    /// an `EstimatorError`).
    pub fn initialize(buckets: &[f64], max_confirms: usize, decay: f64, label: &str) -> Self {
        assert!(buckets.len() >= 2, "need at least 2 buckets");
        assert!(max_confirms >= 1, "max_confirms must be >= 1");
        assert!(decay > 0.0 && decay < 1.0, "decay must lie in (0, 1)");
        assert!(
            buckets.windows(2).all(|w| w[0] < w[1]),
            "bucket upper bounds must be strictly increasing"
        );

        let k = buckets.len();
        TxConfirmStat {
            buckets: buckets.to_vec(),
            decay,
            max_confirms,
            label: label.to_owned(),
            conf_avg: vec![vec![0.0; k]; max_confirms],
            tx_ct_avg: vec![0.0; k],
            avg: vec![0.0; k],
            cur_block_conf: vec![vec![0.0; k]; max_confirms],
            cur_block_tx_ct: vec![0.0; k],
            cur_block_val: vec![0.0; k],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_confirms(&self) -> usize {
        self.max_confirms
    }

    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Least `i` such that `v < buckets[i]`; saturates into the top bucket
    /// for values at or beyond the largest real bound.
    fn bucket_index(&self, v: f64) -> usize {
        let i = self.buckets.partition_point(|&bound| bound <= v);
        i.min(self.bucket_count() - 1)
    }

    /// Zeros every `cur_block_*` cell; dimensions are unchanged. Calling
    /// this twice in a row is idempotent.
    pub fn clear_current(&mut self) {
        for row in &mut self.cur_block_conf {
            row.iter_mut().for_each(|c| *c = 0.0);
        }
        self.cur_block_tx_ct.iter_mut().for_each(|c| *c = 0.0);
        self.cur_block_val.iter_mut().for_each(|c| *c = 0.0);
    }

    /// Records one confirmed sample. Silently ignored when
    /// `blocks_to_confirm < 1` (§7, `InvalidArgument`).
    pub fn record(&mut self, blocks_to_confirm: usize, v: f64) {
        if blocks_to_confirm < 1 {
            return;
        }
        let x = self.bucket_index(v);
        let from = blocks_to_confirm - 1;
        for y in from..self.max_confirms {
            self.cur_block_conf[y][x] += 1.0;
        }
        self.cur_block_tx_ct[x] += 1.0;
        self.cur_block_val[x] += v;
    }

    /// Folds this block's accumulators into the decayed moving averages.
    pub fn update_moving_averages(&mut self) {
        for x in 0..self.bucket_count() {
            for y in 0..self.max_confirms {
                self.conf_avg[y][x] = self.conf_avg[y][x] * self.decay + self.cur_block_conf[y][x];
            }
            self.tx_ct_avg[x] = self.tx_ct_avg[x] * self.decay + self.cur_block_tx_ct[x];
            self.avg[x] = self.avg[x] * self.decay + self.cur_block_val[x];
        }
    }

    /// Estimated median value for confirmation within `target` blocks, or
    /// `-1` if there isn't enough data. See §4.1 for the descent algorithm.
    pub fn estimate_median(&self, target: usize, sufficient_tx: f64, min_success: f64) -> f64 {
        if target == 0 || target > self.max_confirms {
            return -1.0;
        }
        let k = self.bucket_count();
        // EMA effective sample window: with decay d, the series has an
        // effective "lookback" of 1 / (1 - d) blocks' worth of samples.
        let threshold = sufficient_tx / (1.0 - self.decay);

        let mut n_conf = 0.0;
        let mut total = 0.0;
        let mut cur_high = k - 1;
        let mut found = false;
        let mut best_low = k - 1;
        let mut best_high = k - 1;

        for bucket in (0..k).rev() {
            let cur_low = bucket;
            n_conf += self.conf_avg[target - 1][bucket];
            total += self.tx_ct_avg[bucket];
            if total >= threshold {
                let rate = n_conf / total;
                if rate < min_success {
                    break;
                }
                found = true;
                best_low = cur_low;
                best_high = cur_high;
                n_conf = 0.0;
                total = 0.0;
                cur_high = bucket.saturating_sub(1);
            }
        }

        if !found {
            return -1.0;
        }

        let mut tx_sum: f64 = self.tx_ct_avg[best_low..=best_high].iter().sum();
        if tx_sum <= 0.0 {
            return -1.0;
        }
        tx_sum /= 2.0;
        for j in best_low..=best_high {
            if self.tx_ct_avg[j] >= tx_sum {
                return self.avg[j] / self.tx_ct_avg[j];
            }
            tx_sum -= self.tx_ct_avg[j];
        }
        -1.0
    }

    pub fn serialize<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        codec::write_f64(w, self.decay)?;
        codec::write_f64_slice(w, &self.buckets)?;
        codec::write_f64_slice(w, &self.avg)?;
        codec::write_f64_slice(w, &self.tx_ct_avg)?;
        codec::write_f64_rows(w, &self.conf_avg)?;
        Ok(())
    }

    /// `legacy` selects the pre-100000 on-disk layout: an explicit
    /// `max_confirms: u64` up front, and `conf_avg` written as
    /// `max_confirms` consecutive rows with no outer length prefix.
    pub fn deserialize<R: std::io::Read>(
        r: &mut R,
        legacy: bool,
        label: &str,
    ) -> Result<TxConfirmStat> {
        let decay = codec::read_f64(r)?;
        if !(decay > 0.0 && decay < 1.0) {
            return Err(EstimatorError::CorruptEstimatesFile(format!(
                "{}: decay {} outside (0, 1)",
                label, decay
            )));
        }

        let legacy_max_confirms = if legacy {
            Some(codec::read_u64(r)?)
        } else {
            None
        };

        let buckets = codec::read_f64_vec(r, None)?;
        let k = buckets.len();
        if !(2..=1000).contains(&k) {
            return Err(EstimatorError::CorruptEstimatesFile(format!(
                "{}: bucket count {} outside [2, 1000]",
                label, k
            )));
        }

        let avg = codec::read_f64_vec(r, Some(k))?;
        let tx_ct_avg = codec::read_f64_vec(r, Some(k))?;

        let conf_avg = if let Some(max_confirms) = legacy_max_confirms {
            codec::read_f64_rows_flat(r, max_confirms as usize, k)?
        } else {
            codec::read_f64_rows(r, k)?
        };
        let max_confirms = conf_avg.len();
        if !(1..=1008).contains(&max_confirms) {
            return Err(EstimatorError::CorruptEstimatesFile(format!(
                "{}: max_confirms {} outside [1, 1008]",
                label, max_confirms
            )));
        }

        Ok(TxConfirmStat {
            buckets,
            decay,
            max_confirms,
            label: label.to_owned(),
            conf_avg,
            tx_ct_avg,
            avg,
            cur_block_conf: vec![vec![0.0; k]; max_confirms],
            cur_block_tx_ct: vec![0.0; k],
            cur_block_val: vec![0.0; k],
        })
    }

    /// One diagnostic line per bucket: `label bucket_bound tx_ct_avg avg`.
    pub fn debug_print(&self) {
        for (x, bound) in self.buckets.iter().enumerate() {
            debug!(
                "{} bucket<={:.2} tx_ct_avg={:.4} avg={:.4}",
                self.label, bound, self.tx_ct_avg[x], self.avg[x]
            );
        }
    }
}
