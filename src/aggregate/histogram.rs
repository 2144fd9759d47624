use serde::Serialize;

use crate::decode::{self, SHANNONS_PER_CKB};
use crate::formatters;
use crate::models::RawChannel;

/// Decade exponents of the capacity buckets. The first bucket starts at zero.
const FIRST_EXPONENT: u32 = 1;
const LAST_EXPONENT: u32 = 8;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    /// `"10^e"`
    pub label: String,
    pub exponent: u32,
    /// Inclusive lower bound in CKB.
    pub min_ckb: u64,
    /// Exclusive upper bound in CKB.
    pub max_ckb: u64,
    pub range: String,
    pub count: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CapacityHistogram {
    pub buckets: Vec<HistogramBucket>,
    /// Channels at or above the last bucket's upper bound.
    pub overflow: usize,
    /// Channels whose capacity could not be decoded.
    pub undecodable: usize,
}

impl CapacityHistogram {
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum::<usize>() + self.overflow
    }
}

fn empty_buckets() -> Vec<HistogramBucket> {
    (FIRST_EXPONENT..=LAST_EXPONENT)
        .map(|exponent| {
            let min_ckb = if exponent == FIRST_EXPONENT {
                0
            } else {
                10u64.pow(exponent)
            };
            let max_ckb = 10u64.pow(exponent + 1);
            HistogramBucket {
                label: format!("10^{}", exponent),
                exponent,
                min_ckb,
                max_ckb,
                range: format!(
                    "{}-{}",
                    formatters::format_compact(min_ckb as f64, 0),
                    formatters::format_compact(max_ckb as f64, 0)
                ),
                count: 0,
            }
        })
        .collect()
}

/// Bucket index for a Shannon amount, compared on integers so boundaries are exact.
fn bucket_index(shannon: u128, buckets: &[HistogramBucket]) -> Option<usize> {
    buckets.iter().position(|b| {
        let min = b.min_ckb as u128 * SHANNONS_PER_CKB;
        let max = b.max_ckb as u128 * SHANNONS_PER_CKB;
        shannon >= min && shannon < max
    })
}

/// Counts capacities (in Shannon) into decade buckets.
pub fn histogram_from_shannon(capacities: impl IntoIterator<Item = u128>) -> CapacityHistogram {
    let mut buckets = empty_buckets();
    let mut overflow = 0;
    for shannon in capacities {
        match bucket_index(shannon, &buckets) {
            Some(i) => buckets[i].count += 1,
            None => {
                log::warn!(
                    "Channel capacity {} CKB is beyond the largest bucket",
                    decode::shannon_to_ckb(shannon)
                );
                overflow += 1;
            }
        }
    }
    CapacityHistogram {
        buckets,
        overflow,
        undecodable: 0,
    }
}

/// Counts channel capacities into decade buckets. Undecodable capacities are
/// reported separately and are not part of `total()`.
pub fn capacity_histogram(channels: &[RawChannel]) -> CapacityHistogram {
    let mut undecodable = 0;
    let capacities: Vec<u128> = channels
        .iter()
        .filter_map(|c| match c.capacity_shannon() {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!(
                    "Skipping capacity of channel {} in histogram: {}",
                    c.channel_outpoint,
                    e
                );
                undecodable += 1;
                None
            }
        })
        .collect();
    let mut histogram = histogram_from_shannon(capacities);
    histogram.undecodable = undecodable;
    histogram
}
