use std::collections::BTreeMap;

use serde::Serialize;

use crate::decode;
use crate::formatters::{self, decode_or_zero};
use crate::models::{ChannelState, RawChannel, RawKpi};

/// Summary statistics over channel capacities, all in Shannon.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityStats {
    pub total: u128,
    pub average: u128,
    pub median: u128,
    pub min: u128,
    pub max: u128,
}

/// Integer statistics. The total saturates; the median of an even-sized list is
/// the floored mean of the two middle values. An empty list yields zeros.
pub fn capacity_stats(mut values: Vec<u128>) -> CapacityStats {
    if values.is_empty() {
        return CapacityStats::default();
    }
    values.sort_unstable();
    let len = values.len();
    let total = values.iter().fold(0u128, |acc, v| acc.saturating_add(*v));
    let median = if len % 2 == 0 {
        let (low, high) = (values[len / 2 - 1], values[len / 2]);
        low / 2 + high / 2 + (low % 2 + high % 2) / 2
    } else {
        values[len / 2]
    };
    CapacityStats {
        total,
        average: total / len as u128,
        median,
        min: values[0],
        max: values[len - 1],
    }
}

/// Builds the KPI record locally from full node and channel lists, in the same
/// shape the API reports.
pub fn kpi_snapshot(node_count: usize, channels: &[RawChannel]) -> RawKpi {
    let capacities = channels
        .iter()
        .map(|c| decode_or_zero("channel capacity", c.capacity_shannon()))
        .collect();
    let stats = capacity_stats(capacities);
    let hex = |v: u128| format!("0x{:x}", v);
    RawKpi {
        total_capacity: hex(stats.total),
        average_capacity: hex(stats.average),
        median_capacity: hex(stats.median),
        min_capacity: hex(stats.min),
        max_capacity: hex(stats.max),
        total_nodes: node_count as u64,
        total_channels: channels.len() as u64,
    }
}

/// Channel count and capacity statistics for one asset.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssetStats {
    pub asset: String,
    pub channel_count: usize,
    pub capacity: CapacityStats,
    pub total_ckb: f64,
    pub total: String,
}

/// Groups channels by asset (`udt_name`, `"ckb"` when absent). Largest groups first,
/// ties by name.
pub fn asset_stats(channels: &[RawChannel]) -> Vec<AssetStats> {
    let mut groups: BTreeMap<&str, Vec<u128>> = BTreeMap::new();
    for channel in channels {
        groups
            .entry(channel.asset_name())
            .or_default()
            .push(decode_or_zero("channel capacity", channel.capacity_shannon()));
    }
    let mut rows: Vec<AssetStats> = groups
        .into_iter()
        .map(|(asset, capacities)| {
            let channel_count = capacities.len();
            let capacity = capacity_stats(capacities);
            AssetStats {
                asset: asset.to_string(),
                channel_count,
                capacity,
                total_ckb: decode::shannon_to_ckb(capacity.total),
                total: formatters::format_ckb(capacity.total),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.channel_count.cmp(&a.channel_count));
    rows
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StateCount {
    pub state: ChannelState,
    pub count: usize,
}

/// Channel counts per lifecycle state. Every state appears, channels without a
/// reported state are counted under `unknown`.
pub fn state_counts(channels: &[RawChannel]) -> (Vec<StateCount>, usize) {
    let mut counts: BTreeMap<ChannelState, usize> =
        ChannelState::ALL.iter().map(|s| (*s, 0)).collect();
    let mut unknown = 0;
    for channel in channels {
        match channel.state {
            Some(state) => *counts.entry(state).or_default() += 1,
            None => unknown += 1,
        }
    }
    let rows = counts
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();
    (rows, unknown)
}
