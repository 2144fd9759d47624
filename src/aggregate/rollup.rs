use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::decode;
use crate::formatters::{self, decode_or_zero, or_unknown};
use crate::models::{RawChannel, RawNode};

/// Channel totals attributed to one node.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeRollup {
    pub channel_count: u64,
    pub capacity_shannon: u128,
}

/// Splits every channel's capacity evenly between its endpoints. An odd Shannon goes
/// to `node1`, so the attributed total always equals the channel total. A node total
/// that would not fit in a `u128` is capped at `u128::MAX`.
pub fn node_rollups(channels: &[RawChannel]) -> HashMap<String, NodeRollup> {
    let mut rollups: HashMap<String, NodeRollup> = HashMap::new();
    for channel in channels {
        let capacity = decode_or_zero("channel capacity", channel.capacity_shannon());
        let half = capacity / 2;
        let shares = [
            (&channel.node1, half + capacity % 2),
            (&channel.node2, half),
        ];
        for (node_id, share) in shares {
            let entry = rollups.entry(node_id.clone()).or_default();
            entry.channel_count += 1;
            entry.capacity_shannon = entry
                .capacity_shannon
                .checked_add(share)
                .unwrap_or_else(|| {
                    log::warn!("Capacity of node {} exceeds u128, capping", node_id);
                    u128::MAX
                });
        }
    }
    rollups
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RankedNode {
    pub node_id: String,
    pub name: String,
    pub country: String,
    pub channel_count: u64,
    pub capacity_ckb: f64,
    pub capacity: String,
}

/// Joins rollups with the node list. Rollup entries for ids that are not in `nodes`
/// are dropped; nodes without channels get zero totals.
pub fn rank_nodes(nodes: &[RawNode], rollups: &HashMap<String, NodeRollup>) -> Vec<RankedNode> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
    let dangling = rollups.keys().filter(|id| !known.contains(id.as_str())).count();
    if dangling > 0 {
        log::warn!(
            "Ignoring {} channel endpoints that reference unknown nodes",
            dangling
        );
    }

    nodes
        .iter()
        .map(|node| {
            let rollup = rollups.get(&node.node_id).copied().unwrap_or_default();
            RankedNode {
                node_id: node.node_id.clone(),
                name: or_unknown(node.node_name.as_deref()),
                country: or_unknown(node.country.as_deref()),
                channel_count: rollup.channel_count,
                capacity_ckb: decode::shannon_to_ckb(rollup.capacity_shannon),
                capacity: formatters::format_ckb(rollup.capacity_shannon),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{SHANNONS_PER_CKB, u128_to_le_hex};

    fn channel(node1: &str, node2: &str, shannon: u128) -> RawChannel {
        RawChannel {
            channel_outpoint: format!("{}-{}", node1, node2),
            node1: node1.into(),
            node2: node2.into(),
            capacity: u128_to_le_hex(shannon),
            created_timestamp: "0x0".into(),
            last_commit_time: None,
            state: None,
            udt_name: None,
        }
    }

    fn node(id: &str, name: Option<&str>) -> RawNode {
        RawNode {
            node_id: id.into(),
            node_name: name.map(str::to_string),
            addresses: vec![],
            announce_timestamp: 0,
            auto_accept_min_ckb_funding_amount: 0,
            country: None,
            city: None,
            region: None,
            loc: None,
            channel_count: None,
        }
    }

    #[test]
    fn splits_capacity_between_endpoints() {
        let rollups = node_rollups(&[
            channel("a", "b", 200 * SHANNONS_PER_CKB),
            channel("a", "c", 100 * SHANNONS_PER_CKB),
        ]);
        assert_eq!(rollups["a"].channel_count, 2);
        assert_eq!(rollups["a"].capacity_shannon, 150 * SHANNONS_PER_CKB);
        assert_eq!(rollups["b"].capacity_shannon, 100 * SHANNONS_PER_CKB);
        assert_eq!(rollups["c"].channel_count, 1);
    }

    #[test]
    fn attributed_total_equals_channel_total() {
        let channels = vec![
            channel("a", "b", 7),
            channel("b", "c", 1_000_000_001),
            channel("c", "a", 3),
            channel("a", "b", 7),
        ];
        let expected: u128 = channels
            .iter()
            .map(|c| c.capacity_shannon().unwrap())
            .sum();
        let attributed: u128 = node_rollups(&channels)
            .values()
            .map(|r| r.capacity_shannon)
            .sum();
        assert_eq!(attributed, expected);
    }

    #[test]
    fn self_loops_accumulate() {
        let rollups = node_rollups(&[channel("a", "a", 10)]);
        assert_eq!(rollups.len(), 1);
        assert_eq!(rollups["a"].channel_count, 2);
        assert_eq!(rollups["a"].capacity_shannon, 10);
    }

    #[test]
    fn huge_capacities_cap_instead_of_wrapping() {
        let rollups = node_rollups(&[channel("a", "b", u128::MAX), channel("a", "b", u128::MAX)]);
        assert_eq!(rollups["a"].channel_count, 2);
        assert_eq!(rollups["a"].capacity_shannon, u128::MAX);
        assert_eq!(rollups["b"].capacity_shannon, u128::MAX - 1);
    }

    #[test]
    fn ranking_drops_dangling_endpoints() {
        let rollups = node_rollups(&[channel("a", "ghost", 400 * SHANNONS_PER_CKB)]);
        let ranked = rank_nodes(&[node("a", Some("alpha")), node("b", None)], &rollups);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "alpha");
        assert_eq!(ranked[0].capacity, "200.0 CKB");
        assert_eq!(ranked[1].name, "Unknown");
        assert_eq!(ranked[1].channel_count, 0);
        assert!(ranked.iter().all(|r| r.node_id != "ghost"));
    }
}
