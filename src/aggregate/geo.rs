use std::collections::BTreeMap;

use serde::Serialize;

use crate::formatters::or_unknown;
use crate::models::{GeoPoint, RawNode};

/// Parses `"lat,lng"`. Out-of-range or malformed coordinates yield `None`.
pub fn parse_location(loc: &str) -> Option<GeoPoint> {
    let (lat, lng) = loc.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(GeoPoint { lat, lng })
}

/// Nodes sharing one location.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GeoCluster {
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    pub country: String,
    pub node_count: usize,
    pub node_ids: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GeoSummary {
    pub clusters: Vec<GeoCluster>,
    /// Nodes left off the map for lack of usable coordinates.
    pub unlocated: usize,
}

// f64 is not Ord; the bit patterns of parsed finite values are a stable key.
type LocationKey = (u64, u64);

fn location_key(point: GeoPoint) -> LocationKey {
    // Fold -0.0 into 0.0 so both land in the same cluster.
    ((point.lat + 0.0).to_bits(), (point.lng + 0.0).to_bits())
}

/// Groups nodes into city-level clusters, largest first.
pub fn cluster_nodes(nodes: &[RawNode]) -> GeoSummary {
    let mut clusters: BTreeMap<LocationKey, GeoCluster> = BTreeMap::new();
    let mut unlocated = 0;

    for node in nodes {
        let Some(point) = node.loc.as_deref().and_then(parse_location) else {
            unlocated += 1;
            continue;
        };
        let cluster = clusters
            .entry(location_key(point))
            .or_insert_with(|| GeoCluster {
                lat: point.lat,
                lng: point.lng,
                city: or_unknown(node.city.as_deref()),
                country: or_unknown(node.country.as_deref()),
                node_count: 0,
                node_ids: Vec::new(),
            });
        cluster.node_count += 1;
        cluster.node_ids.push(node.node_id.clone());
    }

    if unlocated > 0 {
        log::debug!("{} nodes have no usable location", unlocated);
    }

    let mut clusters: Vec<GeoCluster> = clusters.into_values().collect();
    for cluster in &mut clusters {
        cluster.node_ids.sort();
    }
    clusters.sort_by(|a, b| {
        b.node_count
            .cmp(&a.node_count)
            .then_with(|| a.city.cmp(&b.city))
    });
    GeoSummary {
        clusters,
        unlocated,
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RegionCount {
    pub country: String,
    pub node_count: usize,
}

/// Node counts per country for tabular views. Every node is counted, located or not.
pub fn region_counts(nodes: &[RawNode]) -> Vec<RegionCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for node in nodes {
        *counts.entry(or_unknown(node.country.as_deref())).or_default() += 1;
    }
    let mut rows: Vec<RegionCount> = counts
        .into_iter()
        .map(|(country, node_count)| RegionCount {
            country,
            node_count,
        })
        .collect();
    rows.sort_by(|a, b| b.node_count.cmp(&a.node_count));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(id: &str, loc: Option<&str>, city: Option<&str>, country: Option<&str>) -> RawNode {
        RawNode {
            node_id: id.into(),
            node_name: None,
            addresses: vec![],
            announce_timestamp: 0,
            auto_accept_min_ckb_funding_amount: 0,
            country: country.map(str::to_string),
            city: city.map(str::to_string),
            region: None,
            loc: loc.map(str::to_string),
            channel_count: None,
        }
    }

    #[test]
    fn parses_coordinates() {
        assert_eq!(
            parse_location(" 22.28, 114.15 "),
            Some(GeoPoint {
                lat: 22.28,
                lng: 114.15
            })
        );
        assert_eq!(parse_location("91,0"), None);
        assert_eq!(parse_location("10,-181"), None);
        assert_eq!(parse_location("north,east"), None);
        assert_eq!(parse_location("10"), None);
        assert_eq!(parse_location("NaN,1"), None);
    }

    #[test]
    fn clusters_by_location() {
        let nodes = vec![
            located("b", Some("22.28,114.15"), Some("Hong Kong"), Some("HK")),
            located("a", Some("22.28,114.15"), Some("Hong Kong"), Some("HK")),
            located("c", Some("52.52,13.40"), None, Some("DE")),
            located("d", None, Some("Paris"), Some("FR")),
            located("e", Some("garbage"), None, None),
        ];
        let summary = cluster_nodes(&nodes);
        assert_eq!(summary.unlocated, 2);
        assert_eq!(summary.clusters.len(), 2);
        assert_eq!(summary.clusters[0].city, "Hong Kong");
        assert_eq!(summary.clusters[0].node_ids, vec!["a", "b"]);
        assert_eq!(summary.clusters[1].city, "Unknown");
        let clustered: usize = summary.clusters.iter().map(|c| c.node_count).sum();
        assert_eq!(clustered + summary.unlocated, nodes.len());
    }

    #[test]
    fn region_counts_keep_unlocated_nodes() {
        let nodes = vec![
            located("a", None, None, Some("HK")),
            located("b", Some("1,1"), None, Some("HK")),
            located("c", None, None, None),
        ];
        let rows = region_counts(&nodes);
        assert_eq!(
            rows,
            vec![
                RegionCount {
                    country: "HK".into(),
                    node_count: 2
                },
                RegionCount {
                    country: "Unknown".into(),
                    node_count: 1
                },
            ]
        );
    }
}
