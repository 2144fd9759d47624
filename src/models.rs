use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::geo::GeoCluster;
use crate::aggregate::histogram::HistogramBucket;
use crate::aggregate::rollup::RankedNode;
use crate::aggregate::stats::AssetStats;
use crate::decode;
use crate::formatters::{self, decode_or_zero, or_unknown};

// Records as the remote API sends them, and the view models we hand to the UI.

/// Integers the backend sends as plain JSON numbers, and older deployments as `0x` hex.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrHex {
    Number(u64),
    Hex(String),
}

fn number_or_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrHex::deserialize(deserializer)? {
        NumberOrHex::Number(value) => Ok(value),
        NumberOrHex::Hex(hex) => decode::hex_to_u64(&hex).map_err(serde::de::Error::custom),
    }
}

/// A node as returned by the API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawNode {
    pub node_id: String,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Milliseconds since the epoch.
    #[serde(alias = "timestamp", deserialize_with = "number_or_hex")]
    pub announce_timestamp: u64,
    /// Shannon.
    #[serde(deserialize_with = "number_or_hex")]
    pub auto_accept_min_ckb_funding_amount: u64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// `"lat,lng"`
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub channel_count: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[serde(alias = "Open")]
    Open,
    #[serde(alias = "closed_waiting_onchain_settlement", alias = "Commitment")]
    Commitment,
    #[serde(
        alias = "closed_cooperative",
        alias = "closed_uncooperative",
        alias = "Closed"
    )]
    Closed,
}

impl ChannelState {
    pub const ALL: [ChannelState; 3] = [
        ChannelState::Open,
        ChannelState::Commitment,
        ChannelState::Closed,
    ];

    /// The backend's state names this state covers.
    pub fn backend_names(&self) -> &'static [&'static str] {
        match self {
            ChannelState::Open => &["open"],
            ChannelState::Commitment => &["closed_waiting_onchain_settlement"],
            ChannelState::Closed => &["closed_cooperative", "closed_uncooperative"],
        }
    }
}

/// A channel as returned by the API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawChannel {
    pub channel_outpoint: String,
    pub node1: String,
    pub node2: String,
    /// Shannon, little-endian u128 hex.
    pub capacity: String,
    /// Milliseconds, `0x` hex.
    pub created_timestamp: String,
    #[serde(default)]
    pub last_commit_time: Option<String>,
    #[serde(default)]
    pub state: Option<ChannelState>,
    #[serde(default)]
    pub udt_name: Option<String>,
}

/// Asset name for channels that carry no UDT.
pub const NATIVE_ASSET: &str = "ckb";

impl RawChannel {
    pub fn capacity_shannon(&self) -> Result<u128, decode::DecodeError> {
        decode::u128_le_to_decimal(&self.capacity)
    }

    /// The UDT name, or `"ckb"` when the channel is funded in CKB alone.
    pub fn asset_name(&self) -> &str {
        match self.udt_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => NATIVE_ASSET,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChannelTx {
    pub tx_hash: String,
    /// `0x` hex.
    pub block_number: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChannelStateInfo {
    pub state: ChannelState,
    #[serde(default)]
    pub txs: Vec<ChannelTx>,
}

/// Aggregate metrics as the API reports them. Capacities are `0x` hex Shannon.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RawKpi {
    pub total_capacity: String,
    pub average_capacity: String,
    pub median_capacity: String,
    pub min_capacity: String,
    pub max_capacity: String,
    pub total_nodes: u64,
    pub total_channels: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub series: Vec<TimeSeriesPoint>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    Capacity,
    Nodes,
    Channels,
}

impl SeriesMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesMetric::Capacity => "capacity",
            SeriesMetric::Nodes => "nodes",
            SeriesMetric::Channels => "channels",
        }
    }
}

/// A series ready for charting, with the change over the whole window.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub metric: SeriesMetric,
    pub points: Vec<TimeSeriesPoint>,
    pub latest: Option<f64>,
    /// Signed compact difference between the first and last point, e.g. `"+1.5K"`.
    pub change: Option<String>,
    pub change_percent: Option<f64>,
}

impl SeriesView {
    pub fn new(metric: SeriesMetric, points: Vec<TimeSeriesPoint>) -> Self {
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (Some(first.value), Some(last.value)),
            _ => (None, None),
        };
        let (change, change_percent) = match (first, last) {
            (Some(first), Some(last)) if points.len() > 1 => (
                Some(formatters::format_delta(last - first, 2)),
                formatters::percent_change(first, last),
            ),
            _ => (None, None),
        };
        SeriesView {
            metric,
            points,
            latest: last,
            change,
            change_percent,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NodePage {
    pub next_page: usize,
    pub nodes: Vec<RawNode>,
    pub total_count: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChannelPage {
    pub next_page: usize,
    pub channels: Vec<RawChannel>,
    pub total_count: usize,
}

/// Wrapper the API uses for single-node lookups.
#[derive(Deserialize, Debug, Clone)]
pub struct NodeEnvelope {
    pub node_info: Option<RawNode>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChannelEnvelope {
    pub channel_info: Option<RawChannel>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Node ready for display. Missing names and places read "Unknown".
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeView {
    pub node_id: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub region: String,
    pub location: Option<GeoPoint>,
    pub announced_at: String,
    pub auto_accept_min_ckb: String,
    pub addresses: Vec<String>,
    pub channel_count: Option<u64>,
}

impl From<&RawNode> for NodeView {
    fn from(node: &RawNode) -> Self {
        NodeView {
            node_id: node.node_id.clone(),
            name: or_unknown(node.node_name.as_deref()),
            city: or_unknown(node.city.as_deref()),
            country: or_unknown(node.country.as_deref()),
            region: or_unknown(node.region.as_deref()),
            location: node
                .loc
                .as_deref()
                .and_then(crate::aggregate::geo::parse_location),
            announced_at: formatters::format_timestamp(node.announce_timestamp),
            auto_accept_min_ckb: formatters::format_ckb(u128::from(
                node.auto_accept_min_ckb_funding_amount,
            )),
            addresses: node.addresses.clone(),
            channel_count: node.channel_count,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub channel_outpoint: String,
    pub node1: String,
    pub node2: String,
    pub capacity_ckb: f64,
    pub capacity: String,
    pub created_at: String,
    pub last_commit_at: Option<String>,
    pub state: Option<ChannelState>,
    pub asset: String,
}

impl From<&RawChannel> for ChannelView {
    fn from(channel: &RawChannel) -> Self {
        let created = decode_or_zero(
            "channel created timestamp",
            decode::hex_to_u64(&channel.created_timestamp),
        );
        ChannelView {
            channel_outpoint: channel.channel_outpoint.clone(),
            node1: channel.node1.clone(),
            node2: channel.node2.clone(),
            capacity_ckb: decode::shannon_to_ckb(decode_or_zero(
                "channel capacity",
                channel.capacity_shannon(),
            )),
            capacity: formatters::display_or_na(
                "channel capacity",
                channel.capacity_shannon(),
                formatters::format_ckb,
            ),
            created_at: formatters::format_timestamp(created),
            last_commit_at: channel.last_commit_time.as_deref().map(|raw| {
                formatters::display_or_na(
                    "channel last commit time",
                    decode::hex_to_u64(raw),
                    formatters::format_timestamp,
                )
            }),
            state: channel.state,
            asset: channel.asset_name().to_string(),
        }
    }
}

/// Headline numbers for the overview page.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct KpiView {
    pub total_capacity_ckb: f64,
    pub total_capacity: String,
    pub average_capacity: String,
    pub median_capacity: String,
    pub min_capacity: String,
    pub max_capacity: String,
    pub total_nodes: u64,
    pub total_channels: u64,
}

impl From<&RawKpi> for KpiView {
    fn from(kpi: &RawKpi) -> Self {
        let shown = |field: &str, raw: &str| {
            formatters::display_or_na(field, decode::hex_to_u128(raw), formatters::format_ckb)
        };
        KpiView {
            total_capacity_ckb: decode::shannon_to_ckb(decode_or_zero(
                "total capacity",
                decode::hex_to_u128(&kpi.total_capacity),
            )),
            total_capacity: shown("total capacity", &kpi.total_capacity),
            average_capacity: shown("average capacity", &kpi.average_capacity),
            median_capacity: shown("median capacity", &kpi.median_capacity),
            min_capacity: shown("min capacity", &kpi.min_capacity),
            max_capacity: shown("max capacity", &kpi.max_capacity),
            total_nodes: kpi.total_nodes,
            total_channels: kpi.total_channels,
        }
    }
}

/// One entry of a chart data set.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartItem {
    Bucket(HistogramBucket),
    Ranking(RankedNode),
    MapPoint(GeoCluster),
    Asset(AssetStats),
}

/// A page of already-sorted rows.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

/// Result of one independently fetched part of a page.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { data: T },
    Failed { message: String },
}

impl<T> Section<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Section::Ready { data },
            Err(e) => Section::Failed {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_view_reports_change_over_the_window() {
        let point = |day: u32, value: f64| TimeSeriesPoint {
            timestamp: DateTime::parse_from_rfc3339(&format!("2024-01-{:02}T00:00:00Z", day))
                .unwrap()
                .with_timezone(&Utc),
            value,
        };
        let view = SeriesView::new(
            SeriesMetric::Nodes,
            vec![point(1, 1000.0), point(2, 1200.0), point(3, 2500.0)],
        );
        assert_eq!(view.latest, Some(2500.0));
        assert_eq!(view.change.as_deref(), Some("+1.5K"));
        assert_eq!(view.change_percent, Some(150.0));

        let single = SeriesView::new(SeriesMetric::Nodes, vec![point(1, 7.0)]);
        assert_eq!(single.latest, Some(7.0));
        assert_eq!(single.change, None);

        let empty = SeriesView::new(SeriesMetric::Capacity, Vec::new());
        assert_eq!(empty.latest, None);
        assert_eq!(empty.change_percent, None);
    }

    fn raw_channel(capacity: &str) -> RawChannel {
        RawChannel {
            channel_outpoint: "0xabc0".into(),
            node1: "0x01".into(),
            node2: "0x02".into(),
            capacity: capacity.into(),
            created_timestamp: "0x18bcfe56800".into(),
            last_commit_time: None,
            state: Some(ChannelState::Open),
            udt_name: None,
        }
    }

    #[test]
    fn parses_fine_grained_states() {
        let state: ChannelState = serde_json::from_str("\"closed_cooperative\"").unwrap();
        assert_eq!(state, ChannelState::Closed);
        let state: ChannelState =
            serde_json::from_str("\"closed_waiting_onchain_settlement\"").unwrap();
        assert_eq!(state, ChannelState::Commitment);
        assert_eq!(serde_json::to_string(&ChannelState::Open).unwrap(), "\"open\"");
    }

    #[test]
    fn channel_view_decodes_capacity() {
        let view = ChannelView::from(&raw_channel("0x00e1f505000000000000000000000000"));
        assert_eq!(view.capacity_ckb, 1.0);
        assert_eq!(view.capacity, "1.0 CKB");
        assert_eq!(view.created_at, "2023-11-14T22:13:20Z");
        assert_eq!(view.asset, "ckb");
    }

    #[test]
    fn blank_udt_names_count_as_ckb() {
        let mut channel = raw_channel("0x00e1f505000000000000000000000000");
        channel.udt_name = Some("  ".into());
        assert_eq!(channel.asset_name(), "ckb");
        channel.udt_name = Some("RUSD".into());
        assert_eq!(ChannelView::from(&channel).asset, "RUSD");
    }

    #[test]
    fn malformed_capacity_degrades_to_na() {
        let view = ChannelView::from(&raw_channel("0x00e1f505"));
        assert_eq!(view.capacity_ckb, 0.0);
        assert_eq!(view.capacity, "N/A");
    }

    #[test]
    fn node_view_fills_in_unknowns() {
        let node: RawNode = serde_json::from_value(serde_json::json!({
            "node_id": "0x02aa",
            "addresses": [],
            "timestamp": "0x0",
            "auto_accept_min_ckb_funding_amount": "0x5f5e100",
            "loc": "52.52,13.40"
        }))
        .unwrap();
        let view = NodeView::from(&node);
        assert_eq!(view.name, "Unknown");
        assert_eq!(view.city, "Unknown");
        assert_eq!(view.auto_accept_min_ckb, "1.0 CKB");
        assert_eq!(view.location, Some(GeoPoint { lat: 52.52, lng: 13.40 }));
    }

    #[test]
    fn node_accepts_plain_numbers_from_the_backend() {
        let node: RawNode = serde_json::from_value(serde_json::json!({
            "node_id": "0x02b6d4e3ab86a2ca2fad6fae0ecb2e1e559e0b911939872a90abdda6d20302be71",
            "node_name": "fiber-hk-01",
            "addresses": ["/ip4/18.163.221.211/tcp/8228/p2p/QmXen3eUHhywmutEzydCs"],
            "commit_timestamp": "2024-05-01T10:00:00+00:00",
            "announce_timestamp": 1700000000000u64,
            "chain_hash": "0x10639e0895502b5688a6be8cf69460d76541bfa4821629d86d62ba0aae3f9606",
            "auto_accept_min_ckb_funding_amount": 10000000000u64,
            "country": "HK",
            "city": "Hong Kong",
            "region": "HK",
            "loc": "22.2783,114.1747"
        }))
        .unwrap();
        assert_eq!(node.announce_timestamp, 1_700_000_000_000);
        assert_eq!(node.auto_accept_min_ckb_funding_amount, 10_000_000_000);

        let view = NodeView::from(&node);
        assert_eq!(view.announced_at, "2023-11-14T22:13:20Z");
        assert_eq!(view.auto_accept_min_ckb, "100.0 CKB");
        assert_eq!(view.name, "fiber-hk-01");
    }

    #[test]
    fn node_rejects_malformed_integers() {
        let bad = serde_json::json!({
            "node_id": "0x02aa",
            "announce_timestamp": "1700000000000",
            "auto_accept_min_ckb_funding_amount": 0
        });
        assert!(serde_json::from_value::<RawNode>(bad).is_err());
    }

    #[test]
    fn section_reports_failures() {
        let failed: Section<u8> = Section::from_result(Err("boom"));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "status": "failed", "message": "boom" })
        );
    }
}
