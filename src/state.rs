use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::aggregate::geo::{self, GeoSummary, RegionCount};
use crate::aggregate::histogram::{self, CapacityHistogram};
use crate::aggregate::ranking::{self, Order, SortValue};
use crate::aggregate::rollup::{self, RankedNode};
use crate::aggregate::stats::{self, AssetStats, StateCount};
use crate::cache::{ChannelListQuery, NodeListQuery, QueryCache, QueryKey, QueryKind};
use crate::client::ApiClient;
use crate::config::Config;
use crate::db::PreferenceStore;
use crate::decode::{self, SHANNONS_PER_CKB};
use crate::error::{DashboardError, Result};
use crate::formatters;
use crate::models::{
    ChannelEnvelope, ChannelPage, ChannelStateInfo, ChannelView, KpiView, NodeEnvelope, NodePage,
    NodeView, PageView, RawChannel, RawKpi, RawNode, Section, SeriesMetric, TimeSeries,
    TimeSeriesPoint,
};
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingSortBy {
    #[default]
    Capacity,
    ChannelCount,
    Name,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Overview {
    pub network: Network,
    pub kpis: KpiView,
    /// The same metrics recomputed from the current listings.
    pub listing_kpis: KpiView,
    pub capacity_histogram: CapacityHistogram,
    pub channel_states: Vec<StateCount>,
    pub channels_without_state: usize,
    pub assets: Vec<AssetStats>,
    pub regions: Vec<RegionCount>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeTotals {
    pub channel_count: u64,
    pub capacity_ckb: f64,
    pub capacity: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeDetail {
    pub network: Network,
    pub node: NodeView,
    /// Totals over the channels on the current page, attributed half per endpoint.
    pub page_totals: Section<NodeTotals>,
    pub channels: Section<PageView<ChannelView>>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChannelDetail {
    pub network: Network,
    pub channel: ChannelView,
    pub state: ChannelStateInfo,
    pub node1: NodeView,
    pub node2: NodeView,
}

/// Everything a request needs: the API client, the shared cache, the preference
/// store and the currently selected network.
pub struct Dashboard {
    client: ApiClient,
    cache: QueryCache,
    prefs: PreferenceStore,
    active: RwLock<Network>,
    default_page_size: usize,
}

/// Rejects a window whose start lies after its end.
fn check_window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(DashboardError::BadRequest(format!(
            "start {} is after end {}",
            start, end
        ))),
        _ => Ok(()),
    }
}

fn page_view<R, V>(rows: &[R], page: usize, page_size: usize, total_count: usize) -> PageView<V>
where
    for<'a> V: From<&'a R>,
{
    PageView {
        items: rows.iter().map(V::from).collect(),
        page,
        page_size,
        total_count,
        total_pages: total_count.div_ceil(page_size.max(1)),
    }
}

impl Dashboard {
    pub fn new(config: &Config, prefs: PreferenceStore, initial: Network) -> Result<Self> {
        Ok(Dashboard {
            client: ApiClient::new(config)?,
            cache: QueryCache::new(config.cache_max_entries, config.cache_ttl),
            prefs,
            active: RwLock::new(initial),
            default_page_size: config.default_page_size,
        })
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn active_network(&self) -> Network {
        *self.active.read().await
    }

    /// Persists the new selection, then drops everything cached for the previous
    /// network. Returns the previous network.
    pub async fn switch_network(&self, network: Network) -> Result<Network> {
        let mut active = self.active.write().await;
        let previous = *active;
        if previous == network {
            return Ok(previous);
        }

        let prefs = self.prefs.clone();
        tokio::task::spawn_blocking(move || prefs.save_network(network))
            .await
            .map_err(|e| DashboardError::Task(e.to_string()))??;

        *active = network;
        drop(active);
        log::info!("[Network] Switched from {} to {}", previous, network);
        self.cache.invalidate_network(previous).await;
        Ok(previous)
    }

    async fn query<T: DeserializeOwned>(&self, network: Network, kind: QueryKind) -> Result<T> {
        let fetch = {
            let client = self.client.clone();
            let kind = kind.clone();
            async move { client.request(network, &kind).await }
        };
        let value = self
            .cache
            .get_or_fetch(QueryKey::new(kind, network), fetch)
            .await?;
        Ok(T::deserialize(value.as_ref())?)
    }

    /// Re-fetches one query and replaces its cached value.
    pub async fn refresh(&self, network: Network, kind: QueryKind) -> Result<()> {
        let fetch = {
            let client = self.client.clone();
            let kind = kind.clone();
            async move { client.request(network, &kind).await }
        };
        self.cache
            .refresh(QueryKey::new(kind, network), fetch)
            .await
            .map(|_| ())
    }

    pub async fn all_nodes(&self, network: Network) -> Result<Vec<RawNode>> {
        self.query(network, QueryKind::AllNodes).await
    }

    pub async fn all_channels(&self, network: Network) -> Result<Vec<RawChannel>> {
        self.query(network, QueryKind::AllChannels).await
    }

    pub async fn kpis(&self, network: Network) -> Result<KpiView> {
        let raw: RawKpi = self.query(network, QueryKind::Kpi).await?;
        Ok(KpiView::from(&raw))
    }

    /// Historical series. Capacity comes back in Shannon and is converted to CKB.
    pub async fn series(
        &self,
        network: Network,
        metric: SeriesMetric,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        check_window(start, end)?;
        let series: TimeSeries = self
            .query(network, QueryKind::Series { metric, start, end })
            .await?;
        let mut points = series.series;
        if metric == SeriesMetric::Capacity {
            for point in &mut points {
                point.value /= SHANNONS_PER_CKB as f64;
            }
        }
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    pub async fn node(&self, network: Network, node_id: &str) -> Result<NodeView> {
        let envelope: NodeEnvelope = self
            .query(
                network,
                QueryKind::Node {
                    node_id: node_id.to_string(),
                },
            )
            .await?;
        envelope
            .node_info
            .as_ref()
            .map(NodeView::from)
            .ok_or_else(|| DashboardError::NotFound(format!("node {}", node_id)))
    }

    pub async fn node_page(
        &self,
        network: Network,
        query: NodeListQuery,
    ) -> Result<PageView<NodeView>> {
        check_window(query.start, query.end)?;
        let (page, page_size) = (query.page, query.page_size);
        let raw: NodePage = self.query(network, QueryKind::NodeList(query)).await?;
        Ok(page_view(&raw.nodes, page, page_size, raw.total_count))
    }

    async fn raw_channel_page(
        &self,
        network: Network,
        query: ChannelListQuery,
    ) -> Result<ChannelPage> {
        check_window(query.start, query.end)?;
        self.query(network, QueryKind::ChannelList(query)).await
    }

    pub async fn channel_page(
        &self,
        network: Network,
        query: ChannelListQuery,
    ) -> Result<PageView<ChannelView>> {
        let (page, page_size) = (query.page, query.page_size);
        let raw = self.raw_channel_page(network, query).await?;
        Ok(page_view(&raw.channels, page, page_size, raw.total_count))
    }

    /// Node plus its channels. The node must load; a failed channel listing is
    /// reported in place without hiding the node.
    pub async fn node_detail(
        &self,
        network: Network,
        node_id: &str,
        mut channels: ChannelListQuery,
    ) -> Result<NodeDetail> {
        channels.node_id = Some(node_id.to_string());
        let (page, page_size) = (channels.page, channels.page_size);
        let (node, channel_page) = tokio::join!(
            self.node(network, node_id),
            self.raw_channel_page(network, channels)
        );
        let node = node?;

        let page_totals = channel_page.as_ref().map(|raw| {
            let rollups = rollup::node_rollups(&raw.channels);
            let own = rollups.get(node_id).copied().unwrap_or_default();
            NodeTotals {
                channel_count: own.channel_count,
                capacity_ckb: decode::shannon_to_ckb(own.capacity_shannon),
                capacity: formatters::format_ckb(own.capacity_shannon),
            }
        });
        let channel_views = channel_page.as_ref().map(|raw| {
            page_view::<_, ChannelView>(&raw.channels, page, page_size, raw.total_count)
        });

        Ok(NodeDetail {
            network,
            node,
            page_totals: Section::from_result(page_totals),
            channels: Section::from_result(channel_views),
        })
    }

    /// Channel, its state and both endpoints. Any failure fails the whole page.
    pub async fn channel_detail(&self, network: Network, outpoint: &str) -> Result<ChannelDetail> {
        let (envelope, state) = tokio::try_join!(
            self.query::<ChannelEnvelope>(
                network,
                QueryKind::Channel {
                    outpoint: outpoint.to_string(),
                },
            ),
            self.query::<ChannelStateInfo>(
                network,
                QueryKind::ChannelState {
                    outpoint: outpoint.to_string(),
                },
            )
        )?;
        let channel = envelope
            .channel_info
            .ok_or_else(|| DashboardError::NotFound(format!("channel {}", outpoint)))?;
        let (node1, node2) = tokio::try_join!(
            self.node(network, &channel.node1),
            self.node(network, &channel.node2)
        )?;

        Ok(ChannelDetail {
            network,
            channel: ChannelView::from(&channel),
            state,
            node1,
            node2,
        })
    }

    pub async fn capacity_histogram(&self, network: Network) -> Result<CapacityHistogram> {
        let channels = self.all_channels(network).await?;
        Ok(histogram::capacity_histogram(&channels))
    }

    /// Nodes ranked by attributed capacity, channel count or name, sorted before paging.
    pub async fn top_nodes(
        &self,
        network: Network,
        sort_by: RankingSortBy,
        order: Order,
        page: usize,
        page_size: usize,
    ) -> Result<PageView<RankedNode>> {
        let (nodes, channels) =
            tokio::try_join!(self.all_nodes(network), self.all_channels(network))?;
        let rollups = rollup::node_rollups(&channels);
        let ranked = rollup::rank_nodes(&nodes, &rollups);
        let key = move |row: &RankedNode| match sort_by {
            RankingSortBy::Capacity => SortValue::Float(row.capacity_ckb),
            RankingSortBy::ChannelCount => SortValue::Integer(row.channel_count as u128),
            RankingSortBy::Name => SortValue::text(&row.name),
        };
        Ok(ranking::sort_and_paginate(ranked, key, order, page, page_size))
    }

    /// Channel counts and capacity statistics per asset.
    pub async fn asset_breakdown(&self, network: Network) -> Result<Vec<AssetStats>> {
        let channels = self.all_channels(network).await?;
        Ok(stats::asset_stats(&channels))
    }

    pub async fn map(&self, network: Network) -> Result<GeoSummary> {
        let nodes = self.all_nodes(network).await?;
        Ok(geo::cluster_nodes(&nodes))
    }

    pub async fn overview(&self, network: Network) -> Result<Overview> {
        let (kpis, nodes, channels) = tokio::try_join!(
            self.kpis(network),
            self.all_nodes(network),
            self.all_channels(network)
        )?;
        let (channel_states, channels_without_state) = stats::state_counts(&channels);
        Ok(Overview {
            network,
            kpis,
            listing_kpis: KpiView::from(&stats::kpi_snapshot(nodes.len(), &channels)),
            capacity_histogram: histogram::capacity_histogram(&channels),
            channel_states,
            channels_without_state,
            assets: stats::asset_stats(&channels),
            regions: geo::region_counts(&nodes),
        })
    }

    /// Queries the background worker keeps warm for a network.
    pub fn warm_queries() -> [QueryKind; 3] {
        [QueryKind::Kpi, QueryKind::AllNodes, QueryKind::AllChannels]
    }
}
