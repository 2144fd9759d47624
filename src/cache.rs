use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::ranking::Order;
use crate::error::{DashboardError, Result};
use crate::models::{ChannelState, SeriesMetric};
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeSortBy {
    Region,
    #[default]
    LastSeen,
    ChannelCount,
}

impl NodeSortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeSortBy::Region => "region",
            NodeSortBy::LastSeen => "last_seen",
            NodeSortBy::ChannelCount => "channel_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSortBy {
    CreateTime,
    #[default]
    LastCommitTime,
    Capacity,
}

impl ChannelSortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelSortBy::CreateTime => "create_time",
            ChannelSortBy::LastCommitTime => "last_commit_time",
            ChannelSortBy::Capacity => "capacity",
        }
    }
}

/// One page of a node listing. `search` wins over `region`, and both win over the
/// date window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeListQuery {
    pub page: usize,
    pub page_size: usize,
    pub sort_by: NodeSortBy,
    pub order: Order,
    /// Fuzzy match on name or id.
    pub search: Option<String>,
    pub region: Option<String>,
    /// Nodes seen within this window instead of the last few hours.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// One page of a channel listing. Filters apply in the order `node_id`, `state`,
/// date window; only the first one present is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChannelListQuery {
    pub page: usize,
    pub page_size: usize,
    pub sort_by: ChannelSortBy,
    pub order: Order,
    /// Only channels with this endpoint.
    pub node_id: Option<String>,
    pub state: Option<ChannelState>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// What a query asks for, including every parameter that changes the answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    NodeList(NodeListQuery),
    AllNodes,
    Node { node_id: String },
    ChannelList(ChannelListQuery),
    AllChannels,
    Channel { outpoint: String },
    ChannelState { outpoint: String },
    Kpi,
    Series {
        metric: SeriesMetric,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

/// Cache key. Two keys are only equal when both the query and the network match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub network: Network,
}

impl QueryKey {
    pub fn new(kind: QueryKind, network: Network) -> Self {
        QueryKey { kind, network }
    }
}

/// Process-wide response cache. Concurrent lookups of one key share a single fetch,
/// and failed fetches are not stored.
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<QueryKey, Arc<Value>>,
}

impl QueryCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        QueryCache { inner }
    }

    pub async fn get(&self, key: &QueryKey) -> Option<Arc<Value>> {
        self.inner.get(key).await
    }

    pub async fn get_or_fetch<F>(&self, key: QueryKey, fetch: F) -> Result<Arc<Value>>
    where
        F: Future<Output = Result<Value>>,
    {
        let network = key.network;
        self.inner
            .try_get_with(key, async move {
                log::debug!("[Cache] Miss on {}", network);
                fetch.await.map(Arc::new)
            })
            .await
            .map_err(|shared| Arc::try_unwrap(shared).unwrap_or_else(DashboardError::Shared))
    }

    /// Fetches a fresh value and replaces the entry for the same key. Readers keep
    /// seeing the previous value until the fetch succeeds.
    pub async fn refresh<F>(&self, key: QueryKey, fetch: F) -> Result<Arc<Value>>
    where
        F: Future<Output = Result<Value>>,
    {
        let value = Arc::new(fetch.await?);
        self.inner.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Drops every entry that belongs to `network`.
    pub async fn invalidate_network(&self, network: Network) -> usize {
        let stale: Vec<Arc<QueryKey>> = self
            .inner
            .iter()
            .filter(|(key, _)| key.network == network)
            .map(|(key, _)| key)
            .collect();
        for key in &stale {
            self.inner.invalidate(key.as_ref()).await;
        }
        log::info!("[Cache] Invalidated {} entries for {}", stale.len(), network);
        stale.len()
    }

    /// Number of live entries, after pending evictions have run.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
