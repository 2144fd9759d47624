use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{ChannelListQuery, NodeListQuery, QueryKind};
use crate::config::Config;
use crate::error::{DashboardError, Result};
use crate::models::{ChannelPage, NodePage};
use crate::network::Network;

/// Page size used when walking a whole listing.
const FULL_LIST_PAGE_SIZE: usize = 500;
/// Stop walking a listing after this many pages even if the server keeps going.
const MAX_LIST_PAGES: usize = 1_000;

/// Read-only client for the dashboard API. One base URL per network.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    mainnet_url: String,
    testnet_url: String,
    attempts: u32,
    backoff: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder().timeout(config.fetch_timeout).build()?;
        Ok(ApiClient {
            http,
            mainnet_url: config.mainnet_api_url.clone(),
            testnet_url: config.testnet_api_url.clone(),
            attempts: config.fetch_retries,
            backoff: config.retry_backoff,
        })
    }

    fn base_url(&self, net: Network) -> &str {
        match net {
            Network::Mainnet => &self.mainnet_url,
            Network::Testnet => &self.testnet_url,
        }
    }

    /// Runs the request a query describes and returns the raw JSON body.
    pub async fn request(&self, net: Network, kind: &QueryKind) -> Result<Value> {
        match kind {
            QueryKind::NodeList(query) => {
                let (path, params) = node_list_request(query);
                self.get_json(net, path, &params).await
            }
            QueryKind::AllNodes => {
                let request_for = |page| {
                    node_list_request(&NodeListQuery {
                        page,
                        page_size: FULL_LIST_PAGE_SIZE,
                        ..Default::default()
                    })
                };
                let nodes = self
                    .walk_pages(
                        net,
                        request_for,
                        |page: &NodePage| (page.nodes.len(), page.total_count),
                        |page: NodePage| page.nodes,
                    )
                    .await?;
                Ok(serde_json::to_value(nodes)?)
            }
            QueryKind::Node { node_id } => {
                self.get_json(net, "node_info", &[("node_id", node_id.clone())])
                    .await
            }
            QueryKind::ChannelList(query) => {
                let (path, params) = channel_list_request(query);
                self.get_json(net, path, &params).await
            }
            QueryKind::AllChannels => {
                let request_for = |page| {
                    channel_list_request(&ChannelListQuery {
                        page,
                        page_size: FULL_LIST_PAGE_SIZE,
                        ..Default::default()
                    })
                };
                let channels = self
                    .walk_pages(
                        net,
                        request_for,
                        |page: &ChannelPage| (page.channels.len(), page.total_count),
                        |page: ChannelPage| page.channels,
                    )
                    .await?;
                Ok(serde_json::to_value(channels)?)
            }
            QueryKind::Channel { outpoint } => {
                self.get_json(net, "channel_info", &[("channel_outpoint", outpoint.clone())])
                    .await
            }
            QueryKind::ChannelState { outpoint } => {
                self.get_json(net, "channel_state", &[("channel_outpoint", outpoint.clone())])
                    .await
            }
            QueryKind::Kpi => self.get_json(net, "analysis_hourly", &[]).await,
            QueryKind::Series { metric, start, end } => {
                let mut params = vec![("metric", metric.as_str().to_string())];
                if let Some(start) = start {
                    params.push(("start", start.to_string()));
                }
                if let Some(end) = end {
                    params.push(("end", end.to_string()));
                }
                self.get_json(net, "analysis", &params).await
            }
        }
    }

    /// Collects every item of a paged listing.
    async fn walk_pages<P, T>(
        &self,
        net: Network,
        request_for: impl Fn(usize) -> ListRequest,
        sizes: impl Fn(&P) -> (usize, usize),
        items: impl Fn(P) -> Vec<T>,
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let mut collected = Vec::new();
        for page in 0..MAX_LIST_PAGES {
            let (path, params) = request_for(page);
            let body: P = serde_json::from_value(self.get_json(net, path, &params).await?)?;
            let (returned, total) = sizes(&body);
            collected.extend(items(body));
            if returned == 0 || collected.len() >= total {
                return Ok(collected);
            }
        }
        log::warn!(
            "[API] Stopped listing {} after {} pages with {} items",
            net,
            MAX_LIST_PAGES,
            collected.len()
        );
        Ok(collected)
    }

    /// GET with bounded retries on transport errors and 5xx responses.
    pub async fn get_json(
        &self,
        net: Network,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url(net), path);
        let mut attempt = 1;
        loop {
            match self.get_once(&url, net, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    log::warn!(
                        "[API] {} attempt {}/{} failed: {}",
                        url,
                        attempt,
                        self.attempts,
                        e
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("[API] {} failed: {}", url, e);
                    return Err(e);
                }
            }
        }
    }

    async fn get_once(&self, url: &str, net: Network, params: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .query(&[("net", net.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DashboardError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            return Err(DashboardError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

type ListRequest = (&'static str, Vec<(&'static str, String)>);

/// Adds `start`/`end` when either is set. Returns whether a window was given.
fn push_window(
    params: &mut Vec<(&'static str, String)>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> bool {
    if let Some(start) = start {
        params.push(("start", start.to_string()));
    }
    if let Some(end) = end {
        params.push(("end", end.to_string()));
    }
    start.is_some() || end.is_some()
}

fn node_list_request(query: &NodeListQuery) -> ListRequest {
    let mut params = vec![
        ("page", query.page.to_string()),
        ("page_size", query.page_size.to_string()),
        ("sort_by", query.sort_by.as_str().to_string()),
        ("order", query.order.as_str().to_string()),
    ];
    let path = if let Some(search) = &query.search {
        params.push(("node_name", search.clone()));
        "nodes_fuzzy_by_name_or_id"
    } else if let Some(region) = &query.region {
        params.push(("region", region.clone()));
        "nodes_by_region"
    } else if push_window(&mut params, query.start, query.end) {
        "nodes_nearly_monthly"
    } else {
        "nodes_hourly"
    };
    (path, params)
}

fn channel_list_request(query: &ChannelListQuery) -> ListRequest {
    let mut params = vec![
        ("page", query.page.to_string()),
        ("page_size", query.page_size.to_string()),
        ("sort_by", query.sort_by.as_str().to_string()),
        ("order", query.order.as_str().to_string()),
    ];
    let path = if let Some(node_id) = &query.node_id {
        params.push(("node_id", node_id.clone()));
        "channels_by_node_id"
    } else if let Some(state) = query.state {
        for name in state.backend_names() {
            params.push(("state", name.to_string()));
        }
        "channel_by_state"
    } else if push_window(&mut params, query.start, query.end) {
        "channels_nearly_monthly"
    } else {
        "channels_hourly"
    };
    (path, params)
}
