use actix_web::{HttpResponse, get, put, web};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::aggregate::ranking::Order;
use crate::cache::{ChannelListQuery, ChannelSortBy, NodeListQuery, NodeSortBy};
use crate::error::Result;
use crate::models::{ChannelState, ChartItem, SeriesMetric, SeriesView};
use crate::network::Network;
use crate::state::{Dashboard, RankingSortBy};

type DashboardData = web::Data<Dashboard>;

/// Query parameters every route understands.
#[derive(Deserialize, Debug, Default)]
pub struct NetParams {
    pub net: Option<Network>,
}

#[derive(Deserialize, Debug, Default)]
pub struct NodeListParams {
    pub net: Option<Network>,
    #[serde(default)]
    pub page: usize,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub sort_by: NodeSortBy,
    #[serde(default)]
    pub order: Order,
    pub search: Option<String>,
    pub region: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChannelListParams {
    pub net: Option<Network>,
    #[serde(default)]
    pub page: usize,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub sort_by: ChannelSortBy,
    #[serde(default)]
    pub order: Order,
    pub state: Option<ChannelState>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RankingParams {
    pub net: Option<Network>,
    #[serde(default)]
    pub page: usize,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub sort_by: RankingSortBy,
    #[serde(default)]
    pub order: Order,
}

#[derive(Deserialize, Debug, Default)]
pub struct SeriesParams {
    pub net: Option<Network>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct NetworkSelection {
    pub network: Network,
}

/// The network a request runs against, fixed once per request.
async fn resolve(dashboard: &Dashboard, requested: Option<Network>) -> Network {
    match requested {
        Some(net) => net,
        None => dashboard.active_network().await,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn health(dashboard: DashboardData) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "name": env!("CARGO_PKG_NAME"),
        "cached_entries": dashboard.cache().entry_count().await,
    }))
}

#[get("/network")]
async fn get_network(dashboard: DashboardData) -> HttpResponse {
    let network = dashboard.active_network().await;
    HttpResponse::Ok().json(NetworkSelection { network })
}

#[put("/network")]
async fn put_network(
    dashboard: DashboardData,
    selection: web::Json<NetworkSelection>,
) -> Result<HttpResponse> {
    let previous = dashboard.switch_network(selection.network).await?;
    info!("[API] Network selection: {} -> {}", previous, selection.network);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "previous": previous,
        "network": selection.network,
    })))
}

#[get("/overview")]
async fn overview(dashboard: DashboardData, params: web::Query<NetParams>) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    Ok(HttpResponse::Ok().json(dashboard.overview(net).await?))
}

fn channel_query(dashboard: &Dashboard, params: ChannelListParams) -> ChannelListQuery {
    ChannelListQuery {
        page: params.page,
        page_size: params.page_size.unwrap_or(dashboard.default_page_size()).max(1),
        sort_by: params.sort_by,
        order: params.order,
        node_id: None,
        state: params.state,
        start: params.start,
        end: params.end,
    }
}

#[get("/nodes")]
async fn list_nodes(
    dashboard: DashboardData,
    params: web::Query<NodeListParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let net = resolve(&dashboard, params.net).await;
    let query = NodeListQuery {
        page: params.page,
        page_size: params.page_size.unwrap_or(dashboard.default_page_size()).max(1),
        sort_by: params.sort_by,
        order: params.order,
        search: non_blank(params.search),
        region: non_blank(params.region),
        start: params.start,
        end: params.end,
    };
    Ok(HttpResponse::Ok().json(dashboard.node_page(net, query).await?))
}

#[get("/nodes/{node_id}")]
async fn node_detail(
    dashboard: DashboardData,
    node_id: web::Path<String>,
    params: web::Query<ChannelListParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let net = resolve(&dashboard, params.net).await;
    let channels = channel_query(&dashboard, params);
    let detail = dashboard.node_detail(net, &node_id, channels).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[get("/channels")]
async fn list_channels(
    dashboard: DashboardData,
    params: web::Query<ChannelListParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let net = resolve(&dashboard, params.net).await;
    let query = channel_query(&dashboard, params);
    Ok(HttpResponse::Ok().json(dashboard.channel_page(net, query).await?))
}

#[get("/channels/{outpoint}")]
async fn channel_detail(
    dashboard: DashboardData,
    outpoint: web::Path<String>,
    params: web::Query<NetParams>,
) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    Ok(HttpResponse::Ok().json(dashboard.channel_detail(net, &outpoint).await?))
}

#[get("/map")]
async fn map(dashboard: DashboardData, params: web::Query<NetParams>) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    Ok(HttpResponse::Ok().json(dashboard.map(net).await?))
}

#[get("/rankings")]
async fn rankings(
    dashboard: DashboardData,
    params: web::Query<RankingParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let net = resolve(&dashboard, params.net).await;
    let page_size = params.page_size.unwrap_or(dashboard.default_page_size());
    let page = dashboard
        .top_nodes(net, params.sort_by, params.order, params.page, page_size)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/charts/capacity")]
async fn capacity_chart(
    dashboard: DashboardData,
    params: web::Query<NetParams>,
) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    let histogram = dashboard.capacity_histogram(net).await?;
    let items: Vec<ChartItem> = histogram.buckets.into_iter().map(ChartItem::Bucket).collect();
    Ok(HttpResponse::Ok().json(items))
}

#[get("/charts/top-nodes")]
async fn top_nodes_chart(
    dashboard: DashboardData,
    params: web::Query<RankingParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let net = resolve(&dashboard, params.net).await;
    let page_size = params.page_size.unwrap_or(dashboard.default_page_size());
    let page = dashboard
        .top_nodes(net, params.sort_by, params.order, params.page, page_size)
        .await?;
    let items: Vec<ChartItem> = page.items.into_iter().map(ChartItem::Ranking).collect();
    Ok(HttpResponse::Ok().json(items))
}

#[get("/charts/map")]
async fn map_chart(
    dashboard: DashboardData,
    params: web::Query<NetParams>,
) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    let summary = dashboard.map(net).await?;
    let items: Vec<ChartItem> = summary
        .clusters
        .into_iter()
        .map(ChartItem::MapPoint)
        .collect();
    Ok(HttpResponse::Ok().json(items))
}

#[get("/charts/assets")]
async fn asset_chart(
    dashboard: DashboardData,
    params: web::Query<NetParams>,
) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    let assets = dashboard.asset_breakdown(net).await?;
    let items: Vec<ChartItem> = assets.into_iter().map(ChartItem::Asset).collect();
    Ok(HttpResponse::Ok().json(items))
}

#[get("/series/{metric}")]
async fn series(
    dashboard: DashboardData,
    metric: web::Path<SeriesMetric>,
    params: web::Query<SeriesParams>,
) -> Result<HttpResponse> {
    let net = resolve(&dashboard, params.net).await;
    let metric = metric.into_inner();
    let points = dashboard
        .series(net, metric, params.start, params.end)
        .await?;
    Ok(HttpResponse::Ok().json(SeriesView::new(metric, points)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(get_network)
        .service(put_network)
        .service(overview)
        .service(list_nodes)
        .service(node_detail)
        .service(list_channels)
        .service(channel_detail)
        .service(map)
        .service(rankings)
        .service(capacity_chart)
        .service(top_nodes_chart)
        .service(map_chart)
        .service(asset_chart)
        .service(series);
}
