//! HTTP API for the Commission Engine.
//!
//! This module exposes read-only report endpoints around the
//! aggregation engine using the [`axum`](https://crates.io/crates/axum)
//! framework.  Handlers fetch records through a [`RecordSource`], hand
//! them to [`crate::engine`] and return the result as JSON.  Every
//! route requires an `Authorization: Bearer <token>` header matching
//! one of the configured tokens.

use crate::config::Config;
use crate::engine::{
    aggregate_by_category, aggregate_period, build_report, compare_periods,
    rank_by_balanced_score, ScoreWeights,
};
use crate::error::ApiError;
use crate::models::{
    CollectionRecord, CommissionRule, Period, PeriodComparison, PeriodRange, PeriodSummary,
    RankedRepresentative, Report, RepresentativeReport, SalesRecord,
};
use crate::store::{load_from_dir, RecordSource};
use anyhow::Result;
use axum::{
    extract::{Path, Query, Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application state shared across requests.
pub struct AppState {
    pub records: Arc<dyn RecordSource>,
    pub api_tokens: HashSet<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: i32,
    pub month: u32,
}

impl PeriodQuery {
    fn period(&self) -> Result<Period, ApiError> {
        Ok(Period::new(self.year, self.month)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

#[derive(Debug, Serialize)]
pub struct RepresentativeResponse {
    #[serde(flatten)]
    pub report: Report,
    pub collection_records: Vec<CollectionRecord>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub period: PeriodRange,
    pub categories: BTreeMap<String, PeriodSummary>,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub period: PeriodRange,
    pub ranking: Vec<RankedRepresentative>,
}

#[derive(Debug, Serialize)]
pub struct ComparisonResponse {
    pub period: Period,
    pub previous_period: Period,
    pub current: PeriodSummary,
    pub previous: PeriodSummary,
    pub change: PeriodComparison,
}

/// Build the API router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/reports", get(report_handler))
        .route("/api/reports/range", get(range_handler))
        .route("/api/reports/categories", get(category_handler))
        .route("/api/reports/ranking", get(ranking_handler))
        .route("/api/reports/compare", get(compare_handler))
        .route("/api/reports/representative/:id", get(representative_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state)
}

/// Rejects requests without a known bearer token.
async fn require_bearer(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);
    let present = token.is_some();
    let known = token.is_some_and(|t| state.api_tokens.contains(t));
    if known {
        return Ok(next.run(req).await);
    }
    if present {
        warn!(uri = %req.uri(), "rejected unknown bearer token");
    } else {
        warn!(uri = %req.uri(), "missing bearer token");
    }
    Err(ApiError::Unauthorized)
}

type Records = (Vec<SalesRecord>, Vec<CollectionRecord>, Vec<CommissionRule>);

fn fetch(source: &dyn RecordSource, range: &PeriodRange, rep: Option<&str>) -> Result<Records, ApiError> {
    let sales = source.sales_records(range, rep)?;
    let collections = source.collection_records(range, rep)?;
    let rules = source.commission_rules()?;
    debug!(
        sales = sales.len(),
        collections = collections.len(),
        start = %range.start,
        end = %range.end,
        "fetched records"
    );
    Ok((sales, collections, rules))
}

fn report_for(source: &dyn RecordSource, range: PeriodRange) -> Result<Report, ApiError> {
    let (sales, collections, rules) = fetch(source, &range, None)?;
    let representatives = source.representatives()?;
    Ok(build_report(range, &sales, &collections, &rules, &representatives))
}

/// Handler for GET /api/reports
async fn report_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Report>, ApiError> {
    let range = PeriodRange::single(query.period()?);
    Ok(Json(report_for(state.records.as_ref(), range)?))
}

/// Handler for GET /api/reports/range
async fn range_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Report>, ApiError> {
    let start = Period::new(query.start_year, query.start_month)?;
    let end = Period::new(query.end_year, query.end_month)?;
    let range = PeriodRange::new(start, end)?;
    Ok(Json(report_for(state.records.as_ref(), range)?))
}

/// Handler for GET /api/reports/representative/:id
async fn representative_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<RepresentativeResponse>, ApiError> {
    let range = PeriodRange::single(query.period()?);
    let source = state.records.as_ref();
    let (sales, collections, rules) = fetch(source, &range, Some(&id))?;
    let representatives = source.representatives()?;
    if sales.is_empty() && collections.is_empty() && !representatives.iter().any(|r| r.id == id) {
        return Err(ApiError::NotFound(id));
    }
    let mut report = build_report(range, &sales, &collections, &rules, &representatives);
    if report.representatives.is_empty() {
        // Known representative with nothing recorded this month.
        report.representatives.push(RepresentativeReport {
            representative_id: id.clone(),
            name: representatives.iter().find(|r| r.id == id).map(|r| r.name.clone()),
            totals: PeriodSummary::default(),
            sales_details: Vec::new(),
        });
    }
    Ok(Json(RepresentativeResponse {
        report,
        collection_records: collections,
    }))
}

/// Handler for GET /api/reports/categories
async fn category_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let range = PeriodRange::single(query.period()?);
    let (sales, _, rules) = fetch(state.records.as_ref(), &range, None)?;
    Ok(Json(CategoryResponse {
        period: range,
        categories: aggregate_by_category(&sales, &rules),
    }))
}

/// Handler for GET /api/reports/ranking
async fn ranking_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<RankingResponse>, ApiError> {
    let range = PeriodRange::single(query.period()?);
    let (sales, collections, rules) = fetch(state.records.as_ref(), &range, None)?;
    let aggregation = aggregate_period(&sales, &collections, &rules);
    Ok(Json(RankingResponse {
        period: range,
        ranking: rank_by_balanced_score(&aggregation.per_representative, ScoreWeights::default()),
    }))
}

/// Handler for GET /api/reports/compare
async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ComparisonResponse>, ApiError> {
    let period = query.period()?;
    let previous_period = period.previous();
    let source = state.records.as_ref();

    let (sales, collections, rules) = fetch(source, &PeriodRange::single(period), None)?;
    let current = aggregate_period(&sales, &collections, &rules).overall;
    let (sales, collections, rules) = fetch(source, &PeriodRange::single(previous_period), None)?;
    let previous = aggregate_period(&sales, &collections, &rules).overall;

    Ok(Json(ComparisonResponse {
        period,
        previous_period,
        current,
        previous,
        change: compare_periods(&current, &previous),
    }))
}

/// Launch the API server.  Records are loaded once from the configured
/// data directory; the call blocks until the server terminates.
pub async fn serve(config: Config) -> Result<()> {
    let store = load_from_dir(&config.data_dir)?;
    if config.api_tokens.is_empty() {
        warn!("no API tokens configured, every request will be rejected");
    }
    let state = Arc::new(AppState {
        records: Arc::new(store),
        api_tokens: config.api_tokens,
    });
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
