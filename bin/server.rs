// Expedition Analytics - Web Server
// Read-only JSON API over a batch loaded at startup

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use expedition_analytics::{
    activity_threshold_matches, filter_species_by_name, most_common_activity_per_species,
    species_population_totals, summarize, tracking_issues, unique_expedition_count,
    unique_species_per_expedition, ActivityThreshold, AnalysisParams, AnalysisReport,
    AnalyticsConfig, Batch, NdjsonSource, RecordSource, SpeciesNameFilter,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    batch: Arc<Batch>,
    params: Arc<AnalysisParams>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct CountResponse {
    unique_expedition_count: u64,
    records: usize,
}

#[derive(Serialize)]
struct ReportResponse {
    fingerprint: String,
    skipped_rows: usize,
    report: AnalysisReport,
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    target_activity: Option<String>,
    min_activity_count: Option<i64>,
}

impl ActivityQuery {
    fn bind(self, defaults: &ActivityThreshold) -> ActivityThreshold {
        ActivityThreshold::new(
            self.target_activity
                .unwrap_or_else(|| defaults.target_activity.clone()),
            self.min_activity_count.unwrap_or(defaults.min_activity_count),
        )
    }
}

#[derive(Debug, Deserialize)]
struct SpeciesQuery {
    /// Comma-separated names
    names: Option<String>,
}

impl SpeciesQuery {
    fn bind(self, defaults: &SpeciesNameFilter) -> SpeciesNameFilter {
        match self.names {
            Some(names) => SpeciesNameFilter::new(
                names.split(',').map(str::trim).filter(|n| !n.is_empty()),
            ),
            None => defaults.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    target_activity: Option<String>,
    min_activity_count: Option<i64>,
    names: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/expeditions/count - Distinct expedition ids
async fn get_expedition_count(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(CountResponse {
        unique_expedition_count: unique_expedition_count(&state.batch),
        records: state.batch.len(),
    }))
}

/// GET /api/species/unique-per-expedition
async fn get_species_per_expedition(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(unique_species_per_expedition(&state.batch)))
}

/// GET /api/species/population - Population totals by species name
async fn get_population(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(species_population_totals(&state.batch)))
}

/// GET /api/tracking-issues - Species with more tagged than counted
async fn get_tracking_issues(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(tracking_issues(&state.batch)))
}

/// GET /api/activity-matches?target_activity=&min_activity_count=
async fn get_activity_matches(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> impl IntoResponse {
    let threshold = query.bind(&state.params.activity);
    Json(ApiResponse::ok(activity_threshold_matches(&state.batch, &threshold)))
}

/// GET /api/most-common-activity
async fn get_most_common_activity(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(most_common_activity_per_species(&state.batch)))
}

/// GET /api/species?names=a,b - Species entries matching any name
async fn get_species(
    State(state): State<AppState>,
    Query(query): Query<SpeciesQuery>,
) -> impl IntoResponse {
    let filter = query.bind(&state.params.species_filter);
    Json(ApiResponse::ok(filter_species_by_name(&state.batch, &filter)))
}

/// GET /api/report - Every operation plus its fingerprint
async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> impl IntoResponse {
    let activity = ActivityQuery {
        target_activity: query.target_activity,
        min_activity_count: query.min_activity_count,
    };
    let species = SpeciesQuery { names: query.names };
    let params = AnalysisParams {
        activity: activity.bind(&state.params.activity),
        species_filter: species.bind(&state.params.species_filter),
    };

    let report = summarize(&state.batch, &params);
    match report.fingerprint() {
        Ok(fingerprint) => {
            let response = ReportResponse {
                fingerprint,
                skipped_rows: report.skipped_rows(),
                report,
            };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => {
            error!("Error fingerprinting report: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<ReportResponse>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/expeditions/count", get(get_expedition_count))
        .route("/species/unique-per-expedition", get(get_species_per_expedition))
        .route("/species/population", get(get_population))
        .route("/species", get(get_species))
        .route("/tracking-issues", get(get_tracking_issues))
        .route("/activity-matches", get(get_activity_matches))
        .route("/most-common-activity", get(get_most_common_activity))
        .route("/report", get(get_report))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🌐 Expedition Analytics - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AnalyticsConfig::load(None)?;
    let input: PathBuf = match env::args().nth(1).map(PathBuf::from).or(config.input_path.clone()) {
        Some(path) => path,
        None => anyhow::bail!("No input file. Usage: expedition-server [INPUT.jsonl]"),
    };

    // Load batch
    let source = NdjsonSource::new(&input);
    let ingest = source.read_batch()?;
    println!("✓ Loaded {}: {}", source.describe(), ingest.summary());

    let state = AppState {
        batch: Arc::new(ingest.batch),
        params: Arc::new(config.to_params()),
    };

    let listener = tokio::net::TcpListener::bind(config.server_addr.as_str())
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!(addr = %config.server_addr, "server listening");
    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/report", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
