use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod filters;
pub mod loader;
pub mod models;
pub mod overview;
pub mod shows;
pub mod stats;
pub mod users;

#[cfg(test)]
mod testing;

use filters::{CategoryField, CategoryFilters, DateRange, FilterSet};
use loader::DatasetCache;
use models::{Dataset, DatasetMetadata};
use users::UserFilters;

#[derive(Clone)]
pub struct AppState {
    dataset: Arc<DatasetCache>,
}

impl AppState {
    pub fn new(dataset: DatasetCache) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }
}

/// Query parameters shared by the report endpoints.
///
/// Category lists are comma separated. An absent list leaves that field
/// unconstrained; a present but empty list (`states=`) matches nothing.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub states: Option<String>,
    pub genres: Option<String>,
    pub show_types: Option<String>,
    pub show: Option<String>,
    pub min_views: Option<u64>,
    pub min_completion: Option<f64>,
    pub max_completion: Option<f64>,
    pub min_watch_hours: Option<f64>,
}

pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl FilterQuery {
    pub fn filter_set(&self) -> FilterSet {
        let mut categories = CategoryFilters::new();
        for (field, raw) in [
            (CategoryField::State, &self.states),
            (CategoryField::Genre, &self.genres),
            (CategoryField::ShowType, &self.show_types),
        ] {
            if let Some(raw) = raw {
                categories.set(field, parse_list(raw));
            }
        }

        FilterSet {
            date_range: DateRange::from_bounds(self.start, self.end),
            categories,
            numeric: Vec::new(),
        }
    }

    pub fn user_filters(&self) -> UserFilters {
        UserFilters {
            min_views: self.min_views,
            min_completion: self.min_completion,
            max_completion: self.max_completion,
            min_watch_hours: self.min_watch_hours,
        }
    }
}

/// Loaded dataset; a cold cache is filled on the blocking pool.
async fn dataset(state: &AppState) -> Result<Arc<Dataset>, StatusCode> {
    let cache = Arc::clone(&state.dataset);
    let loaded = if cache.is_loaded() {
        cache.get()
    } else {
        tokio::task::spawn_blocking(move || cache.get())
            .await
            .map_err(|e| {
                tracing::error!("dataset load task failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
    };

    loaded.map_err(|e| {
        tracing::error!("failed to load dataset: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn health_check() -> &'static str {
    "ok"
}

async fn get_filters(State(state): State<AppState>) -> Result<Json<DatasetMetadata>, StatusCode> {
    let dataset = dataset(&state).await?;
    Ok(Json(dataset.metadata().clone()))
}

async fn get_overview(
    State(state): State<AppState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<overview::OverviewReport>, StatusCode> {
    let dataset = dataset(&state).await?;
    let filtered = params.filter_set().apply(dataset.table());
    tracing::debug!("overview over {} of {} events", filtered.len(), dataset.table().len());

    Ok(Json(overview::calculate_overview(&filtered)))
}

async fn get_shows(
    State(state): State<AppState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<shows::ShowsReport>, StatusCode> {
    let dataset = dataset(&state).await?;

    let show = params.show.as_deref().filter(|s| !s.is_empty());
    if let Some(name) = show {
        if !dataset.metadata().show_names.iter().any(|s| s == name) {
            tracing::debug!("unknown show requested: {}", name);
            return Err(StatusCode::NOT_FOUND);
        }
    }

    let filtered = params.filter_set().apply(dataset.table());
    tracing::debug!(
        "show analysis over {} of {} events (show: {:?})",
        filtered.len(),
        dataset.table().len(),
        show
    );

    Ok(Json(shows::calculate_shows(&filtered, show)))
}

async fn get_users(
    State(state): State<AppState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<users::UsersReport>, StatusCode> {
    let dataset = dataset(&state).await?;
    let filtered = params.filter_set().apply(dataset.table());

    Ok(Json(users::calculate_users(&filtered, &params.user_filters())))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/filters", get(get_filters))
        .route("/api/overview", get(get_overview))
        .route("/api/shows", get(get_shows))
        .route("/api/users", get(get_users))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.as_str())
        .init();

    let cache = DatasetCache::new(&config.data_path);
    cache.get()?;
    tracing::info!("dataset ready from {}", cache.path().display());

    let app = build_router(AppState::new(cache));

    tracing::info!("listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
