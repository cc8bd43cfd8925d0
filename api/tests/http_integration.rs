//! Integration tests for the report endpoints
//!
//! Each test serves a small on-disk dataset through the router.

use std::io::Write;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use streaming_analytics_api::{build_router, loader::DatasetCache, AppState};

fn record(user: &str, show: &str, genre: &str, state: &str, at: &str, duration: u64, watch: u64) -> Value {
    let show_type = if genre == "Documentary" { "Movie" } else { "Series" };
    serde_json::json!({
        "user_id": user,
        "show_name": show,
        "show_genre": genre,
        "show_type": show_type,
        "show_rating": "TV-PG",
        "show_description": format!("{} description", show),
        "show_duration_seconds": duration,
        "user_watch_duration_seconds": watch,
        "state": state,
        "created_date": &at[..10],
        "created_at": at,
    })
}

fn dataset_file() -> NamedTempFile {
    let mut records = vec![
        record("u1", "Alpha", "Drama", "CA", "2024-01-01T08:00:00", 100, 50),
        record("u1", "Alpha", "Drama", "CA", "2024-01-01T23:59:59", 100, 100),
        record("u2", "Beta", "Comedy", "NY", "2024-01-02T12:00:00", 50, 25),
        record("u3", "Gamma", "Documentary", "TX", "2024-02-10T20:00:00", 3600, 3600),
    ];
    for i in 0..5 {
        records.push(record(
            &format!("v{}", i),
            "Delta",
            "Drama",
            "NY",
            "2024-01-15T19:00:00",
            200,
            180,
        ));
    }

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", Value::Array(records)).unwrap();
    file
}

fn test_app(file: &NamedTempFile) -> Router {
    build_router(AppState::new(DatasetCache::new(file.path())))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let file = dataset_file();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = test_app(&file).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_filter_options() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/filters").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record_count"], 9);
    assert_eq!(body["states"], serde_json::json!(["CA", "NY", "TX"]));
    assert_eq!(body["min_date"], "2024-01-01");
    assert_eq!(body["max_date"], "2024-02-10");
}

#[tokio::test]
async fn test_overview_unfiltered() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/overview").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["total_views"], 9);
    assert_eq!(body["metrics"]["unique_users"], 8);

    let top = body["top_shows_by_completion"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["show_name"], "Delta");
}

#[tokio::test]
async fn test_overview_single_day() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/overview?start=2024-01-01").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["total_views"], 2);
    assert_eq!(body["daily_views"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_category_list_matches_nothing() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/overview?states=").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["total_views"], 0);
    assert_eq!(body["metrics"]["avg_completion_rate"], Value::Null);
    assert!(body["genre_stats"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_overview_category_filter() {
    let file = dataset_file();
    let (_, body) = get_json(test_app(&file), "/api/overview?states=CA,TX&genres=Drama").await;
    assert_eq!(body["metrics"]["total_views"], 2);
    assert_eq!(body["metrics"]["unique_users"], 1);
}

#[tokio::test]
async fn test_invalid_date_is_bad_request() {
    let file = dataset_file();
    let (status, _) = get_json(test_app(&file), "/api/overview?start=01-01-2024").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_single_show_analysis() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/shows?show=Alpha").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["show"]["total_views"], 2);
    assert_eq!(body["show"]["unique_viewers"], 1);
    assert_eq!(body["completion"]["average"], 75.0);
    assert_eq!(body["completion"]["median"], 75.0);
}

#[tokio::test]
async fn test_unknown_show_is_not_found() {
    let file = dataset_file();
    let (status, _) = get_json(test_app(&file), "/api/shows?show=Nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_all_shows_analysis() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/shows").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("show").is_none());
    let metrics = body["show_metrics"].as_array().unwrap();
    assert_eq!(metrics[0]["show_name"], "Delta");
    assert_eq!(metrics[0]["total_views"], 5);
}

#[tokio::test]
async fn test_users_report() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/users").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["total_users"], 8);

    let top = body["top_users"].as_array().unwrap();
    assert_eq!(top[0]["user_id"], "u1");
    assert_eq!(top[0]["total_views"], 2);
    assert_eq!(top[0]["avg_completion_rate"], 75.0);
}

#[tokio::test]
async fn test_users_report_with_user_filters() {
    let file = dataset_file();
    let (status, body) = get_json(
        test_app(&file),
        "/api/users?min_views=2&min_completion=0&max_completion=100",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["total_users"], 1);
    assert_eq!(body["segment_matrix"].as_array().unwrap().len(), 16);
}

#[tokio::test]
async fn test_users_report_nan_bound_is_open() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/users?min_completion=NaN").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["total_users"], 8);
}

#[tokio::test]
async fn test_users_report_empty_is_zeroed() {
    let file = dataset_file();
    let (status, body) = get_json(test_app(&file), "/api/users?min_views=50").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["total_users"], 0);
    assert_eq!(body["overview"]["avg_completion"], 0.0);
    assert!(body["top_users"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_on_cold_cache() {
    let file = dataset_file();
    let app = test_app(&file);

    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(get_json(app.clone(), "/api/overview")))
        .collect();
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["total_views"], 9);
    }
}

#[tokio::test]
async fn test_missing_dataset_is_server_error() {
    let app = build_router(AppState::new(DatasetCache::new("/no/such/file.json")));
    let (status, _) = get_json(app, "/api/overview").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
