//! Fixture builders for unit tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::loader::completion_rate;
use crate::models::ViewEvent;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
}

#[allow(clippy::too_many_arguments)]
pub fn event(
    user_id: &str,
    show_name: &str,
    genre: &str,
    show_type: &str,
    state: &str,
    created_at: &str,
    duration: u64,
    watch: u64,
) -> ViewEvent {
    let created_at = timestamp(created_at);
    ViewEvent {
        user_id: user_id.to_string(),
        show_name: show_name.to_string(),
        show_genre: genre.to_string(),
        show_type: show_type.to_string(),
        show_rating: "TV-14".to_string(),
        show_description: format!("{} description", show_name),
        show_duration_seconds: duration,
        user_watch_duration_seconds: watch,
        state: state.to_string(),
        created_date: created_at.date(),
        created_at,
        completion_rate: completion_rate(watch, duration),
    }
}

/// Minimal event for tests that only care about user, show and completion.
pub fn view(user_id: &str, show_name: &str, duration: u64, watch: u64) -> ViewEvent {
    event(
        user_id,
        show_name,
        "Drama",
        "Series",
        "CA",
        "2024-01-01T12:00:00",
        duration,
        watch,
    )
}
