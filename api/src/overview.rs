use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{ViewEvent, ViewTable};
use crate::stats::{
    desc_defined_first, group_by, histogram, mean, EventStats, HistogramBin, SECONDS_PER_HOUR,
};

pub const COMPLETION_HISTOGRAM_BINS: usize = 20;
/// Shows with fewer qualifying events are left out of completion rankings.
pub const MIN_VIEWS_FOR_RANKING: u64 = 5;
pub const TOP_SHOWS_LIMIT: usize = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OverviewReport {
    pub metrics: OverviewMetrics,
    pub daily_views: Vec<DailyViews>,
    pub genre_stats: Vec<GenreStats>,
    pub state_stats: Vec<StateStats>,
    pub completion_distribution: Vec<HistogramBin>,
    pub top_shows_by_completion: Vec<ShowCompletion>,
    pub type_completion: Vec<TypeCompletion>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OverviewMetrics {
    pub total_views: u64,
    pub unique_users: u64,
    pub avg_completion_rate: Option<f64>,
    pub total_watch_hours: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub total_views: u64,
    pub total_watch_time: u64,
    pub unique_users: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenreStats {
    pub genre: String,
    pub views: u64,
    pub avg_watch_time: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StateStats {
    pub state: String,
    pub views: u64,
    pub unique_users: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShowCompletion {
    pub show_name: String,
    pub avg_completion: f64,
    pub views: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TypeCompletion {
    pub show_type: String,
    pub avg_completion: Option<f64>,
    pub views: u64,
}

pub fn overview_metrics(table: &ViewTable) -> OverviewMetrics {
    let events: Vec<&ViewEvent> = table.iter().collect();
    let stats = EventStats::from_events(&events);
    OverviewMetrics {
        total_views: stats.views,
        unique_users: stats.unique_users,
        avg_completion_rate: stats.avg_completion,
        total_watch_hours: stats.total_watch_seconds as f64 / SECONDS_PER_HOUR,
    }
}

pub fn daily_views(table: &ViewTable) -> Vec<DailyViews> {
    let mut days: Vec<DailyViews> = group_by(table, |e| e.created_date)
        .into_iter()
        .map(|(date, events)| {
            let stats = EventStats::from_events(&events);
            DailyViews {
                date,
                total_views: stats.views,
                total_watch_time: stats.total_watch_seconds,
                unique_users: stats.unique_users,
            }
        })
        .collect();

    days.sort_by_key(|d| d.date);
    days
}

pub fn genre_stats(table: &ViewTable) -> Vec<GenreStats> {
    let mut genres: Vec<GenreStats> = group_by(table, |e| e.show_genre.clone())
        .into_iter()
        .map(|(genre, events)| {
            let stats = EventStats::from_events(&events);
            GenreStats {
                genre,
                views: stats.views,
                avg_watch_time: stats.avg_watch_seconds,
            }
        })
        .collect();

    genres.sort_by(|a, b| b.views.cmp(&a.views));
    genres
}

pub fn state_stats(table: &ViewTable) -> Vec<StateStats> {
    let mut states: Vec<StateStats> = group_by(table, |e| e.state.clone())
        .into_iter()
        .map(|(state, events)| {
            let stats = EventStats::from_events(&events);
            StateStats {
                state,
                views: stats.views,
                unique_users: stats.unique_users,
            }
        })
        .collect();

    states.sort_by(|a, b| b.views.cmp(&a.views));
    states
}

/// Distribution of per-event completion rates; undefined rates are skipped.
pub fn completion_distribution(table: &ViewTable) -> Vec<HistogramBin> {
    let rates: Vec<f64> = table.iter().filter_map(|e| e.completion_rate).collect();
    histogram(&rates, COMPLETION_HISTOGRAM_BINS)
}

/// Highest mean completion first, among shows with at least `min_views`
/// events carrying a defined completion rate. Ties keep first-seen order.
pub fn top_shows_by_completion(
    table: &ViewTable,
    min_views: u64,
    limit: usize,
) -> Vec<ShowCompletion> {
    let mut shows: Vec<ShowCompletion> = group_by(
        table.iter().filter(|e| e.completion_rate.is_some()),
        |e| e.show_name.clone(),
    )
    .into_iter()
    .filter(|(_, events)| events.len() as u64 >= min_views)
    .filter_map(|(show_name, events)| {
        let avg_completion = mean(events.iter().filter_map(|e| e.completion_rate))?;
        Some(ShowCompletion {
            show_name,
            avg_completion,
            views: events.len() as u64,
        })
    })
    .collect();

    shows.sort_by(|a, b| b.avg_completion.total_cmp(&a.avg_completion));
    shows.truncate(limit);
    shows
}

pub fn type_completion(table: &ViewTable) -> Vec<TypeCompletion> {
    let mut types: Vec<TypeCompletion> = group_by(table, |e| e.show_type.clone())
        .into_iter()
        .map(|(show_type, events)| {
            let stats = EventStats::from_events(&events);
            TypeCompletion {
                show_type,
                avg_completion: stats.avg_completion,
                views: stats.views,
            }
        })
        .collect();

    types.sort_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| desc_defined_first(a.avg_completion, b.avg_completion))
    });
    types
}

pub fn calculate_overview(table: &ViewTable) -> OverviewReport {
    OverviewReport {
        metrics: overview_metrics(table),
        daily_views: daily_views(table),
        genre_stats: genre_stats(table),
        state_stats: state_stats(table),
        completion_distribution: completion_distribution(table),
        top_shows_by_completion: top_shows_by_completion(
            table,
            MIN_VIEWS_FOR_RANKING,
            TOP_SHOWS_LIMIT,
        ),
        type_completion: type_completion(table),
    }
}
