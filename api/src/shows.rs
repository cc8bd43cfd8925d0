use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::{ViewEvent, ViewTable};
use crate::overview::COMPLETION_HISTOGRAM_BINS;
use crate::stats::{
    desc_defined_first, distinct_count, group_by, histogram, mean, median, min_max, round1,
    EventStats, HistogramBin,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShowsReport {
    /// Present when a single show was selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<ShowDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionSummary>,
    pub show_metrics: Vec<ShowMetrics>,
    pub hourly_views: Vec<HourlyViews>,
    pub geo_stats: Vec<GeoStats>,
    pub daily_trends: Vec<DailyTrend>,
    pub weekly_trends: Vec<WeeklyTrend>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShowDetails {
    pub show_name: String,
    pub genre: String,
    pub show_type: String,
    pub rating: String,
    pub description: String,
    pub duration_minutes: f64,
    pub total_views: u64,
    pub unique_viewers: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompletionSummary {
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub distribution: Vec<HistogramBin>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShowMetrics {
    pub show_name: String,
    pub total_views: u64,
    pub unique_viewers: u64,
    pub avg_completion: Option<f64>,
    pub avg_watch_time_minutes: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlyViews {
    pub hour: u32,
    pub views: u64,
    pub avg_completion: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeoStats {
    pub state: String,
    pub views: u64,
    pub unique_viewers: u64,
    pub avg_completion: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub views: u64,
    pub unique_viewers: u64,
    pub avg_completion: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeeklyTrend {
    pub year: i32,
    pub week: u32,
    pub week_label: String,
    pub views: u64,
    pub avg_completion: Option<f64>,
}

/// Descriptive attributes of `show_name` plus its view counts within `table`.
/// Attributes come from the first matching event.
pub fn show_details(table: &ViewTable, show_name: &str) -> Option<ShowDetails> {
    let events: Vec<&ViewEvent> = table.iter().filter(|e| e.show_name == show_name).collect();
    let first = events.first()?;

    Some(ShowDetails {
        show_name: first.show_name.clone(),
        genre: first.show_genre.clone(),
        show_type: first.show_type.clone(),
        rating: first.show_rating.clone(),
        description: first.show_description.clone(),
        duration_minutes: first.show_duration_seconds as f64 / 60.0,
        total_views: events.len() as u64,
        unique_viewers: distinct_count(events.iter().map(|e| e.user_id.as_str())),
    })
}

pub fn completion_summary(table: &ViewTable) -> CompletionSummary {
    let rates: Vec<f64> = table.iter().filter_map(|e| e.completion_rate).collect();
    let bounds = min_max(rates.iter().copied());

    CompletionSummary {
        average: mean(rates.iter().copied()),
        median: median(rates.iter().copied()),
        max: bounds.map(|(_, hi)| hi),
        min: bounds.map(|(lo, _)| lo),
        distribution: histogram(&rates, COMPLETION_HISTOGRAM_BINS),
    }
}

/// One row per show, most viewed first.
pub fn show_metrics(table: &ViewTable) -> Vec<ShowMetrics> {
    let mut shows: Vec<ShowMetrics> = group_by(table, |e| e.show_name.clone())
        .into_iter()
        .map(|(show_name, events)| {
            let stats = EventStats::from_events(&events);
            ShowMetrics {
                show_name,
                total_views: stats.views,
                unique_viewers: stats.unique_users,
                avg_completion: stats.avg_completion.map(round1),
                avg_watch_time_minutes: stats.avg_watch_seconds.map(|s| round1(s / 60.0)),
            }
        })
        .collect();

    shows.sort_by(|a, b| b.total_views.cmp(&a.total_views));
    shows
}

pub fn hourly_views(table: &ViewTable) -> Vec<HourlyViews> {
    let mut hours: Vec<HourlyViews> = group_by(table, |e| e.created_at.hour())
        .into_iter()
        .map(|(hour, events)| {
            let stats = EventStats::from_events(&events);
            HourlyViews {
                hour,
                views: stats.views,
                avg_completion: stats.avg_completion,
            }
        })
        .collect();

    hours.sort_by_key(|h| h.hour);
    hours
}

pub fn geo_stats(table: &ViewTable) -> Vec<GeoStats> {
    let mut states: Vec<GeoStats> = group_by(table, |e| e.state.clone())
        .into_iter()
        .map(|(state, events)| {
            let stats = EventStats::from_events(&events);
            GeoStats {
                state,
                views: stats.views,
                unique_viewers: stats.unique_users,
                avg_completion: stats.avg_completion,
            }
        })
        .collect();

    states.sort_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| desc_defined_first(a.avg_completion, b.avg_completion))
    });
    states
}

pub fn daily_trends(table: &ViewTable) -> Vec<DailyTrend> {
    let mut days: Vec<DailyTrend> = group_by(table, |e| e.created_date)
        .into_iter()
        .map(|(date, events)| {
            let stats = EventStats::from_events(&events);
            DailyTrend {
                date,
                views: stats.views,
                unique_viewers: stats.unique_users,
                avg_completion: stats.avg_completion,
            }
        })
        .collect();

    days.sort_by_key(|d| d.date);
    days
}

/// Weekly buckets keyed by ISO week-year and ISO week, so the days around New
/// Year land in the same bucket as the rest of their week. This departs from
/// pairing the calendar year with the ISO week, which puts 2024-12-30 in
/// "2024-W01" and 2025-01-02 in "2025-W01".
pub fn weekly_trends(table: &ViewTable) -> Vec<WeeklyTrend> {
    let mut weeks: Vec<WeeklyTrend> = group_by(table, |e| {
        let iso = e.created_date.iso_week();
        (iso.year(), iso.week())
    })
    .into_iter()
    .map(|((year, week), events)| {
        let stats = EventStats::from_events(&events);
        WeeklyTrend {
            year,
            week,
            week_label: format!("{}-W{:02}", year, week),
            views: stats.views,
            avg_completion: stats.avg_completion,
        }
    })
    .collect();

    weeks.sort_by_key(|w| (w.year, w.week));
    weeks
}

/// Build the detailed analysis, narrowed to `show_name` when one is given.
pub fn calculate_shows(table: &ViewTable, show_name: Option<&str>) -> ShowsReport {
    let selected: ViewTable;
    let (table, show, completion) = match show_name {
        Some(name) => {
            selected = table
                .iter()
                .filter(|e| e.show_name == name)
                .cloned()
                .collect();
            let show = show_details(&selected, name);
            let completion = completion_summary(&selected);
            (&selected, show, Some(completion))
        }
        None => (table, None, None),
    };

    ShowsReport {
        show,
        completion,
        show_metrics: show_metrics(table),
        hourly_views: hourly_views(table),
        geo_stats: geo_stats(table),
        daily_trends: daily_trends(table),
        weekly_trends: weekly_trends(table),
    }
}
