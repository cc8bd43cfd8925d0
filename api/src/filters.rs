//! Filter predicates over events and per-user rollups.
//!
//! All predicates combine with AND. A category field that is not mentioned is
//! unconstrained, but a field mapped to an empty set admits nothing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{ViewEvent, ViewTable};
use crate::users::UserRollup;

/// Inclusive bounds on `created_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Reversed bounds are swapped.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Range from optional endpoints; one endpoint alone means that single day.
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (Some(s), Some(e)) => Some(Self::new(s, e)),
            (Some(d), None) | (None, Some(d)) => Some(Self::single(d)),
            (None, None) => None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    State,
    Genre,
    ShowType,
    ShowName,
}

impl CategoryField {
    pub fn value<'a>(&self, event: &'a ViewEvent) -> &'a str {
        match self {
            CategoryField::State => &event.state,
            CategoryField::Genre => &event.show_genre,
            CategoryField::ShowType => &event.show_type,
            CategoryField::ShowName => &event.show_name,
        }
    }
}

/// Allowed values per categorical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilters(BTreeMap<CategoryField, BTreeSet<String>>);

impl CategoryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `field` to `values`. An empty iterator excludes every record.
    pub fn with<I, S>(mut self, field: CategoryField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(field, values);
        self
    }

    pub fn set<I, S>(&mut self, field: CategoryField, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(field, values.into_iter().map(Into::into).collect());
    }

    pub fn allowed(&self, field: CategoryField) -> Option<&BTreeSet<String>> {
        self.0.get(&field)
    }

    pub fn matches(&self, event: &ViewEvent) -> bool {
        self.0
            .iter()
            .all(|(field, allowed)| allowed.contains(field.value(event)))
    }
}

/// A record exposing named numeric metrics to range filters.
pub trait NumericRecord {
    type Metric: Copy;

    /// `None` when the metric is undefined for this record.
    fn metric(&self, metric: Self::Metric) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventMetric {
    CompletionRate,
    WatchDurationSeconds,
    ShowDurationSeconds,
}

impl NumericRecord for ViewEvent {
    type Metric = EventMetric;

    fn metric(&self, metric: EventMetric) -> Option<f64> {
        match metric {
            EventMetric::CompletionRate => self.completion_rate,
            EventMetric::WatchDurationSeconds => Some(self.user_watch_duration_seconds as f64),
            EventMetric::ShowDurationSeconds => Some(self.show_duration_seconds as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMetric {
    TotalViews,
    AvgCompletionRate,
    TotalWatchHours,
    UniqueShows,
    DaysActive,
}

impl NumericRecord for UserRollup {
    type Metric = UserMetric;

    fn metric(&self, metric: UserMetric) -> Option<f64> {
        match metric {
            UserMetric::TotalViews => Some(self.total_views as f64),
            UserMetric::AvgCompletionRate => self.avg_completion_rate,
            UserMetric::TotalWatchHours => Some(self.total_watch_hours),
            UserMetric::UniqueShows => Some(self.unique_shows as f64),
            UserMetric::DaysActive => Some(self.days_active as f64),
        }
    }
}

/// Inclusive bounds on one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange<M> {
    pub metric: M,
    pub min: f64,
    pub max: f64,
}

impl<M: Copy> NumericRange<M> {
    /// Reversed bounds are swapped; a NaN bound leaves that side open.
    pub fn new(metric: M, min: f64, max: f64) -> Self {
        let min = if min.is_nan() { f64::NEG_INFINITY } else { min };
        let max = if max.is_nan() { f64::INFINITY } else { max };
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { metric, min, max }
    }

    pub fn at_least(metric: M, min: f64) -> Self {
        Self::new(metric, min, f64::INFINITY)
    }

    pub fn at_most(metric: M, max: f64) -> Self {
        Self::new(metric, f64::NEG_INFINITY, max)
    }

    pub fn contains<R: NumericRecord<Metric = M>>(&self, record: &R) -> bool {
        record
            .metric(self.metric)
            .is_some_and(|v| self.min <= v && v <= self.max)
    }
}

fn within_all<R: NumericRecord>(record: &R, ranges: &[NumericRange<R::Metric>]) -> bool {
    ranges.iter().all(|range| range.contains(record))
}

/// Events passing every supplied predicate, in their original order.
pub fn apply_filters(
    table: &ViewTable,
    date_range: Option<DateRange>,
    category_filters: &CategoryFilters,
    numeric_range_filters: &[NumericRange<EventMetric>],
) -> ViewTable {
    table
        .iter()
        .filter(|event| date_range.map_or(true, |range| range.contains(event.created_date)))
        .filter(|event| category_filters.matches(event))
        .filter(|event| within_all(*event, numeric_range_filters))
        .cloned()
        .collect()
}

/// Per-user rollups passing every range, in their original order.
pub fn filter_users(users: &[UserRollup], ranges: &[NumericRange<UserMetric>]) -> Vec<UserRollup> {
    users
        .iter()
        .filter(|user| within_all(*user, ranges))
        .cloned()
        .collect()
}

/// The set of event-level selections a caller makes in one interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub date_range: Option<DateRange>,
    pub categories: CategoryFilters,
    pub numeric: Vec<NumericRange<EventMetric>>,
}

impl FilterSet {
    pub fn apply(&self, table: &ViewTable) -> ViewTable {
        apply_filters(table, self.date_range, &self.categories, &self.numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{date, event};

    fn sample() -> ViewTable {
        ViewTable::new(vec![
            event("u1", "A", "Drama", "Series", "CA", "2024-01-01T08:00:00", 100, 50),
            event("u2", "B", "Comedy", "Movie", "NY", "2024-01-01T23:59:59", 100, 100),
            event("u1", "C", "Drama", "Movie", "TX", "2024-01-02T00:00:00", 200, 20),
            event("u3", "A", "Drama", "Series", "NY", "2024-01-03T12:00:00", 0, 30),
        ])
    }

    #[test]
    fn test_single_day_range_includes_late_events() {
        let table = sample();
        let filtered = apply_filters(
            &table,
            Some(DateRange::single(date("2024-01-01"))),
            &CategoryFilters::new(),
            &[],
        );
        assert_eq!(filtered.len(), 2);
        assert!(filtered
            .iter()
            .all(|e| e.created_date == date("2024-01-01")));
    }

    #[test]
    fn test_from_bounds_single_endpoint() {
        assert_eq!(
            DateRange::from_bounds(Some(date("2024-01-02")), None),
            Some(DateRange::single(date("2024-01-02")))
        );
        assert_eq!(DateRange::from_bounds(None, None), None);
    }

    #[test]
    fn test_inverted_date_range_is_swapped() {
        let range = DateRange::new(date("2024-01-03"), date("2024-01-01"));
        assert_eq!(range.start, date("2024-01-01"));
        assert!(range.contains(date("2024-01-02")));
    }

    #[test]
    fn test_empty_category_set_yields_nothing() {
        let table = sample();
        let filters = CategoryFilters::new().with(CategoryField::State, Vec::<String>::new());
        assert!(apply_filters(&table, None, &filters, &[]).is_empty());
    }

    #[test]
    fn test_full_category_set_preserves_table() {
        let table = sample();
        let filters = CategoryFilters::new()
            .with(CategoryField::State, ["CA", "NY", "TX"])
            .with(CategoryField::Genre, ["Drama", "Comedy"])
            .with(CategoryField::ShowType, ["Series", "Movie"]);
        assert_eq!(apply_filters(&table, None, &filters, &[]), table);
    }

    #[test]
    fn test_filters_combine_with_and() {
        let table = sample();
        let filters = CategoryFilters::new()
            .with(CategoryField::Genre, ["Drama"])
            .with(CategoryField::State, ["NY", "TX"]);
        let filtered = apply_filters(&table, None, &filters, &[]);
        let shows: Vec<_> = filtered.iter().map(|e| e.show_name.as_str()).collect();
        assert_eq!(shows, vec!["C", "A"]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let table = sample();
        let set = FilterSet {
            date_range: Some(DateRange::new(date("2024-01-01"), date("2024-01-02"))),
            categories: CategoryFilters::new().with(CategoryField::Genre, ["Drama"]),
            numeric: vec![NumericRange::at_least(EventMetric::CompletionRate, 10.0)],
        };
        let once = set.apply(&table);
        let twice = set.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_undefined_completion_fails_completion_range() {
        let table = sample();
        let ranges = [NumericRange::new(EventMetric::CompletionRate, 0.0, 1000.0)];
        let filtered = apply_filters(&table, None, &CategoryFilters::new(), &ranges);
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|e| e.completion_rate.is_some()));
    }

    #[test]
    fn test_inverted_numeric_range_is_swapped() {
        let range = NumericRange::new(EventMetric::WatchDurationSeconds, 60.0, 25.0);
        assert_eq!((range.min, range.max), (25.0, 60.0));
        let table = sample();
        let filtered = apply_filters(&table, None, &CategoryFilters::new(), &[range]);
        let watched: Vec<_> = filtered
            .iter()
            .map(|e| e.user_watch_duration_seconds)
            .collect();
        assert_eq!(watched, vec![50, 30]);
    }

    #[test]
    fn test_nan_bound_is_open() {
        let range = NumericRange::new(EventMetric::CompletionRate, f64::NAN, 60.0);
        assert_eq!((range.min, range.max), (f64::NEG_INFINITY, 60.0));

        let table = sample();
        let filtered = apply_filters(&table, None, &CategoryFilters::new(), &[range]);
        let rates: Vec<_> = filtered.iter().filter_map(|e| e.completion_rate).collect();
        assert_eq!(rates, vec![50.0, 10.0]);

        let unbounded = NumericRange::new(EventMetric::WatchDurationSeconds, f64::NAN, f64::NAN);
        assert_eq!(
            apply_filters(&table, None, &CategoryFilters::new(), &[unbounded]).len(),
            table.len()
        );
    }

    #[test]
    fn test_source_table_is_untouched() {
        let table = sample();
        let before = table.clone();
        let _ = apply_filters(
            &table,
            None,
            &CategoryFilters::new().with(CategoryField::State, ["CA"]),
            &[],
        );
        assert_eq!(table, before);
    }
}
