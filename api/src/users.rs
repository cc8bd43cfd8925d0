//! User behaviour: per-user rollups and everything derived from them.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::filters::{filter_users, NumericRange, UserMetric};
use crate::models::{ViewEvent, ViewTable};
use crate::stats::{
    distinct_count, group_by, histogram, mean, round2, HistogramBin, SECONDS_PER_HOUR,
};

pub const TOP_USERS_LIMIT: usize = 20;
pub const USER_HISTOGRAM_BINS: usize = 20;

/// One row per user over a filtered event set.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRollup {
    pub user_id: String,
    pub total_views: u64,
    pub total_watch_time: u64,
    pub total_watch_hours: f64,
    /// `None` when none of the user's events has a defined completion rate.
    pub avg_completion_rate: Option<f64>,
    pub unique_shows: u64,
    pub unique_genres: u64,
    pub first_view_date: NaiveDate,
    pub last_view_date: NaiveDate,
    /// Whole days between first and last view; 0 for a single-day user.
    pub days_active: i64,
    /// State on the user's first event in table order.
    pub user_state: String,
}

impl UserRollup {
    fn from_events(user_id: String, events: &[&ViewEvent]) -> Option<Self> {
        let first = events.first()?;
        let total_watch_time: u64 = events.iter().map(|e| e.user_watch_duration_seconds).sum();
        let first_view_date = events.iter().map(|e| e.created_date).min()?;
        let last_view_date = events.iter().map(|e| e.created_date).max()?;

        Some(Self {
            user_id,
            total_views: events.len() as u64,
            total_watch_time,
            total_watch_hours: round2(total_watch_time as f64 / SECONDS_PER_HOUR),
            avg_completion_rate: mean(events.iter().filter_map(|e| e.completion_rate)),
            unique_shows: distinct_count(events.iter().map(|e| e.show_name.as_str())),
            unique_genres: distinct_count(events.iter().map(|e| e.show_genre.as_str())),
            first_view_date,
            last_view_date,
            days_active: (last_view_date - first_view_date).num_days(),
            user_state: first.state.clone(),
        })
    }

    pub fn viewer_segment(&self) -> ViewerSegment {
        ViewerSegment::classify(self.total_views)
    }

    pub fn completion_segment(&self) -> CompletionSegment {
        CompletionSegment::classify(self.avg_completion_rate)
    }

    pub fn engagement_level(&self) -> EngagementLevel {
        EngagementLevel::classify(self.total_views)
    }

    pub fn lifecycle_stage(&self) -> LifecycleStage {
        LifecycleStage::classify(self.days_active)
    }
}

/// Collapse events into one rollup per user, most views first and then by id.
pub fn user_rollups(table: &ViewTable) -> Vec<UserRollup> {
    let mut users: Vec<UserRollup> = group_by(table, |e| e.user_id.clone())
        .into_iter()
        .filter_map(|(user_id, events)| UserRollup::from_events(user_id, &events))
        .collect();

    users.sort_by(|a, b| {
        b.total_views
            .cmp(&a.total_views)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    users
}

/// Advanced per-user thresholds. Unset fields do not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFilters {
    pub min_views: Option<u64>,
    pub min_completion: Option<f64>,
    pub max_completion: Option<f64>,
    pub min_watch_hours: Option<f64>,
}

impl UserFilters {
    pub fn ranges(&self) -> Vec<NumericRange<UserMetric>> {
        let mut ranges = Vec::new();
        if let Some(min) = self.min_views {
            ranges.push(NumericRange::at_least(UserMetric::TotalViews, min as f64));
        }
        match (self.min_completion, self.max_completion) {
            (None, None) => {}
            (min, max) => ranges.push(NumericRange::new(
                UserMetric::AvgCompletionRate,
                min.unwrap_or(f64::NEG_INFINITY),
                max.unwrap_or(f64::INFINITY),
            )),
        }
        if let Some(min) = self.min_watch_hours {
            ranges.push(NumericRange::at_least(UserMetric::TotalWatchHours, min));
        }
        ranges
    }

    pub fn apply(&self, users: &[UserRollup]) -> Vec<UserRollup> {
        filter_users(users, &self.ranges())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViewerSegment {
    #[serde(rename = "Light Viewer")]
    Light,
    #[serde(rename = "Casual Viewer")]
    Casual,
    #[serde(rename = "Regular Viewer")]
    Regular,
    #[serde(rename = "Heavy Viewer")]
    Heavy,
}

impl ViewerSegment {
    pub const ALL: [ViewerSegment; 4] = [Self::Light, Self::Casual, Self::Regular, Self::Heavy];

    pub fn classify(total_views: u64) -> Self {
        if total_views >= 20 {
            Self::Heavy
        } else if total_views >= 10 {
            Self::Regular
        } else if total_views >= 5 {
            Self::Casual
        } else {
            Self::Light
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "Light Viewer",
            Self::Casual => "Casual Viewer",
            Self::Regular => "Regular Viewer",
            Self::Heavy => "Heavy Viewer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompletionSegment {
    Browser,
    Selective,
    Engaged,
    Completionist,
}

impl CompletionSegment {
    pub const ALL: [CompletionSegment; 4] = [
        Self::Browser,
        Self::Selective,
        Self::Engaged,
        Self::Completionist,
    ];

    /// An undefined rate falls through every threshold to `Browser`.
    pub fn classify(avg_completion_rate: Option<f64>) -> Self {
        match avg_completion_rate {
            Some(rate) if rate >= 80.0 => Self::Completionist,
            Some(rate) if rate >= 60.0 => Self::Engaged,
            Some(rate) if rate >= 40.0 => Self::Selective,
            _ => Self::Browser,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Browser => "Browser",
            Self::Selective => "Selective",
            Self::Engaged => "Engaged",
            Self::Completionist => "Completionist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub fn classify(total_views: u64) -> Self {
        if total_views >= 10 {
            Self::High
        } else if total_views >= 5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleStage {
    #[serde(rename = "Single Day")]
    SingleDay,
    #[serde(rename = "1 Week")]
    OneWeek,
    #[serde(rename = "1 Month")]
    OneMonth,
    #[serde(rename = "3 Months")]
    ThreeMonths,
    #[serde(rename = "3+ Months")]
    LongTerm,
}

impl LifecycleStage {
    pub fn classify(days_active: i64) -> Self {
        if days_active == 0 {
            Self::SingleDay
        } else if days_active <= 7 {
            Self::OneWeek
        } else if days_active <= 30 {
            Self::OneMonth
        } else if days_active <= 90 {
            Self::ThreeMonths
        } else {
            Self::LongTerm
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserOverview {
    pub total_users: u64,
    pub avg_views: f64,
    pub avg_completion: f64,
    pub avg_watch_hours: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StateUsers {
    pub user_state: String,
    pub user_count: u64,
    pub avg_views_per_user: f64,
    pub avg_completion: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EngagementGroup {
    pub engagement_level: EngagementLevel,
    pub user_count: u64,
    pub avg_completion: Option<f64>,
    pub avg_watch_hours: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlyActivity {
    pub hour: u32,
    pub avg_views_per_user: f64,
    pub active_users: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeekdayActivity {
    pub weekday: Weekday,
    pub views: u64,
    pub active_users: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContentDiversity {
    pub user_id: String,
    pub unique_shows: u64,
    pub unique_genres: u64,
    pub total_views: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SegmentCell {
    pub viewer_segment: ViewerSegment,
    pub completion_segment: CompletionSegment,
    pub user_count: u64,
    pub avg_watch_hours: Option<f64>,
    pub avg_unique_shows: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ViewerSegmentStats {
    pub viewer_segment: ViewerSegment,
    pub user_count: u64,
    pub avg_views: f64,
    pub avg_completion: Option<f64>,
    pub avg_watch_hours: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CohortSummary {
    pub cohort_month: String,
    pub total_users: u64,
    pub avg_lifetime_days: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LifecycleStats {
    pub lifecycle_stage: LifecycleStage,
    pub user_count: u64,
    pub avg_views: f64,
    pub avg_completion: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserDistributions {
    pub views: Vec<HistogramBin>,
    pub completion: Vec<HistogramBin>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UsersReport {
    pub overview: UserOverview,
    pub distributions: UserDistributions,
    pub users_by_state: Vec<StateUsers>,
    pub engagement: Vec<EngagementGroup>,
    pub hourly_activity: Vec<HourlyActivity>,
    pub weekday_activity: Vec<WeekdayActivity>,
    pub content_diversity: Vec<ContentDiversity>,
    pub segment_matrix: Vec<SegmentCell>,
    pub viewer_segments: Vec<ViewerSegmentStats>,
    pub cohorts: Vec<CohortSummary>,
    pub lifecycle: Vec<LifecycleStats>,
    pub top_users: Vec<UserRollup>,
}

/// Headline numbers; every mean falls back to 0 when there are no users.
pub fn user_overview(users: &[UserRollup]) -> UserOverview {
    UserOverview {
        total_users: users.len() as u64,
        avg_views: mean(users.iter().map(|u| u.total_views as f64)).unwrap_or(0.0),
        avg_completion: mean(users.iter().filter_map(|u| u.avg_completion_rate)).unwrap_or(0.0),
        avg_watch_hours: mean(users.iter().map(|u| u.total_watch_hours)).unwrap_or(0.0),
    }
}

pub fn user_distributions(users: &[UserRollup]) -> UserDistributions {
    let views: Vec<f64> = users.iter().map(|u| u.total_views as f64).collect();
    let completion: Vec<f64> = users.iter().filter_map(|u| u.avg_completion_rate).collect();
    UserDistributions {
        views: histogram(&views, USER_HISTOGRAM_BINS),
        completion: histogram(&completion, USER_HISTOGRAM_BINS),
    }
}

pub fn users_by_state(users: &[UserRollup]) -> Vec<StateUsers> {
    let mut states: Vec<StateUsers> = group_by(users, |u| u.user_state.clone())
        .into_iter()
        .map(|(user_state, group)| StateUsers {
            user_state,
            user_count: group.len() as u64,
            avg_views_per_user: mean(group.iter().map(|u| u.total_views as f64)).unwrap_or(0.0),
            avg_completion: mean(group.iter().filter_map(|u| u.avg_completion_rate)),
        })
        .collect();

    states.sort_by(|a, b| b.user_count.cmp(&a.user_count));
    states
}

/// Engagement levels, largest group first.
pub fn engagement_distribution(users: &[UserRollup]) -> Vec<EngagementGroup> {
    let mut groups: Vec<EngagementGroup> = group_by(users, |u| u.engagement_level())
        .into_iter()
        .map(|(engagement_level, group)| EngagementGroup {
            engagement_level,
            user_count: group.len() as u64,
            avg_completion: mean(group.iter().filter_map(|u| u.avg_completion_rate)),
            avg_watch_hours: mean(group.iter().map(|u| u.total_watch_hours)).unwrap_or(0.0),
        })
        .collect();

    groups.sort_by(|a, b| {
        b.user_count
            .cmp(&a.user_count)
            .then_with(|| b.engagement_level.cmp(&a.engagement_level))
    });
    groups
}

/// Distinct active users per hour of day, and the mean number of views those
/// users made in that hour.
pub fn hourly_activity(table: &ViewTable) -> Vec<HourlyActivity> {
    let per_user_hour = group_by(table, |e| (e.user_id.clone(), e.created_at.hour()));

    let mut hours: Vec<HourlyActivity> =
        group_by(per_user_hour, |((_, hour), _)| *hour)
            .into_iter()
            .map(|(hour, cells)| {
                let active_users = cells
                    .iter()
                    .map(|((user, _), _)| user.as_str())
                    .collect::<HashSet<_>>()
                    .len() as u64;
                HourlyActivity {
                    hour,
                    avg_views_per_user: mean(cells.iter().map(|(_, events)| events.len() as f64))
                        .unwrap_or(0.0),
                    active_users,
                }
            })
            .collect();

    hours.sort_by_key(|h| h.hour);
    hours
}

/// Views and distinct users per weekday, Monday first.
pub fn weekday_activity(table: &ViewTable) -> Vec<WeekdayActivity> {
    let mut days: Vec<WeekdayActivity> = group_by(table, |e| e.created_at.weekday())
        .into_iter()
        .map(|(weekday, events)| WeekdayActivity {
            weekday,
            views: events.len() as u64,
            active_users: distinct_count(events.iter().map(|e| e.user_id.as_str())),
        })
        .collect();

    days.sort_by_key(|d| d.weekday.num_days_from_monday());
    days
}

pub fn content_diversity(users: &[UserRollup]) -> Vec<ContentDiversity> {
    users
        .iter()
        .map(|u| ContentDiversity {
            user_id: u.user_id.clone(),
            unique_shows: u.unique_shows,
            unique_genres: u.unique_genres,
            total_views: u.total_views,
        })
        .collect()
}

/// Full viewer × completion grid in band order, empty cells included.
pub fn segment_matrix(users: &[UserRollup]) -> Vec<SegmentCell> {
    let mut cells = Vec::with_capacity(16);
    for viewer_segment in ViewerSegment::ALL {
        for completion_segment in CompletionSegment::ALL {
            let group: Vec<&UserRollup> = users
                .iter()
                .filter(|u| {
                    u.viewer_segment() == viewer_segment
                        && u.completion_segment() == completion_segment
                })
                .collect();
            cells.push(SegmentCell {
                viewer_segment,
                completion_segment,
                user_count: group.len() as u64,
                avg_watch_hours: mean(group.iter().map(|u| u.total_watch_hours)),
                avg_unique_shows: mean(group.iter().map(|u| u.unique_shows as f64)),
            });
        }
    }
    cells
}

/// Characteristics of each populated viewer segment, lightest band first.
pub fn viewer_segments(users: &[UserRollup]) -> Vec<ViewerSegmentStats> {
    let mut segments: Vec<ViewerSegmentStats> = group_by(users, |u| u.viewer_segment())
        .into_iter()
        .map(|(viewer_segment, group)| ViewerSegmentStats {
            viewer_segment,
            user_count: group.len() as u64,
            avg_views: mean(group.iter().map(|u| u.total_views as f64)).unwrap_or(0.0),
            avg_completion: mean(group.iter().filter_map(|u| u.avg_completion_rate)),
            avg_watch_hours: mean(group.iter().map(|u| u.total_watch_hours)).unwrap_or(0.0),
        })
        .collect();

    segments.sort_by_key(|s| s.viewer_segment);
    segments
}

/// Users grouped by the month of their first view in `table`.
pub fn cohort_summary(table: &ViewTable) -> Vec<CohortSummary> {
    let spans: Vec<(NaiveDate, NaiveDate)> = group_by(table, |e| e.user_id.clone())
        .into_iter()
        .filter_map(|(_, events)| {
            let first = events.iter().map(|e| e.created_date).min()?;
            let last = events.iter().map(|e| e.created_date).max()?;
            Some((first, last))
        })
        .collect();

    let mut cohorts: Vec<CohortSummary> =
        group_by(spans, |(first, _)| first.format("%Y-%m").to_string())
            .into_iter()
            .map(|(cohort_month, group)| CohortSummary {
                cohort_month,
                total_users: group.len() as u64,
                avg_lifetime_days: mean(
                    group
                        .iter()
                        .map(|(first, last)| (*last - *first).num_days() as f64),
                )
                .unwrap_or(0.0),
            })
            .collect();

    cohorts.sort_by(|a, b| a.cohort_month.cmp(&b.cohort_month));
    cohorts
}

pub fn lifecycle_distribution(users: &[UserRollup]) -> Vec<LifecycleStats> {
    let mut stages: Vec<LifecycleStats> = group_by(users, |u| u.lifecycle_stage())
        .into_iter()
        .map(|(lifecycle_stage, group)| LifecycleStats {
            lifecycle_stage,
            user_count: group.len() as u64,
            avg_views: mean(group.iter().map(|u| u.total_views as f64)).unwrap_or(0.0),
            avg_completion: mean(group.iter().filter_map(|u| u.avg_completion_rate)),
        })
        .collect();

    stages.sort_by_key(|s| s.lifecycle_stage);
    stages
}

/// Most views first; ties keep rollup order.
pub fn top_users(users: &[UserRollup], limit: usize) -> Vec<UserRollup> {
    let mut ranked = users.to_vec();
    ranked.sort_by(|a, b| b.total_views.cmp(&a.total_views));
    ranked.truncate(limit);
    ranked
}

/// Full user analysis over already-filtered events.
///
/// Cohorts and hourly activity look at the events directly; everything else is
/// computed from the rollups that survive `user_filters`.
pub fn calculate_users(table: &ViewTable, user_filters: &UserFilters) -> UsersReport {
    let users = user_filters.apply(&user_rollups(table));
    tracing::debug!(
        "user analysis over {} events, {} users after filters",
        table.len(),
        users.len()
    );

    UsersReport {
        overview: user_overview(&users),
        distributions: user_distributions(&users),
        users_by_state: users_by_state(&users),
        engagement: engagement_distribution(&users),
        hourly_activity: hourly_activity(table),
        weekday_activity: weekday_activity(table),
        content_diversity: content_diversity(&users),
        segment_matrix: segment_matrix(&users),
        viewer_segments: viewer_segments(&users),
        cohorts: cohort_summary(table),
        lifecycle: lifecycle_distribution(&users),
        top_users: top_users(&users, TOP_USERS_LIMIT),
    }
}
