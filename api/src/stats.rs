//! Small aggregation helpers shared by the report modules.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::models::ViewEvent;

pub const SECONDS_PER_HOUR: f64 = 3600.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Middle value, averaging the two middle values for even-sized input.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.into_iter().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Descending order for optional metrics, undefined values last.
pub fn desc_defined_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Group items by key, keeping groups in first-seen order and items in input
/// order within each group. Callers sort the result explicitly.
pub fn group_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: FnMut(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();

    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }

    groups
}

pub fn distinct_count<'a, T: Eq + Hash + ?Sized + 'a>(values: impl IntoIterator<Item = &'a T>) -> u64 {
    values.into_iter().collect::<HashSet<_>>().len() as u64
}

/// Count, sum, distinct users and means over a group of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStats {
    pub views: u64,
    pub total_watch_seconds: u64,
    pub unique_users: u64,
    pub avg_watch_seconds: Option<f64>,
    /// Mean over events with a defined completion rate.
    pub avg_completion: Option<f64>,
}

impl EventStats {
    pub fn from_events(events: &[&ViewEvent]) -> Self {
        let total_watch_seconds = events.iter().map(|e| e.user_watch_duration_seconds).sum();
        Self {
            views: events.len() as u64,
            total_watch_seconds,
            unique_users: distinct_count(events.iter().map(|e| e.user_id.as_str())),
            avg_watch_seconds: mean(events.iter().map(|e| e.user_watch_duration_seconds as f64)),
            avg_completion: mean(events.iter().filter_map(|e| e.completion_rate)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Equal-width bins spanning the observed range; the last bin includes its
/// upper edge. Empty input yields no bins.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let Some((lo, hi)) = min_max(values.iter().copied()) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if lo == hi {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: values.len() as u64,
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0u64; bins];
    for &v in values {
        let i = (((v - lo) / width) as usize).min(bins - 1);
        counts[i] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count,
        })
        .collect()
}
