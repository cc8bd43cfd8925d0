use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::{MalformedInputError, Result};
use crate::models::{Dataset, ViewEvent, ViewTable};
use crate::stats::round2;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// User ids show up as strings in some exports and integers in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Text(String),
    Number(i64),
}

impl RawUserId {
    fn into_string(self) -> String {
        match self {
            RawUserId::Text(s) => s,
            RawUserId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawViewEvent {
    user_id: Option<RawUserId>,
    show_name: Option<String>,
    show_genre: Option<String>,
    show_type: Option<String>,
    show_rating: Option<String>,
    show_description: Option<String>,
    show_duration_seconds: Option<u64>,
    user_watch_duration_seconds: Option<u64>,
    state: Option<String>,
    created_date: Option<String>,
    created_at: Option<String>,
}

/// Percentage watched, rounded to 2 decimals. Not clamped at 100.
pub fn completion_rate(watch_seconds: u64, duration_seconds: u64) -> Option<f64> {
    if duration_seconds == 0 {
        return None;
    }
    Some(round2(
        watch_seconds as f64 / duration_seconds as f64 * 100.0,
    ))
}

fn required<T>(value: Option<T>, index: usize, field: &'static str) -> Result<T> {
    value.ok_or_else(|| MalformedInputError::missing_field(index, field))
}

impl RawViewEvent {
    fn into_event(self, index: usize) -> Result<ViewEvent> {
        let created_at_raw = required(self.created_at, index, "created_at")?;
        let created_at = NaiveDateTime::parse_from_str(&created_at_raw, TIMESTAMP_FORMAT)
            .map_err(|_| MalformedInputError::invalid_timestamp(index, "created_at", &created_at_raw))?;

        let created_date = match self.created_date {
            Some(raw) => NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .map_err(|_| MalformedInputError::invalid_date(index, "created_date", &raw))?,
            None => created_at.date(),
        };

        let show_duration_seconds =
            required(self.show_duration_seconds, index, "show_duration_seconds")?;
        let user_watch_duration_seconds = required(
            self.user_watch_duration_seconds,
            index,
            "user_watch_duration_seconds",
        )?;

        if show_duration_seconds == 0 {
            tracing::warn!("record {} has zero show duration, completion rate undefined", index);
        }

        Ok(ViewEvent {
            user_id: required(self.user_id, index, "user_id")?.into_string(),
            show_name: required(self.show_name, index, "show_name")?,
            show_genre: required(self.show_genre, index, "show_genre")?,
            show_type: required(self.show_type, index, "show_type")?,
            show_rating: required(self.show_rating, index, "show_rating")?,
            show_description: required(self.show_description, index, "show_description")?,
            show_duration_seconds,
            user_watch_duration_seconds,
            state: required(self.state, index, "state")?,
            created_date,
            created_at,
            completion_rate: completion_rate(user_watch_duration_seconds, show_duration_seconds),
        })
    }
}

/// Parse a JSON array of viewing records into a dataset.
pub fn parse_dataset(json: &str) -> Result<Dataset> {
    let raw: Vec<RawViewEvent> = serde_json::from_str(json)?;

    let events = raw
        .into_iter()
        .enumerate()
        .map(|(index, record)| record.into_event(index))
        .collect::<Result<Vec<_>>>()?;

    Ok(Dataset::new(ViewTable::new(events)))
}

/// Read and parse the dataset at `path`.
pub fn load(path: &Path) -> Result<Dataset> {
    let started = Instant::now();
    let json = std::fs::read_to_string(path).map_err(|e| MalformedInputError::io(path, e))?;
    let dataset = parse_dataset(&json)?;

    let meta = dataset.metadata();
    tracing::info!(
        "loaded {} records from {} in {:?} ({} states, {} genres, {} show types, {} shows)",
        meta.record_count,
        path.display(),
        started.elapsed(),
        meta.states.len(),
        meta.genres.len(),
        meta.show_types.len(),
        meta.show_names.len()
    );

    Ok(dataset)
}

/// Process-lifetime memoization of the loaded dataset.
///
/// The first successful `get` parses the source; every later call returns the
/// same `Arc`. Concurrent first calls serialize on `init` so the file is read
/// once. A failed load leaves the slot empty.
///
/// `get` on a cold cache blocks on file I/O; async callers should load it
/// up front or from a blocking task.
#[derive(Debug)]
pub struct DatasetCache {
    path: PathBuf,
    slot: OnceLock<Arc<Dataset>>,
    init: Mutex<()>,
    attempts: AtomicUsize,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: OnceLock::new(),
            init: Mutex::new(()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Number of times the source has been read, successful or not.
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn get(&self) -> Result<Arc<Dataset>> {
        if let Some(dataset) = self.slot.get() {
            return Ok(dataset.clone());
        }

        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(dataset) = self.slot.get() {
            return Ok(dataset.clone());
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        let dataset = Arc::new(load(&self.path)?);
        let _ = self.slot.set(dataset.clone());
        Ok(dataset)
    }
}
