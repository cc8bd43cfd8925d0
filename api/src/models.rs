use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One user viewing one show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEvent {
    pub user_id: String,
    pub show_name: String,
    pub show_genre: String,
    pub show_type: String,
    pub show_rating: String,
    pub show_description: String,
    pub show_duration_seconds: u64,
    pub user_watch_duration_seconds: u64,
    pub state: String,
    pub created_date: NaiveDate,
    pub created_at: NaiveDateTime,
    /// `None` when the show has a zero duration.
    pub completion_rate: Option<f64>,
}

/// An immutable, ordered set of events. Filtering produces a new table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewTable {
    events: Vec<ViewEvent>,
}

impl ViewTable {
    pub fn new(events: Vec<ViewEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[ViewEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ViewEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<ViewEvent> for ViewTable {
    fn from_iter<I: IntoIterator<Item = ViewEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ViewTable {
    type Item = &'a ViewEvent;
    type IntoIter = std::slice::Iter<'a, ViewEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Filter option lists and bounds, derived once when the dataset is loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetMetadata {
    pub record_count: usize,
    pub states: Vec<String>,
    pub genres: Vec<String>,
    pub show_types: Vec<String>,
    pub show_names: Vec<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl DatasetMetadata {
    pub fn from_table(table: &ViewTable) -> Self {
        let mut states = Vec::new();
        let mut genres = Vec::new();
        let mut show_types = Vec::new();
        let mut show_names = Vec::new();

        for event in table {
            states.push(event.state.clone());
            genres.push(event.show_genre.clone());
            show_types.push(event.show_type.clone());
            show_names.push(event.show_name.clone());
        }

        for values in [&mut states, &mut genres, &mut show_types, &mut show_names] {
            values.sort();
            values.dedup();
        }

        Self {
            record_count: table.len(),
            states,
            genres,
            show_types,
            show_names,
            min_date: table.iter().map(|e| e.created_date).min(),
            max_date: table.iter().map(|e| e.created_date).max(),
        }
    }
}

/// The loaded source: base table plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    table: ViewTable,
    metadata: DatasetMetadata,
}

impl Dataset {
    pub fn new(table: ViewTable) -> Self {
        let metadata = DatasetMetadata::from_table(&table);
        Self { table, metadata }
    }

    pub fn table(&self) -> &ViewTable {
        &self.table
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }
}
