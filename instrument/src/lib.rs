//! Column-table capture of search trace events.
//!
//! A [`TableSubscriber`] turns every `tracing` event into one row of the table
//! named after the event's target (`aceei_iteration`, `tabu_iteration`,
//! `tabu_neighbors`, `commit`, ...). Columns appear as fields are first seen;
//! rows that lack a field are padded with the column's zero value.
//!
//! Tables live behind an explicit [`TraceRecorder`] handle rather than a
//! global, so concurrent runs each get their own recorder.
//!
//! ```
//! let recorder = instrument::TraceRecorder::new();
//! tracing::subscriber::with_default(recorder.subscriber(), || {
//!     tracing::info!(target: "tabu_iteration", iteration = 1u64, norm = 2.0f64);
//! });
//! let tables = recorder.drain();
//! assert_eq!(tables.table("tabu_iteration").map(|t| t.row_count), Some(1));
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Id, Level, Metadata, Subscriber};

// === COLUMNS ===

/// A column of typed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedColumn {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl TypedColumn {
    pub fn len(&self) -> usize {
        match self {
            TypedColumn::U64(v) => v.len(),
            TypedColumn::I64(v) => v.len(),
            TypedColumn::F64(v) => v.len(),
            TypedColumn::Bool(v) => v.len(),
            TypedColumn::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pad_to(&mut self, rows: usize) {
        let missing = rows.saturating_sub(self.len());
        if missing == 0 {
            return;
        }
        match self {
            TypedColumn::U64(v) => v.resize(rows, 0),
            TypedColumn::I64(v) => v.resize(rows, 0),
            TypedColumn::F64(v) => v.resize(rows, 0.0),
            TypedColumn::Bool(v) => v.resize(rows, false),
            TypedColumn::Str(v) => v.resize(rows, String::new()),
        }
    }
}

// === TABLES ===

/// One table per event target; columns keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventTable {
    pub columns: BTreeMap<String, TypedColumn>,
    pub row_count: usize,
}

impl EventTable {
    fn align(&mut self) {
        for column in self.columns.values_mut() {
            column.pad_to(self.row_count);
        }
    }

    /// Unsigned column by name. A column keeps the type of the first value
    /// recorded under that name.
    pub fn u64s(&self, name: &str) -> Option<&[u64]> {
        match self.columns.get(name) {
            Some(TypedColumn::U64(v)) => Some(v),
            _ => None,
        }
    }

    pub fn i64s(&self, name: &str) -> Option<&[i64]> {
        match self.columns.get(name) {
            Some(TypedColumn::I64(v)) => Some(v),
            _ => None,
        }
    }

    pub fn f64s(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name) {
            Some(TypedColumn::F64(v)) => Some(v),
            _ => None,
        }
    }

    pub fn bools(&self, name: &str) -> Option<&[bool]> {
        match self.columns.get(name) {
            Some(TypedColumn::Bool(v)) => Some(v),
            _ => None,
        }
    }

    pub fn strs(&self, name: &str) -> Option<&[String]> {
        match self.columns.get(name) {
            Some(TypedColumn::Str(v)) => Some(v),
            _ => None,
        }
    }
}

/// Every table captured by one recorder, keyed by target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceTables {
    pub tables: BTreeMap<String, EventTable>,
}

impl TraceTables {
    pub fn table(&self, target: &str) -> Option<&EventTable> {
        self.tables.get(target)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes `{dir}/{run_name}.json`, creating `dir` if needed.
    pub fn write_json(&self, dir: &Path, run_name: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", sanitize(run_name)));
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Replace anything but ASCII alphanumerics with `_` and cap the length.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(60)
        .collect()
}

// === RECORDER ===

/// Shared handle to a set of tables. Clones refer to the same tables.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    tables: Arc<Mutex<TraceTables>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriber feeding this recorder, capturing `DEBUG` and above.
    pub fn subscriber(&self) -> TableSubscriber {
        self.subscriber_with_level(Level::DEBUG)
    }

    pub fn subscriber_with_level(&self, max_level: Level) -> TableSubscriber {
        TableSubscriber {
            recorder: self.clone(),
            max_level,
        }
    }

    /// Installs this recorder's subscriber for the current thread until the
    /// guard drops.
    pub fn capture(&self) -> DefaultGuard {
        tracing::subscriber::set_default(self.subscriber())
    }

    /// Takes the recorded tables, leaving the recorder empty.
    pub fn drain(&self) -> TraceTables {
        std::mem::take(&mut *self.lock())
    }

    /// Copy of the tables recorded so far.
    pub fn snapshot(&self) -> TraceTables {
        self.lock().clone()
    }

    pub fn clear(&self) {
        *self.lock() = TraceTables::default();
    }

    fn lock(&self) -> MutexGuard<'_, TraceTables> {
        // A panic while recording leaves the tables usable
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// === SUBSCRIBER ===

/// Visitor that writes event fields into one table row.
struct RowVisitor<'a> {
    table: &'a mut EventTable,
    row: usize,
}

impl RowVisitor<'_> {
    fn column(&mut self, field: &Field, empty: impl FnOnce(usize) -> TypedColumn) -> &mut TypedColumn {
        let row = self.row;
        self.table
            .columns
            .entry(field.name().to_string())
            .or_insert_with(|| empty(row))
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if let TypedColumn::U64(v) = self.column(field, |rows| TypedColumn::U64(vec![0; rows])) {
            v.push(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if let TypedColumn::I64(v) = self.column(field, |rows| TypedColumn::I64(vec![0; rows])) {
            v.push(value);
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let TypedColumn::F64(v) = self.column(field, |rows| TypedColumn::F64(vec![0.0; rows])) {
            v.push(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if let TypedColumn::Bool(v) = self.column(field, |rows| TypedColumn::Bool(vec![false; rows])) {
            v.push(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if let TypedColumn::Str(v) = self.column(field, |rows| TypedColumn::Str(vec![String::new(); rows])) {
            v.push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// Tracing subscriber that appends each event as a row of its target's table.
/// Spans are accepted but not recorded.
pub struct TableSubscriber {
    recorder: TraceRecorder,
    max_level: Level,
}

impl Subscriber for TableSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= self.max_level
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target().to_string();
        let mut tables = self.recorder.lock();
        let table = tables.tables.entry(target).or_default();

        table.align();
        let row = table.row_count;
        event.record(&mut RowVisitor { table, row });
        table.row_count += 1;
        table.align();
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}
