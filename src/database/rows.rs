//! Row-set materialization.

use super::types::{SqlValue, TypeMapper};
use crate::error::ServerError;
use futures_util::stream::TryStreamExt;
use serde_json::{json, Map, Value};
use tiberius::{QueryItem, QueryStream};
use tracing::warn;

/// A materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in result order.
    pub columns: Vec<String>,

    /// Row values, one entry per column.
    pub rows: Vec<Vec<SqlValue>>,

    /// Whether rows beyond the limit were dropped.
    pub truncated: bool,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            truncated: false,
        }
    }

    /// Append a row as read. [`RowSet::json_rows`] drops values beyond the
    /// column count.
    pub fn push(&mut self, row: Vec<SqlValue>) {
        self.rows.push(row);
    }

    /// Row objects keyed by column name.
    pub fn json_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (column, value) in self.columns.iter().zip(row) {
                    object.insert(column.clone(), value.to_json());
                }
                Value::Object(object)
            })
            .collect()
    }

    /// `{data: [row...], count: N}`.
    pub fn to_json(&self) -> Value {
        let data = self.json_rows();
        let count = data.len();
        json!({ "data": data, "count": count })
    }
}

/// Drain the first result set of a stream into a [`RowSet`].
///
/// At most `max_rows` rows are kept; later result sets are ignored.
pub async fn collect_rows(
    mut stream: QueryStream<'_>,
    max_rows: usize,
) -> Result<RowSet, ServerError> {
    let mut result: Option<RowSet> = None;
    let mut finished_first = false;

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                if result.is_some() {
                    finished_first = true;
                    continue;
                }
                result = Some(RowSet::new(
                    meta.columns().iter().map(|c| c.name().to_string()).collect(),
                ));
            }
            QueryItem::Row(row) => {
                if finished_first {
                    continue;
                }
                let Some(set) = result.as_mut() else { continue };
                if set.rows.len() >= max_rows {
                    set.truncated = true;
                    continue;
                }
                let values = (0..set.columns.len())
                    .map(|idx| TypeMapper::extract_column(&row, idx))
                    .collect();
                set.push(values);
            }
        }
    }

    let set = result.unwrap_or_default();
    if set.truncated {
        warn!("Row set truncated at {} rows", max_rows);
    }
    Ok(set)
}

/// First cell of every result set, in order.
pub async fn collect_first_cells(
    mut stream: QueryStream<'_>,
) -> Result<Vec<Option<String>>, ServerError> {
    let mut cells: Vec<Option<String>> = Vec::new();
    let mut awaiting_row = false;

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(_) => {
                cells.push(None);
                awaiting_row = true;
            }
            QueryItem::Row(row) => {
                if awaiting_row {
                    if let Some(slot) = cells.last_mut() {
                        *slot = TypeMapper::extract_column(&row, 0).into_payload();
                    }
                    awaiting_row = false;
                }
            }
        }
    }

    Ok(cells)
}
