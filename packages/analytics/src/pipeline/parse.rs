//! Row re-hydration.

use crate::types::value::{Record, Value, ValueRule};

/// A visible output column and how to re-hydrate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputColumn<'a> {
    pub alias: &'a str,
    pub rule: ValueRule,
}

/// Pick the visible columns out of raw rows, in column order.
///
/// Columns missing from a row come back as null.
pub fn parse_rows(columns: &[OutputColumn<'_>], rows: Vec<Record>) -> Vec<Record> {
    rows.into_iter()
        .map(|mut row| {
            columns
                .iter()
                .map(|column| {
                    let raw = row.shift_remove(column.alias).unwrap_or(Value::Null);
                    (column.alias.to_string(), column.rule.apply(raw))
                })
                .collect()
        })
        .collect()
}
