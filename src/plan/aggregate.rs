//! Deduplicator: collapse rows sharing a SKU key into one.
//!
//! Two entry points. [`aggregate_rows`] works on typed upload rows;
//! [`aggregate_table`] works on any named-column table (the legacy summary
//! sheet, or an upload file that was already merged by hand) and decides
//! which columns to sum from their headers.

use indexmap::map::Entry;
use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{ConfigError, PipelineConfig};
use crate::error::{PipelineError, Stage};
use crate::plan::cell::{coerce_number, format_sku, parse_date_text, CellValue};
use crate::plan::project::{ProjectedRow, FIXED_LEADING};
use crate::plan::table::Table;

#[derive(Debug, Clone)]
pub struct AggregateRules {
    key_aliases: Vec<String>,
    date_formats: Vec<String>,
    day_column: Regex,
    quantity_column: Regex,
}

impl AggregateRules {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let mut key_aliases = vec![FIXED_LEADING[0].to_string()];
        for alias in &config.columns.sku {
            if !key_aliases.contains(alias) {
                key_aliases.push(alias.clone());
            }
        }
        let quantity_column = Regex::new(&config.columns.quantity_pattern)
            .map_err(|err| ConfigError::Invalid(format!("columns.quantity_pattern: {err}")))?;
        let day_column = Regex::new(r"^day\d+$")
            .map_err(|err| ConfigError::Invalid(format!("day column pattern: {err}")))?;
        Ok(Self {
            key_aliases,
            date_formats: config.date.input_formats.clone(),
            day_column,
            quantity_column,
        })
    }

    /// First key alias present in `columns`.
    pub fn key_column(&self, columns: &[String]) -> Option<usize> {
        self.key_aliases
            .iter()
            .find_map(|alias| columns.iter().position(|column| column == alias))
    }

    pub fn is_summable(&self, column: &str) -> bool {
        self.day_column.is_match(column)
            || self.quantity_column.is_match(column)
            || parse_date_text(column, &self.date_formats).is_ok()
    }
}

/// Group rows by trimmed SKU key in first-seen order. Summable columns are
/// summed with non-numeric cells counted as 0; every other column keeps the
/// first non-blank value in its group.
pub fn aggregate_table(table: &Table, rules: &AggregateRules) -> Result<Table, PipelineError> {
    let key_idx = rules.key_column(&table.columns).ok_or_else(|| {
        PipelineError::transformation(
            Stage::Aggregate,
            format!(
                "no SKU key column among [{}]",
                table.columns.join(", ")
            ),
        )
    })?;
    let summable: Vec<bool> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| idx != key_idx && rules.is_summable(column))
        .collect();
    debug!(
        key = %table.columns[key_idx],
        summed = summable.iter().filter(|flag| **flag).count(),
        "aggregating table"
    );

    let width = table.columns.len();
    let mut groups: IndexMap<String, Vec<CellValue>> = IndexMap::new();
    for row in &table.rows {
        let key = row.get(key_idx).map(format_sku).unwrap_or_default();
        match groups.entry(key) {
            Entry::Vacant(slot) => {
                let cells = (0..width)
                    .map(|idx| {
                        let cell = row.get(idx).cloned().unwrap_or(CellValue::Empty);
                        if summable[idx] {
                            CellValue::Number(coerce_number(&cell))
                        } else {
                            cell
                        }
                    })
                    .collect();
                slot.insert(cells);
            }
            Entry::Occupied(mut slot) => {
                debug!(sku = %slot.key(), "collapsing duplicate row");
                let merged = slot.get_mut();
                for (idx, target) in merged.iter_mut().enumerate() {
                    let Some(cell) = row.get(idx) else { continue };
                    if summable[idx] {
                        let sum = coerce_number(target) + coerce_number(cell);
                        *target = CellValue::Number(sum);
                    } else if target.is_blank() && !cell.is_blank() {
                        *target = cell.clone();
                    }
                }
            }
        }
    }

    info!(rows_in = table.rows.len(), rows_out = groups.len(), "aggregated table");
    Ok(Table {
        columns: table.columns.clone(),
        rows: groups.into_values().collect(),
    })
}

/// Typed form of [`aggregate_table`] for upload rows.
pub fn aggregate_rows(rows: &[ProjectedRow]) -> Vec<ProjectedRow> {
    let mut groups: IndexMap<String, ProjectedRow> = IndexMap::new();
    for row in rows {
        match groups.entry(row.sku_no.trim().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
            }
            Entry::Occupied(mut slot) => {
                let merged = slot.get_mut();
                for (target, quantity) in merged.days.iter_mut().zip(row.days.iter()) {
                    if quantity.is_finite() {
                        *target += quantity;
                    }
                }
                for (target, value) in [
                    (&mut merged.color, &row.color),
                    (&mut merged.size, &row.size),
                    (&mut merged.dt, &row.dt),
                ] {
                    if target.is_empty() {
                        target.clone_from(value);
                    }
                }
            }
        }
    }
    if groups.len() != rows.len() {
        debug!(rows_in = rows.len(), rows_out = groups.len(), "collapsed duplicate upload rows");
    }
    groups.into_values().collect()
}
