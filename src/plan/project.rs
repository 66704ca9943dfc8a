use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Stage};
use crate::plan::cell::{format_date, CellValue};
use crate::plan::record::SkuMap;
use crate::plan::table::Table;

pub const DAY_WINDOW: usize = 60;

pub const FIXED_LEADING: [&str; 3] = ["sku_no", "color", "size"];
pub const WATERMARK_COLUMN: &str = "dt";

/// One SKU in the upload table. `days[i]` is the quantity arriving on
/// `today + i`, so `days[0]` is the `day1` column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedRow {
    pub sku_no: String,
    pub color: String,
    pub size: String,
    #[serde(serialize_with = "serialize_days")]
    pub days: [f64; DAY_WINDOW],
    pub dt: String,
}

fn serialize_days<S: serde::Serializer>(days: &[f64; DAY_WINDOW], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(days.iter())
}

impl ProjectedRow {
    pub fn total(&self) -> f64 {
        self.days.iter().sum()
    }

    /// Quantity in the 1-based `dayN` column.
    pub fn day(&self, n: usize) -> f64 {
        n.checked_sub(1)
            .and_then(|idx| self.days.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn to_cells(&self) -> Vec<CellValue> {
        let mut cells = Vec::with_capacity(DAY_WINDOW + 4);
        cells.push(CellValue::Text(self.sku_no.clone()));
        cells.push(CellValue::Text(self.color.clone()));
        cells.push(CellValue::Text(self.size.clone()));
        cells.extend(self.days.iter().map(|qty| CellValue::Number(*qty)));
        cells.push(CellValue::Text(self.dt.clone()));
        cells
    }
}

pub fn day_column(n: usize) -> String {
    format!("day{n}")
}

/// `sku_no, color, size, day1..day60, dt`.
pub fn upload_columns() -> Vec<String> {
    FIXED_LEADING
        .iter()
        .map(|name| name.to_string())
        .chain((1..=DAY_WINDOW).map(day_column))
        .chain(std::iter::once(WATERMARK_COLUMN.to_string()))
        .collect()
}

/// Project every record onto the day window starting at `today`.
///
/// `today` itself is `day1` and `today + 59` is `day60`; dates before today or
/// past the window are dropped.
///
/// One row per SKU in map order, including SKUs whose dates all fall outside
/// the window.
pub fn project(records: &SkuMap, today: NaiveDate, output_format: &str) -> Result<Vec<ProjectedRow>, PipelineError> {
    let dt = watermark(today, output_format)?;
    let window = window_dates(today)?;

    let rows: Vec<ProjectedRow> = records
        .values()
        .map(|record| {
            let mut days = [0.0; DAY_WINDOW];
            for (slot, date) in days.iter_mut().zip(&window) {
                let quantity = record.dates.get(date).copied().unwrap_or(0.0);
                *slot = if quantity.is_finite() { quantity } else { 0.0 };
            }
            ProjectedRow {
                sku_no: record.sku_code.clone(),
                color: record.fields.color.clone(),
                size: record.fields.size.clone(),
                days,
                dt: dt.clone(),
            }
        })
        .collect();
    info!(skus = rows.len(), %today, dt = %dt, "projected day window");
    Ok(rows)
}

fn window_dates(today: NaiveDate) -> Result<Vec<NaiveDate>, PipelineError> {
    (0..DAY_WINDOW as u64)
        .map(|offset| {
            today.checked_add_days(Days::new(offset)).ok_or_else(|| {
                PipelineError::transformation(Stage::Project, format!("{today} + {offset} days is out of range"))
            })
        })
        .collect()
}

/// `today - 1`, rendered with the output format.
pub fn watermark(today: NaiveDate, output_format: &str) -> Result<String, PipelineError> {
    let yesterday = today
        .pred_opt()
        .ok_or_else(|| PipelineError::transformation(Stage::Project, format!("no day before {today}")))?;
    format_date(yesterday, output_format).ok_or_else(|| {
        PipelineError::transformation(
            Stage::Project,
            format!("output date format '{output_format}' cannot render {yesterday}"),
        )
    })
}

/// Upload rows as a generic table with the full 64-column header.
pub fn rows_to_table(rows: &[ProjectedRow]) -> Table {
    Table {
        columns: upload_columns(),
        rows: rows.iter().map(ProjectedRow::to_cells).collect(),
    }
}
