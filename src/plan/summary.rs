use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Stage};
use crate::plan::cell::{format_date, CellValue};
use crate::plan::record::SkuMap;
use crate::plan::table::Table;

pub const SKU_COLUMN: &str = "sku编码";
pub const SPU_COLUMN: &str = "spu编码";
pub const NAME_COLUMN: &str = "商品名称";
pub const SPEC_COLUMN: &str = "规格";
pub const FIRST_DATE_COLUMN: &str = "第一批时间";
pub const FIRST_QUANTITY_COLUMN: &str = "第一批数量";
pub const TOTAL_COLUMN: &str = "总交货量";

/// The wide per-date summary sheet: one row per SKU, one column per distinct
/// delivery date across all SKUs (ascending), plus first-batch and total
/// columns. Dates are not limited to the upload window.
pub fn build_summary(records: &SkuMap, config: &PipelineConfig) -> Result<Table, PipelineError> {
    let output_format = config.date.output_format.as_str();
    let render = |date: NaiveDate| {
        format_date(date, output_format).ok_or_else(|| {
            PipelineError::transformation(
                Stage::Summary,
                format!("output date format '{output_format}' cannot render {date}"),
            )
        })
    };

    let dates: BTreeSet<NaiveDate> = records
        .values()
        .flat_map(|record| record.dates.keys().copied())
        .collect();

    let mut columns: Vec<String> = [
        SKU_COLUMN,
        SPU_COLUMN,
        NAME_COLUMN,
        SPEC_COLUMN,
        FIRST_DATE_COLUMN,
        FIRST_QUANTITY_COLUMN,
        TOTAL_COLUMN,
    ]
    .iter()
    .map(|name| name.to_string())
    .collect();
    for date in &dates {
        columns.push(render(*date)?);
    }

    let mut table = Table::new(columns);
    for record in records.values() {
        let (first_date, first_quantity) = match record.first_delivery() {
            Some((date, quantity)) => (CellValue::Text(render(date)?), CellValue::Number(quantity)),
            None => (CellValue::Empty, CellValue::Number(0.0)),
        };
        let mut row = vec![
            CellValue::Text(record.sku_code.clone()),
            CellValue::Text(record.fields.spu.clone()),
            CellValue::Text(record.fields.name.clone()),
            CellValue::Text(record.fields.spec.clone()),
            first_date,
            first_quantity,
            CellValue::Number(record.total()),
        ];
        row.extend(dates.iter().map(|date| match record.dates.get(date) {
            Some(quantity) => CellValue::Number(*quantity),
            None => CellValue::Empty,
        }));
        table.rows.push(row);
    }
    Ok(table)
}
