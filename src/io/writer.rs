use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use regex::Regex;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::config::{ConfigError, PipelineConfig};
use crate::error::PipelineError;
use crate::plan::cell::{parse_date_text, CellValue};
use crate::plan::project::{rows_to_table, ProjectedRow};
use crate::plan::table::{Snapshot, Table};

pub const UPLOAD_SHEET: &str = "Sheet1";

/// `{dir}/{stem}_{suffix}_{YYYYmmdd_HHMMSS}.xlsx`
pub fn output_path(stem: &str, dir: &Path, suffix: &str, now: NaiveDateTime) -> PathBuf {
    dir.join(format!("{stem}_{suffix}_{}.xlsx", now.format("%Y%m%d_%H%M%S")))
}

/// Header fills and the columns that must be written as text.
#[derive(Debug, Clone)]
pub struct SheetStyle {
    fixed_header: u32,
    date_header: u32,
    date_formats: Vec<String>,
    day_column: Regex,
    text_columns: Vec<String>,
}

impl SheetStyle {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let mut text_columns = vec!["sku_no".to_string()];
        text_columns.extend(config.columns.sku.iter().cloned());
        text_columns.extend(config.columns.spu.iter().cloned());
        Ok(Self {
            fixed_header: config.styles.fixed_header_rgb()?,
            date_header: config.styles.date_header_rgb()?,
            date_formats: config.date.input_formats.clone(),
            day_column: Regex::new(r"^day\d+$")
                .map_err(|err| ConfigError::Invalid(format!("day column pattern: {err}")))?,
            text_columns,
        })
    }

    fn is_date_header(&self, header: &str) -> bool {
        self.day_column.is_match(header) || parse_date_text(header, &self.date_formats).is_ok()
    }

    fn header_format(&self, header: &str) -> Format {
        let fill = if self.is_date_header(header) {
            self.date_header
        } else {
            self.fixed_header
        };
        let format = base_format().set_bold().set_background_color(Color::RGB(fill));
        if self.is_date_header(header) {
            format
        } else {
            format.set_font_color(Color::White)
        }
    }

    fn is_text_column(&self, header: &str) -> bool {
        self.text_columns.iter().any(|column| column == header)
    }
}

fn base_format() -> Format {
    Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
}

/// Upload table as a single `Sheet1`.
pub fn write_upload_xlsx(rows: &[ProjectedRow], path: &Path, style: &SheetStyle) -> Result<(), PipelineError> {
    write_table_xlsx(&rows_to_table(rows), UPLOAD_SHEET, path, style)
}

pub fn write_table_xlsx(table: &Table, sheet_name: &str, path: &Path, style: &SheetStyle) -> Result<(), PipelineError> {
    write_tables_xlsx(&[(sheet_name, table)], path, style)
}

/// Raw sheets of a snapshot, one worksheet each, under their original names.
pub fn write_snapshot_xlsx(snapshot: &Snapshot, path: &Path, style: &SheetStyle) -> Result<(), PipelineError> {
    let tables: Vec<(String, Table)> = snapshot
        .sheets()
        .map(|(_, sheet)| (sheet.name.clone(), Table::from_sheet(sheet)))
        .collect();
    let borrowed: Vec<(&str, &Table)> = tables
        .iter()
        .map(|(name, table)| (name.as_str(), table))
        .collect();
    write_tables_xlsx(&borrowed, path, style)
}

pub fn write_tables_xlsx(tables: &[(&str, &Table)], path: &Path, style: &SheetStyle) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let write_err = |err: XlsxError| PipelineError::Write {
        path: path.display().to_string(),
        message: err.to_string(),
    };

    let mut workbook = Workbook::new();
    for (sheet_name, table) in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*sheet_name).map_err(write_err)?;
        fill_worksheet(worksheet, table, style).map_err(write_err)?;
    }
    workbook.save(path).map_err(write_err)?;
    info!(
        path = %path.display(),
        sheets = tables.len(),
        rows = tables.iter().map(|(_, table)| table.len()).sum::<usize>(),
        "wrote workbook"
    );
    Ok(())
}

fn fill_worksheet(worksheet: &mut Worksheet, table: &Table, style: &SheetStyle) -> Result<(), XlsxError> {
    let cell_format = base_format();
    let text_format = base_format().set_num_format("@");

    for (col, header) in table.columns.iter().enumerate() {
        let col = column_number(col)?;
        worksheet.write_string_with_format(0, col, header, &style.header_format(header))?;
        let width = if style.is_text_column(header) { 20.0 } else { 12.0 };
        worksheet.set_column_width(col, width)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col_idx, header) in table.columns.iter().enumerate() {
            let col = column_number(col_idx)?;
            let cell = row.get(col_idx);
            if style.is_text_column(header) {
                let text = cell.map(CellValue::display_text).unwrap_or_default();
                worksheet.write_string_with_format(row_num, col, text, &text_format)?;
                continue;
            }
            match cell {
                None | Some(CellValue::Empty) => {
                    worksheet.write_blank(row_num, col, &cell_format)?;
                }
                Some(CellValue::Number(value)) => {
                    worksheet.write_number_with_format(row_num, col, *value, &cell_format)?;
                }
                Some(CellValue::Bool(value)) => {
                    worksheet.write_boolean_with_format(row_num, col, *value, &cell_format)?;
                }
                Some(other) => {
                    worksheet.write_string_with_format(row_num, col, other.display_text(), &cell_format)?;
                }
            }
        }
    }
    Ok(())
}

fn column_number(idx: usize) -> Result<u16, XlsxError> {
    u16::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Upload rows as CSV with the same 64-column header.
pub fn write_upload_csv<W: Write>(rows: &[ProjectedRow], writer: W) -> Result<(), PipelineError> {
    let table = rows_to_table(rows);
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |err: csv::Error| PipelineError::Write {
        path: "<csv>".to_string(),
        message: err.to_string(),
    };
    out.write_record(&table.columns).map_err(csv_err)?;
    for row in &table.rows {
        out.write_record(row.iter().map(|cell| match cell {
            CellValue::Number(value) => format_number(*value),
            other => other.display_text(),
        }))
        .map_err(csv_err)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_upload_csv_file(rows: &[ProjectedRow], path: &Path) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let file = fs::File::create(path)?;
    write_upload_csv(rows, file)?;
    info!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn output_path_stamps_suffix_and_time() {
        let now = NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        let path = output_path("plan", Path::new("out"), "上传格式", now);
        assert_eq!(path, Path::new("out").join("plan_上传格式_20261017_090503.xlsx"));
    }

    #[test]
    fn csv_numbers_render_without_trailing_zero() {
        let mut days = [0.0; crate::plan::DAY_WINDOW];
        days[0] = 100.0;
        days[1] = 2.5;
        let rows = vec![ProjectedRow {
            sku_no: "001".into(),
            color: "红色".into(),
            size: "L".into(),
            days,
            dt: "2026-10-16".into(),
        }];
        let mut buffer = Vec::new();
        write_upload_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("sku_no,color,size,day1,day2"));
        assert!(lines.next().unwrap().starts_with("001,红色,L,100,2.5,0"));
    }
}
