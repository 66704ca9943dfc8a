use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::{debug, info};

use crate::config::SheetConfig;
use crate::error::PipelineError;
use crate::plan::cell::{excel_serial_to_cell, CellValue};
use crate::plan::table::{SheetTable, Snapshot};

/// Read the recognized sheets of a workbook (xlsx, xlsm, xls, ods).
///
/// Cached cell values are used as-is, so formulas arrive already evaluated.
/// Sheets whose name matches no configured alias are discarded.
pub fn load_workbook(path: &Path, sheets: &SheetConfig) -> Result<Snapshot, PipelineError> {
    let mut workbook = open(path)?;
    let mut snapshot = Snapshot::default();
    for name in workbook.sheet_names() {
        let Some(role) = sheets.role_of(&name) else {
            debug!(sheet = %name, "discarding unrecognized sheet");
            continue;
        };
        let table = read_sheet(&mut workbook, path, &name)?;
        debug!(
            sheet = %name,
            role = role.label(),
            rows = table.rows.len(),
            columns = table.headers.len(),
            "loaded sheet"
        );
        if !snapshot.insert(role, table) {
            debug!(sheet = %name, role = role.label(), "role already filled, ignoring sheet");
        }
    }
    info!(
        path = %path.display(),
        sheets = snapshot.sheets().count(),
        "loaded workbook"
    );
    Ok(snapshot)
}

/// First sheet whose name is in `names`, tried in order.
pub fn load_named_sheet(path: &Path, names: &[&str]) -> Result<Option<SheetTable>, PipelineError> {
    let mut workbook = open(path)?;
    let available = workbook.sheet_names();
    let Some(name) = names
        .iter()
        .find_map(|wanted| available.iter().find(|name| name.trim() == *wanted).cloned())
    else {
        return Ok(None);
    };
    read_sheet(&mut workbook, path, &name).map(Some)
}

fn open(path: &Path) -> Result<Sheets<BufReader<File>>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceMissing {
            sheet: path.display().to_string(),
            cause: "file not found".to_string(),
        });
    }
    open_workbook_auto(path).map_err(|err| PipelineError::Workbook {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

fn read_sheet(workbook: &mut Sheets<BufReader<File>>, path: &Path, name: &str) -> Result<SheetTable, PipelineError> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|err| PipelineError::Workbook {
            path: path.display().to_string(),
            message: format!("sheet '{name}': {err}"),
        })?;
    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect();
    Ok(clean_table(name, rows))
}

fn data_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(text) => CellValue::Text(text.clone()),
        Data::Float(value) => CellValue::Number(*value),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::DateTime(value) => excel_serial_to_cell(value.as_f64()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => CellValue::Text(text.clone()),
    }
}

/// Header is the first non-empty row. Empty rows are dropped, as are columns
/// whose header and cells are all blank.
pub fn clean_table(name: &str, rows: Vec<Vec<CellValue>>) -> SheetTable {
    let mut rows = rows
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.is_blank()));
    let Some(header_row) = rows.next() else {
        return SheetTable::new(name, Vec::new(), Vec::new());
    };
    let body: Vec<Vec<CellValue>> = rows.collect();

    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header_row.len()))
        .max()
        .unwrap_or(0);
    let keep: Vec<usize> = (0..width)
        .filter(|idx| {
            let header_blank = header_row.get(*idx).map_or(true, CellValue::is_blank);
            let cells_blank = body
                .iter()
                .all(|row| row.get(*idx).map_or(true, CellValue::is_blank));
            !(header_blank && cells_blank)
        })
        .collect();

    let headers = keep
        .iter()
        .map(|idx| {
            header_row
                .get(*idx)
                .map(CellValue::display_text)
                .unwrap_or_default()
        })
        .collect();
    let body = body
        .into_iter()
        .map(|row| {
            keep.iter()
                .map(|idx| match row.get(*idx) {
                    Some(CellValue::Text(text)) if text.trim().is_empty() => CellValue::Empty,
                    Some(cell) => cell.clone(),
                    None => CellValue::Empty,
                })
                .collect()
        })
        .collect();
    SheetTable::new(name, headers, body)
}
