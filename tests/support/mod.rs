#![allow(dead_code)]

use std::path::Path;

use chrono::{Days, NaiveDate};
use delivery_plan::plan::cell::CellValue;
use delivery_plan::plan::table::{SheetTable, Snapshot};
use rust_xlsxwriter::Workbook;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
}

/// `today + offset` days.
pub fn day(offset: u64) -> NaiveDate {
    today().checked_add_days(Days::new(offset)).expect("date in range")
}

pub fn iso(offset: u64) -> String {
    day(offset).format("%Y-%m-%d").to_string()
}

pub fn text(value: &str) -> CellValue {
    CellValue::text(value)
}

pub fn num(value: f64) -> CellValue {
    CellValue::Number(value)
}

pub fn regular_headers() -> Vec<String> {
    let mut headers = vec!["sku编码".to_string(), "商品名称".to_string(), "规格".to_string()];
    for slot in 1..=5 {
        headers.push(format!("到货批次-{slot}"));
        headers.push(format!("到货数量-{slot}"));
    }
    headers
}

/// A regular-sheet row; `batches` fill the numbered slots from 1.
pub fn regular_row(sku: CellValue, spec: &str, batches: &[(CellValue, CellValue)]) -> Vec<CellValue> {
    let mut row = vec![sku, text("样品"), text(spec)];
    for slot in 0..5 {
        match batches.get(slot) {
            Some((date, qty)) => {
                row.push(date.clone());
                row.push(qty.clone());
            }
            None => {
                row.push(CellValue::Empty);
                row.push(CellValue::Empty);
            }
        }
    }
    row
}

pub fn regular_sheet(rows: Vec<Vec<CellValue>>) -> SheetTable {
    SheetTable::new("常规产品", regular_headers(), rows)
}

/// S-level sheet with `SKU编码, 规格` followed by `date_headers`.
pub fn s_level_sheet(date_headers: &[String], rows: Vec<Vec<CellValue>>) -> SheetTable {
    let mut headers = vec!["SKU编码".to_string(), "规格".to_string()];
    headers.extend(date_headers.iter().cloned());
    SheetTable::new("S级产品", headers, rows)
}

pub fn s_level_row(sku: &str, spec: &str, quantities: &[CellValue]) -> Vec<CellValue> {
    let mut row = vec![text(sku), text(spec)];
    row.extend(quantities.iter().cloned());
    row
}

pub fn snapshot(regular: SheetTable, s_level: SheetTable) -> Snapshot {
    Snapshot {
        regular: Some(regular),
        s_level: Some(s_level),
        summary: None,
    }
}

/// Write `(sheet name, header, rows)` triples to an xlsx file.
pub fn write_workbook(path: &Path, sheets: &[(&str, Vec<String>, Vec<Vec<CellValue>>)]) {
    let mut workbook = Workbook::new();
    for (name, headers, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).expect("sheet name");
        for (col, header) in headers.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, header)
                .expect("header cell");
        }
        for (row_idx, row) in rows.iter().enumerate() {
            let row_num = row_idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    CellValue::Text(value) => {
                        worksheet.write_string(row_num, col, value).expect("text cell");
                    }
                    CellValue::Number(value) => {
                        worksheet.write_number(row_num, col, *value).expect("number cell");
                    }
                    CellValue::Bool(value) => {
                        worksheet.write_boolean(row_num, col, *value).expect("bool cell");
                    }
                    CellValue::Empty => {}
                    other => {
                        worksheet
                            .write_string(row_num, col, other.display_text())
                            .expect("cell");
                    }
                }
            }
        }
    }
    workbook.save(path).expect("workbook saved");
}

/// Standard two-sheet fixture plus an unrelated sheet the loader must ignore.
pub fn write_plan_workbook(path: &Path) {
    let regular_rows = vec![
        regular_row(
            text("001"),
            "颜色:红色,尺码:L",
            &[(text(&iso(0)), num(100.0)), (text(&iso(1)), num(50.0))],
        ),
        regular_row(
            text("002"),
            "颜色：蓝色，尺码：M",
            &[(text(&iso(2)), num(30.0))],
        ),
        regular_row(text("0"), "", &[(text(&iso(0)), num(999.0))]),
    ];
    let s_dates = vec![iso(0), iso(5), iso(70)];
    let s_rows = vec![
        s_level_row("002", "颜色:绿色,尺码:S", &[CellValue::Empty, num(20.0), CellValue::Empty]),
        s_level_row("003", "颜色:黑色", &[num(7.0), CellValue::Empty, num(40.0)]),
    ];
    let mut s_headers = vec!["SKU编码".to_string(), "规格".to_string()];
    s_headers.extend(s_dates);
    write_workbook(
        path,
        &[
            ("说明", vec!["备注".to_string()], vec![vec![text("ignore me")]]),
            ("常规产品", regular_headers(), regular_rows),
            ("S级产品", s_headers, s_rows),
        ],
    );
}
