mod support;

use chrono::NaiveTime;
use delivery_plan::config::PipelineConfig;
use delivery_plan::error::{CellIssue, PipelineError, Stage};
use delivery_plan::plan::cell::CellValue;
use delivery_plan::plan::normalize::{normalize, RegularSheetParser, SLevelSheetParser, SheetParser};
use delivery_plan::plan::table::SheetTable;
use support::*;

fn empty_s_level() -> SheetTable {
    s_level_sheet(&[], Vec::new())
}

#[test]
fn regular_batches_accumulate_by_date() {
    let config = PipelineConfig::default();
    let regular = regular_sheet(vec![regular_row(
        text("001"),
        "颜色:红色,尺码:L",
        &[(text(&iso(0)), num(100.0)), (text(&iso(1)), num(50.0))],
    )]);

    let normalized = normalize(&regular, &empty_s_level(), &config).expect("normalize");
    let record = &normalized.records["001"];
    assert_eq!(record.dates[&day(0)], 100.0);
    assert_eq!(record.dates[&day(1)], 50.0);
    assert_eq!(record.fields.color, "红色");
    assert_eq!(record.fields.size, "L");
    assert!(normalized.warnings.is_empty());
}

#[test]
fn batches_on_the_same_date_are_summed() {
    let config = PipelineConfig::default();
    let regular = regular_sheet(vec![
        regular_row(text("A"), "", &[(text(&iso(3)), num(10.0)), (text(&iso(3)), num(5.0))]),
        regular_row(text("A"), "", &[(text(&iso(3)), num(1.0))]),
    ]);

    let normalized = normalize(&regular, &empty_s_level(), &config).expect("normalize");
    assert_eq!(normalized.records.len(), 1);
    assert_eq!(normalized.records["A"].dates[&day(3)], 16.0);
}

#[test]
fn duplicate_date_headers_both_contribute() {
    let config = PipelineConfig::default();
    let dashed = iso(0);
    let slashed = day(0).format("%Y/%m/%d").to_string();
    let s_level = s_level_sheet(
        &[dashed, slashed],
        vec![s_level_row("003", "", &[num(100.0), num(100.0)])],
    );

    let normalized = normalize(&regular_sheet(Vec::new()), &s_level, &config).expect("normalize");
    assert_eq!(normalized.records["003"].dates[&day(0)], 200.0);
}

#[test]
fn repeated_identical_headers_are_not_collapsed() {
    let config = PipelineConfig::default();
    let s_level = s_level_sheet(
        &[iso(1), iso(1)],
        vec![s_level_row("003", "", &[num(100.0), num(100.0)])],
    );

    let normalized = normalize(&regular_sheet(Vec::new()), &s_level, &config).expect("normalize");
    assert_eq!(normalized.records["003"].dates[&day(1)], 200.0);
}

#[test]
fn sku_in_both_sheets_merges_dates_and_keeps_regular_fields() {
    let config = PipelineConfig::default();
    let regular = regular_sheet(vec![regular_row(
        text("002"),
        "颜色:蓝色",
        &[(text(&iso(2)), num(30.0))],
    )]);
    let s_level = s_level_sheet(
        &[iso(5)],
        vec![s_level_row("002", "颜色:绿色,尺码:S", &[num(20.0)])],
    );

    let normalized = normalize(&regular, &s_level, &config).expect("normalize");
    let record = &normalized.records["002"];
    assert_eq!(record.dates[&day(2)], 30.0);
    assert_eq!(record.dates[&day(5)], 20.0);
    assert_eq!(record.fields.color, "蓝色");
    assert_eq!(record.fields.size, "S", "empty regular size is filled from S-level");
}

#[test]
fn zero_and_blank_skus_are_dropped_from_both_sheets() {
    let config = PipelineConfig::default();
    let regular = regular_sheet(vec![
        regular_row(text("0"), "", &[(text(&iso(0)), num(5.0))]),
        regular_row(num(0.0), "", &[(text(&iso(0)), num(5.0))]),
        regular_row(CellValue::Empty, "", &[(text(&iso(0)), num(5.0))]),
        regular_row(text("  "), "", &[(text(&iso(0)), num(5.0))]),
    ]);
    let s_level = s_level_sheet(
        &[iso(0)],
        vec![s_level_row("0", "", &[num(5.0)]), s_level_row("", "", &[num(5.0)])],
    );

    let normalized = normalize(&regular, &s_level, &config).expect("normalize");
    assert!(normalized.records.is_empty());
    assert_eq!(normalized.sources[0].rows_dropped, 4);
    assert_eq!(normalized.sources[1].rows_dropped, 2);
}

#[test]
fn time_only_batch_date_is_skipped_without_losing_the_row() {
    let config = PipelineConfig::default();
    let time = NaiveTime::from_hms_opt(8, 30, 0).expect("valid time");
    let regular = regular_sheet(vec![regular_row(
        text("001"),
        "",
        &[
            (CellValue::Time(time), num(10.0)),
            (text("09:15"), num(20.0)),
            (text(&iso(4)), num(30.0)),
        ],
    )]);

    let normalized = normalize(&regular, &empty_s_level(), &config).expect("normalize");
    let record = &normalized.records["001"];
    assert_eq!(record.dates.len(), 1);
    assert_eq!(record.dates[&day(4)], 30.0);
    assert_eq!(normalized.warnings.len(), 2);
    assert!(normalized
        .warnings
        .iter()
        .all(|warning| warning.reason == CellIssue::TimeOnly));
    assert_eq!(normalized.warnings[0].column, "到货批次-1");
    assert_eq!(normalized.warnings[0].row, 2);
}

#[test]
fn malformed_cells_are_reported_and_skipped() {
    let config = PipelineConfig::default();
    let regular = regular_sheet(vec![regular_row(
        text("001"),
        "",
        &[
            (text("下周"), num(10.0)),
            (text(&iso(1)), text("TBD")),
            (text(&iso(2)), num(-3.0)),
            (text(&iso(3)), text("1,200")),
        ],
    )]);
    let s_level = s_level_sheet(
        &[iso(6), "备注".to_string()],
        vec![s_level_row("001", "", &[text("n/a"), text("加急")])],
    );

    let normalized = normalize(&regular, &s_level, &config).expect("normalize");
    let reasons: Vec<CellIssue> = normalized.warnings.iter().map(|w| w.reason).collect();
    assert_eq!(
        reasons,
        vec![
            CellIssue::UnparsableDate,
            CellIssue::UnparsableQuantity,
            CellIssue::NegativeQuantity,
            CellIssue::UnparsableQuantity,
        ]
    );
    assert_eq!(normalized.warnings[3].sheet, "S级产品");
    let record = &normalized.records["001"];
    assert_eq!(record.dates.len(), 1);
    assert_eq!(record.dates[&day(3)], 1200.0);
}

#[test]
fn native_date_cells_and_datetime_text_are_accepted() {
    let config = PipelineConfig::default();
    let midday = day(7).and_hms_opt(12, 0, 0).expect("valid time");
    let regular = regular_sheet(vec![regular_row(
        text("001"),
        "",
        &[
            (CellValue::DateTime(midday), num(1.0)),
            (text(&format!("{} 08:00:00", iso(7))), num(2.0)),
            (text(&day(8).format("%Y年%m月%d日").to_string()), num(4.0)),
        ],
    )]);

    let normalized = normalize(&regular, &empty_s_level(), &config).expect("normalize");
    let record = &normalized.records["001"];
    assert_eq!(record.dates[&day(7)], 3.0);
    assert_eq!(record.dates[&day(8)], 4.0);
}

#[test]
fn numeric_skus_are_rendered_without_decimals() {
    let config = PipelineConfig::default();
    let regular = regular_sheet(vec![regular_row(
        num(6_901_234_567_890.0),
        "",
        &[(text(&iso(0)), num(1.0))],
    )]);

    let normalized = normalize(&regular, &empty_s_level(), &config).expect("normalize");
    assert!(normalized.records.contains_key("6901234567890"));
}

#[test]
fn sheet_without_sku_column_is_a_transformation_error() {
    let config = PipelineConfig::default();
    let broken = SheetTable::new("常规产品", vec!["商品名称".to_string()], Vec::new());

    let err = normalize(&broken, &empty_s_level(), &config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Transformation {
            stage: Stage::Normalize,
            ..
        }
    ));
}

#[test]
fn s_level_parser_ignores_non_date_headers() {
    let config = PipelineConfig::default();
    let parser = SLevelSheetParser::new(&config).expect("parser");
    let headers = vec![
        "SKU编码".to_string(),
        "规格".to_string(),
        iso(0),
        "合计".to_string(),
        iso(1),
    ];
    let columns = parser.date_columns(&headers);
    assert_eq!(columns, vec![(2, day(0)), (4, day(1))]);
}

#[test]
fn regular_parser_counts_rows() {
    let config = PipelineConfig::default();
    let parser = RegularSheetParser::new(&config).expect("parser");
    let sheet = regular_sheet(vec![
        regular_row(text("A"), "", &[]),
        regular_row(text("0"), "", &[]),
    ]);

    let outcome = parser.parse(&sheet).expect("parse");
    assert_eq!(outcome.rows_read, 2);
    assert_eq!(outcome.rows_dropped, 1);
    assert!(outcome.records.contains_key("A"));
    assert!(outcome.records["A"].dates.is_empty());
}
