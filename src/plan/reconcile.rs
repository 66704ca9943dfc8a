//! Totals check between the stages. Mismatches are reported, never fatal.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::plan::project::{ProjectedRow, DAY_WINDOW};
use crate::plan::record::SkuMap;

pub const TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Accepted source quantities vs the merged record.
    SourceVsMerged,
    /// In-window merged quantities vs the projected day buckets.
    WindowVsProjected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuMismatch {
    pub sku: String,
    pub kind: MismatchKind,
    pub expected: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub regular_total: f64,
    pub s_level_total: f64,
    pub merged_total: f64,
    pub window_total: f64,
    pub projected_total: f64,
    /// Merged quantity dated outside the upload window.
    pub dropped_outside_window: f64,
    pub mismatches: Vec<SkuMismatch>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

pub struct SourceTotals<'a> {
    pub regular: f64,
    pub s_level: f64,
    pub per_sku: &'a IndexMap<String, f64>,
}

pub fn reconcile(
    sources: SourceTotals<'_>,
    records: &SkuMap,
    projected: &[ProjectedRow],
    today: NaiveDate,
) -> ReconcileReport {
    let mut report = ReconcileReport {
        regular_total: sources.regular,
        s_level_total: sources.s_level,
        ..ReconcileReport::default()
    };

    for (sku, record) in records {
        let merged = record.total();
        let expected = sources.per_sku.get(sku).copied().unwrap_or(0.0);
        if (expected - merged).abs() > TOLERANCE {
            report.mismatches.push(SkuMismatch {
                sku: sku.clone(),
                kind: MismatchKind::SourceVsMerged,
                expected,
                actual: merged,
            });
        }
        report.merged_total += merged;
        report.window_total += record.window_total(today, DAY_WINDOW as u32);
    }

    let mut projected_by_sku: IndexMap<&str, f64> = IndexMap::new();
    for row in projected {
        *projected_by_sku.entry(row.sku_no.as_str()).or_insert(0.0) += row.total();
    }
    for (sku, record) in records {
        let expected = record.window_total(today, DAY_WINDOW as u32);
        let actual = projected_by_sku.get(sku.as_str()).copied().unwrap_or(0.0);
        if (expected - actual).abs() > TOLERANCE {
            report.mismatches.push(SkuMismatch {
                sku: sku.clone(),
                kind: MismatchKind::WindowVsProjected,
                expected,
                actual,
            });
        }
    }
    report.projected_total = projected_by_sku.values().sum();
    report.dropped_outside_window = report.merged_total - report.window_total;

    for mismatch in &report.mismatches {
        warn!(
            sku = %mismatch.sku,
            kind = ?mismatch.kind,
            expected = mismatch.expected,
            actual = mismatch.actual,
            "quantity totals disagree"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::project::project;
    use crate::plan::record::SkuRecord;

    #[test]
    fn out_of_window_quantity_is_reported_as_dropped() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let mut record = SkuRecord::new("A");
        record.add_quantity(today, 10.0);
        record.add_quantity(today + chrono::Days::new(60), 5.0);
        let mut records = SkuMap::new();
        records.insert("A".into(), record);
        let per_sku: IndexMap<String, f64> = [("A".to_string(), 15.0)].into_iter().collect();

        let rows = project(&records, today, "%Y-%m-%d").unwrap();
        let report = reconcile(
            SourceTotals { regular: 15.0, s_level: 0.0, per_sku: &per_sku },
            &records,
            &rows,
            today,
        );
        assert!(report.is_clean());
        assert_eq!(report.window_total, 10.0);
        assert_eq!(report.projected_total, 10.0);
        assert_eq!(report.dropped_outside_window, 5.0);
    }
}
