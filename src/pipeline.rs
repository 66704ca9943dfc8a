//! Orchestration: snapshot in, upload table (and optional summary) out.
//!
//! [`run`] is the pure core over a loaded snapshot and a fixed reference date.
//! [`process_file`], [`process_snapshot`] and [`merge_file`] add the loader
//! and writer around it and report what was produced.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{CellFormatError, PipelineError, Stage};
use crate::io::loader::{load_named_sheet, load_workbook};
use crate::io::writer::{
    output_path, write_table_xlsx, write_upload_csv_file, write_upload_xlsx, SheetStyle, UPLOAD_SHEET,
};
use crate::plan::aggregate::{aggregate_rows, aggregate_table, AggregateRules};
use crate::plan::normalize::{normalize, SourceSummary};
use crate::plan::project::{project, watermark, ProjectedRow};
use crate::plan::reconcile::{reconcile, ReconcileReport, SourceTotals};
use crate::plan::record::SkuMap;
use crate::plan::summary::build_summary;
use crate::plan::table::{SheetRole, Snapshot, Table};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub today: NaiveDate,
    /// Falls back to `output.directory` from the config.
    pub output_dir: Option<PathBuf>,
    pub write_csv: bool,
    pub write_summary: bool,
}

impl RunOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            output_dir: None,
            write_csv: false,
            write_summary: false,
        }
    }

    /// Options dated at the local wall-clock day.
    pub fn for_today() -> Self {
        Self::new(Local::now().date_naive())
    }

    fn output_dir(&self, config: &PipelineConfig) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| config.output.directory.clone())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: SkuMap,
    pub upload: Vec<ProjectedRow>,
    pub summary: Table,
    pub warnings: Vec<CellFormatError>,
    pub sources: Vec<SourceSummary>,
    pub report: ReconcileReport,
}

/// Normalize, project, aggregate and reconcile one snapshot.
pub fn run(snapshot: &Snapshot, config: &PipelineConfig, today: NaiveDate) -> Result<PipelineOutput, PipelineError> {
    let regular = snapshot.require(SheetRole::Regular, &config.sheets)?;
    let s_level = snapshot.require(SheetRole::SLevel, &config.sheets)?;

    let normalized = normalize(regular, s_level, config)?;
    let projected = project(&normalized.records, today, &config.date.output_format)?;
    let upload = aggregate_rows(&projected);
    if upload.len() != normalized.records.len() {
        return Err(PipelineError::transformation(
            Stage::Aggregate,
            format!(
                "{} upload rows for {} distinct SKUs",
                upload.len(),
                normalized.records.len()
            ),
        ));
    }
    let summary = build_summary(&normalized.records, config)?;

    let source_total = |role: SheetRole| {
        normalized
            .sources
            .iter()
            .filter(|source| source.role == role.label())
            .map(|source| source.total_quantity)
            .sum::<f64>()
    };
    let report = reconcile(
        SourceTotals {
            regular: source_total(SheetRole::Regular),
            s_level: source_total(SheetRole::SLevel),
            per_sku: &normalized.source_totals,
        },
        &normalized.records,
        &upload,
        today,
    );
    info!(
        skus = upload.len(),
        warnings = normalized.warnings.len(),
        window_total = report.window_total,
        dropped_outside_window = report.dropped_outside_window,
        "pipeline run complete"
    );

    Ok(PipelineOutput {
        records: normalized.records,
        upload,
        summary,
        warnings: normalized.warnings,
        sources: normalized.sources,
        report,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub status: &'static str,
    pub input: String,
    pub today: String,
    pub dt: String,
    pub upload_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<String>,
    pub skus: usize,
    pub sources: Vec<SourceSummary>,
    pub reconcile: ReconcileReport,
    pub warnings: Vec<CellFormatError>,
}

/// Run a snapshot and write its outputs named after `stem`.
pub fn process_snapshot(
    snapshot: &Snapshot,
    input_label: &str,
    stem: &str,
    options: &RunOptions,
    config: &PipelineConfig,
) -> Result<ProcessReport, PipelineError> {
    let output = run(snapshot, config, options.today)?;
    let style = SheetStyle::from_config(config)?;
    let dir = options.output_dir(config);
    let now = Local::now().naive_local();

    let upload_path = output_path(stem, &dir, &config.output.suffixes.upload, now);
    write_upload_xlsx(&output.upload, &upload_path, &style)?;

    let csv_path = if options.write_csv {
        let path = upload_path.with_extension("csv");
        write_upload_csv_file(&output.upload, &path)?;
        Some(path)
    } else {
        None
    };

    let summary_path = if options.write_summary {
        let path = output_path(stem, &dir, &config.output.suffixes.summary, now);
        write_table_xlsx(
            &output.summary,
            config.sheets.display_name(SheetRole::Summary),
            &path,
            &style,
        )?;
        Some(path)
    } else {
        None
    };

    Ok(ProcessReport {
        status: "ok",
        input: input_label.to_string(),
        today: options.today.to_string(),
        dt: watermark(options.today, &config.date.output_format)?,
        upload_path: upload_path.display().to_string(),
        csv_path: csv_path.map(|path| path.display().to_string()),
        summary_path: summary_path.map(|path| path.display().to_string()),
        skus: output.upload.len(),
        sources: output.sources,
        reconcile: output.report,
        warnings: output.warnings,
    })
}

/// Load a local workbook and process it.
pub fn process_file(input: &Path, options: &RunOptions, config: &PipelineConfig) -> Result<ProcessReport, PipelineError> {
    let snapshot = load_workbook(input, &config.sheets)?;
    process_snapshot(
        &snapshot,
        &input.display().to_string(),
        &file_stem(input),
        options,
        config,
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub status: &'static str,
    pub input: String,
    pub sheet: String,
    pub output_path: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub duplicates_collapsed: usize,
}

/// Re-aggregate an existing summary or upload workbook by SKU.
///
/// The summary sheet is preferred; an upload `Sheet1` is accepted otherwise.
pub fn merge_file(input: &Path, output_dir: Option<&Path>, config: &PipelineConfig) -> Result<MergeReport, PipelineError> {
    merge_file_at(input, output_dir, config, Local::now().naive_local())
}

pub fn merge_file_at(
    input: &Path,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
    now: NaiveDateTime,
) -> Result<MergeReport, PipelineError> {
    let mut names: Vec<&str> = config.sheets.summary.iter().map(String::as_str).collect();
    names.push(UPLOAD_SHEET);
    let sheet = load_named_sheet(input, &names)?.ok_or_else(|| PipelineError::SourceMissing {
        sheet: config.sheets.display_name(SheetRole::Summary).to_string(),
        cause: format!("no sheet named any of [{}] in '{}'", names.join(", "), input.display()),
    })?;

    let table = Table::from_sheet(&sheet);
    let rules = AggregateRules::from_config(config)?;
    let merged = aggregate_table(&table, &rules)?;

    let dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output.directory.clone());
    let path = output_path(&file_stem(input), &dir, &config.output.suffixes.merge, now);
    let style = SheetStyle::from_config(config)?;
    write_table_xlsx(&merged, &sheet.name, &path, &style)?;

    info!(
        sheet = %sheet.name,
        rows_in = table.len(),
        rows_out = merged.len(),
        "merged duplicate SKUs"
    );
    Ok(MergeReport {
        status: "ok",
        input: input.display().to_string(),
        sheet: sheet.name.clone(),
        output_path: path.display().to_string(),
        rows_in: table.len(),
        rows_out: merged.len(),
        duplicates_collapsed: table.len() - merged.len(),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "delivery_plan".to_string())
}
