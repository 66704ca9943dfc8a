//! Schema normalizer: turns the two source sheet layouts into one `SkuMap`.
//!
//! The regular sheet carries numbered (arrival date, quantity) column pairs;
//! the S-level sheet uses its header row as the date axis. Both are parsed by
//! a [`SheetParser`] into the same record type, then unioned by SKU.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{CellFormatError, CellIssue, PipelineError, Stage};
use crate::plan::cell::{format_sku, is_placeholder_sku, parse_date, parse_date_text, parse_quantity, CellValue};
use crate::plan::record::{merge_sku_maps, upsert, DescriptiveFields, SkuMap};
use crate::plan::spec_field::SpecParser;
use crate::plan::table::{HeaderResolver, RawRow, SheetRole, SheetTable};

/// A parsing strategy for one source sheet layout.
pub trait SheetParser {
    fn role(&self) -> SheetRole;
    fn parse(&self, sheet: &SheetTable) -> Result<SheetOutcome, PipelineError>;
}

#[derive(Debug, Clone, Default)]
pub struct SheetOutcome {
    pub records: SkuMap,
    pub warnings: Vec<CellFormatError>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    /// Accepted quantity per SKU, before any merging.
    pub totals: IndexMap<String, f64>,
}

impl SheetOutcome {
    fn accept(&mut self, sku: &str, fields: &DescriptiveFields, date: NaiveDate, quantity: f64) {
        upsert(&mut self.records, sku, fields).add_quantity(date, quantity);
        *self.totals.entry(sku.to_string()).or_insert(0.0) += quantity;
    }

    fn reject(&mut self, sheet: &str, row: &RawRow<'_>, column: &str, value: &CellValue, reason: CellIssue) {
        let issue = CellFormatError {
            sheet: sheet.to_string(),
            row: row.number,
            column: column.to_string(),
            value: value.display_text(),
            reason,
        };
        warn!(
            sheet = %issue.sheet,
            row = issue.row,
            column = %issue.column,
            value = %issue.value,
            "skipping cell: {}",
            issue.reason
        );
        self.warnings.push(issue);
    }

    pub fn total(&self) -> f64 {
        self.totals.values().sum()
    }
}

/// Per-sheet counters reported alongside the merged records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub sheet: String,
    pub role: &'static str,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub skus: usize,
    pub total_quantity: f64,
    pub warnings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: SkuMap,
    pub warnings: Vec<CellFormatError>,
    pub sources: Vec<SourceSummary>,
    /// Accepted quantity per SKU summed over both sheets.
    pub source_totals: IndexMap<String, f64>,
}

/// SKU and descriptive columns shared by both layouts.
struct IdentityColumns {
    sku: HeaderResolver,
    name: HeaderResolver,
    spu: HeaderResolver,
    spec: HeaderResolver,
}

impl IdentityColumns {
    fn resolve(sheet: &SheetTable, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let columns = &config.columns;
        let sku = HeaderResolver::new(&columns.sku, &sheet.headers);
        if !sku.is_present() {
            return Err(PipelineError::transformation(
                Stage::Normalize,
                format!(
                    "sheet '{}' has no SKU column (expected one of: {})",
                    sheet.name,
                    columns.sku.join(", ")
                ),
            ));
        }
        Ok(Self {
            sku,
            name: HeaderResolver::new(&columns.name, &sheet.headers),
            spu: HeaderResolver::new(&columns.spu, &sheet.headers),
            spec: HeaderResolver::new(&columns.spec, &sheet.headers),
        })
    }

    /// `None` for rows without a usable SKU.
    fn read(&self, row: &RawRow<'_>, spec_parser: &SpecParser) -> Option<(String, DescriptiveFields)> {
        let sku = self.sku.value(row).map(format_sku).unwrap_or_default();
        if is_placeholder_sku(&sku) {
            return None;
        }
        let text = |resolver: &HeaderResolver| {
            resolver
                .value(row)
                .map(CellValue::display_text)
                .unwrap_or_default()
        };
        let spec = text(&self.spec);
        let (color, size) = spec_parser.parse(&spec);
        Some((
            sku,
            DescriptiveFields {
                name: text(&self.name),
                spu: text(&self.spu),
                spec,
                color,
                size,
            },
        ))
    }
}

/// Fixed columns plus numbered batch (date, quantity) pairs.
pub struct RegularSheetParser<'a> {
    config: &'a PipelineConfig,
    spec: SpecParser,
}

impl<'a> RegularSheetParser<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            config,
            spec: SpecParser::from_config(&config.columns)?,
        })
    }
}

impl SheetParser for RegularSheetParser<'_> {
    fn role(&self) -> SheetRole {
        SheetRole::Regular
    }

    fn parse(&self, sheet: &SheetTable) -> Result<SheetOutcome, PipelineError> {
        let identity = IdentityColumns::resolve(sheet, self.config)?;
        let formats = &self.config.date.input_formats;
        let slots: Vec<(String, usize, String, usize)> = self
            .config
            .columns
            .batch_columns()
            .into_iter()
            .filter_map(|(date_header, qty_header)| {
                let date_idx = sheet.column_index(&date_header)?;
                let qty_idx = sheet.column_index(&qty_header)?;
                Some((date_header, date_idx, qty_header, qty_idx))
            })
            .collect();
        debug!(sheet = %sheet.name, batch_slots = slots.len(), "resolved batch columns");

        let mut outcome = SheetOutcome::default();
        for row in sheet.raw_rows() {
            outcome.rows_read += 1;
            let Some((sku, fields)) = identity.read(&row, &self.spec) else {
                outcome.rows_dropped += 1;
                continue;
            };
            upsert(&mut outcome.records, &sku, &fields);

            for (date_header, date_idx, qty_header, qty_idx) in &slots {
                let date_cell = row.cell(*date_idx);
                let qty_cell = row.cell(*qty_idx);
                if date_cell.is_blank() || qty_cell.is_blank() {
                    continue;
                }
                let date = match parse_date(date_cell, formats) {
                    Ok(Some(date)) => date,
                    Ok(None) => continue,
                    Err(reason) => {
                        outcome.reject(&sheet.name, &row, date_header, date_cell, reason);
                        continue;
                    }
                };
                match parse_quantity(qty_cell) {
                    Ok(Some(quantity)) => outcome.accept(&sku, &fields, date, quantity),
                    Ok(None) => {}
                    Err(reason) => outcome.reject(&sheet.name, &row, qty_header, qty_cell, reason),
                }
            }
        }
        Ok(outcome)
    }
}

/// Every header that reads as a date is a per-date quantity column.
pub struct SLevelSheetParser<'a> {
    config: &'a PipelineConfig,
    spec: SpecParser,
}

impl<'a> SLevelSheetParser<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            config,
            spec: SpecParser::from_config(&config.columns)?,
        })
    }

    /// `(column index, date)` for each date-shaped header, duplicates included.
    pub fn date_columns(&self, headers: &[String]) -> Vec<(usize, NaiveDate)> {
        headers
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| {
                parse_date_text(header, &self.config.date.input_formats)
                    .ok()
                    .map(|date| (idx, date))
            })
            .collect()
    }
}

impl SheetParser for SLevelSheetParser<'_> {
    fn role(&self) -> SheetRole {
        SheetRole::SLevel
    }

    fn parse(&self, sheet: &SheetTable) -> Result<SheetOutcome, PipelineError> {
        let identity = IdentityColumns::resolve(sheet, self.config)?;
        let date_columns = self.date_columns(&sheet.headers);
        if date_columns.is_empty() {
            debug!(sheet = %sheet.name, "no date-shaped headers");
        } else {
            debug!(sheet = %sheet.name, date_columns = date_columns.len(), "resolved date columns");
        }

        let mut outcome = SheetOutcome::default();
        for row in sheet.raw_rows() {
            outcome.rows_read += 1;
            let Some((sku, fields)) = identity.read(&row, &self.spec) else {
                outcome.rows_dropped += 1;
                continue;
            };
            upsert(&mut outcome.records, &sku, &fields);

            for (idx, date) in &date_columns {
                let cell = row.cell(*idx);
                match parse_quantity(cell) {
                    Ok(Some(quantity)) => outcome.accept(&sku, &fields, *date, quantity),
                    Ok(None) => {}
                    Err(reason) => outcome.reject(&sheet.name, &row, &sheet.headers[*idx], cell, reason),
                }
            }
        }
        Ok(outcome)
    }
}

/// Parse both sheets and union them by SKU, regular sheet first.
pub fn normalize(
    regular: &SheetTable,
    s_level: &SheetTable,
    config: &PipelineConfig,
) -> Result<Normalized, PipelineError> {
    let regular_parser = RegularSheetParser::new(config)?;
    let s_level_parser = SLevelSheetParser::new(config)?;
    let parsers: [(&dyn SheetParser, &SheetTable); 2] =
        [(&regular_parser, regular), (&s_level_parser, s_level)];

    let mut normalized = Normalized::default();
    for (parser, sheet) in parsers {
        let outcome = parser.parse(sheet)?;
        info!(
            sheet = %sheet.name,
            rows = outcome.rows_read,
            dropped = outcome.rows_dropped,
            skus = outcome.records.len(),
            "normalized sheet"
        );
        normalized.sources.push(SourceSummary {
            sheet: sheet.name.clone(),
            role: parser.role().label(),
            rows_read: outcome.rows_read,
            rows_dropped: outcome.rows_dropped,
            skus: outcome.records.len(),
            total_quantity: outcome.total(),
            warnings: outcome.warnings.len(),
        });
        for (sku, quantity) in outcome.totals {
            *normalized.source_totals.entry(sku).or_insert(0.0) += quantity;
        }
        normalized.warnings.extend(outcome.warnings);
        let records = std::mem::take(&mut normalized.records);
        normalized.records = merge_sku_maps(records, outcome.records);
    }
    Ok(normalized)
}
