//! Run configuration: date formats, sheet and column aliases, output naming, styles.
//!
//! A `PipelineConfig` is built once (from YAML or defaults) and passed by
//! reference into every component. The reference date is not part of it; it is
//! supplied per run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::table::SheetRole;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub date: DateConfig,
    pub sheets: SheetConfig,
    pub columns: ColumnConfig,
    pub output: OutputConfig,
    pub styles: StyleConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// Tried in order; the first format that parses wins.
    pub input_formats: Vec<String>,
    pub output_format: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            input_formats: strings(&[
                "%Y-%m-%d",
                "%Y/%m/%d",
                "%Y.%m.%d",
                "%Y年%m月%d日",
                "%Y-%m-%d %H:%M:%S",
                "%Y/%m/%d %H:%M:%S",
                "%Y-%m-%dT%H:%M:%S",
                "%m/%d/%Y",
            ]),
            output_format: "%Y-%m-%d".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub regular: Vec<String>,
    pub s_level: Vec<String>,
    pub summary: Vec<String>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            regular: strings(&["常规产品", "regular"]),
            s_level: strings(&["S级产品", "s_level"]),
            summary: strings(&["汇总", "summary"]),
        }
    }
}

impl SheetConfig {
    /// Role of a workbook sheet by exact (trimmed) name, if recognized.
    pub fn role_of(&self, sheet_name: &str) -> Option<SheetRole> {
        let name = sheet_name.trim();
        SheetRole::ALL
            .into_iter()
            .find(|role| self.aliases(*role).iter().any(|alias| alias == name))
    }

    pub fn aliases(&self, role: SheetRole) -> &[String] {
        match role {
            SheetRole::Regular => &self.regular,
            SheetRole::SLevel => &self.s_level,
            SheetRole::Summary => &self.summary,
        }
    }

    /// Name used when a sheet of this role is written back out.
    pub fn display_name(&self, role: SheetRole) -> &str {
        self.aliases(role)
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| role.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub sku: Vec<String>,
    pub spec: Vec<String>,
    pub name: Vec<String>,
    pub spu: Vec<String>,
    pub batch_date_prefix: String,
    pub batch_quantity_prefix: String,
    pub batch_slots: usize,
    pub color_labels: Vec<String>,
    pub size_labels: Vec<String>,
    pub quantity_pattern: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            sku: strings(&["sku编码", "SKU编码", "sku_no"]),
            spec: strings(&["规格", "spec"]),
            name: strings(&["商品名称", "sku名称"]),
            spu: strings(&["spu编码", "SPU编码"]),
            batch_date_prefix: "到货批次-".to_string(),
            batch_quantity_prefix: "到货数量-".to_string(),
            batch_slots: 5,
            color_labels: strings(&["颜色", "color"]),
            size_labels: strings(&["尺码", "size"]),
            quantity_pattern: "(数量|总|(?i:qty|quantity|total))".to_string(),
        }
    }
}

impl ColumnConfig {
    /// `(date header, quantity header)` for each numbered batch slot.
    pub fn batch_columns(&self) -> Vec<(String, String)> {
        (1..=self.batch_slots)
            .map(|slot| {
                (
                    format!("{}{slot}", self.batch_date_prefix),
                    format!("{}{slot}", self.batch_quantity_prefix),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub suffixes: SuffixConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            suffixes: SuffixConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuffixConfig {
    pub upload: String,
    pub summary: String,
    pub merge: String,
}

impl Default for SuffixConfig {
    fn default() -> Self {
        Self {
            upload: "上传格式".to_string(),
            summary: "汇总".to_string(),
            merge: "合并".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Header fill for descriptive columns, `RRGGBB`.
    pub fixed_header: String,
    /// Header fill for day/date columns, `RRGGBB`.
    pub date_header: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            fixed_header: "1F6B3B".to_string(),
            date_header: "F4B183".to_string(),
        }
    }
}

impl StyleConfig {
    pub fn fixed_header_rgb(&self) -> Result<u32, ConfigError> {
        parse_hex_color(&self.fixed_header)
    }

    pub fn date_header_rgb(&self) -> Result<u32, ConfigError> {
        parse_hex_color(&self.date_header)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Environment variable holding an already-issued tenant access token.
    pub token_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.feishu.cn/open-apis".to_string(),
            token_env: "FEISHU_TENANT_TOKEN".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file, or fall back to the built-in defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.date.input_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "date.input_formats must list at least one format".to_string(),
            ));
        }
        for format in self
            .date
            .input_formats
            .iter()
            .chain(std::iter::once(&self.date.output_format))
        {
            if !is_valid_strftime(format) {
                return Err(ConfigError::Invalid(format!(
                    "'{format}' is not a valid date format"
                )));
            }
        }
        if self.columns.sku.is_empty() {
            return Err(ConfigError::Invalid(
                "columns.sku must list at least one header alias".to_string(),
            ));
        }
        if self.columns.batch_slots == 0 {
            return Err(ConfigError::Invalid(
                "columns.batch_slots must be at least 1".to_string(),
            ));
        }
        Regex::new(&self.columns.quantity_pattern).map_err(|err| {
            ConfigError::Invalid(format!("columns.quantity_pattern: {err}"))
        })?;
        self.styles.fixed_header_rgb()?;
        self.styles.date_header_rgb()?;
        Ok(())
    }
}

fn is_valid_strftime(format: &str) -> bool {
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

fn parse_hex_color(raw: &str) -> Result<u32, ConfigError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return Err(ConfigError::Invalid(format!(
            "'{raw}' is not an RRGGBB color"
        )));
    }
    u32::from_str_radix(hex, 16)
        .map_err(|_| ConfigError::Invalid(format!("'{raw}' is not an RRGGBB color")))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
