use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Pipeline stage named in a [`PipelineError::Transformation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Project,
    Aggregate,
    Summary,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Project => "project",
            Self::Aggregate => "aggregate",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fatal errors: any of these aborts the run and no partial output is returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("required source '{sheet}' is missing or unreadable: {cause}")]
    SourceMissing { sheet: String, cause: String },

    #[error("{stage} stage failed: {message}")]
    Transformation { stage: Stage, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read workbook '{path}': {message}")]
    Workbook { path: String, message: String },

    #[error("failed to write '{path}': {message}")]
    Write { path: String, message: String },

    #[error("remote sheet request failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transformation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Transformation {
            stage,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::SourceMissing { .. } => 3,
            Self::Remote(_) => 4,
            _ => 1,
        }
    }
}

/// Why a single cell contribution was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum CellIssue {
    #[error("unparsable date")]
    UnparsableDate,
    #[error("time without a date")]
    TimeOnly,
    #[error("unparsable quantity")]
    UnparsableQuantity,
    #[error("negative quantity")]
    NegativeQuantity,
}

/// Non-fatal, cell-scoped: the contribution is dropped and processing continues.
///
/// `row` is the 1-based row in the cleaned sheet, header row = 1.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{sheet}!{column} row {row}: {reason} ({value:?})")]
pub struct CellFormatError {
    pub sheet: String,
    pub row: usize,
    pub column: String,
    pub value: String,
    pub reason: CellIssue,
}
