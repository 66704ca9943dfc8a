use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::cli::parse_today;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{merge_file, process_file, RunOptions};

/// Outputs always land in `output.directory`; a body naming any other field,
/// `output_dir` included, is rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessRequest {
    pub input_path: String,
    /// `YYYY-MM-DD`; the server's local date when omitted.
    pub today: Option<String>,
    #[serde(default)]
    pub csv: bool,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeRequest {
    pub input_path: String,
}

/// A generated file read back from the output directory.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum ApiError {
    Parse(serde_json::Error),
    Validation(String),
    NotFound(String),
    Pipeline(PipelineError),
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Invalid request body: {err}"),
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::NotFound(name) => write!(f, "File not found: {name}"),
            Self::Pipeline(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "failed to read output file: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize response: {err}"),
        }
    }
}

impl std::error::Error for ApiError {}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "delivery-plan-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn process_payload(body: &str, config: &PipelineConfig) -> Result<String, ApiError> {
    let request: ProcessRequest = serde_json::from_str(body).map_err(ApiError::Parse)?;
    let input = validate_input(&request.input_path)?;
    let mut options = match request.today.as_deref() {
        Some(raw) => RunOptions::new(
            parse_today(raw).map_err(|err| ApiError::Validation(format!("today: {err}")))?,
        ),
        None => RunOptions::for_today(),
    };
    options.write_csv = request.csv;
    options.write_summary = request.summary;

    let report = process_file(&input, &options, config).map_err(ApiError::Pipeline)?;
    serde_json::to_string_pretty(&report).map_err(ApiError::Serialize)
}

pub fn merge_payload(body: &str, config: &PipelineConfig) -> Result<String, ApiError> {
    let request: MergeRequest = serde_json::from_str(body).map_err(ApiError::Parse)?;
    let input = validate_input(&request.input_path)?;
    let report = merge_file(&input, None, config).map_err(ApiError::Pipeline)?;
    serde_json::to_string_pretty(&report).map_err(ApiError::Serialize)
}

fn validate_input(raw: &str) -> Result<PathBuf, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("input_path must not be empty".to_string()));
    }
    Ok(PathBuf::from(trimmed))
}

/// Read `raw_name` (percent-encoded, as it appears in the URL) from the
/// output directory. Only a bare file name is accepted.
pub fn download_file(raw_name: &str, config: &PipelineConfig) -> Result<Download, ApiError> {
    let file_name = urlencoding::decode(raw_name)
        .map_err(|err| ApiError::Validation(format!("file name is not valid UTF-8: {err}")))?
        .into_owned();
    if !is_bare_file_name(&file_name) {
        return Err(ApiError::Validation(format!("invalid file name '{file_name}'")));
    }

    let path = config.output.directory.join(&file_name);
    if !path.is_file() {
        return Err(ApiError::NotFound(file_name));
    }
    let bytes = fs::read(&path).map_err(ApiError::Io)?;
    Ok(Download {
        content_type: content_type_for(&path),
        file_name,
        bytes,
    })
}

fn is_bare_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(&['/', '\\', '\0'][..]) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        Some(ext) if ext.eq_ignore_ascii_case("csv") => "text/csv; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_bare_file_names_are_downloadable() {
        assert!(is_bare_file_name("plan_上传格式_20261017.xlsx"));
        for name in ["", "..", ".", "../secret.xlsx", "/etc/passwd", "out/plan.xlsx", "a\\b.xlsx", "C:x.xlsx\0"] {
            assert!(!is_bare_file_name(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(
            content_type_for(Path::new("plan.XLSX")),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(content_type_for(Path::new("plan.csv")), "text/csv; charset=utf-8");
        assert_eq!(content_type_for(Path::new("plan")), "application/octet-stream");
    }
}
