use regex::Regex;

use crate::config::{ColumnConfig, ConfigError};

/// Pulls `label:value` pairs (color, size) out of a free-text spec cell.
///
/// Separators are `:`, `：` or whitespace; a value ends at a comma (either
/// width), `、`, a semicolon, whitespace or the end of the text. A label
/// followed directly by another `label:value` pair has no value.
#[derive(Debug, Clone)]
pub struct SpecParser {
    color: Regex,
    size: Regex,
}

impl SpecParser {
    pub fn from_config(columns: &ColumnConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            color: label_pattern(&columns.color_labels)?,
            size: label_pattern(&columns.size_labels)?,
        })
    }

    /// `(color, size)`; each is empty when its label is absent.
    pub fn parse(&self, spec: &str) -> (String, String) {
        (capture(&self.color, spec), capture(&self.size, spec))
    }
}

fn label_pattern(labels: &[String]) -> Result<Regex, ConfigError> {
    if labels.is_empty() {
        return Err(ConfigError::Invalid(
            "spec field labels must not be empty".to_string(),
        ));
    }
    let alternatives = labels
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?:{alternatives})\s*[:：\s]\s*([^,，、;；:：\s]+)(?:[,，、;；\s]|$)");
    Regex::new(&pattern)
        .map_err(|err| ConfigError::Invalid(format!("spec label pattern: {err}")))
}

fn capture(pattern: &Regex, spec: &str) -> String {
    pattern
        .captures(spec)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim().to_string())
        .unwrap_or_default()
}
