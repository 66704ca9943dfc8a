//! Collaborative-sheet client. Reads sheet values over the open API with an
//! already-issued tenant token; issuing tokens is left to the caller.

use std::collections::HashMap;

use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{RemoteConfig, SheetConfig};
use crate::error::PipelineError;
use crate::io::loader::clean_table;
use crate::plan::cell::CellValue;
use crate::plan::table::{SheetTable, Snapshot};

/// `(spreadsheet token, sheet id)` from a sheet URL such as
/// `https://tenant.feishu.cn/sheets/<token>?sheet=<id>`.
pub fn parse_sheet_url(raw: &str) -> Result<(String, String), PipelineError> {
    let url = Url::parse(raw.trim()).map_err(|err| PipelineError::Remote(format!("invalid sheet url '{raw}': {err}")))?;
    let token = url
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::Remote(format!("sheet url '{raw}' has no spreadsheet token")))?;
    let sheet_id = url
        .query_pairs()
        .find(|(key, _)| key == "sheet")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PipelineError::Remote(format!("sheet url '{raw}' has no ?sheet= parameter")))?;
    Ok((token, sheet_id))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct MetaInfo {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    #[serde(rename = "sheetId")]
    sheet_id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValuesData {
    #[serde(rename = "valueRange")]
    value_range: ValueRange,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct RemoteSheetClient {
    client: Client,
    base_url: String,
    token: String,
    titles: HashMap<String, HashMap<String, String>>,
}

impl RemoteSheetClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            titles: HashMap::new(),
        }
    }

    /// Token from the configured environment variable; `.env` is read first.
    pub fn from_env(remote: &RemoteConfig) -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        let token = std::env::var(&remote.token_env)
            .map_err(|_| PipelineError::Remote(format!("missing {} in environment (.env)", remote.token_env)))?;
        Ok(Self::new(remote.base_url.clone(), token))
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, PipelineError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .map_err(|err| PipelineError::Remote(format!("request to {url} failed: {err}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::Remote(format!(
                "request to {url} failed with status {}",
                resp.status()
            )));
        }
        let envelope: Envelope<T> = resp
            .json()
            .map_err(|err| PipelineError::Remote(format!("unreadable response from {url}: {err}")))?;
        if envelope.code != 0 {
            return Err(PipelineError::Remote(format!(
                "{url} returned code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        envelope
            .data
            .ok_or_else(|| PipelineError::Remote(format!("{url} returned no data")))
    }

    fn sheet_title(&mut self, token: &str, sheet_id: &str) -> Result<String, PipelineError> {
        if !self.titles.contains_key(token) {
            let url = format!("{}/sheets/v2/spreadsheets/{token}/metainfo", self.base_url);
            let meta: MetaInfo = self.get(&url, &[])?;
            let titles = meta
                .sheets
                .into_iter()
                .filter(|sheet| !sheet.title.is_empty())
                .map(|sheet| (sheet.sheet_id, sheet.title))
                .collect();
            self.titles.insert(token.to_string(), titles);
        }
        Ok(self
            .titles
            .get(token)
            .and_then(|titles| titles.get(sheet_id))
            .cloned()
            .unwrap_or_else(|| sheet_id.to_string()))
    }

    /// Fetch one sheet as a cleaned table named by its title.
    pub fn fetch_sheet(&mut self, sheet_url: &str) -> Result<SheetTable, PipelineError> {
        let (token, sheet_id) = parse_sheet_url(sheet_url)?;
        let title = self.sheet_title(&token, &sheet_id)?;
        let url = format!("{}/sheets/v2/spreadsheets/{token}/values/{sheet_id}", self.base_url);
        let data: ValuesData = self.get(
            &url,
            &[
                ("valueRenderOption", "ToString"),
                ("dateTimeRenderOption", "FormattedString"),
            ],
        )?;
        if data.value_range.values.is_empty() {
            return Err(PipelineError::Remote(format!("sheet '{title}' is empty")));
        }
        let table = values_to_table(&title, data.value_range.values);
        debug!(sheet = %title, rows = table.rows.len(), "fetched remote sheet");
        Ok(table)
    }
}

pub fn values_to_table(title: &str, values: Vec<Vec<Value>>) -> SheetTable {
    let rows = values
        .into_iter()
        .map(|row| row.into_iter().map(json_to_cell).collect())
        .collect();
    clean_table(title, rows)
}

fn json_to_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::String(text) => CellValue::Text(text),
        Value::Bool(flag) => CellValue::Bool(flag),
        Value::Number(number) => number
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(number.to_string())),
        // rich-text segments and the like
        other => CellValue::Text(other.to_string()),
    }
}

/// Fetch every URL and file each sheet under the role its title names.
pub fn fetch_snapshot(
    client: &mut RemoteSheetClient,
    urls: &[String],
    sheets: &SheetConfig,
) -> Result<Snapshot, PipelineError> {
    let mut snapshot = Snapshot::default();
    for url in urls {
        let table = client.fetch_sheet(url)?;
        match sheets.role_of(&table.name) {
            Some(role) => {
                info!(sheet = %table.name, role = role.label(), "fetched sheet");
                snapshot.insert(role, table);
            }
            None => debug!(sheet = %table.name, "discarding unrecognized remote sheet"),
        }
    }
    Ok(snapshot)
}
