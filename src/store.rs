// Tabular store: the external collaborator that holds the room catalog and the booking tables.
// Tables are addressed by name, cells by A1 notation ("A1", "A1:Z", "B2:E10").

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

// A row is an ordered sequence of cell values; the first row of a table is conventionally a header
pub type Row = Vec<String>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Store error: {0}")]
    Other(String),
}

// The two operations the booking core needs from the store
#[async_trait]
pub trait TabularStore: Send + Sync + 'static {
    // Read the cells of `range` in `table`, row by row
    async fn read(&self, table: &str, range: &str) -> Result<Vec<Row>, StoreError>;

    // Append rows to `table`, after the last row of the data region starting at `start_cell`
    async fn append(&self, table: &str, start_cell: &str, rows: Vec<Row>) -> Result<(), StoreError>;
}

// Qualified A1 reference, e.g. "Bookings!A1"
pub fn a1_reference(table: &str, range: &str) -> String {
    format!("{}!{}", table, range)
}

// Parsed A1 range. Rows and columns are zero-based; open ends mean "to the end of the table".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_col: usize,
    pub start_row: usize,
    pub end_col: Option<usize>,
    pub end_row: Option<usize>,
}

impl CellRange {
    pub fn parse(range: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidRange(range.to_string());

        let (start, end) = match range.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (range, None),
        };

        let (start_col, start_row) = parse_cell(start).ok_or_else(invalid)?;
        let start_col = start_col.ok_or_else(invalid)?;
        let start_row = start_row.unwrap_or(0);

        let (end_col, end_row) = match end {
            // "A1" alone addresses a single cell
            None => (Some(start_col), Some(start_row)),
            Some(end) => parse_cell(end).ok_or_else(invalid)?,
        };

        if end_col.map_or(false, |c| c < start_col) || end_row.map_or(false, |r| r < start_row) {
            return Err(invalid());
        }

        Ok(Self {
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }

    // Clip a full table to this range
    pub fn slice(&self, rows: &[Row]) -> Vec<Row> {
        let last_row = self.end_row.map_or(rows.len(), |r| (r + 1).min(rows.len()));
        if self.start_row >= last_row {
            return Vec::new();
        }

        rows[self.start_row..last_row]
            .iter()
            .map(|row| {
                let last_col = self.end_col.map_or(row.len(), |c| (c + 1).min(row.len()));
                if self.start_col >= last_col {
                    Vec::new()
                } else {
                    row[self.start_col..last_col].to_vec()
                }
            })
            .collect()
    }
}

// "B12" -> (Some(1), Some(11)), "Z" -> (Some(25), None), "12" -> (None, Some(11))
fn parse_cell(cell: &str) -> Option<(Option<usize>, Option<usize>)> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    let split = cell
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);

    let col = if letters.is_empty() {
        None
    } else {
        let mut index = 0usize;
        for c in letters.chars() {
            let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
            index = index.checked_mul(26)?.checked_add(digit)?;
        }
        Some(index - 1)
    };

    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(n - 1)
    };

    Some((col, row))
}

// In-memory store used by tests, benchmarks and local runs.
// Failures can be injected per table to exercise the booking write policy.
#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Row>>,
    failing_tables: Mutex<HashMap<String, StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Create or replace a table
    pub fn insert_table(&self, table: &str, rows: Vec<Row>) {
        self.tables.insert(table.to_string(), rows);
    }

    // Every operation on `table` fails with `error` until `restore_table` is called
    pub fn fail_table(&self, table: &str, error: StoreError) {
        self.failing_tables.lock().insert(table.to_string(), error);
    }

    pub fn restore_table(&self, table: &str) {
        self.failing_tables.lock().remove(table);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |rows| rows.len())
    }

    fn check_failure(&self, table: &str) -> Result<(), StoreError> {
        match self.failing_tables.lock().get(table) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read(&self, table: &str, range: &str) -> Result<Vec<Row>, StoreError> {
        self.check_failure(table)?;
        let range = CellRange::parse(range)?;

        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        Ok(range.slice(&rows))
    }

    async fn append(&self, table: &str, start_cell: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        self.check_failure(table)?;
        CellRange::parse(start_cell)?;

        debug!("Appending {} row(s) to in-memory table {}", rows.len(), table);

        // Spreadsheet semantics: appending to a missing tab is an error, not an implicit create
        let mut existing = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        existing.extend(rows);

        Ok(())
    }
}

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

// Google Sheets v4 values API. Each table is a tab of one spreadsheet.
pub struct SheetsStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl SheetsStore {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: SHEETS_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            api_key: None,
            access_token: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    // OAuth access token; writes to a private spreadsheet need one
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // .../spreadsheets/{id}/values/{table!range}{suffix}
    fn values_url(&self, reference: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| StoreError::Other(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Other(format!("Cannot use {} as a base URL", self.base_url)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", reference, suffix));

        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }

        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body,
        };

        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

// Sheets returns formatted strings by default, but numbers and booleans may come back unformatted
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn network_error(e: reqwest::Error) -> StoreError {
    StoreError::Network(e.to_string())
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read(&self, table: &str, range: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.values_url(&a1_reference(table, range), "")?;
        debug!("Reading {}!{} from spreadsheet {}", table, range, self.spreadsheet_id);

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(network_error)?;
        let response = Self::check_status(response).await?;

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append(&self, table: &str, start_cell: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut url = self.values_url(&a1_reference(table, start_cell), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        debug!("Appending {} row(s) to {} in spreadsheet {}", rows.len(), table, self.spreadsheet_id);

        let response = self
            .authorize(self.client.post(url))
            .json(&json!({ "values": rows }))
            .send()
            .await
            .map_err(network_error)?;
        Self::check_status(response).await?;

        Ok(())
    }
}
