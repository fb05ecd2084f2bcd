// Store location and table layout. The core treats every value here as opaque.

use crate::catalog::CatalogColumns;
use crate::store::SheetsStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub const ENV_SHEET_ID: &str = "GOOGLE_SHEET_ID";
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const ENV_CATALOG_TABLE: &str = "HOTEL_CATALOG_TABLE";
pub const ENV_BOOKINGS_TABLE: &str = "HOTEL_BOOKINGS_TABLE";
pub const ENV_ROOM_BOOKINGS_TABLE: &str = "HOTEL_ROOM_BOOKINGS_TABLE";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingConfig {
    // Spreadsheet holding every table
    pub spreadsheet_id: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,

    pub catalog_table: String,
    pub catalog_range: String,
    // Narrower range used for the room listing
    pub rooms_range: String,
    pub catalog_columns: CatalogColumns,

    // Booking history
    pub bookings_table: String,
    // Per-room occupancy; also what the admin view lists
    pub room_bookings_table: String,
    pub append_start_cell: String,
    pub admin_range: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_key: None,
            access_token: None,
            catalog_table: "booking".to_string(),
            catalog_range: "A1:Z".to_string(),
            rooms_range: "A1:E".to_string(),
            catalog_columns: CatalogColumns::default(),
            bookings_table: "Bookings".to_string(),
            room_bookings_table: "bookedrooms".to_string(),
            append_start_cell: "A1".to_string(),
            admin_range: "A1:Z".to_string(),
        }
    }
}

impl BookingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Build from any key/value source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self {
            spreadsheet_id: get(ENV_SHEET_ID).ok_or_else(|| ConfigError::Missing(ENV_SHEET_ID.to_string()))?,
            api_key: get(ENV_API_KEY),
            access_token: get(ENV_ACCESS_TOKEN),
            ..Self::default()
        };

        if let Some(table) = get(ENV_CATALOG_TABLE) {
            config.catalog_table = table;
        }
        if let Some(table) = get(ENV_BOOKINGS_TABLE) {
            config.bookings_table = table;
        }
        if let Some(table) = get(ENV_ROOM_BOOKINGS_TABLE) {
            config.room_bookings_table = table;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Missing("spreadsheetId".to_string()));
        }

        // Both writes landing in one table would double every booking row
        if self.bookings_table == self.room_bookings_table {
            return Err(ConfigError::Invalid(format!(
                "bookings and room bookings tables are both {}",
                self.bookings_table
            )));
        }

        for (name, value) in [
            ("catalogTable", &self.catalog_table),
            ("bookingsTable", &self.bookings_table),
            ("roomBookingsTable", &self.room_bookings_table),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name.to_string()));
            }
        }

        Ok(())
    }

    // Sheets-backed store for this configuration
    pub fn sheets_store(&self) -> SheetsStore {
        let mut store = SheetsStore::new(self.spreadsheet_id.clone());
        if let Some(key) = &self.api_key {
            store = store.with_api_key(key.clone());
        }
        if let Some(token) = &self.access_token {
            store = store.with_access_token(token.clone());
        }
        store
    }
}
