// Room catalog: header-driven column lookup and projection of raw rows into typed room records

use crate::store::Row;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid value {value:?} in column {column} for room {room}")]
    InvalidValue {
        room: String,
        column: String,
        value: String,
    },
}

// Header names of the catalog columns. Only the room identifier and the price are required.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogColumns {
    pub room_id: String,
    pub price: String,
    pub extra_person: String,
    pub extra_child: String,
    pub availability: String,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            room_id: "Room Type".to_string(),
            price: "Price".to_string(),
            extra_person: "Extra Person".to_string(),
            extra_child: "Extra Child".to_string(),
            availability: "Availability".to_string(),
        }
    }
}

// A snapshot of the catalog table: header row plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub header: Row,
    pub rows: Vec<Row>,
}

impl Catalog {
    // Split the rows returned by the store; the first row is the header
    pub fn from_rows(mut rows: Vec<Row>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let header = rows.remove(0);
        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Column positions resolved once per catalog read
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSchema {
    columns: CatalogColumns,
    room_id: usize,
    price: usize,
    extra_person: Option<usize>,
    extra_child: Option<usize>,
    availability: Option<usize>,
}

// Typed view of one catalog row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomRecord {
    pub room_id: String,
    pub base_price: f64,
    // None when the column is absent from the header
    pub extra_person_rate: Option<f64>,
    pub extra_child_rate: Option<f64>,
    pub available: bool,
}

fn column_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h == name)
}

impl CatalogSchema {
    pub fn from_header(header: &[String], columns: &CatalogColumns) -> Result<Self, CatalogError> {
        let room_id = column_index(header, &columns.room_id)
            .ok_or_else(|| CatalogError::MissingColumn(columns.room_id.clone()))?;
        let price = column_index(header, &columns.price)
            .ok_or_else(|| CatalogError::MissingColumn(columns.price.clone()))?;

        Ok(Self {
            room_id,
            price,
            extra_person: column_index(header, &columns.extra_person),
            extra_child: column_index(header, &columns.extra_child),
            availability: column_index(header, &columns.availability),
            columns: columns.clone(),
        })
    }

    // Room identifier of a raw row, if the row reaches that column
    pub fn room_id<'a>(&self, row: &'a [String]) -> Option<&'a str> {
        row.get(self.room_id).map(String::as_str)
    }

    // First row whose identifier matches exactly
    pub fn find<'a>(&self, rows: &'a [Row], room_id: &str) -> Option<&'a Row> {
        rows.iter().find(|row| self.room_id(row) == Some(room_id))
    }

    pub fn project(&self, row: &[String]) -> Result<RoomRecord, CatalogError> {
        let room_id = self.room_id(row).unwrap_or_default().to_string();

        let price_cell = row.get(self.price).map(String::as_str).unwrap_or_default();
        let base_price = parse_amount(price_cell).ok_or_else(|| CatalogError::InvalidValue {
            room: room_id.clone(),
            column: self.columns.price.clone(),
            value: price_cell.to_string(),
        })?;

        let extra_person_rate = self
            .extra_person
            .map(|idx| self.surcharge(row, idx, &self.columns.extra_person, &room_id))
            .transpose()?;
        let extra_child_rate = self
            .extra_child
            .map(|idx| self.surcharge(row, idx, &self.columns.extra_child, &room_id))
            .transpose()?;

        // Only the exact literal "yes" marks a room available; a short row reads as not available
        let available = match self.availability {
            Some(idx) => row.get(idx).map_or(false, |cell| cell == "yes"),
            None => true,
        };

        Ok(RoomRecord {
            room_id,
            base_price,
            extra_person_rate,
            extra_child_rate,
            available,
        })
    }

    // Empty or missing surcharge cells count as zero
    fn surcharge(
        &self,
        row: &[String],
        idx: usize,
        column: &str,
        room_id: &str,
    ) -> Result<f64, CatalogError> {
        let cell = row.get(idx).map(String::as_str).unwrap_or_default();
        if cell.trim().is_empty() {
            return Ok(0.0);
        }

        parse_amount(cell).ok_or_else(|| CatalogError::InvalidValue {
            room: room_id.to_string(),
            column: column.to_string(),
            value: cell.to_string(),
        })
    }
}

// Finite, non-negative amount
fn parse_amount(cell: &str) -> Option<f64> {
    let value: f64 = cell.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}
