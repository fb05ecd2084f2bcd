// Admin view: direct reads of the room bookings table

use crate::booking::{BookingRecord, RowError};
use crate::config::BookingConfig;
use crate::store::{Row, StoreError, TabularStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdminError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // Row numbers are 1-based sheet rows
    #[error("Malformed booking in row {row}: {source}")]
    MalformedRow { row: usize, source: RowError },
}

pub struct AdminView<S: TabularStore> {
    store: Arc<S>,
    config: Arc<BookingConfig>,
}

impl<S: TabularStore> AdminView<S> {
    pub fn new(store: Arc<S>, config: Arc<BookingConfig>) -> Self {
        Self { store, config }
    }

    // Raw table contents, header first, exactly as stored
    pub async fn list_bookings(&self) -> Result<Vec<Row>, StoreError> {
        let rows = self
            .store
            .read(&self.config.room_bookings_table, &self.config.admin_range)
            .await?;
        debug!(
            "Read {} row(s) from {}",
            rows.len(),
            self.config.room_bookings_table
        );
        Ok(rows)
    }

    // Typed bookings, skipping the header row
    pub async fn booking_records(&self) -> Result<Vec<BookingRecord>, AdminError> {
        let rows = self.list_bookings().await?;

        rows.iter()
            .enumerate()
            .skip(1)
            .map(|(idx, row)| {
                BookingRecord::from_row(row).map_err(|source| AdminError::MalformedRow {
                    row: idx + 1,
                    source,
                })
            })
            .collect()
    }
}
