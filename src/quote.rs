// Quote engine: price and availability for a room, derived from the current catalog snapshot

use crate::catalog::{Catalog, CatalogColumns, CatalogError, CatalogSchema, RoomRecord};
use crate::config::BookingConfig;
use crate::store::{StoreError, TabularStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// Flat add-on for the breakfast rate plan, independent of guests and nights
pub const BREAKFAST_SURCHARGE: f64 = 200.0;

// Guests included in the base price
pub const INCLUDED_GUESTS: i32 = 2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Invalid catalog data: {0}")]
    InvalidCatalogData(#[from] CatalogError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RatePlan {
    #[serde(rename = "With Breakfast")]
    WithBreakfast,
    #[serde(rename = "Without Breakfast")]
    WithoutBreakfast,
}

// No plan selected means no surcharge
impl Default for RatePlan {
    fn default() -> Self {
        RatePlan::WithoutBreakfast
    }
}

impl RatePlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatePlan::WithBreakfast => "With Breakfast",
            RatePlan::WithoutBreakfast => "Without Breakfast",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "With Breakfast" => Some(RatePlan::WithBreakfast),
            "Without Breakfast" => Some(RatePlan::WithoutBreakfast),
            _ => None,
        }
    }

    pub fn surcharge(&self) -> f64 {
        match self {
            RatePlan::WithBreakfast => BREAKFAST_SURCHARGE,
            RatePlan::WithoutBreakfast => 0.0,
        }
    }
}

impl fmt::Display for RatePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Field names follow the query string of the quote endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(rename = "roomType")]
    pub room_id: String,
    pub guests: i32,
    #[serde(default)]
    pub children: i32,
    #[serde(default)]
    pub rate_plan: RatePlan,
    // Stay dates do not affect the price
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
}

impl QuoteRequest {
    pub fn new(room_id: impl Into<String>, guests: i32, children: i32, rate_plan: RatePlan) -> Self {
        Self {
            room_id: room_id.into(),
            guests,
            children,
            rate_plan,
            check_in: None,
            check_out: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuoteResult {
    pub price: f64,
    pub available: bool,
}

impl QuoteResult {
    pub fn display_price(&self) -> String {
        format!("{:.2}", self.price)
    }
}

// Apply the pricing rules to one room
pub fn price_room(room: &RoomRecord, request: &QuoteRequest) -> f64 {
    let mut price = room.base_price;

    if let Some(rate) = room.extra_person_rate {
        if request.guests > INCLUDED_GUESTS {
            price += rate * f64::from(request.guests - INCLUDED_GUESTS);
        }
    }

    if let Some(rate) = room.extra_child_rate {
        if request.children > 0 {
            price += rate * f64::from(request.children);
        }
    }

    price + request.rate_plan.surcharge()
}

// Pure quote computation over a catalog snapshot
pub fn compute_quote(
    catalog: &Catalog,
    columns: &CatalogColumns,
    request: &QuoteRequest,
) -> Result<QuoteResult, QuoteError> {
    // Nothing to look up in an empty table, so the header is not required
    if catalog.is_empty() {
        return Err(QuoteError::RoomNotFound(request.room_id.clone()));
    }

    let schema = CatalogSchema::from_header(&catalog.header, columns)?;
    let row = schema
        .find(&catalog.rows, &request.room_id)
        .ok_or_else(|| QuoteError::RoomNotFound(request.room_id.clone()))?;
    let room = schema.project(row)?;

    Ok(QuoteResult {
        price: price_room(&room, request),
        available: room.available,
    })
}

pub struct QuoteEngine<S: TabularStore> {
    store: Arc<S>,
    config: Arc<BookingConfig>,
}

impl<S: TabularStore> QuoteEngine<S> {
    pub fn new(store: Arc<S>, config: Arc<BookingConfig>) -> Self {
        Self { store, config }
    }

    // Read the catalog table as configured for quoting
    pub async fn catalog(&self) -> Result<Catalog, QuoteError> {
        let rows = self
            .store
            .read(&self.config.catalog_table, &self.config.catalog_range)
            .await?;
        Ok(Catalog::from_rows(rows))
    }

    // Room listing, as shown on the landing and booking pages
    pub async fn rooms(&self) -> Result<Catalog, QuoteError> {
        let rows = self
            .store
            .read(&self.config.catalog_table, &self.config.rooms_range)
            .await?;
        Ok(Catalog::from_rows(rows))
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResult, QuoteError> {
        debug!(
            "Quoting room {} for {} guest(s), {} child(ren), {}",
            request.room_id, request.guests, request.children, request.rate_plan
        );

        let catalog = self.catalog().await?;
        match compute_quote(&catalog, &self.config.catalog_columns, request) {
            Ok(result) => {
                info!(
                    "Quote for room {}: {} (available: {})",
                    request.room_id,
                    result.display_price(),
                    result.available
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Quote for room {} failed: {}", request.room_id, e);
                Err(e)
            }
        }
    }
}
