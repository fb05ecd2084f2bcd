// Hotel booking core: room quotes from a spreadsheet catalog and dual-table booking writes

pub mod admin;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod quote;
pub mod store;

// Re-export key types for convenience
pub use admin::{AdminError, AdminView};
pub use booking::{
    BookingError, BookingRecord, BookingRequest, BookingWriter, SubmitOutcome, TableFailure,
    ValidationErrors,
};
pub use catalog::{Catalog, CatalogColumns, CatalogError, CatalogSchema, RoomRecord};
pub use config::{BookingConfig, ConfigError};
pub use quote::{compute_quote, QuoteEngine, QuoteError, QuoteRequest, QuoteResult, RatePlan};
pub use store::{MemoryStore, Row, SheetsStore, StoreError, TabularStore};
