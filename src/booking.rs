// Booking writer: validates a booking, serializes it into the fixed column layout
// and appends it to the bookings and room bookings tables

use crate::config::BookingConfig;
use crate::quote::RatePlan;
use crate::store::{Row, StoreError, TabularStore};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10,15}$").unwrap());

// Column order of a booking row. Shared with the downstream sheet schema; change both together.
pub const BOOKING_COLUMNS: [&str; 12] = [
    "Timestamp",
    "Hotel Name",
    "Room Type",
    "Check-in",
    "Check-out",
    "Guests",
    "Children",
    "Rate Plan",
    "Price",
    "Name",
    "Email",
    "Phone",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Invalid booking: {0}")]
    Invalid(ValidationErrors),

    #[error("Booking failed: {0}")]
    TotalFailure(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Booking row has {0} cells, expected 12")]
    TooShort(usize),

    #[error("Invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

// Every failed check of a booking request, in form order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message).collect();
        f.write_str(&messages.join(" "))
    }
}

// Booking payload as submitted by the client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub hotel_name: Option<String>,
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    #[serde(default)]
    pub children: i32,
    pub rate_plan: RatePlan,
    pub price: f64,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl BookingRequest {
    // The store accepts anything, so these checks are the only gate before a row is written
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &'static str, message: &'static str| {
            if !ok {
                errors.push(FieldError { field, message });
            }
        };

        check(!self.name.trim().is_empty(), "name", "Name is required.");
        check(EMAIL_RE.is_match(&self.email), "email", "Valid email required.");
        check(PHONE_RE.is_match(&self.phone), "phone", "Valid phone number required.");
        check(
            !self.room_type.trim().is_empty(),
            "roomType",
            "Room selection required.",
        );
        check(self.guests >= 1, "guests", "At least 1 guest required.");
        check(self.children >= 0, "children", "Children cannot be negative.");
        check(
            self.price.is_finite() && self.price >= 0.0,
            "price",
            "Valid price required.",
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub timestamp: DateTime<Utc>,
    pub hotel_name: String,
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub children: i32,
    pub rate_plan: RatePlan,
    pub price: f64,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl BookingRecord {
    // Stamp a request; without a hotel name the room type stands in for it.
    // The stamp keeps millisecond precision, the same as the stored cell.
    pub fn from_request(request: BookingRequest, timestamp: DateTime<Utc>) -> Self {
        let timestamp = timestamp.trunc_subsecs(3);
        let hotel_name = request
            .hotel_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| request.room_type.clone());

        Self {
            timestamp,
            hotel_name,
            room_type: request.room_type,
            check_in: request.check_in,
            check_out: request.check_out,
            guests: request.guests,
            children: request.children,
            rate_plan: request.rate_plan,
            price: request.price,
            name: request.name,
            email: request.email,
            phone: request.phone,
        }
    }

    pub fn to_row(&self) -> Row {
        vec![
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.hotel_name.clone(),
            self.room_type.clone(),
            self.check_in.to_string(),
            self.check_out.to_string(),
            self.guests.to_string(),
            self.children.to_string(),
            self.rate_plan.to_string(),
            self.price.to_string(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
        ]
    }

    pub fn from_row(row: &[String]) -> Result<Self, RowError> {
        if row.len() < BOOKING_COLUMNS.len() {
            return Err(RowError::TooShort(row.len()));
        }

        let invalid = |field: &'static str, value: &str| RowError::InvalidField {
            field,
            value: value.to_string(),
        };

        let timestamp = DateTime::parse_from_rfc3339(&row[0])
            .map_err(|_| invalid("timestamp", &row[0]))?
            .with_timezone(&Utc);
        let check_in: NaiveDate = row[3].parse().map_err(|_| invalid("check-in", &row[3]))?;
        let check_out: NaiveDate = row[4].parse().map_err(|_| invalid("check-out", &row[4]))?;
        let guests: i32 = row[5].parse().map_err(|_| invalid("guests", &row[5]))?;
        let children: i32 = row[6].parse().map_err(|_| invalid("children", &row[6]))?;
        let rate_plan = RatePlan::parse(&row[7]).ok_or_else(|| invalid("rate plan", &row[7]))?;
        let price: f64 = row[8].parse().map_err(|_| invalid("price", &row[8]))?;

        Ok(Self {
            timestamp,
            hotel_name: row[1].clone(),
            room_type: row[2].clone(),
            check_in,
            check_out,
            guests,
            children,
            rate_plan,
            price,
            name: row[9].clone(),
            email: row[10].clone(),
            phone: row[11].clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableFailure {
    pub table: String,
    pub error: StoreError,
}

impl fmt::Display for TableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tab {}: {}", self.table, self.error)
    }
}

// Result of the dual append. A booking counts as written when at least one table took the row.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Ack,
    PartialFailure { table: String, error: StoreError },
    TotalFailure { errors: Vec<TableFailure> },
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SubmitOutcome::TotalFailure { .. })
    }

    pub fn into_result(self) -> Result<(), BookingError> {
        match self {
            SubmitOutcome::Ack | SubmitOutcome::PartialFailure { .. } => Ok(()),
            SubmitOutcome::TotalFailure { errors } => Err(BookingError::TotalFailure(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
        }
    }
}

pub struct BookingWriter<S: TabularStore> {
    store: Arc<S>,
    config: Arc<BookingConfig>,
}

impl<S: TabularStore> BookingWriter<S> {
    pub fn new(store: Arc<S>, config: Arc<BookingConfig>) -> Self {
        Self { store, config }
    }

    // Validate, stamp with the current time and write
    pub async fn submit(&self, request: BookingRequest) -> Result<SubmitOutcome, BookingError> {
        if let Err(errors) = request.validate() {
            warn!("Rejected booking for room {}: {}", request.room_type, errors);
            return Err(BookingError::Invalid(errors));
        }

        let record = BookingRecord::from_request(request, Utc::now());
        Ok(self.submit_booking(&record).await)
    }

    // Append the record to both tables. Both appends always run; nothing is rolled back.
    pub async fn submit_booking(&self, record: &BookingRecord) -> SubmitOutcome {
        let row = record.to_row();
        let primary = &self.config.bookings_table;
        let secondary = &self.config.room_bookings_table;
        let start_cell = &self.config.append_start_cell;

        let (primary_result, secondary_result) = futures::join!(
            self.store.append(primary, start_cell, vec![row.clone()]),
            self.store.append(secondary, start_cell, vec![row])
        );

        let outcome = match (primary_result, secondary_result) {
            (Ok(()), Ok(())) => SubmitOutcome::Ack,
            (Err(error), Ok(())) => SubmitOutcome::PartialFailure {
                table: primary.clone(),
                error,
            },
            (Ok(()), Err(error)) => SubmitOutcome::PartialFailure {
                table: secondary.clone(),
                error,
            },
            (Err(primary_error), Err(secondary_error)) => SubmitOutcome::TotalFailure {
                errors: vec![
                    TableFailure {
                        table: primary.clone(),
                        error: primary_error,
                    },
                    TableFailure {
                        table: secondary.clone(),
                        error: secondary_error,
                    },
                ],
            },
        };

        match &outcome {
            SubmitOutcome::Ack => info!(
                "Booking for {} / {} by {} written to {} and {}",
                record.hotel_name, record.room_type, record.email, primary, secondary
            ),
            SubmitOutcome::PartialFailure { table, error } => warn!(
                "Booking for {} / {} by {} not written to {}: {}",
                record.hotel_name, record.room_type, record.email, table, error
            ),
            SubmitOutcome::TotalFailure { errors } => error!(
                "Booking for {} / {} by {} failed on every table: {:?}",
                record.hotel_name, record.room_type, record.email, errors
            ),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use test_case::test_case;

    fn sample_request() -> BookingRequest {
        BookingRequest {
            hotel_name: Some("Sea View Resort".to_string()),
            room_type: "Deluxe".to_string(),
            check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            guests: 4,
            children: 1,
            rate_plan: RatePlan::WithBreakfast,
            price: 6300.0,
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9876543210".to_string(),
        }
    }

    fn sample_record() -> BookingRecord {
        let timestamp = Utc.with_ymd_and_hms(2025, 5, 20, 9, 30, 15).unwrap();
        BookingRecord::from_request(sample_request(), timestamp)
    }

    fn store_with_tables() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let header: Row = BOOKING_COLUMNS.iter().map(|c| c.to_string()).collect();
        store.insert_table("Bookings", vec![header.clone()]);
        store.insert_table("bookedrooms", vec![header]);
        store
    }

    fn writer(store: Arc<MemoryStore>) -> BookingWriter<MemoryStore> {
        BookingWriter::new(store, Arc::new(BookingConfig::default()))
    }

    #[test]
    fn test_row_column_order() {
        let row = sample_record().to_row();
        assert_eq!(
            row,
            vec![
                "2025-05-20T09:30:15.000Z",
                "Sea View Resort",
                "Deluxe",
                "2025-06-01",
                "2025-06-03",
                "4",
                "1",
                "With Breakfast",
                "6300",
                "Asha Rao",
                "asha@example.com",
                "9876543210",
            ]
        );
        assert_eq!(row.len(), BOOKING_COLUMNS.len());
    }

    #[test]
    fn test_hotel_name_falls_back_to_room_type() {
        let mut request = sample_request();
        request.hotel_name = None;
        let record = BookingRecord::from_request(request, Utc::now());
        assert_eq!(record.hotel_name, "Deluxe");

        let mut request = sample_request();
        request.hotel_name = Some("  ".to_string());
        let record = BookingRecord::from_request(request, Utc::now());
        assert_eq!(record.hotel_name, "Deluxe");
    }

    #[test]
    fn test_from_row_rejects_malformed() {
        let mut row = sample_record().to_row();
        row[5] = "four".to_string();
        assert_eq!(
            BookingRecord::from_row(&row),
            Err(RowError::InvalidField {
                field: "guests",
                value: "four".to_string()
            })
        );

        assert_eq!(
            BookingRecord::from_row(&row[..4]),
            Err(RowError::TooShort(4))
        );
    }

    #[test]
    fn test_valid_request() {
        assert_eq!(sample_request().validate(), Ok(()));
    }

    #[test_case(|r: &mut BookingRequest| { r.name = " ".to_string(); }, "name"; "blank name")]
    #[test_case(|r: &mut BookingRequest| { r.email = "asha.example.com".to_string(); }, "email"; "email without at")]
    #[test_case(|r: &mut BookingRequest| { r.email = "asha@example".to_string(); }, "email"; "email without dot")]
    #[test_case(|r: &mut BookingRequest| { r.phone = "12345".to_string(); }, "phone"; "short phone")]
    #[test_case(|r: &mut BookingRequest| { r.phone = "1234567890123456".to_string(); }, "phone"; "long phone")]
    #[test_case(|r: &mut BookingRequest| { r.phone = "+919876543210".to_string(); }, "phone"; "phone with plus")]
    #[test_case(|r: &mut BookingRequest| { r.phone = "٠١٢٣٤٥٦٧٨٩".to_string(); }, "phone"; "arabic indic digits")]
    #[test_case(|r: &mut BookingRequest| { r.phone = "१२३४५६७८९०".to_string(); }, "phone"; "devanagari digits")]
    #[test_case(|r: &mut BookingRequest| { r.room_type = String::new(); }, "roomType"; "no room")]
    #[test_case(|r: &mut BookingRequest| { r.guests = 0; }, "guests"; "no guests")]
    #[test_case(|r: &mut BookingRequest| { r.children = -1; }, "children"; "negative children")]
    #[test_case(|r: &mut BookingRequest| { r.price = f64::NAN; }, "price"; "nan price")]
    fn test_invalid_request(mutate: fn(&mut BookingRequest), field: &str) {
        let mut request = sample_request();
        mutate(&mut request);
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.0.len(), 1);
        assert!(errors.has(field));
    }

    #[test]
    fn test_all_validation_errors_reported() {
        let mut request = sample_request();
        request.name = String::new();
        request.email = String::new();
        request.phone = String::new();
        let errors = request.validate().unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Name is required. Valid email required. Valid phone number required."
        );
    }

    #[tokio::test]
    async fn test_both_tables_written() {
        let store = store_with_tables();
        let outcome = writer(store.clone()).submit_booking(&sample_record()).await;

        assert_eq!(outcome, SubmitOutcome::Ack);
        assert_eq!(store.row_count("Bookings"), 2);
        assert_eq!(store.row_count("bookedrooms"), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_success() {
        let store = store_with_tables();
        store.fail_table("bookedrooms", StoreError::Network("quota exceeded".to_string()));

        let outcome = writer(store.clone()).submit_booking(&sample_record()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::PartialFailure {
                table: "bookedrooms".to_string(),
                error: StoreError::Network("quota exceeded".to_string()),
            }
        );
        assert!(outcome.is_success());
        assert_eq!(outcome.into_result(), Ok(()));

        // The surviving table still got its row
        assert_eq!(store.row_count("Bookings"), 2);
        assert_eq!(store.row_count("bookedrooms"), 1);
    }

    #[tokio::test]
    async fn test_primary_failure_still_writes_secondary() {
        let store = store_with_tables();
        store.fail_table("Bookings", StoreError::Other("protected range".to_string()));

        let outcome = writer(store.clone()).submit_booking(&sample_record()).await;
        assert!(matches!(
            outcome,
            SubmitOutcome::PartialFailure { ref table, .. } if table == "Bookings"
        ));
        assert_eq!(store.row_count("bookedrooms"), 2);
    }

    #[tokio::test]
    async fn test_total_failure_carries_both_messages() {
        let store = store_with_tables();
        store.fail_table("Bookings", StoreError::Network("connection reset".to_string()));
        store.fail_table(
            "bookedrooms",
            StoreError::Api {
                status: 403,
                message: "The caller does not have permission".to_string(),
            },
        );

        let outcome = writer(store.clone()).submit_booking(&sample_record()).await;
        assert!(!outcome.is_success());

        let message = match outcome.into_result() {
            Err(BookingError::TotalFailure(message)) => message,
            other => panic!("expected total failure, got {:?}", other),
        };
        assert_eq!(
            message,
            "Tab Bookings: Network error: connection reset; \
             Tab bookedrooms: Store API error: 403 - The caller does not have permission"
        );
    }

    #[tokio::test]
    async fn test_resubmission_duplicates_rows() {
        let store = store_with_tables();
        let writer = writer(store.clone());
        let record = sample_record();

        writer.submit_booking(&record).await;
        writer.submit_booking(&record).await;

        let rows = store.read("Bookings", "A1:Z").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], rows[2]);
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let store = store_with_tables();
        let record = sample_record();
        writer(store.clone()).submit_booking(&record).await;

        for table in ["Bookings", "bookedrooms"] {
            let rows = store.read(table, "A1:Z").await.unwrap();
            assert_eq!(rows[1], record.to_row());
            assert_eq!(BookingRecord::from_row(&rows[1]).unwrap(), record);
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_request_before_writing() {
        let store = store_with_tables();
        let mut request = sample_request();
        request.phone = "abc".to_string();

        let result = writer(store.clone()).submit(request).await;
        assert!(matches!(result, Err(BookingError::Invalid(ref e)) if e.has("phone")));
        assert_eq!(store.row_count("Bookings"), 1);
        assert_eq!(store.row_count("bookedrooms"), 1);
    }

    #[tokio::test]
    async fn test_submit_stamps_and_writes() {
        let store = store_with_tables();
        let before = Utc::now();
        let outcome = writer(store.clone()).submit(sample_request()).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ack);

        let rows = store.read("bookedrooms", "A1:Z").await.unwrap();
        let record = BookingRecord::from_row(&rows[1]).unwrap();
        // Millisecond precision in the sheet
        assert!(record.timestamp >= before - chrono::Duration::milliseconds(1));
        assert_eq!(record.email, "asha@example.com");
    }

    #[test]
    fn test_stamped_record_round_trips() {
        let timestamp = Utc.with_ymd_and_hms(2025, 5, 20, 9, 30, 15).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let record = BookingRecord::from_request(sample_request(), timestamp);
        assert_eq!(record.timestamp.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(BookingRecord::from_row(&record.to_row()).unwrap(), record);

        let now = BookingRecord::from_request(sample_request(), Utc::now());
        assert_eq!(BookingRecord::from_row(&now.to_row()).unwrap(), now);
    }

    #[test]
    fn test_request_from_client_json() {
        let request: BookingRequest = serde_json::from_str(
            r#"{
                "roomType": "Deluxe",
                "checkIn": "2025-06-01",
                "checkOut": "2025-06-03",
                "guests": 4,
                "children": 1,
                "ratePlan": "With Breakfast",
                "price": 6300,
                "name": "Asha Rao",
                "email": "asha@example.com",
                "phone": "9876543210",
                "hotelName": "Sea View Resort"
            }"#,
        )
        .unwrap();
        assert_eq!(request, sample_request());
    }
}
