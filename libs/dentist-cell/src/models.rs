// libs/dentist-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How far into the future a dentist may be booked. Staff authorize dates one
/// by one, so anything past the horizon is never offered regardless of data.
pub const BOOKING_HORIZON_DAYS: i64 = 90;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dentist {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-date booking eligibility for a dentist. One row per (dentist, date);
/// a missing row means "not bookable" — there is no day-of-week recurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub dentist_id: Uuid,
    pub date: NaiveDate,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DentistError {
    #[error("Dentist not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
