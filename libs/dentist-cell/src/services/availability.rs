use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailabilityWindow, Dentist, DentistError, BOOKING_HORIZON_DAYS};

/// Resolves per-date booking eligibility for dentists.
///
/// Availability is authorized date by date by clinic staff; this service only
/// reads those decisions. A date without an `availability_windows` row is
/// closed for booking.
pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Is this dentist open for booking on `date` at all?
    ///
    /// Fail-closed: a missing row or a fetch of `is_available=false` both
    /// answer "no". Only transport failures surface as errors.
    pub async fn is_dentist_available(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool, DentistError> {
        debug!("Checking availability for dentist {} on {}", dentist_id, date);

        let path = format!(
            "/rest/v1/availability_windows?dentist_id=eq.{}&date=eq.{}",
            dentist_id, date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DentistError::DatabaseError(e.to_string()))?;

        let available = result
            .first()
            .and_then(|row| row.get("is_available"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(available)
    }

    /// All dates in `[from, to]` the dentist can be booked on, clamped to the
    /// booking horizon `[today, today + 90 days]`.
    pub async fn available_dates(
        &self,
        dentist_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<BTreeSet<NaiveDate>, DentistError> {
        let horizon_end = today + Duration::days(BOOKING_HORIZON_DAYS);
        let lo = from.max(today);
        let hi = to.min(horizon_end);

        if lo > hi {
            return Ok(BTreeSet::new());
        }

        debug!(
            "Fetching available dates for dentist {} between {} and {}",
            dentist_id, lo, hi
        );

        let path = format!(
            "/rest/v1/availability_windows?dentist_id=eq.{}&date=gte.{}&date=lte.{}&is_available=eq.true&order=date.asc",
            dentist_id, lo, hi
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DentistError::DatabaseError(e.to_string()))?;

        let windows: Vec<AvailabilityWindow> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| {
                DentistError::DatabaseError(format!("Failed to parse availability windows: {}", e))
            })?;

        Ok(windows
            .into_iter()
            .map(|w| w.date)
            .filter(|date| *date >= lo && *date <= hi)
            .collect())
    }

    pub async fn get_dentist(
        &self,
        dentist_id: Uuid,
        auth_token: &str,
    ) -> Result<Dentist, DentistError> {
        let path = format!("/rest/v1/dentists?id=eq.{}", dentist_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DentistError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DentistError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| DentistError::DatabaseError(format!("Failed to parse dentist: {}", e)))
    }

    pub async fn list_dentists(&self, auth_token: &str) -> Result<Vec<Dentist>, DentistError> {
        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/dentists?order=name.asc",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| DentistError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Dentist>, _>>()
            .map_err(|e| DentistError::DatabaseError(format!("Failed to parse dentists: {}", e)))
    }
}
