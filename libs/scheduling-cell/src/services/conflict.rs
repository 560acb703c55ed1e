// libs/scheduling-cell/src/services/conflict.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    minutes_since_midnight, Appointment, BlockedInterval, SchedulingError, SchedulingRules,
    Service,
};

/// PostgREST filter selecting the statuses that hold their slot.
const ACTIVE_STATUS_FILTER: &str = "status=in.(pending,confirmed,waiting)";

/// Detects overlap between a proposed interval and everything already
/// occupying the clinic calendar on that date: active appointments and
/// administratively blocked time ranges.
pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
    rules: SchedulingRules,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            rules: SchedulingRules::default(),
        }
    }

    /// Check whether `[start_time, start_time + duration)` overlaps any active
    /// appointment or blocked interval on `date`.
    ///
    /// No dentist filter: the clinic books one shared calendar, so any active
    /// appointment blocks the interval regardless of which dentist holds it.
    /// Blocked intervals are clinic-wide by definition.
    pub async fn has_conflict(
        &self,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        debug!(
            "Checking conflicts on {} for {} + {} min",
            date, start_time, duration_minutes
        );

        let proposed_start = minutes_since_midnight(start_time);
        let proposed_end = proposed_start + duration_minutes;

        let appointments = self
            .get_active_appointments_on(date, exclude_appointment_id, auth_token)
            .await?;
        let durations = self
            .load_service_durations(&appointments, auth_token)
            .await?;

        for appointment in &appointments {
            let other_start = minutes_since_midnight(appointment.time);
            let other_end = other_start + self.duration_of(appointment, &durations);

            if intervals_overlap(proposed_start, proposed_end, other_start, other_end) {
                warn!(
                    "Conflict on {}: proposed {}-{} overlaps appointment {} ({}-{})",
                    date, proposed_start, proposed_end, appointment.id, other_start, other_end
                );
                return Ok(true);
            }
        }

        for blocked in &self.get_blocked_intervals_on(date, auth_token).await? {
            let blocked_start = minutes_since_midnight(blocked.start_time);
            let blocked_end = minutes_since_midnight(blocked.end_time);

            if intervals_overlap(proposed_start, proposed_end, blocked_start, blocked_end) {
                warn!(
                    "Conflict on {}: proposed {}-{} overlaps blocked interval {} ({})",
                    date, proposed_start, proposed_end, blocked.id, blocked.reason
                );
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Resolve the booking duration for a service, falling back to the clinic
    /// default when no service is assigned or the row is missing.
    pub async fn resolve_service_duration(
        &self,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<i32, SchedulingError> {
        let Some(service_id) = service_id else {
            return Ok(self.rules.default_duration_minutes);
        };

        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        let duration = result
            .first()
            .and_then(|row| row.get("duration_minutes"))
            .and_then(|v| v.as_i64())
            .map(|d| d as i32)
            .unwrap_or(self.rules.default_duration_minutes);

        Ok(duration)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_active_appointments_on(
        &self,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = vec![
            format!("date=eq.{}", date),
            ACTIVE_STATUS_FILTER.to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=time.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                SchedulingError::PersistenceError(format!("Failed to parse appointments: {}", e))
            })
    }

    async fn get_blocked_intervals_on(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BlockedInterval>, SchedulingError> {
        let path = format!("/rest/v1/blocked_intervals?date=eq.{}", date);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BlockedInterval>, _>>()
            .map_err(|e| {
                SchedulingError::PersistenceError(format!(
                    "Failed to parse blocked intervals: {}",
                    e
                ))
            })
    }

    /// Fetch durations for every service referenced by the given appointments
    /// in one query.
    async fn load_service_durations(
        &self,
        appointments: &[Appointment],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, i32>, SchedulingError> {
        let service_ids: BTreeSet<Uuid> =
            appointments.iter().filter_map(|a| a.service_id).collect();

        if service_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = service_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/services?id=in.({})", id_list);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        let services: Vec<Service> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Service>, _>>()
            .map_err(|e| {
                SchedulingError::PersistenceError(format!("Failed to parse services: {}", e))
            })?;

        Ok(services
            .into_iter()
            .map(|s| (s.id, s.duration_minutes))
            .collect())
    }

    fn duration_of(&self, appointment: &Appointment, durations: &HashMap<Uuid, i32>) -> i32 {
        appointment
            .service_id
            .and_then(|id| durations.get(&id).copied())
            .unwrap_or(self.rules.default_duration_minutes)
    }
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`
/// overlap iff `a_start < b_end && a_end > b_start`. Touching boundaries do
/// not overlap, so back-to-back appointments are legal.
fn intervals_overlap(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && a_end > b_start
}
