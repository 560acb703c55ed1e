// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dentist_cell::models::DentistError;
use dentist_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ActorRole, Appointment, AppointmentStatus, BookAppointmentRequest, SchedulingError, TimeSlot,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::locking::DateLockService;
use crate::services::slots::TimeSlotService;

/// PostgREST filter selecting the statuses that hold their slot.
const ACTIVE_STATUS_FILTER: &str = "status=in.(pending,confirmed,waiting)";

/// Orchestrates a booking as one logical operation: slot validation, dentist
/// availability, conflict detection and the insert, serialized against other
/// writers through the per-date advisory lock.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    slot_service: TimeSlotService,
    conflict_service: ConflictDetectionService,
    availability_service: AvailabilityService,
    lock_service: DateLockService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            slot_service: TimeSlotService::new(),
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            availability_service: AvailabilityService::new(config),
            lock_service: DateLockService::new(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Book an appointment. Preconditions run in order and the first violated
    /// one is returned; the whole check-then-insert executes under the date
    /// lock so concurrent requests for the same day serialize (the loser of a
    /// race gets `SlotConflict`).
    ///
    /// The initial status follows from who books: staff and owner bookings
    /// are confirmed immediately, patient self-service bookings start pending.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        role: ActorRole,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking request for patient {} on {} at {}",
            request.patient_id, request.date, request.time
        );

        let duration = self
            .conflict_service
            .resolve_service_duration(request.service_id, auth_token)
            .await?;

        self.lock_service.acquire(request.date).await?;
        let outcome = self
            .book_under_lock(&request, role, duration, auth_token)
            .await;
        if let Err(e) = self.lock_service.release(request.date).await {
            warn!("Failed to release date lock for {}: {}", request.date, e);
        }

        match &outcome {
            Ok(appointment) => info!(
                "Appointment {} booked with status {}",
                appointment.id, appointment.status
            ),
            Err(e) => debug!("Booking rejected for patient {}: {}", request.patient_id, e),
        }

        outcome
    }

    async fn book_under_lock(
        &self,
        request: &BookAppointmentRequest,
        role: ActorRole,
        duration: i32,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = Local::now().naive_local();

        // 1. The requested time must land on the slot grid.
        if !self
            .slot_service
            .is_bookable_slot(request.date, request.time, duration, now)?
        {
            return Err(SchedulingError::InvalidSlot);
        }

        // 2. When a dentist was chosen, that dentist must be open for the date.
        if let Some(dentist_id) = request.dentist_id {
            if !self
                .is_dentist_available(dentist_id, request.date, auth_token)
                .await?
            {
                return Err(SchedulingError::DentistUnavailable);
            }
        }

        // 3. Authoritative conflict check, inside the critical section.
        if self
            .conflict_service
            .has_conflict(request.date, request.time, duration, None, auth_token)
            .await?
        {
            return Err(SchedulingError::SlotConflict);
        }

        // 4. Same patient, same (date, time, service): an idempotency guard
        //    distinct from slot exclusivity.
        if self.has_duplicate_booking(request, auth_token).await? {
            return Err(SchedulingError::DuplicateBooking);
        }

        // 5. Commit.
        let status = if role.is_staff() {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Pending
        };

        self.insert_appointment(request, status, auth_token).await
    }

    /// Bookable slots for a date, duration resolved from the service.
    pub async fn slots_for(
        &self,
        date: NaiveDate,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let duration = self
            .conflict_service
            .resolve_service_duration(service_id, auth_token)
            .await?;

        self.slot_service
            .generate_slots(date, duration, Local::now().naive_local())
    }

    /// Advisory conflict pre-check for UIs. The authoritative check happens
    /// again inside `book` under the date lock.
    pub async fn check_conflict(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let duration = self
            .conflict_service
            .resolve_service_duration(service_id, auth_token)
            .await?;

        self.conflict_service
            .has_conflict(date, time, duration, None, auth_token)
            .await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::NotFound);
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            SchedulingError::PersistenceError(format!("Failed to parse appointment: {}", e))
        })
    }

    pub async fn appointments_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=date.desc,time.desc",
            patient_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    /// Day sheet: every appointment on a date, regardless of status.
    pub async fn appointments_on(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?date=eq.{}&order=time.asc", date);
        self.fetch_appointments(&path, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn is_dentist_available(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        self.availability_service
            .is_dentist_available(dentist_id, date, auth_token)
            .await
            .map_err(|e| match e {
                DentistError::NotFound => SchedulingError::DentistUnavailable,
                DentistError::DatabaseError(msg) => SchedulingError::PersistenceError(msg),
            })
    }

    async fn has_duplicate_booking(
        &self,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&date=eq.{}&time=eq.{}&{}",
            request.patient_id,
            request.date,
            urlencoding::encode(&request.time.format("%H:%M:%S").to_string()),
            ACTIVE_STATUS_FILTER
        );

        let existing = self.fetch_appointments(&path, auth_token).await?;

        Ok(existing
            .iter()
            .any(|appointment| appointment.service_id == request.service_id))
    }

    async fn insert_appointment(
        &self,
        request: &BookAppointmentRequest,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = chrono::Utc::now();

        let appointment_data = json!({
            "patient_id": request.patient_id,
            "dentist_id": request.dentist_id,
            "service_id": request.service_id,
            "date": request.date.to_string(),
            "time": request.time.format("%H:%M:%S").to_string(),
            "notes": request.notes,
            "status": status.to_string(),
            "patient_status": null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .request_returning(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
            )
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::PersistenceError(
                "Failed to create appointment".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            SchedulingError::PersistenceError(format!("Failed to parse created appointment: {}", e))
        })
    }

    async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
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
}
