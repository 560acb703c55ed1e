// libs/scheduling-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dentist_cell::models::DentistError;
use dentist_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ActorRole, Appointment, AppointmentStatus, PatientStatus, SchedulingError, TransitionAction,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::locking::DateLockService;
use crate::services::slots::TimeSlotService;

/// The appointment state machine.
///
/// Every mutation of an appointment after booking goes through `transition`;
/// the allowed moves are a fixed table of (status, action, actor role).
/// Terminal statuses (completed, missed, cancelled) accept nothing.
pub struct AppointmentLifecycleService {
    supabase: Arc<SupabaseClient>,
    slot_service: TimeSlotService,
    conflict_service: ConflictDetectionService,
    availability_service: AvailabilityService,
    lock_service: DateLockService,
}

impl AppointmentLifecycleService {
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

    /// Validate a (status, action, actor) triple against the transition table.
    /// Pure; no persistence involved.
    pub fn validate_transition(
        &self,
        status: AppointmentStatus,
        action: &TransitionAction,
        actor: ActorRole,
    ) -> Result<(), SchedulingError> {
        use AppointmentStatus::*;
        use TransitionAction::*;

        let allowed = match (action, status) {
            (Approve, Pending) => actor.is_staff(),
            (MarkWaiting, Confirmed) => actor.is_staff(),
            (Complete, Confirmed | Waiting) => actor.is_staff(),
            (MarkMissed, Confirmed) => actor.is_staff(),
            (Cancel, Pending | Confirmed) => actor.is_staff(),
            (RequestReschedule { .. }, Pending | Confirmed) => actor == ActorRole::Patient,
            (RequestCancel { .. }, Pending | Confirmed) => actor == ActorRole::Patient,
            (ApproveReschedule | RejectReschedule, RescheduleRequested) => actor.is_staff(),
            (ApproveCancel | RejectCancel, CancelRequested) => actor.is_staff(),
            _ => false,
        };

        if !allowed {
            warn!(
                "Rejected transition '{}' from status '{}'",
                action.name(),
                status
            );
            return Err(SchedulingError::InvalidTransition {
                from: status,
                action: action.name().to_string(),
            });
        }

        Ok(())
    }

    /// Apply a state-machine action to an appointment.
    ///
    /// Approving a reschedule is itself a booking operation: the proposed
    /// slot is re-validated (grid, dentist availability, conflicts) under the
    /// date lock before anything is written. On any failure the appointment
    /// keeps its current status and fields.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        action: TransitionAction,
        actor: ActorRole,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        self.validate_transition(appointment.status, &action, actor)?;

        debug!(
            "Applying '{}' to appointment {} (status '{}')",
            action.name(),
            appointment_id,
            appointment.status
        );

        let updated = match action {
            TransitionAction::ApproveReschedule => {
                self.approve_reschedule(&appointment, auth_token).await?
            }
            other => {
                let patch = Self::build_patch(&other);
                self.apply_patch(appointment_id, patch, auth_token).await?
            }
        };

        info!(
            "Appointment {} moved to status '{}'",
            appointment_id, updated.status
        );
        Ok(updated)
    }

    /// Same-day triage annotation. Layered on top of the booking statuses for
    /// the clinic floor; it never feeds back into `status` or conflict
    /// detection.
    pub async fn set_patient_status(
        &self,
        appointment_id: Uuid,
        patient_status: PatientStatus,
        actor: ActorRole,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        let queue_eligible = matches!(
            appointment.status,
            AppointmentStatus::Confirmed | AppointmentStatus::Waiting | AppointmentStatus::Completed
        );
        let is_today = appointment.date == Local::now().date_naive();

        if !actor.is_staff() || !queue_eligible || !is_today {
            return Err(SchedulingError::InvalidTransition {
                from: appointment.status,
                action: "set_patient_status".to_string(),
            });
        }

        let mut patch = Map::new();
        patch.insert(
            "patient_status".to_string(),
            json!(patient_status.to_string()),
        );

        self.apply_patch(appointment_id, patch, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Field updates for every action except ApproveReschedule, which needs
    /// re-validation and runs its own path.
    fn build_patch(action: &TransitionAction) -> Map<String, Value> {
        let mut patch = Map::new();

        match action {
            TransitionAction::Approve => {
                patch.insert("status".into(), json!("confirmed"));
            }
            TransitionAction::MarkWaiting => {
                patch.insert("status".into(), json!("waiting"));
            }
            TransitionAction::Complete => {
                patch.insert("status".into(), json!("completed"));
                // Set exactly once; completable statuses never carry a value.
                patch.insert("completed_at".into(), json!(Utc::now().to_rfc3339()));
            }
            TransitionAction::MarkMissed => {
                patch.insert("status".into(), json!("missed"));
            }
            TransitionAction::Cancel => {
                patch.insert("status".into(), json!("cancelled"));
            }
            TransitionAction::RequestReschedule {
                date,
                time,
                service_id,
                dentist_id,
                notes,
            } => {
                patch.insert("status".into(), json!("reschedule_requested"));
                patch.insert("reschedule_date".into(), json!(date.to_string()));
                patch.insert(
                    "reschedule_time".into(),
                    json!(time.format("%H:%M:%S").to_string()),
                );
                patch.insert("reschedule_service_id".into(), json!(service_id));
                patch.insert("reschedule_dentist_id".into(), json!(dentist_id));
                patch.insert("reschedule_notes".into(), json!(notes));
            }
            TransitionAction::RejectReschedule => {
                patch.insert("status".into(), json!("confirmed"));
                Self::clear_reschedule_fields(&mut patch);
            }
            TransitionAction::RequestCancel { reason } => {
                patch.insert("status".into(), json!("cancel_requested"));
                patch.insert("cancel_reason".into(), json!(reason));
            }
            TransitionAction::ApproveCancel => {
                // cancel_reason is retained for audit.
                patch.insert("status".into(), json!("cancelled"));
            }
            TransitionAction::RejectCancel => {
                patch.insert("status".into(), json!("confirmed"));
                patch.insert("cancel_reason".into(), Value::Null);
            }
            TransitionAction::ApproveReschedule => {
                unreachable!("approve_reschedule runs its own commit path");
            }
        }

        patch
    }

    async fn approve_reschedule(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let (Some(new_date), Some(new_time)) =
            (appointment.reschedule_date, appointment.reschedule_time)
        else {
            // A reschedule_requested row without a proposed slot is corrupt;
            // refuse rather than guess.
            return Err(SchedulingError::InvalidTransition {
                from: appointment.status,
                action: "approve_reschedule".to_string(),
            });
        };

        let new_service_id = appointment.reschedule_service_id;
        let new_dentist_id = appointment.reschedule_dentist_id;

        let duration = self
            .conflict_service
            .resolve_service_duration(new_service_id, auth_token)
            .await?;

        self.lock_service.acquire(new_date).await?;
        let outcome = self
            .commit_reschedule(
                appointment,
                new_date,
                new_time,
                new_service_id,
                new_dentist_id,
                duration,
                auth_token,
            )
            .await;
        if let Err(e) = self.lock_service.release(new_date).await {
            warn!("Failed to release date lock for {}: {}", new_date, e);
        }

        outcome
    }

    /// Approval is a booking: the proposed slot is validated exactly like a
    /// fresh booking before the overwrite is committed, all under the date
    /// lock.
    #[allow(clippy::too_many_arguments)]
    async fn commit_reschedule(
        &self,
        appointment: &Appointment,
        new_date: NaiveDate,
        new_time: NaiveTime,
        new_service_id: Option<Uuid>,
        new_dentist_id: Option<Uuid>,
        duration: i32,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = Local::now().naive_local();

        if !self
            .slot_service
            .is_bookable_slot(new_date, new_time, duration, now)?
        {
            return Err(SchedulingError::InvalidSlot);
        }

        if let Some(dentist_id) = new_dentist_id {
            let available = self
                .availability_service
                .is_dentist_available(dentist_id, new_date, auth_token)
                .await
                .map_err(|e| match e {
                    DentistError::NotFound => SchedulingError::DentistUnavailable,
                    DentistError::DatabaseError(msg) => SchedulingError::PersistenceError(msg),
                })?;
            if !available {
                return Err(SchedulingError::DentistUnavailable);
            }
        }

        if self
            .conflict_service
            .has_conflict(
                new_date,
                new_time,
                duration,
                Some(appointment.id),
                auth_token,
            )
            .await?
        {
            warn!(
                "Reschedule approval for appointment {} lost its slot {} {}",
                appointment.id, new_date, new_time
            );
            return Err(SchedulingError::SlotConflict);
        }

        let mut patch = Map::new();
        patch.insert("status".into(), json!("confirmed"));
        patch.insert("date".into(), json!(new_date.to_string()));
        patch.insert(
            "time".into(),
            json!(new_time.format("%H:%M:%S").to_string()),
        );
        patch.insert("service_id".into(), json!(new_service_id));
        patch.insert("dentist_id".into(), json!(new_dentist_id));
        Self::clear_reschedule_fields(&mut patch);

        self.apply_patch(appointment.id, patch, auth_token).await
    }

    fn clear_reschedule_fields(patch: &mut Map<String, Value>) {
        patch.insert("reschedule_date".into(), Value::Null);
        patch.insert("reschedule_time".into(), Value::Null);
        patch.insert("reschedule_service_id".into(), Value::Null);
        patch.insert("reschedule_dentist_id".into(), Value::Null);
        patch.insert("reschedule_notes".into(), Value::Null);
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
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

    async fn apply_patch(
        &self,
        appointment_id: Uuid,
        mut patch: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        patch.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_returning(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(patch)),
            )
            .await
            .map_err(|e| SchedulingError::PersistenceError(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::PersistenceError(
                "Failed to update appointment".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            SchedulingError::PersistenceError(format!("Failed to parse updated appointment: {}", e))
        })
    }
}
