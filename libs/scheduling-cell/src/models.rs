// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// Reference data owned by the catalogue side of the clinic. The engine only
/// reads `duration_minutes`, which drives slot length and the overlap window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub category: String,
}

/// Clinic-wide closed time range (holiday, staff meeting). Applies to every
/// dentist; created by staff outside this cell and never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub patient_status: Option<PatientStatus>,
    pub reschedule_date: Option<NaiveDate>,
    pub reschedule_time: Option<NaiveTime>,
    pub reschedule_service_id: Option<Uuid>,
    pub reschedule_dentist_id: Option<Uuid>,
    pub reschedule_notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Waiting,
    Completed,
    Missed,
    Cancelled,
    RescheduleRequested,
    CancelRequested,
}

impl AppointmentStatus {
    /// Active appointments hold their slot for conflict detection.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed | AppointmentStatus::Waiting
        )
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Missed | AppointmentStatus::Cancelled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Waiting => write!(f, "waiting"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Missed => write!(f, "missed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::RescheduleRequested => write!(f, "reschedule_requested"),
            AppointmentStatus::CancelRequested => write!(f, "cancel_requested"),
        }
    }
}

/// Same-day clinic-floor triage annotation. Orthogonal to `status`: it tracks
/// where the patient is in the day's queue and never affects booking
/// exclusivity or conflict detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Waiting,
    Ongoing,
    Done,
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientStatus::Waiting => write!(f, "waiting"),
            PatientStatus::Ongoing => write!(f, "ongoing"),
            PatientStatus::Done => write!(f, "done"),
        }
    }
}

/// Who is acting on the engine. Staff and owner share the same transition
/// rights; everyone else is treated as a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Patient,
    Staff,
    Owner,
}

impl ActorRole {
    pub fn from_role_str(role: Option<&str>) -> Self {
        match role {
            Some("staff") => ActorRole::Staff,
            Some("owner") => ActorRole::Owner,
            _ => ActorRole::Patient,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, ActorRole::Staff | ActorRole::Owner)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Candidate start time on the service-duration grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub value: NaiveTime,
    pub display_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: Option<String>,
}

/// State-machine action carried by `POST /{id}/transition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionAction {
    Approve,
    MarkWaiting,
    Complete,
    MarkMissed,
    Cancel,
    RequestReschedule {
        date: NaiveDate,
        time: NaiveTime,
        service_id: Option<Uuid>,
        dentist_id: Option<Uuid>,
        notes: Option<String>,
    },
    ApproveReschedule,
    RejectReschedule,
    RequestCancel {
        reason: String,
    },
    ApproveCancel,
    RejectCancel,
}

impl TransitionAction {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionAction::Approve => "approve",
            TransitionAction::MarkWaiting => "mark_waiting",
            TransitionAction::Complete => "complete",
            TransitionAction::MarkMissed => "mark_missed",
            TransitionAction::Cancel => "cancel",
            TransitionAction::RequestReschedule { .. } => "request_reschedule",
            TransitionAction::ApproveReschedule => "approve_reschedule",
            TransitionAction::RejectReschedule => "reject_reschedule",
            TransitionAction::RequestCancel { .. } => "request_cancel",
            TransitionAction::ApproveCancel => "approve_cancel",
            TransitionAction::RejectCancel => "reject_cancel",
        }
    }
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub default_duration_minutes: i32,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            opening_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            default_duration_minutes: 30,
        }
    }
}

/// Minutes since midnight; all interval arithmetic happens in this unit.
pub fn minutes_since_midnight(time: NaiveTime) -> i32 {
    use chrono::Timelike;
    (time.hour() * 60 + time.minute()) as i32
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulingError {
    #[error("Service duration must be a positive number of minutes")]
    InvalidDuration,

    #[error("Requested time is not a bookable slot")]
    InvalidSlot,

    #[error("Dentist is not available on the requested date")]
    DentistUnavailable,

    #[error("Requested slot conflicts with an existing booking or blocked time")]
    SlotConflict,

    #[error("Patient already holds an identical active booking")]
    DuplicateBooking,

    #[error("Action '{action}' is not allowed from status '{from}'")]
    InvalidTransition {
        from: AppointmentStatus,
        action: String,
    },

    #[error("Appointment not found")]
    NotFound,

    #[error("Persistence error: {0}")]
    PersistenceError(String),
}
