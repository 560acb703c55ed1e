// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ActorRole, BookAppointmentRequest, PatientStatus, SchedulingError, TransitionAction,
};
use crate::services::booking::BookingService;
use crate::services::lifecycle::AppointmentLifecycleService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub dentist_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PatientStatusUpdate {
    pub patient_status: PatientStatus,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::InvalidDuration
        | SchedulingError::InvalidSlot
        | SchedulingError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
        SchedulingError::DentistUnavailable
        | SchedulingError::SlotConflict
        | SchedulingError::DuplicateBooking => AppError::Conflict(e.to_string()),
        SchedulingError::NotFound => AppError::NotFound(e.to_string()),
        SchedulingError::PersistenceError(msg) => AppError::Database(msg),
    }
}

fn actor_role(user: &User) -> ActorRole {
    ActorRole::from_role_str(user.role.as_deref())
}

// ==============================================================================
// SLOT AND CONFLICT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    let slots = booking_service
        .slots_for(query.date, query.service_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "date": query.date,
        "slots": slots,
    })))
}

/// Advisory pre-check so UIs can grey out taken slots. The booking path runs
/// its own authoritative check under the date lock.
#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ConflictCheckQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    // Exclusivity is clinic-wide; dentist_id does not narrow the check.
    let has_conflict = booking_service
        .check_conflict(query.date, query.time, query.service_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "dentist_id": query.dentist_id,
        "date": query.date,
        "time": query.time,
        "has_conflict": has_conflict,
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user);

    // Patients may only book for themselves; staff and owner book for anyone.
    let is_self = request.patient_id.to_string() == user.id;
    if !role.is_staff() && !is_self {
        return Err(AppError::Auth(
            "Not authorized to book appointment for this patient".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .book(request, role, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    let role = actor_role(&user);
    if !role.is_staff() && appointment.patient_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user);
    if !role.is_staff() && patient_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Not authorized to view appointments for this patient".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointments = booking_service
        .appointments_for_patient(patient_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

/// Clinic day sheet for the front desk.
#[axum::debug_handler]
pub async fn get_day_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(date): Path<NaiveDate>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !actor_role(&user).is_staff() {
        return Err(AppError::Auth(
            "Only staff can view the day sheet".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointments = booking_service
        .appointments_on(date, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "date": date,
        "appointments": appointments,
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(action): Json<TransitionAction>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user);

    // Patient-originated actions are limited to the patient's own record.
    if !role.is_staff() {
        let booking_service = BookingService::new(&state);
        let appointment = booking_service
            .get_appointment(appointment_id, auth.token())
            .await
            .map_err(map_scheduling_error)?;

        if appointment.patient_id.to_string() != user.id {
            return Err(AppError::Auth(
                "Not authorized to modify this appointment".to_string(),
            ));
        }
    }

    let lifecycle_service = AppointmentLifecycleService::new(&state);
    let appointment = lifecycle_service
        .transition(appointment_id, action, role, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn update_patient_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(update): Json<PatientStatusUpdate>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user);
    if !role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can update the same-day queue".to_string(),
        ));
    }

    let lifecycle_service = AppointmentLifecycleService::new(&state);
    let appointment = lifecycle_service
        .set_patient_status(appointment_id, update.patient_status, role, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}
