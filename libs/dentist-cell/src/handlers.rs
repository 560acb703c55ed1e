// libs/dentist-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Duration, Local, NaiveDate};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{DentistError, BOOKING_HORIZON_DAYS};
use crate::services::availability::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct AvailableDatesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn map_dentist_error(e: DentistError) -> AppError {
    match e {
        DentistError::NotFound => AppError::NotFound("Dentist not found".to_string()),
        DentistError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_dentists(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let dentists = service
        .list_dentists(auth.token())
        .await
        .map_err(map_dentist_error)?;

    Ok(Json(json!({ "dentists": dentists })))
}

/// Dates within the booking horizon on which the dentist accepts bookings.
/// Defaults to the full horizon when no range is given.
#[axum::debug_handler]
pub async fn get_available_dates(
    State(state): State<Arc<AppConfig>>,
    Path(dentist_id): Path<Uuid>,
    Query(query): Query<AvailableDatesQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let today = Local::now().date_naive();
    let from = query.from.unwrap_or(today);
    let to = query
        .to
        .unwrap_or(today + Duration::days(BOOKING_HORIZON_DAYS));

    let service = AvailabilityService::new(&state);
    let dates = service
        .available_dates(dentist_id, from, to, today, auth.token())
        .await
        .map_err(map_dentist_error)?;

    Ok(Json(json!({
        "dentist_id": dentist_id,
        "dates": dates,
    })))
}

#[axum::debug_handler]
pub async fn get_availability_for_date(
    State(state): State<Arc<AppConfig>>,
    Path((dentist_id, date)): Path<(Uuid, NaiveDate)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let is_available = service
        .is_dentist_available(dentist_id, date, auth.token())
        .await
        .map_err(map_dentist_error)?;

    Ok(Json(json!({
        "dentist_id": dentist_id,
        "date": date,
        "is_available": is_available,
    })))
}
