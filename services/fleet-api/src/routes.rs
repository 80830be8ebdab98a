//! HTTP router and resource handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use error_types::ServiceError;
use idempotency_gate::IdempotencyLayer;
use request_tracker::RequestTracker;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::cars::{CarRepository, CreateCar, UpdateCar};

#[derive(Clone)]
pub struct AppState {
    pub cars: Arc<CarRepository>,
}

/// Build the service router with the idempotency gate on mutating routes.
pub fn build_router(state: AppState, tracker: Arc<RequestTracker>) -> Router {
    Router::new()
        .route("/cars", get(list_cars).post(create_car))
        .route(
            "/cars/:id",
            get(get_car).patch(update_car).delete(delete_car),
        )
        .route("/health", get(health_check))
        .layer(IdempotencyLayer::new(tracker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_cars(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cars.list())
}

async fn create_car(
    State(state): State<AppState>,
    Json(input): Json<CreateCar>,
) -> Result<impl IntoResponse, ServiceError> {
    if input.make.trim().is_empty() || input.model.trim().is_empty() {
        return Err(ServiceError::invalid_input("make and model are required"));
    }
    if !(1900..=2100).contains(&input.year) {
        return Err(ServiceError::invalid_input("year is out of range"));
    }

    let car = state.cars.insert(input);
    Ok((StatusCode::CREATED, Json(car)))
}

async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .cars
        .get(id)
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("car", id.to_string()))
}

async fn update_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCar>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(year) = input.year {
        if !(1900..=2100).contains(&year) {
            return Err(ServiceError::invalid_input("year is out of range"));
        }
    }

    state
        .cars
        .update(id, input)
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("car", id.to_string()))
}

async fn delete_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    if state.cars.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::not_found("car", id.to_string()))
    }
}
