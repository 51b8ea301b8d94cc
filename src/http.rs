//! JSON HTTP API over the shared engine.
//!
//! Paths follow the web front end (`/addRoom`, `/deleteRoom?id=`,
//! ...). Every handler parses raw parameters through [`crate::input`]
//! before calling the engine.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::engine::{Engine, EngineError};
use crate::export;
use crate::input::{self, ExportFormat, InputError};
use crate::model::{Reservation, Room};
use crate::observability;

/// Error response: `{"error": message, "code": CODE}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        Self::bad_request(e.to_string(), "INVALID_INPUT")
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match e {
            EngineError::WalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Conflict(_)
            | EngineError::RoomNotFound(_)
            | EngineError::ReservationNotFound(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: e.to_string(),
            code: e.code(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(format!("invalid request body: {}", e.body_text()), "INVALID_BODY")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("request failed: {}", self.message);
        }
        let body = serde_json::json!({ "error": self.message, "code": self.code });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ── Request types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddRoomRequest {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Capacity")]
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddReservationRequest {
    #[serde(rename = "roomID", alias = "RoomID", alias = "room_id")]
    pub room_id: i64,
    #[serde(alias = "Date")]
    pub date: String,
    #[serde(rename = "startTime", alias = "StartTime", alias = "start_time")]
    pub start_time: String,
    #[serde(rename = "endTime", alias = "EndTime", alias = "end_time")]
    pub end_time: String,
}

/// Query parameters arrive as optional strings so that a missing or
/// malformed value is reported by the input layer, not the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct IdParams {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomDateParams {
    pub room_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

fn param(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

// ── Router ───────────────────────────────────────────────

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", get(list_rooms))
        .route("/addRoom", post(add_room))
        .route("/deleteRoom", delete(delete_room))
        .route("/reservations", get(list_reservations))
        .route("/addReservation", post(add_reservation))
        .route("/createReservation", post(add_reservation))
        .route("/deleteReservation", delete(delete_reservation))
        .route("/availableRooms", get(available_rooms))
        .route("/roomReservations", get(room_reservations))
        .route("/exportReservations", get(export_reservations))
        .layer(middleware::from_fn(count_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn count_requests(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    metrics::counter!(
        observability::HTTP_REQUESTS_TOTAL,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}

// ── Handlers ─────────────────────────────────────────────

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_rooms(State(engine): State<Arc<Engine>>) -> Json<Vec<Room>> {
    Json(engine.list_rooms().await)
}

async fn add_room(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<AddRoomRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let Json(req) = payload?;
    let name = input::check_room_name(&req.name)?;
    let capacity = input::check_capacity(req.capacity)?;
    let room = engine.add_room(name, capacity).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn delete_room(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<IdParams>,
) -> ApiResult<Json<Room>> {
    let id = input::parse_room_id(param(&params.id))?;
    Ok(Json(engine.remove_room(id).await?))
}

async fn list_reservations(State(engine): State<Arc<Engine>>) -> Json<Vec<Reservation>> {
    Json(engine.list_reservations().await)
}

async fn add_reservation(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<AddReservationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    let Json(req) = payload?;
    let room_id = input::check_id(req.room_id)?;
    let date = input::parse_date(&req.date)?;
    let window = input::parse_window(&req.start_time, &req.end_time)?;
    let reservation = engine.add_reservation(room_id, date, window).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn delete_reservation(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<IdParams>,
) -> ApiResult<Json<Reservation>> {
    let id = input::parse_reservation_id(param(&params.id))?;
    Ok(Json(engine.cancel_reservation(id).await?))
}

async fn available_rooms(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<Vec<Room>>> {
    let date = input::parse_date(param(&params.date))?;
    let window = input::parse_window(param(&params.start), param(&params.end))?;
    Ok(Json(engine.list_available_rooms(date, window).await))
}

async fn room_reservations(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<RoomDateParams>,
) -> ApiResult<Json<Vec<Reservation>>> {
    let room_id = input::parse_room_id(param(&params.room_id))?;
    let date = input::parse_date(param(&params.date))?;
    Ok(Json(engine.room_reservations(room_id, date).await))
}

async fn export_reservations(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let format: ExportFormat = param(&params.format).parse()?;
    let reservations = engine.list_reservations().await;
    let body = export::render(format, &reservations).map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("export failed: {e}"),
        code: "EXPORT_ERROR",
    })?;
    let response = match format {
        ExportFormat::Json => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment;filename=reservations.csv"),
            ],
            body,
        )
            .into_response(),
    };
    Ok(response)
}
