use crate::model::{ReservationId, RoomId};

#[derive(Debug)]
pub enum EngineError {
    /// The window overlaps this existing reservation.
    Conflict(ReservationId),
    RoomNotFound(RoomId),
    ReservationNotFound(ReservationId),
    WalError(String),
}

impl EngineError {
    /// Short stable code used by the HTTP layer and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::RoomNotFound(_) | EngineError::ReservationNotFound(_) => "NOT_FOUND",
            EngineError::WalError(_) => "STORAGE_ERROR",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Conflict(id) => {
                write!(f, "room already booked for an overlapping interval (reservation {id})")
            }
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
