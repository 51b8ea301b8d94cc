use chrono::NaiveDate;

use crate::model::*;

use super::store::Store;
use super::EngineError;

/// First reservation on `(room_id, date)` whose window overlaps `window`.
pub(crate) fn find_conflict(
    store: &Store,
    room_id: RoomId,
    date: NaiveDate,
    window: &TimeWindow,
) -> Option<ReservationId> {
    store
        .reservations_on(room_id, date)
        .find(|r| r.window().overlaps(window))
        .map(|r| r.id)
}

pub(crate) fn check_no_conflict(
    store: &Store,
    room_id: RoomId,
    date: NaiveDate,
    window: &TimeWindow,
) -> Result<(), EngineError> {
    match find_conflict(store, room_id, date, window) {
        Some(existing) => Err(EngineError::Conflict(existing)),
        None => Ok(()),
    }
}
