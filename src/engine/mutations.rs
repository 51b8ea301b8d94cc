use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::model::*;
use crate::observability;

use super::conflict::check_no_conflict;
use super::{Engine, EngineError};

impl Engine {
    /// Create a room. Name and capacity are taken as given.
    pub async fn add_room(&self, name: String, capacity: u32) -> Result<Room, EngineError> {
        let started = Instant::now();
        let result: Result<Room, EngineError> = async {
            let mut store = self.store.lock().await;
            let id = store.next_room_id();
            let event = Event::RoomAdded {
                id,
                name: name.clone(),
                capacity,
            };
            self.persist_and_apply(&mut store, &event).await?;
            info!("room {id} added: {name:?}, capacity {capacity}");
            Ok(Room { id, name, capacity })
        }
        .await;
        observability::observe("add_room", started, &result);
        result
    }

    /// Delete a room. Its reservations are left in place as orphans.
    pub async fn remove_room(&self, id: RoomId) -> Result<Room, EngineError> {
        let started = Instant::now();
        let result: Result<Room, EngineError> = async {
            let mut store = self.store.lock().await;
            let room = store.room(id).cloned().ok_or(EngineError::RoomNotFound(id))?;
            self.persist_and_apply(&mut store, &Event::RoomRemoved { id })
                .await?;
            info!("room {id} removed");
            Ok(room)
        }
        .await;
        observability::observe("remove_room", started, &result);
        result
    }

    /// Book `window` on `date` for a room.
    ///
    /// The room must exist and the window must not overlap any reservation
    /// of that room on that date. The check and the append run under one
    /// lock hold. Window order is not validated here.
    pub async fn add_reservation(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let result: Result<Reservation, EngineError> = async {
            let mut store = self.store.lock().await;
            if !store.contains_room(room_id) {
                return Err(EngineError::RoomNotFound(room_id));
            }
            if let Err(e) = check_no_conflict(&store, room_id, date, &window) {
                debug!("reservation rejected for room {room_id} on {date}: {e}");
                metrics::counter!(observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
                return Err(e);
            }

            let id = store.next_reservation_id();
            let event = Event::ReservationAdded {
                id,
                room_id,
                date,
                window,
            };
            self.persist_and_apply(&mut store, &event).await?;
            info!(
                "reservation {id}: room {room_id} on {date} {}-{}",
                window.start.format(hhmm::FORMAT),
                window.end.format(hhmm::FORMAT)
            );
            Ok(Reservation {
                id,
                room_id,
                date,
                start_time: window.start,
                end_time: window.end,
            })
        }
        .await;
        observability::observe("add_reservation", started, &result);
        result
    }

    /// Cancel a reservation, freeing its window. Returns the removed record.
    pub async fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let result: Result<Reservation, EngineError> = async {
            let mut store = self.store.lock().await;
            let reservation = store
                .reservation(id)
                .cloned()
                .ok_or(EngineError::ReservationNotFound(id))?;
            self.persist_and_apply(&mut store, &Event::ReservationCancelled { id })
                .await?;
            info!("reservation {id} cancelled");
            Ok(reservation)
        }
        .await;
        observability::observe("cancel_reservation", started, &result);
        result
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let store = self.store.lock().await;
        self.wal_compact(store.snapshot_events()).await
    }
}
