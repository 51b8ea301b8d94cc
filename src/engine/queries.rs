use chrono::NaiveDate;

use crate::model::*;

use super::conflict::find_conflict;
use super::Engine;

impl Engine {
    /// True when no reservation of `room_id` on `date` overlaps `window`.
    ///
    /// Room existence is not checked: an unknown room has no reservations
    /// and is therefore available.
    pub async fn is_room_available(&self, room_id: RoomId, date: NaiveDate, window: TimeWindow) -> bool {
        let store = self.store.lock().await;
        find_conflict(&store, room_id, date, &window).is_none()
    }

    /// Rooms free for the whole window, in id order. An empty window yields
    /// no rooms.
    pub async fn list_available_rooms(&self, date: NaiveDate, window: TimeWindow) -> Vec<Room> {
        if window.is_empty() {
            return Vec::new();
        }
        let store = self.store.lock().await;
        store
            .rooms()
            .filter(|room| find_conflict(&store, room.id, date, &window).is_none())
            .cloned()
            .collect()
    }

    pub async fn list_rooms(&self) -> Vec<Room> {
        let store = self.store.lock().await;
        store.rooms().cloned().collect()
    }

    pub async fn get_room(&self, id: RoomId) -> Option<Room> {
        let store = self.store.lock().await;
        store.room(id).cloned()
    }

    /// Every reservation in id order, including those whose room was removed.
    pub async fn list_reservations(&self) -> Vec<Reservation> {
        let store = self.store.lock().await;
        store.reservations().cloned().collect()
    }

    /// Reservations of one room on one date, ordered by start time.
    pub async fn room_reservations(&self, room_id: RoomId, date: NaiveDate) -> Vec<Reservation> {
        let store = self.store.lock().await;
        store.reservations_on(room_id, date).cloned().collect()
    }
}
