use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::model::*;

/// Rooms and reservations plus the `(room, date)` index the conflict check
/// scans. Not synchronized: the engine wraps it in its single lock.
#[derive(Debug)]
pub struct Store {
    rooms: BTreeMap<RoomId, Room>,
    reservations: BTreeMap<ReservationId, Reservation>,
    /// Reservation ids per `(room, date)`, kept sorted by start time.
    by_room_date: HashMap<(RoomId, NaiveDate), Vec<ReservationId>>,
    next_room_id: RoomId,
    next_reservation_id: ReservationId,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            rooms: BTreeMap::new(),
            reservations: BTreeMap::new(),
            by_room_date: HashMap::new(),
            next_room_id: 1,
            next_reservation_id: 1,
        }
    }

    // ── Ids ──────────────────────────────────────────────────

    pub fn next_room_id(&self) -> RoomId {
        self.next_room_id
    }

    pub fn next_reservation_id(&self) -> ReservationId {
        self.next_reservation_id
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn contains_room(&self, id: RoomId) -> bool {
        self.rooms.contains_key(&id)
    }

    /// All rooms in id order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // ── Reservations ─────────────────────────────────────────

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    /// All reservations in id order, orphans included.
    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// Reservations of one room on one date, ordered by start time.
    pub fn reservations_on(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> impl Iterator<Item = &Reservation> {
        self.by_room_date
            .get(&(room_id, date))
            .into_iter()
            .flatten()
            .filter_map(|id| self.reservations.get(id))
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::RoomAdded { id, name, capacity } => {
                self.rooms.insert(
                    *id,
                    Room {
                        id: *id,
                        name: name.clone(),
                        capacity: *capacity,
                    },
                );
                self.next_room_id = self.next_room_id.max(id + 1);
            }
            Event::RoomRemoved { id } => {
                // Reservations of the room stay behind as orphans.
                self.rooms.remove(id);
            }
            Event::ReservationAdded {
                id,
                room_id,
                date,
                window,
            } => {
                let reservation = Reservation {
                    id: *id,
                    room_id: *room_id,
                    date: *date,
                    start_time: window.start,
                    end_time: window.end,
                };
                self.index_insert(&reservation);
                self.reservations.insert(*id, reservation);
                self.next_reservation_id = self.next_reservation_id.max(id + 1);
            }
            Event::ReservationCancelled { id } => {
                if let Some(r) = self.reservations.remove(id) {
                    self.index_remove(&r);
                }
            }
            Event::IdsReserved {
                next_room_id,
                next_reservation_id,
            } => {
                self.next_room_id = self.next_room_id.max(*next_room_id);
                self.next_reservation_id = self.next_reservation_id.max(*next_reservation_id);
            }
        }
    }

    /// Minimal event sequence that rebuilds this store, counters included.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(1 + self.rooms.len() + self.reservations.len());
        events.push(Event::IdsReserved {
            next_room_id: self.next_room_id,
            next_reservation_id: self.next_reservation_id,
        });
        events.extend(self.rooms.values().map(|r| Event::RoomAdded {
            id: r.id,
            name: r.name.clone(),
            capacity: r.capacity,
        }));
        events.extend(self.reservations.values().map(|r| Event::ReservationAdded {
            id: r.id,
            room_id: r.room_id,
            date: r.date,
            window: r.window(),
        }));
        events
    }

    fn index_insert(&mut self, reservation: &Reservation) {
        let start = reservation.start_time;
        let slot = self
            .by_room_date
            .entry((reservation.room_id, reservation.date))
            .or_default();
        let reservations = &self.reservations;
        let pos = slot.partition_point(|id| {
            reservations
                .get(id)
                .is_some_and(|existing| existing.start_time <= start)
        });
        slot.insert(pos, reservation.id);
    }

    fn index_remove(&mut self, reservation: &Reservation) {
        let key = (reservation.room_id, reservation.date);
        if let Some(slot) = self.by_room_date.get_mut(&key) {
            slot.retain(|id| *id != reservation.id);
            if slot.is_empty() {
                self.by_room_date.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn add(store: &mut Store, id: u64, room_id: u64, start: u32, end: u32) {
        store.apply_event(&Event::ReservationAdded {
            id,
            room_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            window: TimeWindow::new(
                NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            ),
        });
    }

    #[test]
    fn index_keeps_start_order() {
        let mut store = Store::new();
        add(&mut store, 1, 1, 14, 15);
        add(&mut store, 2, 1, 9, 10);
        add(&mut store, 3, 1, 11, 12);
        add(&mut store, 4, 2, 8, 9);

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let ids: Vec<_> = store.reservations_on(1, date).map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        store.apply_event(&Event::ReservationCancelled { id: 3 });
        let ids: Vec<_> = store.reservations_on(1, date).map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn counters_never_move_backwards() {
        let mut store = Store::new();
        store.apply_event(&Event::IdsReserved {
            next_room_id: 5,
            next_reservation_id: 9,
        });
        store.apply_event(&Event::RoomAdded {
            id: 2,
            name: "Old".into(),
            capacity: 1,
        });
        assert_eq!(store.next_room_id(), 5);
        assert_eq!(store.next_reservation_id(), 9);
    }

    #[test]
    fn snapshot_rebuilds_same_state() {
        let mut store = Store::new();
        store.apply_event(&Event::RoomAdded {
            id: 1,
            name: "Lab".into(),
            capacity: 20,
        });
        add(&mut store, 1, 1, 9, 10);
        add(&mut store, 2, 1, 10, 11);
        store.apply_event(&Event::ReservationCancelled { id: 2 });

        let mut rebuilt = Store::new();
        for e in store.snapshot_events() {
            rebuilt.apply_event(&e);
        }
        assert_eq!(rebuilt.rooms().collect::<Vec<_>>(), store.rooms().collect::<Vec<_>>());
        assert_eq!(
            rebuilt.reservations().collect::<Vec<_>>(),
            store.reservations().collect::<Vec<_>>()
        );
        assert_eq!(rebuilt.next_reservation_id(), 3);
    }
}
