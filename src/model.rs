use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub type RoomId = u64;
pub type ReservationId = u64;

/// Times of day travel as `HH:MM` everywhere: JSON, CSV and the log.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Half-open time-of-day interval `[start, end)`.
///
/// A window whose start is not before its end is empty. The engine never
/// rejects such windows; the input layer does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl Reservation {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

/// The event types. This is the log record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomAdded {
        id: RoomId,
        name: String,
        capacity: u32,
    },
    RoomRemoved {
        id: RoomId,
    },
    ReservationAdded {
        id: ReservationId,
        room_id: RoomId,
        date: NaiveDate,
        window: TimeWindow,
    },
    ReservationCancelled {
        id: ReservationId,
    },
    /// Written first by compaction so ids of deleted records stay burned.
    IdsReserved {
        next_room_id: RoomId,
        next_reservation_id: ReservationId,
    },
}
