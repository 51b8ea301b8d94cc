//! Parsing of raw console and HTTP text into engine primitives.
//!
//! The engine trusts its arguments; every check on user-supplied values
//! lives here.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use crate::limits::*;
use crate::model::{hhmm, ReservationId, RoomId, TimeWindow};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    InvalidNumber(String),
    InvalidDate(String),
    InvalidTime(String),
    /// End time not after start time.
    EmptyWindow { start: String, end: String },
    EmptyName,
    NameTooLong(usize),
    CapacityOutOfRange(i64),
    UnknownFormat(String),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::InvalidNumber(s) => write!(f, "invalid number: {s:?}"),
            InputError::InvalidDate(s) => write!(f, "invalid date: {s:?} (expected YYYY-MM-DD)"),
            InputError::InvalidTime(s) => write!(f, "invalid time: {s:?} (expected HH:MM)"),
            InputError::EmptyWindow { start, end } => {
                write!(f, "invalid time range: end {end} must be after start {start}")
            }
            InputError::EmptyName => write!(f, "invalid name: must not be empty"),
            InputError::NameTooLong(len) => {
                write!(f, "invalid name: {len} bytes exceeds {MAX_ROOM_NAME_LEN}")
            }
            InputError::CapacityOutOfRange(c) => {
                write!(f, "invalid capacity: {c} (expected 0..={MAX_CAPACITY})")
            }
            InputError::UnknownFormat(s) => write!(f, "unsupported format {s:?} (expected json or csv)"),
        }
    }
}

impl std::error::Error for InputError {}

fn parse_positive(raw: &str) -> Result<u64, InputError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(InputError::InvalidNumber(raw.trim().to_string())),
    }
}

pub fn parse_room_id(raw: &str) -> Result<RoomId, InputError> {
    parse_positive(raw)
}

pub fn parse_reservation_id(raw: &str) -> Result<ReservationId, InputError> {
    parse_positive(raw)
}

/// Ids arriving as JSON numbers.
pub fn check_id(id: i64) -> Result<u64, InputError> {
    u64::try_from(id)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| InputError::InvalidNumber(id.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, InputError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| InputError::InvalidDate(raw.to_string()))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, InputError> {
    let raw = raw.trim();
    // chrono accepts single-digit hours; the wire format is strictly HH:MM.
    if raw.len() != 5 {
        return Err(InputError::InvalidTime(raw.to_string()));
    }
    NaiveTime::parse_from_str(raw, hhmm::FORMAT).map_err(|_| InputError::InvalidTime(raw.to_string()))
}

/// Parse a start/end pair into a non-empty window.
pub fn parse_window(start: &str, end: &str) -> Result<TimeWindow, InputError> {
    let window = TimeWindow::new(parse_time(start)?, parse_time(end)?);
    if window.is_empty() {
        return Err(InputError::EmptyWindow {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
        });
    }
    Ok(window)
}

pub fn parse_capacity(raw: &str) -> Result<u32, InputError> {
    let raw = raw.trim();
    let n: i64 = raw.parse().map_err(|_| InputError::InvalidNumber(raw.to_string()))?;
    check_capacity(n)
}

pub fn check_capacity(capacity: i64) -> Result<u32, InputError> {
    if !(0..=MAX_CAPACITY).contains(&capacity) {
        return Err(InputError::CapacityOutOfRange(capacity));
    }
    Ok(capacity as u32)
}

pub fn check_room_name(raw: &str) -> Result<String, InputError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(InputError::EmptyName);
    }
    if name.len() > MAX_ROOM_NAME_LEN {
        return Err(InputError::NameTooLong(name.len()));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(InputError::UnknownFormat(other.to_string())),
        }
    }
}
