//! Read-only projections of the reservation list to JSON and CSV.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::input::{ExportFormat, DATE_FORMAT};
use crate::model::{hhmm, Reservation};

pub const CSV_HEADER: [&str; 5] = ["ID", "RoomID", "Date", "StartTime", "EndTime"];

/// Indented JSON array, four spaces per level.
pub fn write_json<W: Write>(writer: W, reservations: &[Reservation]) -> io::Result<()> {
    let mut ser = Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
    reservations.serialize(&mut ser).map_err(io::Error::from)?;
    let mut writer = ser.into_inner();
    writer.write_all(b"\n")
}

/// Header row first, then one row per reservation. No field can contain a
/// comma or quote, so nothing is escaped.
pub fn write_csv<W: Write>(mut writer: W, reservations: &[Reservation]) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for r in reservations {
        writeln!(
            writer,
            "{},{},{},{},{}",
            r.id,
            r.room_id,
            r.date.format(DATE_FORMAT),
            r.start_time.format(hhmm::FORMAT),
            r.end_time.format(hhmm::FORMAT)
        )?;
    }
    Ok(())
}

pub fn render(format: ExportFormat, reservations: &[Reservation]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ExportFormat::Json => write_json(&mut buf, reservations)?,
        ExportFormat::Csv => write_csv(&mut buf, reservations)?,
    }
    Ok(buf)
}

/// Write `reservations.<ext>` into `dir`, replacing any previous export.
pub fn export_to_dir(
    dir: &Path,
    format: ExportFormat,
    reservations: &[Reservation],
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("reservations.{}", format.extension()));
    fs::write(&path, render(format, reservations)?)?;
    tracing::info!("exported {} reservations to {}", reservations.len(), path.display());
    Ok(path)
}
