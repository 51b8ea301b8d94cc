//! Numbered console menu over the shared engine.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::engine::Engine;
use crate::export;
use crate::input::{self, ExportFormat, InputError, DATE_FORMAT};
use crate::limits::MAX_PROMPT_ATTEMPTS;
use crate::model::{hhmm, Reservation, Room, RoomId, TimeWindow};

const MENU: &str = "
Main menu:
1. List all rooms
2. Add a room
3. Remove a room
4. Create a reservation
5. Cancel a reservation
6. List all reservations
7. Export reservations as JSON
8. Export reservations as CSV
9. List available rooms
10. View reservations for a room and a date
11. Quit
";

pub struct Console<R, W> {
    engine: Arc<Engine>,
    reader: R,
    writer: W,
    export_dir: PathBuf,
    eof: bool,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(engine: Arc<Engine>, reader: R, writer: W, export_dir: PathBuf) -> Self {
        Self {
            engine,
            reader,
            writer,
            export_dir,
            eof: false,
        }
    }

    /// Serve the menu until the user quits or input ends.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            self.writer.write_all(MENU.as_bytes()).await?;
            let Some(choice) = self.prompt("Choose an option: ").await? else {
                break;
            };
            match choice.trim() {
                "1" => self.list_rooms().await?,
                "2" => self.add_room().await?,
                "3" => self.remove_room().await?,
                "4" => self.create_reservation().await?,
                "5" => self.cancel_reservation().await?,
                "6" => self.list_reservations().await?,
                "7" => self.export(ExportFormat::Json).await?,
                "8" => self.export(ExportFormat::Csv).await?,
                "9" => self.list_available_rooms().await?,
                "10" => self.view_room_reservations().await?,
                "11" => {
                    self.say("Goodbye!").await?;
                    break;
                }
                _ => self.say("Invalid option.").await?,
            }
            if self.eof {
                break;
            }
        }
        self.writer.flush().await
    }

    // ── Menu actions ─────────────────────────────────────────

    async fn list_rooms(&mut self) -> io::Result<()> {
        let rooms = self.engine.list_rooms().await;
        self.say("\nRooms:").await?;
        self.print_rooms(&rooms).await
    }

    async fn add_room(&mut self) -> io::Result<()> {
        let Some(name) = self.prompt_valid("Room name: ", input::check_room_name).await? else {
            return Ok(());
        };
        let Some(capacity) = self.prompt_valid("Room capacity: ", input::parse_capacity).await? else {
            return Ok(());
        };
        match self.engine.add_room(name, capacity).await {
            Ok(room) => self.say(&format!("Room added with ID {}.", room.id)).await,
            Err(e) => self.say(&format!("Error adding room: {e}")).await,
        }
    }

    async fn remove_room(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_valid("ID of the room to remove: ", input::parse_room_id).await? else {
            return Ok(());
        };
        match self.engine.remove_room(id).await {
            Ok(_) => self.say("Room removed.").await,
            Err(e) => self.say(&format!("Error removing room: {e}")).await,
        }
    }

    async fn create_reservation(&mut self) -> io::Result<()> {
        let Some(room_id) = self.prompt_valid("Room ID: ", input::parse_room_id).await? else {
            return Ok(());
        };
        let Some(date) = self.prompt_valid("Date (YYYY-MM-DD): ", input::parse_date).await? else {
            return Ok(());
        };
        let Some(window) = self.prompt_window().await? else {
            return Ok(());
        };
        match self.engine.add_reservation(room_id, date, window).await {
            Ok(r) => self.say(&format!("Reservation created with ID {}.", r.id)).await,
            Err(e) => self.say(&format!("Error creating reservation: {e}")).await,
        }
    }

    async fn cancel_reservation(&mut self) -> io::Result<()> {
        let Some(id) = self
            .prompt_valid("ID of the reservation to cancel: ", input::parse_reservation_id)
            .await?
        else {
            return Ok(());
        };
        match self.engine.cancel_reservation(id).await {
            Ok(_) => self.say("Reservation cancelled.").await,
            Err(e) => self.say(&format!("Error cancelling reservation: {e}")).await,
        }
    }

    async fn list_reservations(&mut self) -> io::Result<()> {
        let reservations = self.engine.list_reservations().await;
        self.say("\nReservations:").await?;
        self.print_reservations(&reservations).await
    }

    async fn export(&mut self, format: ExportFormat) -> io::Result<()> {
        let reservations = self.engine.list_reservations().await;
        match export::export_to_dir(&self.export_dir, format, &reservations) {
            Ok(path) => {
                self.say(&format!("Reservations exported to {}.", path.display()))
                    .await
            }
            Err(e) => self.say(&format!("Error exporting reservations: {e}")).await,
        }
    }

    async fn list_available_rooms(&mut self) -> io::Result<()> {
        let Some(date) = self.prompt_valid("Date (YYYY-MM-DD): ", input::parse_date).await? else {
            return Ok(());
        };
        let Some(window) = self.prompt_window().await? else {
            return Ok(());
        };
        let rooms = self.engine.list_available_rooms(date, window).await;
        self.say("\nAvailable rooms:").await?;
        self.print_rooms(&rooms).await
    }

    async fn view_room_reservations(&mut self) -> io::Result<()> {
        let Some(room_id) = self.prompt_valid("Room ID: ", input::parse_room_id).await? else {
            return Ok(());
        };
        let Some(date) = self.prompt_valid("Date (YYYY-MM-DD): ", input::parse_date).await? else {
            return Ok(());
        };
        let reservations = self.engine.room_reservations(room_id, date).await;
        self.say(&format!(
            "\nReservations for room {room_id} on {}:",
            date.format(DATE_FORMAT)
        ))
        .await?;
        self.print_reservations(&reservations).await
    }

    // ── Rendering ────────────────────────────────────────────

    async fn print_rooms(&mut self, rooms: &[Room]) -> io::Result<()> {
        if rooms.is_empty() {
            return self.say("(none)").await;
        }
        for room in rooms {
            self.say(&format!(
                "ID: {}, Name: {}, Capacity: {}",
                room.id, room.name, room.capacity
            ))
            .await?;
        }
        Ok(())
    }

    async fn print_reservations(&mut self, reservations: &[Reservation]) -> io::Result<()> {
        if reservations.is_empty() {
            return self.say("(none)").await;
        }
        let names: HashMap<RoomId, String> = self
            .engine
            .list_rooms()
            .await
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();
        for r in reservations {
            // The room may have been removed since the booking was made.
            let room = names.get(&r.room_id).map_or("removed", String::as_str);
            self.say(&format!(
                "ID: {}, Room: {} ({}), Date: {}, Start: {}, End: {}",
                r.id,
                r.room_id,
                room,
                r.date.format(DATE_FORMAT),
                r.start_time.format(hhmm::FORMAT),
                r.end_time.format(hhmm::FORMAT)
            ))
            .await?;
        }
        Ok(())
    }

    // ── Input ────────────────────────────────────────────────

    async fn say(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// `None` at end of input.
    async fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.flush().await?;
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            self.eof = true;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Ask until `parse` accepts, at most `MAX_PROMPT_ATTEMPTS` times.
    /// `None` when attempts run out or input ends.
    async fn prompt_valid<T>(
        &mut self,
        message: &str,
        parse: impl Fn(&str) -> Result<T, InputError>,
    ) -> io::Result<Option<T>> {
        for _ in 0..MAX_PROMPT_ATTEMPTS {
            let Some(raw) = self.prompt(message).await? else {
                return Ok(None);
            };
            match parse(&raw) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => self.say(&format!("Invalid input: {e}")).await?,
            }
        }
        self.say("Too many invalid attempts.").await?;
        Ok(None)
    }

    async fn prompt_window(&mut self) -> io::Result<Option<TimeWindow>> {
        let Some(start) = self.prompt_valid("Start time (HH:MM): ", input::parse_time).await? else {
            return Ok(None);
        };
        let Some(end) = self.prompt_valid("End time (HH:MM): ", input::parse_time).await? else {
            return Ok(None);
        };
        let window = TimeWindow::new(start, end);
        if window.is_empty() {
            self.say("Invalid input: end time must be after start time.").await?;
            return Ok(None);
        }
        Ok(Some(window))
    }
}
