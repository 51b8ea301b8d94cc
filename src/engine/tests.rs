use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use super::*;

fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, hhmm::FORMAT).unwrap()
}

fn w(start: &str, end: &str) -> TimeWindow {
    TimeWindow::new(t(start), t(end))
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roombook_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(path.with_extension("wal.tmp"));
    path
}

/// No two reservations of one room on one date overlap.
async fn assert_no_overlaps(engine: &Engine) {
    let all = engine.list_reservations().await;
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if a.room_id == b.room_id && a.date == b.date {
                assert!(
                    !a.window().overlaps(&b.window()),
                    "reservations {} and {} overlap",
                    a.id,
                    b.id
                );
            }
        }
    }
}

// ── Scenarios ────────────────────────────────────────────

#[tokio::test]
async fn overlapping_booking_conflicts_abutting_succeeds() {
    let engine = Engine::in_memory();
    let lab = engine.add_room("Lab".into(), 20).await.unwrap();
    assert_eq!(lab.id, 1);

    let first = engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();

    let result = engine
        .add_reservation(1, d("2024-05-01"), w("09:30", "10:30"))
        .await;
    assert!(matches!(result, Err(EngineError::Conflict(id)) if id == first.id));

    engine
        .add_reservation(1, d("2024-05-01"), w("10:00", "11:00"))
        .await
        .unwrap();
    assert_eq!(engine.list_reservations().await.len(), 2);
}

#[tokio::test]
async fn available_rooms_exclude_booked_room() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    engine.add_room("Hall".into(), 100).await.unwrap();
    engine.add_room("Office".into(), 4).await.unwrap();
    engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();
    // Same window, other day: irrelevant to the query.
    engine
        .add_reservation(3, d("2024-05-02"), w("09:00", "10:00"))
        .await
        .unwrap();

    let free = engine
        .list_available_rooms(d("2024-05-01"), w("09:00", "10:00"))
        .await;
    let ids: Vec<_> = free.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn removing_room_keeps_its_reservations() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    let booking = engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();

    assert_eq!(engine.get_room(1).await.map(|r| r.capacity), Some(20));
    let removed = engine.remove_room(1).await.unwrap();
    assert_eq!(removed.name, "Lab");
    assert_eq!(engine.get_room(1).await, None);
    assert!(engine.list_rooms().await.is_empty());
    assert_eq!(engine.list_reservations().await, vec![booking]);

    // The orphan can still be cancelled.
    engine.cancel_reservation(1).await.unwrap();
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn booked_window_is_unavailable_until_cancelled() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    let date = d("2024-05-01");
    let window = w("13:00", "14:30");

    assert!(engine.is_room_available(1, date, window).await);
    let r = engine.add_reservation(1, date, window).await.unwrap();
    assert!(!engine.is_room_available(1, date, window).await);
    assert!(!engine.is_room_available(1, date, w("14:00", "15:00")).await);
    assert!(engine.is_room_available(1, date, w("14:30", "15:00")).await);

    engine.cancel_reservation(r.id).await.unwrap();
    assert!(engine.is_room_available(1, date, window).await);
}

#[tokio::test]
async fn unknown_room_is_vacuously_available() {
    let engine = Engine::in_memory();
    assert!(engine.is_room_available(99, d("2024-05-01"), w("09:00", "10:00")).await);
}

#[tokio::test]
async fn other_rooms_and_dates_do_not_conflict() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    engine.add_room("Hall".into(), 100).await.unwrap();
    let window = w("09:00", "10:00");
    engine.add_reservation(1, d("2024-05-01"), window).await.unwrap();
    engine.add_reservation(2, d("2024-05-01"), window).await.unwrap();
    engine.add_reservation(1, d("2024-05-02"), window).await.unwrap();
    assert_eq!(engine.list_reservations().await.len(), 3);
}

#[tokio::test]
async fn available_rooms_edge_cases() {
    let engine = Engine::in_memory();
    assert!(engine
        .list_available_rooms(d("2024-05-01"), w("09:00", "10:00"))
        .await
        .is_empty());

    engine.add_room("Lab".into(), 20).await.unwrap();
    assert!(engine
        .list_available_rooms(d("2024-05-01"), w("10:00", "10:00"))
        .await
        .is_empty());
    assert!(engine
        .list_available_rooms(d("2024-05-01"), w("11:00", "10:00"))
        .await
        .is_empty());
    assert_eq!(
        engine
            .list_available_rooms(d("2024-05-01"), w("10:00", "11:00"))
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn room_reservations_are_ordered_by_start() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    let date = d("2024-05-01");
    for (start, end) in [("15:00", "16:00"), ("08:00", "09:00"), ("11:00", "12:00")] {
        engine.add_reservation(1, date, w(start, end)).await.unwrap();
    }
    engine.add_reservation(1, d("2024-05-02"), w("07:00", "08:00")).await.unwrap();

    let starts: Vec<_> = engine
        .room_reservations(1, date)
        .await
        .iter()
        .map(|r| r.start_time)
        .collect();
    assert_eq!(starts, vec![t("08:00"), t("11:00"), t("15:00")]);
    assert!(engine.room_reservations(2, date).await.is_empty());
}

#[tokio::test]
async fn no_overlap_after_many_attempts() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    engine.add_room("Hall".into(), 100).await.unwrap();

    let mut accepted = 0;
    for room in 1..=2u64 {
        for start in 8..18u32 {
            for len in [1u32, 2, 3] {
                let s = NaiveTime::from_hms_opt(start, (room as u32 * 15) % 60, 0).unwrap();
                let e = s + chrono::Duration::minutes(i64::from(len) * 40);
                if engine.add_reservation(room, d("2024-05-01"), TimeWindow::new(s, e)).await.is_ok() {
                    accepted += 1;
                }
            }
        }
    }
    assert!(accepted > 0);
    assert_no_overlaps(&engine).await;
}

// ── Errors ───────────────────────────────────────────────

#[tokio::test]
async fn booking_unknown_room_fails() {
    let engine = Engine::in_memory();
    let result = engine
        .add_reservation(7, d("2024-05-01"), w("09:00", "10:00"))
        .await;
    assert!(matches!(result, Err(EngineError::RoomNotFound(7))));
    assert!(engine.list_reservations().await.is_empty());
}

#[tokio::test]
async fn cancel_twice_fails_not_found() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    let r = engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();
    engine.cancel_reservation(r.id).await.unwrap();
    for _ in 0..3 {
        let again = engine.cancel_reservation(r.id).await;
        assert!(matches!(again, Err(EngineError::ReservationNotFound(id)) if id == r.id));
    }
}

#[tokio::test]
async fn remove_missing_room_fails() {
    let engine = Engine::in_memory();
    assert!(matches!(engine.remove_room(1).await, Err(EngineError::RoomNotFound(1))));
    engine.add_room("Lab".into(), 20).await.unwrap();
    engine.remove_room(1).await.unwrap();
    assert!(matches!(engine.remove_room(1).await, Err(EngineError::RoomNotFound(1))));
}

#[tokio::test]
async fn engine_does_not_validate_window_order() {
    let engine = Engine::in_memory();
    engine.add_room("Lab".into(), 20).await.unwrap();
    // An inverted window overlaps nothing, so it is accepted as-is.
    let r = engine
        .add_reservation(1, d("2024-05-01"), w("11:00", "10:00"))
        .await
        .unwrap();
    assert_eq!(r.start_time, t("11:00"));
}

#[tokio::test]
async fn ids_are_never_reused() {
    let engine = Engine::in_memory();
    engine.add_room("A".into(), 1).await.unwrap();
    engine.add_room("B".into(), 1).await.unwrap();
    engine.remove_room(2).await.unwrap();
    assert_eq!(engine.add_room("C".into(), 1).await.unwrap().id, 3);

    let r = engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();
    engine.cancel_reservation(r.id).await.unwrap();
    let next = engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();
    assert_eq!(next.id, r.id + 1);
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_one_window_commit_once() {
    let engine = Arc::new(Engine::in_memory());
    engine.add_room("Lab".into(), 20).await.unwrap();

    let attempts = (0..32).map(|i| {
        let engine = engine.clone();
        // Every window covers 09:30-09:45, so all pairs overlap.
        let start = t(["09:00", "09:15", "09:30"][i % 3]);
        tokio::spawn(async move {
            engine
                .add_reservation(1, d("2024-05-01"), TimeWindow::new(start, t("10:00")))
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let ok = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(EngineError::Conflict(_)))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 31);
}

// ── Persistence ──────────────────────────────────────────

#[tokio::test]
async fn state_survives_reopen() {
    let path = test_wal_path("reopen.wal");
    {
        let engine = Engine::open(path.clone(), 1000).unwrap();
        engine.add_room("Lab".into(), 20).await.unwrap();
        engine.add_room("Hall".into(), 80).await.unwrap();
        engine
            .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
            .await
            .unwrap();
        let gone = engine
            .add_reservation(2, d("2024-05-01"), w("09:00", "10:00"))
            .await
            .unwrap();
        engine.cancel_reservation(gone.id).await.unwrap();
        engine.remove_room(2).await.unwrap();
    }

    let engine = Engine::open(path, 1000).unwrap();
    let rooms = engine.list_rooms().await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].name, "Lab");
    assert_eq!(engine.list_reservations().await.len(), 1);
    assert!(!engine.is_room_available(1, d("2024-05-01"), w("09:30", "09:45")).await);
    assert_eq!(engine.add_room("Office".into(), 4).await.unwrap().id, 3);
    let r = engine
        .add_reservation(1, d("2024-05-01"), w("10:00", "11:00"))
        .await
        .unwrap();
    assert_eq!(r.id, 3);
}

#[tokio::test]
async fn compaction_preserves_state_and_counters() {
    let path = test_wal_path("compaction.wal");
    {
        let engine = Engine::open(path.clone(), 5).unwrap();
        engine.add_room("Lab".into(), 20).await.unwrap();
        for _ in 0..10 {
            let r = engine
                .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
                .await
                .unwrap();
            engine.cancel_reservation(r.id).await.unwrap();
        }
        engine
            .add_reservation(1, d("2024-05-01"), w("12:00", "13:00"))
            .await
            .unwrap();
        engine.compact_wal().await.unwrap();
    }

    let events = crate::wal::Wal::replay(&path).unwrap();
    assert_eq!(events.len(), 3, "counters, room, reservation: {events:?}");

    let engine = Engine::open(path, 5).unwrap();
    let reservations = engine.list_reservations().await;
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].id, 11);
    let next = engine
        .add_reservation(1, d("2024-05-01"), w("09:00", "10:00"))
        .await
        .unwrap();
    assert_eq!(next.id, 12);
}

#[tokio::test]
async fn oversized_log_is_compacted_on_open() {
    let path = test_wal_path("compact_on_open.wal");
    {
        let engine = Engine::open(path.clone(), 0).unwrap();
        engine.add_room("Lab".into(), 20).await.unwrap();
        for _ in 0..20 {
            engine.add_room("Temp".into(), 1).await.unwrap();
            let last = engine.list_rooms().await.last().unwrap().id;
            engine.remove_room(last).await.unwrap();
        }
    }
    assert_eq!(crate::wal::Wal::replay(&path).unwrap().len(), 41);

    let engine = Engine::open(path.clone(), 10).unwrap();
    assert_eq!(crate::wal::Wal::replay(&path).unwrap().len(), 2);
    assert_eq!(engine.list_rooms().await.len(), 1);
    assert_eq!(engine.add_room("Next".into(), 1).await.unwrap().id, 22);
}
