mod conflict;
mod error;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use error::EngineError;
pub use store::Store;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the compaction
                            commit_batch(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    commit_batch(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush so partially buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The availability engine: rooms, reservations and the conflict rule.
///
/// Every operation takes the single store lock for its whole
/// check-then-write unit, so two callers racing for the same window cannot
/// both pass the conflict check.
pub struct Engine {
    store: Mutex<Store>,
    /// `None` for an in-memory engine.
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    /// Appends between automatic compactions; 0 disables them.
    compact_threshold: u64,
    appends_since_compact: AtomicU64,
}

impl Engine {
    /// Replay the log at `wal_path` and start its writer task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf, compact_threshold: u64) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let mut store = Store::new();
        for event in &events {
            store.apply_event(event);
        }
        let mut wal = Wal::open(&wal_path)?;

        let snapshot = store.snapshot_events();
        if compact_threshold > 0 && events.len() as u64 >= snapshot.len() as u64 + compact_threshold {
            wal.compact(&snapshot)?;
            info!(
                "compacted {} on open: {} -> {} events",
                wal_path.display(),
                events.len(),
                snapshot.len()
            );
        }
        info!(
            "loaded {} rooms, {} reservations from {}",
            store.room_count(),
            store.reservation_count(),
            wal_path.display()
        );
        observability::record_store_size(&store);

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            store: Mutex::new(store),
            wal_tx: Some(wal_tx),
            compact_threshold,
            appends_since_compact: AtomicU64::new(0),
        })
    }

    /// Engine without a log. State lives only as long as the value.
    pub fn in_memory() -> Self {
        Self {
            store: Mutex::new(Store::new()),
            wal_tx: None,
            compact_threshold: 0,
            appends_since_compact: AtomicU64::new(0),
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    async fn wal_compact(&self, events: Vec<Event>) -> Result<(), EngineError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        self.appends_since_compact.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// WAL-append then apply, with the store lock held by the caller.
    /// Nothing is applied if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        store: &mut Store,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        store.apply_event(event);
        observability::record_store_size(store);
        self.maybe_compact(store).await;
        Ok(())
    }

    async fn maybe_compact(&self, store: &Store) {
        if self.wal_tx.is_none() || self.compact_threshold == 0 {
            return;
        }
        let appends = self.appends_since_compact.fetch_add(1, Ordering::Relaxed) + 1;
        if appends < self.compact_threshold {
            return;
        }
        let events = store.snapshot_events();
        let len = events.len();
        match self.wal_compact(events).await {
            Ok(()) => info!("compacted WAL after {appends} appends to {len} events"),
            // The log is still complete; compaction is retried on the next append.
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}
