//! Bounds applied by the input layer before anything reaches the engine.

pub const MAX_ROOM_NAME_LEN: usize = 256;
pub const MAX_CAPACITY: i64 = 100_000;

/// Re-prompts the console allows for one field before giving up.
pub const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Seconds the HTTP server waits for in-flight requests on shutdown.
pub const SHUTDOWN_DRAIN_SECS: u64 = 10;
