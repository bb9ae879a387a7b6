//! Trace and segment identifiers.

use rand::Rng;

/// New trace id: `1-<epoch seconds, 8 hex>-<96 random bits, 24 hex>`.
pub fn new_trace_id() -> String {
    let secs = chrono::Utc::now().timestamp();
    let random: [u8; 12] = rand::thread_rng().gen();
    // The wire format carries the epoch as exactly 8 hex digits.
    format!("1-{:08x}-{}", secs as u32, hex::encode(random))
}

/// New segment id: 64 random bits, 16 hex.
pub fn new_segment_id() -> String {
    let random: [u8; 8] = rand::thread_rng().gen();
    hex::encode(random)
}
