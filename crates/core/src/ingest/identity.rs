use sha2::{Digest, Sha256};

/// Number of digest bytes kept in an event id (32 hex characters).
const ID_BYTES: usize = 16;

/// Stable identifier for a feed event: truncated SHA-256 over the ticker followed by the raw
/// timestamp string, hex encoded.
pub fn event_id(ticker: &str, raw_time: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ticker.as_bytes());
    hasher.update(raw_time.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..ID_BYTES])
}
