/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `created_unix_ms` is older than `threshold_ms` relative to `now_unix_ms`.
pub fn is_stale_unix_ms(created_unix_ms: u64, now_unix_ms: u64, threshold_ms: u64) -> bool {
    now_unix_ms.saturating_sub(created_unix_ms) > threshold_ms
}
