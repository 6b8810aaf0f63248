use std::fmt::Write as _;

use axum::http::HeaderMap;

pub const TRACE_HEADER: &str = "x-trace-id";
const TRACE_BYTES: usize = 16;

/// 16 random bytes, lower-case hex encoded.
pub fn new_trace_id() -> String {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let bytes: [u8; TRACE_BYTES] = rng.gen();
    bytes.iter().fold(String::with_capacity(TRACE_BYTES * 2), |mut encoded, byte| {
        let _ = write!(encoded, "{byte:02x}");
        encoded
    })
}

/// Reuses the caller's `X-Trace-Id` when it is present and printable.
pub fn trace_id_from(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_trace_id)
}
