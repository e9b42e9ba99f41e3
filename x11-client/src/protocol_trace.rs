//! Byte-level protocol tracing, switched on with `X11_PROTOCOL_TRACE=1`.
//!
//! Lines go to the `protocol_trace` tracing target so they can be filtered
//! independently of ordinary logs.

use once_cell::sync::Lazy;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable that enables tracing at startup.
pub const TRACE_ENV: &str = "X11_PROTOCOL_TRACE";

static TRACE_ENABLED: Lazy<AtomicBool> = Lazy::new(|| {
    let on = std::env::var(TRACE_ENV)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
        .unwrap_or(false);
    AtomicBool::new(on)
});

/// Whether trace lines are currently emitted.
#[inline]
pub fn enabled() -> bool {
    TRACE_ENABLED.load(Ordering::Relaxed)
}

/// Switch tracing on or off at runtime.
#[inline]
pub fn set_enabled(on: bool) {
    TRACE_ENABLED.store(on, Ordering::Relaxed)
}

/// Trace a message sent to the server.
#[inline]
pub fn out_msg(name: &str, fields: &str) {
    if enabled() {
        tracing::info!(target: "protocol_trace", "OUT {} {}", name, fields);
    }
}

/// Trace a message received from the server.
#[inline]
pub fn in_msg(name: &str, fields: &str) {
    if enabled() {
        tracing::info!(target: "protocol_trace", "IN  {} {}", name, fields);
    }
}

/// Log up to `max` bytes of `data`, 16 per line.
pub fn hexdump(prefix: &str, data: &[u8], max: usize) {
    if !enabled() {
        return;
    }
    for line in hex_lines(data, max) {
        tracing::info!(target: "protocol_trace", "{}{}", prefix, line);
    }
}

fn hex_lines(data: &[u8], max: usize) -> Vec<String> {
    data[..max.min(data.len())]
        .chunks(16)
        .map(|chunk| {
            let mut line = String::with_capacity(chunk.len() * 3);
            for b in chunk {
                let _ = write!(line, " {:02X}", b);
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_lines() {
        let data: Vec<u8> = (0u8..20).collect();
        let lines = hex_lines(&data, 64);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" 00 01 02"));
        assert_eq!(lines[1], " 10 11 12 13");

        assert_eq!(hex_lines(&data, 2), vec![" 00 01".to_string()]);
        assert!(hex_lines(&[], 16).is_empty());
    }

    #[test]
    fn test_toggle() {
        let before = enabled();
        set_enabled(true);
        assert!(enabled());
        set_enabled(before);
    }
}
