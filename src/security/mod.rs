//! Pure input-safety functions: HTML sanitization and SQL-injection heuristics.
//!
//! Nothing in here touches the network or shared state; the middleware layer
//! decides what to do with the results.

pub mod sanitizer;
pub mod sql_injection;

pub use sanitizer::{sanitize, sanitize_str};
pub use sql_injection::{looks_like_sql_injection, suspicious_fields};

/// Compares two byte strings without short-circuiting on the first mismatch.
///
/// Length is not hidden.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
