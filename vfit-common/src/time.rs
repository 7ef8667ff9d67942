//! Timing utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds shown for a remaining duration.
///
/// Rounds up so that a countdown reads "1" until the very last
/// millisecond and only reads "0" once the time is fully spent.
pub fn ceil_seconds(remaining: Duration) -> u32 {
    let millis = remaining.as_millis();
    let secs = millis.div_ceil(1000);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_seconds_rounds_up() {
        assert_eq!(ceil_seconds(Duration::ZERO), 0);
        assert_eq!(ceil_seconds(Duration::from_millis(1)), 1);
        assert_eq!(ceil_seconds(Duration::from_millis(999)), 1);
        assert_eq!(ceil_seconds(Duration::from_millis(1000)), 1);
        assert_eq!(ceil_seconds(Duration::from_millis(1001)), 2);
        assert_eq!(ceil_seconds(Duration::from_secs(30)), 30);
    }

    #[test]
    fn test_now_is_recent() {
        let before = Utc::now();
        let t = now();
        assert!(t >= before);
    }
}
