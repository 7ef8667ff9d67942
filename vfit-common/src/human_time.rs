//! Human-readable time formatting
//!
//! Countdown values are shown as plain seconds below one minute and as
//! `M:SS` above; elapsed workout times as `M:SS` or `H:MM:SS`.

/// Format a countdown value for display.
///
/// # Examples
///
/// ```
/// use vfit_common::human_time::format_countdown;
///
/// assert_eq!(format_countdown(45), "45");
/// assert_eq!(format_countdown(60), "1:00");
/// assert_eq!(format_countdown(65), "1:05");
/// ```
pub fn format_countdown(seconds: u32) -> String {
    if seconds < 60 {
        seconds.to_string()
    } else {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}

/// Format an elapsed duration for summaries.
///
/// # Examples
///
/// ```
/// use vfit_common::human_time::format_elapsed;
///
/// assert_eq!(format_elapsed(0), "0:00");
/// assert_eq!(format_elapsed(723), "12:03");
/// assert_eq!(format_elapsed(3723), "1:02:03");
/// ```
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
