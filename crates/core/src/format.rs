use crate::error::{Result, SubWhizError};

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_SECOND: u64 = 1_000;

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`, or `MM:SS,mmm` when the
/// hour is zero and not forced).
pub fn format_timestamp(seconds: f64, always_include_hours: bool) -> Result<String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SubWhizError::invalid_input(format!(
            "non-negative timestamp expected, got {seconds}"
        )));
    }

    // f64::round ties away from zero
    let mut milliseconds = (seconds * 1000.0).round() as u64;

    let hours = milliseconds / MS_PER_HOUR;
    milliseconds -= hours * MS_PER_HOUR;

    let minutes = milliseconds / MS_PER_MINUTE;
    milliseconds -= minutes * MS_PER_MINUTE;

    let secs = milliseconds / MS_PER_SECOND;
    milliseconds -= secs * MS_PER_SECOND;

    let hours_marker = if always_include_hours || hours > 0 {
        format!("{:02}:", hours)
    } else {
        String::new()
    };

    Ok(format!(
        "{}{:02}:{:02},{:03}",
        hours_marker, minutes, secs, milliseconds
    ))
}
