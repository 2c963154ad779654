//! Transcript timestamps

/// Format seconds as `HH:MM:SS.mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = millis / 3_600_000;
    let minutes = millis % 3_600_000 / 60_000;
    let secs = millis % 60_000 / 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis % 1000)
}
