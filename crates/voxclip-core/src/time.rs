/// Formats a second count as `minutes:seconds` with the seconds zero-padded
/// to two digits. Minutes are not padded and keep growing past an hour.
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
