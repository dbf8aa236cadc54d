//! Foundational low-level utilities shared across support inbox crates.
//!
//! Provides the atomic file-write helper used by preferences persistence and
//! the unix-time helpers used for activity windows and Slack timestamps.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, parse_slack_ts};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_time_utils_seconds_and_millis_agree() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_s = now_ms / 1_000;
        assert!(now_ms_s >= now_s);
        assert!(now_ms_s <= now_s.saturating_add(1));
    }

    #[test]
    fn unit_parse_slack_ts_reads_fractional_seconds() {
        assert_eq!(parse_slack_ts("1712345678.000200"), 1_712_345_678.0002);
        assert_eq!(parse_slack_ts(" 10.5 "), 10.5);
        assert_eq!(parse_slack_ts("not-a-ts"), 0.0);
        assert_eq!(parse_slack_ts(""), 0.0);
    }

    #[test]
    fn functional_write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("preferences.json");
        write_text_atomic(&path, "[]").expect("first write");
        write_text_atomic(&path, "[{\"userId\":\"U1\"}]").expect("second write");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "[{\"userId\":\"U1\"}]");
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_destination() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "data").expect_err("directory target");
        assert!(error.to_string().contains("is a directory"));
    }
}
