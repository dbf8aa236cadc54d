use chrono::{DateTime, Utc};
use inbox_core::current_unix_timestamp;

/// Relative age of a unix timestamp (seconds) against the current clock.
pub fn time_ago(unix_ts: f64) -> String {
    time_ago_at(unix_ts, current_unix_timestamp())
}

/// Relative age of `unix_ts` as seen at `now_unix_s`. Anything older than a
/// week is shown as a short UTC date such as `Mar 4`.
pub fn time_ago_at(unix_ts: f64, now_unix_s: u64) -> String {
    let diff = now_unix_s as f64 - unix_ts;
    if diff < 0.0 {
        return "just now".to_string();
    }
    let diff = diff.floor() as u64;
    match diff {
        0..=59 => format!("{diff}s ago"),
        60..=3_599 => format!("{} min ago", diff / 60),
        3_600..=86_399 => format!("{}h ago", diff / 3_600),
        86_400..=604_799 => format!("{}d ago", diff / 86_400),
        _ => DateTime::<Utc>::from_timestamp(unix_ts.floor() as i64, 0)
            .map(|date| date.format("%b %-d").to_string())
            .unwrap_or_else(|| "a while ago".to_string()),
    }
}

/// Web permalink to a message: `https://{domain}.slack.com/archives/{channel}/p{ts without dot}`.
pub fn message_permalink(workspace_domain: &str, channel_id: &str, ts: &str) -> String {
    format!(
        "https://{workspace_domain}.slack.com/archives/{channel_id}/p{}",
        compact_ts(ts)
    )
}

/// `ts` with its first `.` removed, the form Slack uses in message links.
pub(crate) fn compact_ts(ts: &str) -> String {
    ts.replacen('.', "", 1)
}

#[cfg(test)]
mod tests {
    use super::{compact_ts, message_permalink, time_ago_at};

    #[test]
    fn unit_time_ago_buckets() {
        let now = 1_700_000_000_u64;
        let at = |secs_ago: f64| time_ago_at(now as f64 - secs_ago, now);
        assert_eq!(time_ago_at(now as f64 + 5.0, now), "just now");
        assert_eq!(at(0.0), "0s ago");
        assert_eq!(at(59.9), "59s ago");
        assert_eq!(at(60.0), "1 min ago");
        assert_eq!(at(3_599.0), "59 min ago");
        assert_eq!(at(3_600.0), "1h ago");
        assert_eq!(at(86_399.0), "23h ago");
        assert_eq!(at(86_400.0), "1d ago");
        assert_eq!(at(604_799.0), "6d ago");
    }

    #[test]
    fn unit_time_ago_falls_back_to_short_date_after_a_week() {
        // 2023-11-14T22:13:20Z
        let now = 1_700_000_000_u64;
        assert_eq!(time_ago_at(1_690_000_000.5, now), "Jul 22");
    }

    #[test]
    fn unit_message_permalink_strips_the_ts_dot() {
        assert_eq!(compact_ts("1712345678.000200"), "1712345678000200");
        assert_eq!(
            message_permalink("acme", "C1", "1712345678.000200"),
            "https://acme.slack.com/archives/C1/p1712345678000200"
        );
    }
}
