pub mod views;

use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Rect centered in `r`, sized as a percentage of it. Used by every modal.
pub fn center_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Compact age for list rows: "now", "5m", "2h", "3d", then the date.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);

    if delta.num_seconds() < 60 {
        "now".to_string()
    } else if delta.num_minutes() < 60 {
        format!("{}m", delta.num_minutes())
    } else if delta.num_hours() < 24 {
        format!("{}h", delta.num_hours())
    } else if delta.num_days() < 7 {
        format!("{}d", delta.num_days())
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

/// Compact counter for like/follower/trend numbers: 999, 1.5K, 8.1M.
pub fn compact_count(n: u32) -> String {
    if n < 1_000 {
        n.to_string()
    } else if n < 1_000_000 {
        trim_decimal(n as f64 / 1_000.0, "K")
    } else {
        trim_decimal(n as f64 / 1_000_000.0, "M")
    }
}

fn trim_decimal(value: f64, suffix: &str) -> String {
    let formatted = format!("{:.1}", value);
    let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{}{}", trimmed, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

        let just_now = Utc.with_ymd_and_hms(2024, 5, 10, 11, 59, 30).unwrap();
        assert_eq!(relative_time(just_now, now), "now");

        let minutes = Utc.with_ymd_and_hms(2024, 5, 10, 11, 55, 0).unwrap();
        assert_eq!(relative_time(minutes, now), "5m");

        let hours = Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap();
        assert_eq!(relative_time(hours, now), "2h");

        let days = Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap();
        assert_eq!(relative_time(days, now), "3d");

        let old = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        assert_eq!(relative_time(old, now), "2024-01-02");
    }

    #[test]
    fn test_compact_count_small() {
        assert_eq!(compact_count(0), "0");
        assert_eq!(compact_count(999), "999");
    }

    #[test]
    fn test_compact_count_thousands() {
        assert_eq!(compact_count(1_000), "1K");
        assert_eq!(compact_count(15_400), "15.4K");
        assert_eq!(compact_count(50_000), "50K");
    }

    #[test]
    fn test_compact_count_millions() {
        assert_eq!(compact_count(8_100_000), "8.1M");
        assert_eq!(compact_count(1_200_000), "1.2M");
    }

    #[test]
    fn test_center_rect_is_contained() {
        let area = Rect::new(0, 0, 100, 40);
        let modal = center_rect(60, 30, area);
        assert!(modal.width <= 60);
        assert!(modal.x >= 20);
        assert!(modal.y >= 10);
    }
}
