//! 時間表示のフォーマット

use crate::model::Deadline;

/// 秒数を `HH:MM:SS` で表示 (時間は24を超えても繰り上げない)
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// 秒数を `1d 2h`, `3h 05m`, `4m 10s`, `9s` のような短い形式で表示
///
/// 上位2単位のみ表示し、残りは切り捨てる。
pub fn format_compact(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// 経過時間と期限を `00:42:10 / 2h` の形で表示
pub fn format_against(elapsed: u64, deadline: Option<&Deadline>) -> String {
    match deadline {
        Some(d) => format!("{} / {}", format_clock(elapsed), d),
        None => format_clock(elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(59), "00:00:59");
        assert_eq!(format_clock(3661), "01:01:01");
        assert_eq!(format_clock(90_000), "25:00:00");
    }

    #[test]
    fn test_format_compact_truncates() {
        assert_eq!(format_compact(9), "9s");
        assert_eq!(format_compact(250), "4m 10s");
        assert_eq!(format_compact(3600 * 3 + 5 * 60 + 59), "3h 05m");
        assert_eq!(format_compact(86_400 + 7200 + 3599), "1d 2h");
    }
}
