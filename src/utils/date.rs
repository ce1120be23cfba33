// src/utils/date.rs

//! Tolerant date parsing for board text.

use chrono::NaiveDate;

/// Parse a deadline out of free text.
///
/// Boards write deadlines as `2025-11-01`, `2025.11.01`, `2025/11/01`
/// or `2025년 11월 1일`, often inside a range ("2025-10-01 ~
/// 2025-11-01"). The last date found wins, so ranges resolve to their
/// end date.
pub fn parse_deadline(text: &str) -> Option<NaiveDate> {
    let pattern = regex::Regex::new(r"(\d{4})\s*[년.\-/]\s*(\d{1,2})\s*[월.\-/]\s*(\d{1,2})").ok()?;

    let mut last = None;
    for caps in pattern.captures_iter(text) {
        let year: i32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let day: u32 = caps.get(3)?.as_str().parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            last = Some(date);
        }
    }
    last
}
