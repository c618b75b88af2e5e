//! Single-line recognition for WhatsApp message headers.
//!
//! WhatsApp exports vary by locale. Each message header starts with a
//! timestamp in one of several formats:
//! - US: `1/15/24, 10:30 AM - Sender: Message`
//! - EU: `15/01/2024, 10:30 - Sender: Message`
//! - ISO: `2024-01-15, 10:30 - Sender: Message`
//! - German: `15.01.24, 10:30 - Sender: Message`
//! - Dashed: `15-01-24, 10:30 - Sender: Message`
//! - Asian: `2024/01/15, 10:30 - Sender: Message`
//! - Bracketed (iOS): `[15/01/24, 10:30:45] Sender: Message`
//!
//! The order matters: the US pattern requires an AM/PM marker, so it is
//! tried before the ambiguous day-first slash pattern. A line that matches
//! no pattern is a continuation of the previous message.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};

/// A successfully recognized message header line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub timestamp: NaiveDateTime,
    /// Empty when the line carries no sender (system messages).
    pub sender: String,
    pub content: String,
}

/// Timestamp layout variants, in match-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateLayout {
    /// `M/D/YY, H:MM AM` - the AM/PM marker is what identifies US ordering.
    UsSlash,
    /// `D/M/YY, HH:MM` - European/Brazilian, 24h clock.
    EuSlash,
    /// `YYYY-MM-DD, HH:MM`
    IsoDash,
    /// `D.M.YY, HH:MM` - German.
    EuDot,
    /// `D-M-YY, HH:MM`
    EuDash,
    /// `YYYY/MM/DD, HH:MM`
    AsianSlash,
    /// `[D/M/YY, HH:MM:SS]` - iOS exports, seconds mandatory.
    BracketedSlash,
}

impl DateLayout {
    fn pattern(self) -> &'static str {
        match self {
            DateLayout::UsSlash => {
                r"^(\d{1,2})/(\d{1,2})/(\d{2,4}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([APap][Mm])\s*-\s*"
            }
            DateLayout::EuSlash => {
                r"^(\d{1,2})/(\d{1,2})/(\d{2,4}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*-\s*"
            }
            DateLayout::IsoDash => {
                r"^(\d{4})-(\d{1,2})-(\d{1,2}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*-\s*"
            }
            DateLayout::EuDot => {
                r"^(\d{1,2})\.(\d{1,2})\.(\d{2,4}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*-\s*"
            }
            DateLayout::EuDash => {
                r"^(\d{1,2})-(\d{1,2})-(\d{2,4}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*-\s*"
            }
            DateLayout::AsianSlash => {
                r"^(\d{4})/(\d{1,2})/(\d{1,2}),?\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*-\s*"
            }
            DateLayout::BracketedSlash => {
                r"^\[(\d{1,2})/(\d{1,2})/(\d{2,4}),?\s+(\d{1,2}):(\d{2}):(\d{2})\]\s*"
            }
        }
    }

    /// Builds the timestamp from the capture groups of this layout.
    ///
    /// Returns `None` for combinations that don't form a valid calendar
    /// date, e.g. a US-ordered date matched by the day-first pattern.
    fn timestamp(self, caps: &Captures<'_>) -> Option<NaiveDateTime> {
        let g = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let (day, month, year) = match self {
            DateLayout::UsSlash => (g(2)?, g(1)?, normalize_year(g(3)?)),
            DateLayout::IsoDash | DateLayout::AsianSlash => (g(3)?, g(2)?, g(1)?),
            DateLayout::EuSlash
            | DateLayout::EuDot
            | DateLayout::EuDash
            | DateLayout::BracketedSlash => (g(1)?, g(2)?, normalize_year(g(3)?)),
        };

        let mut hours = g(4)?;
        let minutes = g(5)?;
        let seconds = g(6).unwrap_or(0);

        if self == DateLayout::UsSlash {
            let is_pm = caps
                .get(7)
                .is_some_and(|m| m.as_str().eq_ignore_ascii_case("pm"));
            if is_pm && hours != 12 {
                hours += 12;
            } else if !is_pm && hours == 12 {
                hours = 0;
            }
        }

        NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?
            .and_hms_opt(hours, minutes, seconds)
    }
}

/// Expands a two-digit year: `>50` lands in the 1900s, otherwise 2000s.
fn normalize_year(year: u32) -> u32 {
    if year < 100 {
        year + if year > 50 { 1900 } else { 2000 }
    } else {
        year
    }
}

static PATTERNS: LazyLock<Vec<(DateLayout, Regex)>> = LazyLock::new(|| {
    [
        DateLayout::UsSlash,
        DateLayout::EuSlash,
        DateLayout::IsoDash,
        DateLayout::EuDot,
        DateLayout::EuDash,
        DateLayout::AsianSlash,
        DateLayout::BracketedSlash,
    ]
    .into_iter()
    .map(|layout| {
        let regex = Regex::new(layout.pattern()).expect("timestamp pattern must compile");
        (layout, regex)
    })
    .collect()
});

/// Maximum sender-name length in characters: a colon further into the
/// remainder is message punctuation, not a sender separator.
const MAX_SENDER_LEN: usize = 50;

/// Tries to recognize a message header line.
///
/// Patterns are tried in priority order; the first match wins. After the
/// timestamp, `Sender: content` is split at the first colon within the
/// first [`MAX_SENDER_LEN`] characters; without one the whole remainder
/// becomes the content and the sender stays empty.
///
/// Returns `None` for continuation lines (no timestamp prefix) and for
/// matches whose components don't form a valid calendar date.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    for (layout, regex) in PATTERNS.iter() {
        let Some(caps) = regex.captures(line) else {
            continue;
        };
        let timestamp = layout.timestamp(&caps)?;
        let remainder = &line[caps.get(0).map_or(0, |m| m.end())..];

        if let Some(colon) = remainder.find(':') {
            // The bound is in characters so multi-byte sender names
            // (CJK, Cyrillic) get the same headroom as ASCII ones.
            if colon > 0 && remainder[..colon].chars().count() < MAX_SENDER_LEN {
                return Some(ParsedLine {
                    timestamp,
                    sender: remainder[..colon].trim().to_string(),
                    content: remainder[colon + 1..].trim().to_string(),
                });
            }
        }

        return Some(ParsedLine {
            timestamp,
            sender: String::new(),
            content: remainder.trim().to_string(),
        });
    }

    None
}

/// Heuristic used during archive ingestion to decide whether a text entry
/// without the expected name is actually a chat transcript: at least 2 of
/// the first 10 non-blank lines must parse as message headers.
pub fn looks_like_chat(text: &str) -> bool {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .filter(|line| parse_line(line).is_some())
        .count()
        >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_us_format_with_ampm() {
        let parsed = parse_line("1/15/24, 10:30 PM - Alice: Hello").unwrap();
        assert_eq!(parsed.timestamp.month(), 1);
        assert_eq!(parsed.timestamp.day(), 15);
        assert_eq!(parsed.timestamp.year(), 2024);
        assert_eq!(parsed.timestamp.hour(), 22);
        assert_eq!(parsed.sender, "Alice");
        assert_eq!(parsed.content, "Hello");
    }

    #[test]
    fn test_us_noon_and_midnight() {
        let noon = parse_line("1/15/24, 12:00 PM - A: x").unwrap();
        assert_eq!(noon.timestamp.hour(), 12);
        let midnight = parse_line("1/15/24, 12:00 AM - A: x").unwrap();
        assert_eq!(midnight.timestamp.hour(), 0);
    }

    #[test]
    fn test_european_format_day_first() {
        // No AM/PM marker, so day comes first.
        let parsed = parse_line("15/01/2024, 22:30 - Bob: Oi").unwrap();
        assert_eq!(parsed.timestamp.day(), 15);
        assert_eq!(parsed.timestamp.month(), 1);
        assert_eq!(parsed.timestamp.hour(), 22);
        assert_eq!(parsed.sender, "Bob");
    }

    #[test]
    fn test_iso_format() {
        let parsed = parse_line("2024-01-15, 10:30 - Alice: Hi").unwrap();
        assert_eq!(parsed.timestamp.year(), 2024);
        assert_eq!(parsed.timestamp.month(), 1);
        assert_eq!(parsed.timestamp.day(), 15);
    }

    #[test]
    fn test_german_dotted_format() {
        let parsed = parse_line("15.01.24, 10:30 - Hans: Hallo").unwrap();
        assert_eq!(parsed.timestamp.day(), 15);
        assert_eq!(parsed.timestamp.year(), 2024);
    }

    #[test]
    fn test_dashed_format() {
        let parsed = parse_line("15-01-24, 10:30 - Alice: Hi").unwrap();
        assert_eq!(parsed.timestamp.day(), 15);
    }

    #[test]
    fn test_asian_format() {
        let parsed = parse_line("2024/01/15, 10:30 - Kim: Hi").unwrap();
        assert_eq!(parsed.timestamp.year(), 2024);
        assert_eq!(parsed.timestamp.month(), 1);
        assert_eq!(parsed.timestamp.day(), 15);
    }

    #[test]
    fn test_bracketed_ios_format() {
        let parsed = parse_line("[15/01/24, 10:30:45] Alice: Hello").unwrap();
        assert_eq!(parsed.timestamp.day(), 15);
        assert_eq!(parsed.timestamp.second(), 45);
        assert_eq!(parsed.sender, "Alice");
    }

    #[test]
    fn test_seconds_optional() {
        let parsed = parse_line("15/01/2024, 10:30:45 - Bob: Oi").unwrap();
        assert_eq!(parsed.timestamp.second(), 45);
        let parsed = parse_line("15/01/2024, 10:30 - Bob: Oi").unwrap();
        assert_eq!(parsed.timestamp.second(), 0);
    }

    #[test]
    fn test_two_digit_year_pivot() {
        let parsed = parse_line("15/01/99, 10:30 - A: x").unwrap();
        assert_eq!(parsed.timestamp.year(), 1999);
        let parsed = parse_line("15/01/50, 10:30 - A: x").unwrap();
        assert_eq!(parsed.timestamp.year(), 2050);
        let parsed = parse_line("15/01/51, 10:30 - A: x").unwrap();
        assert_eq!(parsed.timestamp.year(), 1951);
    }

    #[test]
    fn test_no_sender_becomes_system_candidate() {
        let parsed = parse_line("15/01/2024, 10:30 - Alice created group \"Trip\"").unwrap();
        assert_eq!(parsed.sender, "");
        assert!(parsed.content.starts_with("Alice created group"));
    }

    #[test]
    fn test_colon_too_far_is_not_a_sender() {
        let long = "a".repeat(60);
        let line = format!("15/01/2024, 10:30 - {long}: tail");
        let parsed = parse_line(&line).unwrap();
        assert_eq!(parsed.sender, "");
        assert!(parsed.content.contains("tail"));
    }

    #[test]
    fn test_multibyte_sender_within_char_bound() {
        // 20 characters but 60 UTF-8 bytes; still a valid sender.
        let sender = "田".repeat(20);
        let line = format!("15/01/2024, 10:30 - {sender}: hi");
        let parsed = parse_line(&line).unwrap();
        assert_eq!(parsed.sender, sender);
        assert_eq!(parsed.content, "hi");
    }

    #[test]
    fn test_continuation_line_rejected() {
        assert!(parse_line("just a continuation line").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        // Matches the day-first pattern but 31/02 is not a real date.
        assert!(parse_line("31/02/2024, 10:30 - A: x").is_none());
    }

    #[test]
    fn test_looks_like_chat() {
        let chat = "15/01/2024, 10:30 - Alice: Hi\n15/01/2024, 10:31 - Bob: Hello\nplain line";
        assert!(looks_like_chat(chat));
        assert!(!looks_like_chat("just\nsome\nprose\nwithout timestamps"));
        // A single parsing line is not enough evidence.
        assert!(!looks_like_chat("15/01/2024, 10:30 - Alice: Hi\nprose"));
    }
}
