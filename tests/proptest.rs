//! Property-based tests for zapview.
//!
//! These tests generate random transcripts to find edge cases in the
//! parser and the ID scheme.

use proptest::prelude::*;

use zapview::index::build_index;
use zapview::parser::{parse_chat, parse_line};

/// Fast strategies: select from predefined pools instead of regex
/// generation.
fn arb_sender() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Alice".to_string(),
        "Bob".to_string(),
        "José María".to_string(),
        "田中太郎".to_string(),
        "+55 11 91234-5678".to_string(),
        "User123".to_string(),
    ])
}

fn arb_content() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Hello".to_string(),
        "How are you?".to_string(),
        "IMG-20240115-WA0001.jpg (file attached)".to_string(),
        "<Media omitted>".to_string(),
        "check https://example.com:8080".to_string(),
        "🎉🔥 emoji content".to_string(),
        "multi word message with punctuation!".to_string(),
        "x".to_string(),
    ])
}

/// A syntactically valid header line with a random-but-real date.
fn arb_header_line() -> impl Strategy<Value = String> {
    (
        1u32..=28,
        1u32..=12,
        20u32..=25,
        0u32..24,
        0u32..60,
        arb_sender(),
        arb_content(),
    )
        .prop_map(|(day, month, year, hour, minute, sender, content)| {
            format!("{day:02}/{month:02}/{year}, {hour:02}:{minute:02} - {sender}: {content}")
        })
}

fn arb_transcript() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => arb_header_line(),
            1 => Just("a continuation line without a timestamp".to_string()),
        ],
        1..40,
    )
    .prop_map(|lines| lines.join("\n"))
}

proptest! {
    /// Every syntactically valid header with a real calendar date parses.
    #[test]
    fn prop_valid_headers_always_parse(line in arb_header_line()) {
        let parsed = parse_line(&line).unwrap();
        prop_assert!(!parsed.sender.is_empty());
    }

    /// The parser never panics, whatever the input.
    #[test]
    fn prop_parse_chat_never_panics(content in ".{0,500}") {
        let _ = parse_chat(&content, "chat.txt");
    }

    /// Message IDs within one parse are unique, even for duplicate lines.
    #[test]
    fn prop_ids_unique_within_chat(transcript in arb_transcript()) {
        let chat = parse_chat(&transcript, "chat.txt");
        let mut ids: Vec<_> = chat.messages.iter().map(|m| m.id.as_str()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        prop_assert_eq!(ids.len(), before);
    }

    /// The same transcript always produces the same IDs.
    #[test]
    fn prop_ids_deterministic(transcript in arb_transcript()) {
        let first = parse_chat(&transcript, "chat.txt");
        let second = parse_chat(&transcript, "chat.txt");
        let a: Vec<_> = first.messages.iter().map(|m| &m.id).collect();
        let b: Vec<_> = second.messages.iter().map(|m| &m.id).collect();
        prop_assert_eq!(a, b);
    }

    /// No message content is lost: every header's content appears in some
    /// message, and continuations merge instead of vanishing (except
    /// orphans before the first header).
    #[test]
    fn prop_no_content_lost_after_first_header(transcript in arb_transcript()) {
        let chat = parse_chat(&transcript, "chat.txt");
        let mut seen_header = false;
        for line in transcript.lines() {
            if parse_line(line).is_some() {
                seen_header = true;
            }
            if seen_header {
                prop_assert!(
                    chat.messages.iter().any(|m| m.raw_line.contains(line)),
                    "line dropped: {line:?}"
                );
            }
        }
    }

    /// Counters line up with the message list.
    #[test]
    fn prop_counts_consistent(transcript in arb_transcript()) {
        let chat = parse_chat(&transcript, "chat.txt");
        prop_assert_eq!(chat.message_count, chat.messages.len());
        let media = chat.messages.iter().filter(|m| m.is_media_message).count();
        prop_assert_eq!(chat.media_count, media);
        for participant in &chat.participants {
            prop_assert!(!participant.is_empty());
        }
    }

    /// Flat list structure: one item per message plus one per distinct
    /// day, and every message's recorded position points at itself.
    #[test]
    fn prop_index_flat_structure(transcript in arb_transcript()) {
        use std::collections::HashSet;
        use zapview::index::{FlatItem, date_key};

        let chat = parse_chat(&transcript, "chat.txt");
        let index = build_index(&chat.messages, &chat.title);

        let distinct_days: HashSet<_> =
            chat.messages.iter().map(|m| date_key(m.timestamp)).collect();
        prop_assert_eq!(
            index.flat_items.len(),
            chat.messages.len() + distinct_days.len()
        );

        for msg in &chat.messages {
            let slot = index.positions[&msg.id];
            prop_assert!(
                matches!(
                    &index.flat_items[slot],
                    FlatItem::Message { message_id } if message_id == &msg.id
                ),
                "flat item at recorded position does not point back at the message"
            );
        }
    }

    /// Timestamps parsed from day-first text survive a round trip through
    /// the message struct.
    #[test]
    fn prop_header_timestamp_preserved(
        day in 1u32..=28,
        month in 1u32..=12,
        hour in 0u32..24,
        minute in 0u32..60,
    ) {
        use chrono::{Datelike, Timelike};

        let line = format!("{day:02}/{month:02}/2024, {hour:02}:{minute:02} - A: x");
        let chat = parse_chat(&line, "chat.txt");
        prop_assert_eq!(chat.message_count, 1);
        let ts = chat.messages[0].timestamp;
        prop_assert_eq!(ts.day(), day);
        prop_assert_eq!(ts.month(), month);
        prop_assert_eq!(ts.hour(), hour);
        prop_assert_eq!(ts.minute(), minute);
    }
}
