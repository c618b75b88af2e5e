//! Aggregate chat statistics.

use std::collections::HashMap;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::message::ParsedChat;

/// Activity summary over one chat. System messages are excluded from the
/// per-participant, per-date and per-hour tallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatStats {
    pub messages_by_participant: HashMap<String, usize>,
    /// Keyed by ISO date, `YYYY-MM-DD`.
    pub messages_by_date: HashMap<String, usize>,
    /// 24 buckets, midnight first.
    pub messages_by_hour: [usize; 24],
    pub most_active_participant: String,
    pub most_active_hour: usize,
    /// Rounded average over the chat's whole span, including silent days.
    pub avg_messages_per_day: usize,
    pub total_days: usize,
}

impl ChatStats {
    pub fn compute(chat: &ParsedChat) -> Self {
        let mut messages_by_participant: HashMap<String, usize> = HashMap::new();
        let mut messages_by_date: HashMap<String, usize> = HashMap::new();
        let mut messages_by_hour = [0usize; 24];

        for message in &chat.messages {
            if message.is_system_message {
                continue;
            }
            *messages_by_participant
                .entry(message.sender.clone())
                .or_insert(0) += 1;
            let date_key = message.timestamp.format("%Y-%m-%d").to_string();
            *messages_by_date.entry(date_key).or_insert(0) += 1;
            messages_by_hour[message.timestamp.hour() as usize] += 1;
        }

        let most_active_participant = messages_by_participant
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();

        let most_active_hour = messages_by_hour
            .iter()
            .enumerate()
            .max_by_key(|(_, count)| **count)
            .map_or(0, |(hour, _)| hour);

        let total_days = match (chat.start_date, chat.end_date) {
            (Some(start), Some(end)) => {
                let seconds = (end - start).num_seconds().max(0) as u64;
                usize::try_from(seconds.div_ceil(86_400)).unwrap_or(1).max(1)
            }
            _ => 1,
        };

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let avg_messages_per_day =
            (chat.message_count as f64 / total_days as f64).round() as usize;

        Self {
            messages_by_participant,
            messages_by_date,
            messages_by_hour,
            most_active_participant,
            most_active_hour,
            avg_messages_per_day,
            total_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_chat;

    const SAMPLE: &str = "\
15/01/2024, 10:30 - Alice: one
15/01/2024, 10:45 - Alice: two
15/01/2024, 22:00 - Bob: three
17/01/2024, 09:00 - Alice: four
17/01/2024, 09:30 - Messages and calls are end-to-end encrypted.
";

    #[test]
    fn test_participant_counts_exclude_system() {
        let stats = ChatStats::compute(&parse_chat(SAMPLE, "c.txt"));
        assert_eq!(stats.messages_by_participant["Alice"], 3);
        assert_eq!(stats.messages_by_participant["Bob"], 1);
        assert_eq!(stats.messages_by_participant.len(), 2);
        assert_eq!(stats.most_active_participant, "Alice");
    }

    #[test]
    fn test_date_and_hour_buckets() {
        let stats = ChatStats::compute(&parse_chat(SAMPLE, "c.txt"));
        assert_eq!(stats.messages_by_date["2024-01-15"], 3);
        assert_eq!(stats.messages_by_date["2024-01-17"], 1);
        assert_eq!(stats.messages_by_hour[10], 2);
        assert_eq!(stats.messages_by_hour[22], 1);
        assert_eq!(stats.messages_by_hour[9], 1);
        assert_eq!(stats.most_active_hour, 10);
    }

    #[test]
    fn test_span_and_average() {
        let stats = ChatStats::compute(&parse_chat(SAMPLE, "c.txt"));
        // 15th 10:30 to 17th 09:30 is just under two days, rounded up.
        assert_eq!(stats.total_days, 2);
        // 5 messages (system included in the count) over 2 days.
        assert_eq!(stats.avg_messages_per_day, 3);
    }

    #[test]
    fn test_empty_chat() {
        let stats = ChatStats::compute(&parse_chat("", "c.txt"));
        assert!(stats.messages_by_participant.is_empty());
        assert_eq!(stats.most_active_participant, "");
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.avg_messages_per_day, 0);
    }

    #[test]
    fn test_single_day_chat() {
        let stats =
            ChatStats::compute(&parse_chat("15/01/2024, 10:30 - A: x", "c.txt"));
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.avg_messages_per_day, 1);
    }
}
