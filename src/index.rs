//! Background index construction.
//!
//! For rendering, a chat becomes a flat list of items: one date separator
//! per calendar day followed by that day's messages. The index maps each
//! message id to its own flat position (for bookmark and search-result
//! navigation) and carries the compact corpus the search engine loads.

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::message::{ChatMessage, SearchMessage};

/// One render item in the flattened chat view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlatItem {
    /// Day separator, carrying the formatted date key.
    Date { date: String },
    /// Reference to a message by id.
    Message { message_id: String },
}

/// Index over one chat: flat render list, id positions, search corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatIndex {
    pub chat_title: String,
    /// Message id to its own flat position (separators included).
    pub positions: HashMap<String, usize>,
    pub flat_items: Vec<FlatItem>,
    /// Pre-serialized corpus for [`SearchWorker::load`].
    ///
    /// [`SearchWorker::load`]: crate::search::SearchWorker::load
    pub corpus: Vec<SearchMessage>,
}

/// Grouping key for date separators, e.g. `January 5, 2024`.
///
/// Date navigation recomputes keys to find separators, so every caller
/// must use this exact function rather than formatting inline.
pub fn date_key(timestamp: NaiveDateTime) -> String {
    timestamp.format("%B %-d, %Y").to_string()
}

/// Builds the index in a single linear pass.
///
/// Messages are grouped by calendar day in first-appearance order; each
/// group emits a [`FlatItem::Date`] followed by its messages' items, with
/// the running flat position recorded per message id.
pub fn build_index(messages: &[ChatMessage], chat_title: &str) -> ChatIndex {
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&ChatMessage>> = HashMap::new();

    for message in messages {
        let key = date_key(message.timestamp);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                group_order.push(key.clone());
                Vec::new()
            })
            .push(message);
    }

    let mut positions = HashMap::with_capacity(messages.len());
    let mut flat_items = Vec::with_capacity(messages.len() + group_order.len());

    for date in group_order {
        let day_messages = &groups[&date];
        flat_items.push(FlatItem::Date { date });
        for message in day_messages {
            positions.insert(message.id.clone(), flat_items.len());
            flat_items.push(FlatItem::Message {
                message_id: message.id.clone(),
            });
        }
    }

    let corpus = messages.iter().map(SearchMessage::from).collect();

    debug!(
        messages = messages.len(),
        flat_items = flat_items.len(),
        "index built"
    );

    ChatIndex {
        chat_title: chat_title.to_string(),
        positions,
        flat_items,
        corpus,
    }
}

/// Runs [`build_index`] on a background thread, off the interactive path.
/// The receiver yields exactly one index; a dropped receiver just
/// discards the result.
pub fn spawn_index(messages: Vec<ChatMessage>, chat_title: String) -> mpsc::Receiver<ChatIndex> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("zapview-indexer".into())
        .spawn(move || {
            let index = build_index(&messages, &chat_title);
            let _ = tx.send(index);
        })
        .expect("failed to spawn indexer thread");
    rx
}
