//! Bookmark collection and its export file format.
//!
//! Bookmarks reference messages by their deterministic id, which is what
//! lets an exported bookmark file resolve against a re-imported copy of
//! the same chat. Nothing is persisted automatically; callers export and
//! import explicitly.
//!
//! The JSON layout (`version`, `exportedAt`, camelCase bookmark fields)
//! is an external contract shared with other tools reading these files.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZapviewError};

/// Supported export format version.
pub const BOOKMARK_FORMAT_VERSION: u32 = 1;

/// Preview length stored alongside the bookmark.
const PREVIEW_MAX_CHARS: usize = 100;

/// One bookmarked message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Bookmark's own id, unique within the collection.
    pub id: String,
    /// Deterministic id of the bookmarked message.
    pub message_id: String,
    /// Chat title identifying which chat the message belongs to.
    pub chat_id: String,
    pub comment: String,
    /// Creation time, ISO formatted.
    pub created_at: String,
    /// First ~100 characters of the message content.
    pub message_preview: String,
    pub sender: String,
    /// Original message timestamp, ISO formatted.
    pub message_timestamp: String,
}

/// On-disk export envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkExport {
    pub version: u32,
    pub exported_at: String,
    pub bookmarks: Vec<Bookmark>,
}

static NEXT_BOOKMARK: AtomicU64 = AtomicU64::new(0);

fn generate_id() -> String {
    let seq = NEXT_BOOKMARK.fetch_add(1, Ordering::Relaxed);
    format!("bm_{}_{seq}", Utc::now().timestamp_millis())
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
    format!("{}...", cut.trim())
}

/// In-memory bookmark collection.
#[derive(Debug, Default)]
pub struct BookmarkStore {
    bookmarks: Vec<Bookmark>,
    by_message: HashMap<String, usize>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookmarks a message. Re-bookmarking an already bookmarked message
    /// replaces the existing entry.
    pub fn add(
        &mut self,
        message_id: &str,
        chat_id: &str,
        comment: &str,
        message_content: &str,
        sender: &str,
        message_timestamp: NaiveDateTime,
    ) -> &Bookmark {
        let bookmark = Bookmark {
            id: generate_id(),
            message_id: message_id.to_string(),
            chat_id: chat_id.to_string(),
            comment: comment.to_string(),
            created_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            message_preview: truncate_preview(message_content),
            sender: sender.to_string(),
            message_timestamp: message_timestamp
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
        };

        if let Some(&idx) = self.by_message.get(message_id) {
            self.bookmarks[idx] = bookmark;
            &self.bookmarks[idx]
        } else {
            self.by_message
                .insert(message_id.to_string(), self.bookmarks.len());
            self.bookmarks.push(bookmark);
            self.bookmarks.last().expect("just pushed")
        }
    }

    pub fn remove(&mut self, message_id: &str) -> bool {
        let Some(idx) = self.by_message.remove(message_id) else {
            return false;
        };
        self.bookmarks.remove(idx);
        // Positions after the removed entry shifted down.
        for stored in self.by_message.values_mut() {
            if *stored > idx {
                *stored -= 1;
            }
        }
        true
    }

    pub fn is_bookmarked(&self, message_id: &str) -> bool {
        self.by_message.contains_key(message_id)
    }

    pub fn get(&self, message_id: &str) -> Option<&Bookmark> {
        self.by_message
            .get(message_id)
            .map(|&idx| &self.bookmarks[idx])
    }

    pub fn for_chat<'a>(&'a self, chat_id: &'a str) -> impl Iterator<Item = &'a Bookmark> {
        self.bookmarks.iter().filter(move |b| b.chat_id == chat_id)
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn clear(&mut self) {
        self.bookmarks.clear();
        self.by_message.clear();
    }

    /// Serializes the collection as a versioned export document.
    pub fn to_json(&self) -> Result<String> {
        let export = BookmarkExport {
            version: BOOKMARK_FORMAT_VERSION,
            exported_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            bookmarks: self.bookmarks.clone(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Replaces the collection with the contents of an export document.
    /// Returns the number of imported bookmarks.
    ///
    /// # Errors
    ///
    /// [`ZapviewError::BookmarkVersion`] for any version other than
    /// [`BOOKMARK_FORMAT_VERSION`], [`ZapviewError::Json`] for malformed
    /// JSON.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let export: BookmarkExport = serde_json::from_str(json)?;
        if export.version != BOOKMARK_FORMAT_VERSION {
            return Err(ZapviewError::BookmarkVersion {
                found: export.version,
                expected: BOOKMARK_FORMAT_VERSION,
            });
        }
        self.bookmarks = export.bookmarks;
        self.by_message = self
            .bookmarks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.message_id.clone(), i))
            .collect();
        Ok(self.bookmarks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let mut store = BookmarkStore::new();
        store.add("msg1", "Bob", "important", "hello world", "Alice", ts());
        assert!(store.is_bookmarked("msg1"));
        assert!(!store.is_bookmarked("msg2"));
        let bookmark = store.get("msg1").unwrap();
        assert_eq!(bookmark.sender, "Alice");
        assert_eq!(bookmark.message_preview, "hello world");
    }

    #[test]
    fn test_rebookmark_replaces() {
        let mut store = BookmarkStore::new();
        store.add("msg1", "Bob", "first", "text", "Alice", ts());
        store.add("msg1", "Bob", "second", "text", "Alice", ts());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("msg1").unwrap().comment, "second");
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut store = BookmarkStore::new();
        store.add("m1", "c", "", "one", "A", ts());
        store.add("m2", "c", "", "two", "A", ts());
        store.add("m3", "c", "", "three", "A", ts());
        assert!(store.remove("m2"));
        assert!(!store.remove("m2"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("m3").unwrap().message_preview, "three");
    }

    #[test]
    fn test_preview_truncated() {
        let mut store = BookmarkStore::new();
        let long = "x".repeat(300);
        store.add("m1", "c", "", &long, "A", ts());
        let preview = &store.get("m1").unwrap().message_preview;
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 103);
    }

    #[test]
    fn test_for_chat_filters() {
        let mut store = BookmarkStore::new();
        store.add("m1", "Bob", "", "x", "A", ts());
        store.add("m2", "Work", "", "y", "A", ts());
        store.add("m3", "Bob", "", "z", "A", ts());
        assert_eq!(store.for_chat("Bob").count(), 2);
        assert_eq!(store.for_chat("Work").count(), 1);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut store = BookmarkStore::new();
        store.add("m1", "Bob", "note", "hello", "Alice", ts());
        let json = store.to_json().unwrap();
        // The wire format is camelCase.
        assert!(json.contains("\"messageId\""));
        assert!(json.contains("\"exportedAt\""));
        assert!(json.contains("\"version\": 1"));

        let mut imported = BookmarkStore::new();
        assert_eq!(imported.import_json(&json).unwrap(), 1);
        assert!(imported.is_bookmarked("m1"));
        assert_eq!(imported.get("m1").unwrap().comment, "note");
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let mut store = BookmarkStore::new();
        let json = r#"{"version":2,"exportedAt":"2024-01-15T00:00:00.000Z","bookmarks":[]}"#;
        let err = store.import_json(json).unwrap_err();
        assert!(matches!(
            err,
            ZapviewError::BookmarkVersion {
                found: 2,
                expected: 1
            }
        ));
    }

    #[test]
    fn test_import_replaces_existing() {
        let mut store = BookmarkStore::new();
        store.add("old", "c", "", "x", "A", ts());
        let json = r#"{"version":1,"exportedAt":"2024-01-15T00:00:00.000Z","bookmarks":[]}"#;
        assert_eq!(store.import_json(json).unwrap(), 0);
        assert!(store.is_empty());
        assert!(!store.is_bookmarked("old"));
    }
}
