//! Core message and chat types.
//!
//! This module provides [`ChatMessage`], the normalized representation of
//! one logical WhatsApp message (possibly spanning multiple source lines),
//! and [`ParsedChat`], the aggregate a successful parse produces.
//!
//! # Overview
//!
//! A message consists of:
//! - **Identity**: a deterministic `id` derived from (timestamp, sender,
//!   content), stable across re-parses of identical chat text so external
//!   references such as bookmarks survive re-import
//! - **Payload**: `timestamp`, `sender` (empty for system messages) and
//!   newline-joined `content`
//! - **Classification**: system/media flags and an optional [`MediaType`]
//!   inferred from the content text at parse time
//!
//! ```
//! use zapview::parser::parse_chat;
//!
//! let chat = parse_chat("1/5/24, 10:30 AM - Alice: Hello!", "WhatsApp Chat with Alice.txt");
//! assert_eq!(chat.message_count, 1);
//! assert_eq!(chat.messages[0].sender, "Alice");
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Media category of a message, inferred from content text only (no file
/// inspection).
///
/// Classification precedence when content could match several categories is
/// image, video, audio, sticker, contact, location, document; first match
/// wins. `.svg` therefore classifies as [`MediaType::Document`] here, while
/// the extension-based catalog in [`crate::archive`] treats `svg` files as
/// images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Photos: .jpg, .jpeg, .png
    Image,
    /// Videos: .mp4, .mov
    Video,
    /// Voice notes and music: .opus, .mp3, PTT-/AUD- prefixes
    Audio,
    /// Documents: .pdf, .doc, .xml, .svg
    Document,
    /// Stickers: .webp, STK- prefix
    Sticker,
    /// Shared contact cards (.vcf)
    Contact,
    /// Shared locations (static or live)
    Location,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
            MediaType::Sticker => "sticker",
            MediaType::Contact => "contact",
            MediaType::Location => "location",
        };
        write!(f, "{name}")
    }
}

/// One logical chat message.
///
/// Created during chat-text parsing and immutable thereafter except for
/// [`media_path`](ChatMessage::media_path), the back-reference to a
/// cataloged archive entry set during media linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Deterministic id: djb2 hash of `timestamp_iso|sender|content`,
    /// base-36 encoded, with `_1`, `_2`, ... suffixes on collision.
    pub id: String,

    /// Local date-time; WhatsApp exports carry no timezone.
    pub timestamp: NaiveDateTime,

    /// Display name of the author; empty for system messages.
    pub sender: String,

    /// Text content, newline-joined across continuation lines.
    pub content: String,

    /// True when the sender is empty or the content matches a known
    /// system phrase (joins, leaves, subject changes, encryption notices).
    pub is_system_message: bool,

    /// True when the content matches a known media-omission phrase.
    pub is_media_message: bool,

    /// Media category guessed from content, only set for media messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub media_type: Option<MediaType>,

    /// Original source text for debugging/fidelity, newline-joined across
    /// continuation lines like `content`.
    pub raw_line: String,

    /// Archive-relative path of the media file this message references,
    /// established by best-effort filename matching during ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub media_path: Option<String>,
}

impl ChatMessage {
    /// Returns `true` if this message's content is empty or whitespace-only.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Aggregate of a successful chat parse: messages plus derived metadata.
///
/// Created once per parse; immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedChat {
    /// All messages in source order.
    pub messages: Vec<ChatMessage>,

    /// Sorted set of non-system senders.
    pub participants: Vec<String>,

    /// Timestamp of the first message, if any.
    pub start_date: Option<NaiveDateTime>,

    /// Timestamp of the last message, if any.
    pub end_date: Option<NaiveDateTime>,

    /// Display title derived from the filename hint or participant list.
    pub title: String,

    /// Total message count.
    pub message_count: usize,

    /// Count of media-classified messages.
    pub media_count: usize,
}

/// Compact serialized form of one message for the search corpus.
///
/// The background indexer produces a `Vec<SearchMessage>` once per chat so
/// repeated queries never re-serialize the full message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMessage {
    /// Deterministic message id.
    pub id: String,
    /// Full text content.
    pub content: String,
    /// Sender display name.
    pub sender: String,
}

impl From<&ChatMessage> for SearchMessage {
    fn from(msg: &ChatMessage) -> Self {
        SearchMessage {
            id: msg.id.clone(),
            content: msg.content.clone(),
            sender: msg.sender.clone(),
        }
    }
}
