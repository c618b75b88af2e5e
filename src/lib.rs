//! # Zapview
//!
//! A Rust library for browsing WhatsApp chat export archives: parse the
//! exported `.zip` (or a bare `.txt` transcript), resolve the media files
//! referenced by messages, and search the conversation interactively.
//!
//! ## Overview
//!
//! WhatsApp exports a chat as a text transcript plus loose media files,
//! with at least seven regional timestamp formats and localized system
//! messages. Zapview handles that mess end to end:
//!
//! - **Parsing**: timestamps in US, European, ISO, and Asian layouts,
//!   multi-line messages, media and system message detection
//! - **Archives**: lazy ZIP access, chat file discovery, contact cards,
//!   media-to-message linking
//! - **Media**: reference-counted byte cache, JPEG thumbnails, video
//!   frame caching
//! - **Search**: background worker with cancellation, debounced queries,
//!   match navigation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use zapview::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let file = File::open("WhatsApp Chat - Family.zip")?;
//!     let archive = parse_archive(file, Some("WhatsApp Chat - Family.zip"), &no_progress())?;
//!
//!     println!("{}: {} messages", archive.chat.title, archive.chat.message_count);
//!     for msg in archive.chat.messages.iter().take(10) {
//!         println!("{}: {}", msg.sender, msg.content);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive Sessions
//!
//! [`AppSession`](session::AppSession) wires the pieces together for a UI:
//! it debounces keystrokes, runs searches on a worker thread, and cancels
//! superseded queries automatically.
//!
//! ```rust,no_run
//! use std::fs::File;
//! use zapview::progress::no_progress;
//! use zapview::session::AppSession;
//!
//! let mut session = AppSession::new();
//! let slot = session.load_archive(File::open("export.zip")?, Some("export.zip"), &no_progress())?;
//! session.select_chat(slot)?;
//! session.set_query("birthday");
//! # Ok::<(), zapview::ZapviewError>(())
//! ```
//!
//! ## Module Structure
//!
//! - [`parser`]: transcript parsing
//!   - [`parser::line`]: single-line timestamp/sender extraction
//!   - [`parser::chat`]: [`parse_chat`](parser::parse_chat), message
//!     classification, deterministic IDs
//!   - [`parser::vcf`]: contact card parsing
//! - [`archive`]: ZIP handling ([`parse_archive`](archive::parse_archive),
//!   [`ChatArchive`](archive::ChatArchive), [`ArchiveHandle`](archive::ArchiveHandle))
//! - [`media`]: [`MediaResolver`](media::MediaResolver) byte cache and MIME detection
//! - [`thumbs`]: [`ThumbnailCache`](thumbs::ThumbnailCache) with bounded concurrent decoding
//! - [`video`]: [`VideoFrameCache`](video::VideoFrameCache) and frame timing helpers
//! - [`index`]: [`ChatIndex`](index::ChatIndex), date grouping, flat lists
//! - [`search`]: [`SearchWorker`](search::SearchWorker) background engine
//! - [`session`]: [`AppSession`](session::AppSession) orchestration
//! - [`bookmarks`]: [`BookmarkStore`](bookmarks::BookmarkStore) with
//!   JSON export/import
//! - [`stats`]: [`ChatStats`](stats::ChatStats) aggregates
//! - [`error`]: [`ZapviewError`], [`Result`]
//! - [`prelude`]: convenient re-exports

pub mod archive;
pub mod bookmarks;
pub mod error;
pub mod index;
pub mod media;
pub mod message;
pub mod parser;
pub mod progress;
pub mod search;
pub mod session;
pub mod stats;
pub mod thumbs;
pub mod video;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export the main types at the crate root for convenience
pub use error::{Result, ZapviewError};
pub use message::{ChatMessage, MediaType, ParsedChat};

/// Convenient re-exports for common usage.
///
/// Import everything you need with a single line:
///
/// ```rust
/// use zapview::prelude::*;
/// ```
pub mod prelude {
    // Core message types
    pub use crate::message::{ChatMessage, MediaType, ParsedChat, SearchMessage};

    // Error types
    pub use crate::error::{Result, ZapviewError};

    // Parsing
    pub use crate::parser::{ContactInfo, parse_chat, parse_vcf};

    // Archives
    pub use crate::archive::{
        ArchiveHandle, ChatArchive, EntryReader, MediaFile, MediaKind, parse_archive,
    };

    // Media
    pub use crate::media::{MediaResolver, MediaResource, mime_type};
    pub use crate::thumbs::{Thumbnail, ThumbnailCache};
    pub use crate::video::VideoFrameCache;

    // Indexing and search
    pub use crate::index::{ChatIndex, FlatItem, build_index};
    pub use crate::search::{SearchEvent, SearchResults, SearchWorker};

    // Sessions
    pub use crate::session::{AppSession, SessionEvent};

    // Bookmarks and stats
    pub use crate::bookmarks::{Bookmark, BookmarkStore};
    pub use crate::stats::ChatStats;

    // Progress reporting
    pub use crate::progress::{ParseProgress, ParseStage, ProgressCallback, no_progress};
}
