//! Unified error types for zapview.
//!
//! This module provides a single [`ZapviewError`] enum that covers all error
//! cases in the library, following the pattern of popular crates like
//! `reqwest` and `serde_json`: library users get typed errors they can match
//! on, application users get clear, actionable messages.
//!
//! Ingestion-phase errors are fatal and carry enough diagnostic context for
//! a user to self-diagnose a malformed export: [`ZapviewError::NoChatFile`]
//! lists every entry found in the archive, [`ZapviewError::EmptyChat`]
//! includes the first raw line of the file that failed to parse.

use std::io;

use thiserror::Error;

/// A specialized [`Result`] type for zapview operations.
pub type Result<T> = std::result::Result<T, ZapviewError>;

/// The error type for all zapview operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ZapviewError {
    /// An I/O error occurred while reading the archive or an entry.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The ZIP container itself could not be read.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// No chat transcript was found in the archive.
    ///
    /// The single most common user-facing failure mode, so the message
    /// enumerates everything that WAS found.
    #[error(
        "No chat file found in ZIP archive. The archive contains {} entr{}: {}. \
         Export the chat again from WhatsApp using \"Export chat\" and make sure \
         the .txt transcript is included.",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        entries.join(", ")
    )]
    NoChatFile {
        /// Every entry name present in the archive.
        entries: Vec<String>,
    },

    /// A chat file was found but yielded zero messages.
    #[error(
        "Chat file contained no parseable messages{}",
        first_line.as_ref().map(|l| format!(". First line was: {l:?}")).unwrap_or_default()
    )]
    EmptyChat {
        /// First raw line of the chat file, for format debugging.
        first_line: Option<String>,
    },

    /// The archive handle was closed; lazy media resolution is no longer
    /// possible for this chat.
    #[error("Archive handle is closed; media can no longer be loaded")]
    ArchiveClosed,

    /// A cataloged media entry could not be located in the archive.
    #[error("Cannot load media file: {name} - no archive entry at {path}")]
    MediaNotFound {
        /// Display name of the media file.
        name: String,
        /// Archive-relative path that failed to resolve.
        path: String,
    },

    /// Image decode/encode error during thumbnail generation.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON error while reading or writing bookmark files or worker payloads.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background worker failed to initialize within its deadline.
    #[error("Worker failed to initialize within {seconds} seconds")]
    WorkerTimeout {
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// A background worker thread is gone (channel disconnected).
    #[error("Worker channel disconnected: {context}")]
    WorkerGone {
        /// What was being attempted.
        context: String,
    },

    /// Bookmark file carries an unsupported version.
    #[error("Unsupported bookmark file version {found} (expected {expected})")]
    BookmarkVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// Archive entry content was not valid UTF-8.
    #[error("UTF-8 encoding error in {context}: {source}")]
    Utf8 {
        /// Description of where the error occurred.
        context: String,
        /// The underlying UTF-8 error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl ZapviewError {
    /// Creates a no-chat-file error from the archive's entry listing.
    pub fn no_chat_file(entries: Vec<String>) -> Self {
        ZapviewError::NoChatFile { entries }
    }

    /// Creates an empty-chat error with the first raw line for debugging.
    pub fn empty_chat(first_line: Option<String>) -> Self {
        ZapviewError::EmptyChat { first_line }
    }

    /// Creates a worker-gone error.
    pub fn worker_gone(context: impl Into<String>) -> Self {
        ZapviewError::WorkerGone {
            context: context.into(),
        }
    }

    /// Creates a UTF-8 error with location context.
    pub fn utf8(context: impl Into<String>, source: std::string::FromUtf8Error) -> Self {
        ZapviewError::Utf8 {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, ZapviewError::Io(_))
    }

    /// Returns `true` if this is an archive-structure error (no chat file
    /// or empty chat), i.e. fatal to the ingestion attempt.
    pub fn is_archive_structure(&self) -> bool {
        matches!(
            self,
            ZapviewError::NoChatFile { .. } | ZapviewError::EmptyChat { .. }
        )
    }

    /// Returns `true` if this error means the archive handle was closed.
    pub fn is_archive_closed(&self) -> bool {
        matches!(self, ZapviewError::ArchiveClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_chat_file_lists_entries() {
        let err = ZapviewError::no_chat_file(vec![
            "IMG-001.jpg".to_string(),
            "VID-002.mp4".to_string(),
        ]);
        let display = err.to_string();
        assert!(display.contains("IMG-001.jpg"));
        assert!(display.contains("VID-002.mp4"));
        assert!(display.contains("2 entries"));
        assert!(err.is_archive_structure());
    }

    #[test]
    fn test_no_chat_file_singular() {
        let err = ZapviewError::no_chat_file(vec!["photo.png".to_string()]);
        assert!(err.to_string().contains("1 entry"));
    }

    #[test]
    fn test_empty_chat_shows_first_line() {
        let err = ZapviewError::empty_chat(Some("not a chat line".to_string()));
        let display = err.to_string();
        assert!(display.contains("no parseable messages"));
        assert!(display.contains("not a chat line"));
        assert!(err.is_archive_structure());
    }

    #[test]
    fn test_empty_chat_without_line() {
        let err = ZapviewError::empty_chat(None);
        assert!(!err.to_string().contains("First line"));
    }

    #[test]
    fn test_archive_closed() {
        let err = ZapviewError::ArchiveClosed;
        assert!(err.is_archive_closed());
        assert!(!err.is_io());
    }

    #[test]
    fn test_worker_timeout_display() {
        let err = ZapviewError::WorkerTimeout { seconds: 5 };
        assert!(err.to_string().contains("5 seconds"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ZapviewError = io_err.into();
        assert!(err.is_io());
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = ZapviewError::from(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_utf8_error_display() {
        let utf8_err = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let err = ZapviewError::utf8("chat file", utf8_err);
        let display = err.to_string();
        assert!(display.contains("UTF-8"));
        assert!(display.contains("chat file"));
    }
}
