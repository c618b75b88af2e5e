//! ZIP export ingestion.
//!
//! A WhatsApp export archive holds one chat transcript plus any number of
//! media attachments. Ingestion enumerates the archive exactly once,
//! loads the (small) transcript and contact cards eagerly, and catalogs
//! media lazily: attachment bytes stay compressed inside the archive until
//! the media resolver asks for them. This is what keeps multi-gigabyte
//! backups openable.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::{Arc, LazyLock, Mutex};

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Result, ZapviewError};
use crate::message::ParsedChat;
use crate::parser::chat::title_from_filename;
use crate::parser::{ContactInfo, looks_like_chat, parse_chat, parse_vcf};
use crate::progress::{ParseProgress, ParseStage, ProgressCallback};

/// Media category derived from the file extension. This is the catalog
/// classification; the per-message [`MediaType`] derived from message text
/// is a separate axis (e.g. `.svg` catalogs as Image but messages
/// referencing it classify as Document).
///
/// [`MediaType`]: crate::message::MediaType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl MediaKind {
    /// Classifies a filename by extension.
    pub fn from_name(filename: &str) -> Self {
        let ext = filename
            .rsplit('.')
            .next()
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" => MediaKind::Image,
            "mp4" | "mov" | "avi" | "mkv" | "3gp" | "webm" => MediaKind::Video,
            "opus" | "mp3" | "wav" | "aac" | "m4a" | "ogg" => MediaKind::Audio,
            "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "vcf" | "xml" => {
                MediaKind::Document
            }
            _ => MediaKind::Other,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// One cataloged attachment. Bytes are not held here; the archive path is
/// the key the resolver uses to decompress on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Bare filename, e.g. `IMG-20240115-WA0001.jpg`.
    pub name: String,
    /// Full archive-relative path.
    pub path: String,
    pub kind: MediaKind,
    /// Uncompressed size in bytes, from the archive's central directory.
    pub size: u64,
    /// Back-reference to the message this attachment belongs to, set once
    /// during media linking.
    pub message_id: Option<String>,
    pub message_timestamp: Option<NaiveDateTime>,
    pub message_sender: Option<String>,
}

/// Narrow capability the media resolver needs: decompress one entry by
/// archive path. Abstracted so the resolver and its tests don't depend on
/// the ZIP container type.
pub trait EntryReader: Send + Sync {
    fn read_entry(&self, path: &str) -> Result<Vec<u8>>;
}

/// Reader bounds the archive handle needs to keep the container open for
/// random-access decompression.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Shared handle to the still-open ZIP container.
///
/// Clones share one underlying archive. After [`close`](Self::close),
/// every read fails with [`ZapviewError::ArchiveClosed`]; resolvers
/// holding a clone observe the closure instead of a dangling container.
#[derive(Clone)]
pub struct ArchiveHandle {
    inner: Arc<Mutex<Option<ZipArchive<Box<dyn ReadSeek>>>>>,
}

impl ArchiveHandle {
    fn new(archive: ZipArchive<Box<dyn ReadSeek>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(archive))),
        }
    }

    /// Decompresses a single entry.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let archive = guard.as_mut().ok_or(ZapviewError::ArchiveClosed)?;

        let mut entry = archive.by_name(path).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => ZapviewError::MediaNotFound {
                name: path.rsplit('/').next().unwrap_or(path).to_string(),
                path: path.to_string(),
            },
            other => ZapviewError::Zip(other),
        })?;

        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Closes the container. Idempotent; later reads fail with
    /// [`ZapviewError::ArchiveClosed`].
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_none()
    }
}

impl EntryReader for ArchiveHandle {
    fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        ArchiveHandle::read_entry(self, path)
    }
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Fully ingested export: parsed chat, media catalog, contacts, and the
/// open archive handle for lazy media resolution.
#[derive(Debug)]
pub struct ChatArchive {
    pub chat: ParsedChat,
    pub media_files: Vec<MediaFile>,
    /// Contacts from shared vCards, keyed by lowercased display name.
    pub contacts: HashMap<String, ContactInfo>,
    pub has_media: bool,
    pub handle: ArchiveHandle,
}

/// Names that suggest a text entry is a transcript even without a `.txt`
/// extension.
const CHAT_NAME_HINTS: &[&str] = &["chat", "conversation", "whatsapp"];

static GROUP_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:created group|changed the subject to) ["“]([^"”]+)["”]"#)
        .expect("group subject pattern must compile")
});

/// Ingests a WhatsApp export archive.
///
/// `source_name` is the filename of the archive itself, used as a title
/// hint for iOS exports whose transcript is the generic `_chat.txt`.
/// Progress is advisory: three coarse stages, 0-100 each.
///
/// # Errors
///
/// [`ZapviewError::NoChatFile`] when enumeration finds no transcript,
/// [`ZapviewError::EmptyChat`] when the transcript yields zero messages,
/// plus container-level [`ZapviewError::Zip`]/[`ZapviewError::Io`].
pub fn parse_archive<R: Read + Seek + Send + 'static>(
    reader: R,
    source_name: Option<&str>,
    progress: &ProgressCallback,
) -> Result<ChatArchive> {
    progress(ParseProgress::new(ParseStage::Extracting, 0.0));
    let mut archive = ZipArchive::new(Box::new(reader) as Box<dyn ReadSeek>)?;
    progress(ParseProgress::new(ParseStage::Extracting, 100.0));

    let total = archive.len();
    debug!(entries = total, "archive opened");

    let mut entry_names: Vec<String> = Vec::new();
    let mut chat_text: Option<String> = None;
    let mut chat_filename = String::new();
    let mut chat_path = String::new();
    let mut vcf_texts: Vec<(String, String)> = Vec::new();
    let mut media_files: Vec<MediaFile> = Vec::new();

    for i in 0..total {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().to_string();
        let size = entry.size();
        entry_names.push(path.clone());
        let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
        let lower = filename.to_lowercase();

        if lower.ends_with(".txt") && !filename.starts_with('.') {
            // Transcript candidate. Chat files are small, load eagerly.
            // A later .txt replaces an earlier one.
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            chat_text = Some(String::from_utf8_lossy(&bytes).into_owned());
            chat_filename = filename;
            chat_path = path;
            continue;
        }

        if lower.ends_with(".vcf") {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            vcf_texts.push((path.clone(), String::from_utf8_lossy(&bytes).into_owned()));
            // Shared cards are also attachments, keep them in the catalog.
            media_files.push(MediaFile {
                name: filename,
                path,
                kind: MediaKind::Document,
                size,
                message_id: None,
                message_timestamp: None,
                message_sender: None,
            });
            continue;
        }

        // Speculative transcript: name suggests a chat but lacks .txt.
        if CHAT_NAME_HINTS.iter().any(|hint| lower.contains(hint)) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if looks_like_chat(&text) {
                chat_text = Some(text);
                chat_filename = filename;
                chat_path = path;
                continue;
            }
            // Fell through: treat as media below.
        }

        let kind = MediaKind::from_name(&filename);
        if kind != MediaKind::Other || !filename.starts_with('.') {
            media_files.push(MediaFile {
                name: filename,
                path,
                kind,
                size,
                message_id: None,
                message_timestamp: None,
                message_sender: None,
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let pct = 30.0 + ((i + 1) as f64 / total.max(1) as f64) * 50.0;
        progress(ParseProgress::new(ParseStage::Enumerating, pct));
    }

    let Some(chat_text) = chat_text else {
        return Err(ZapviewError::no_chat_file(entry_names));
    };

    let mut contacts: HashMap<String, ContactInfo> = HashMap::new();
    for (path, text) in &vcf_texts {
        match parse_vcf(text) {
            Some(contact) => {
                contacts.insert(contact.name.to_lowercase(), contact);
            }
            None => warn!(path = %path, "skipping malformed vCard"),
        }
    }

    progress(ParseProgress::new(ParseStage::Parsing, 0.0));

    let title_hint = if chat_filename.to_lowercase().starts_with("_chat") {
        ios_title_hint(&chat_path, source_name, &chat_text)
    } else {
        chat_filename.clone()
    };

    let mut chat = parse_chat(&chat_text, &title_hint);
    if chat.messages.is_empty() {
        let first_line = chat_text
            .lines()
            .find(|l| !l.trim().is_empty())
            .map(str::to_string);
        return Err(ZapviewError::empty_chat(first_line));
    }

    progress(ParseProgress::new(ParseStage::Parsing, 50.0));

    link_media(&mut chat, &mut media_files);

    progress(ParseProgress::new(ParseStage::Parsing, 100.0));
    debug!(
        messages = chat.message_count,
        media = media_files.len(),
        contacts = contacts.len(),
        "archive ingested"
    );

    let has_media = !media_files.is_empty();
    Ok(ChatArchive {
        chat,
        media_files,
        contacts,
        has_media,
        handle: ArchiveHandle::new(archive),
    })
}

/// Title derivation for iOS exports, which name the transcript `_chat.txt`
/// and carry the human name elsewhere. Priority: parent folder in the
/// archive, then the archive's own filename, then a group-subject phrase
/// in the first lines, then a fixed fallback that triggers the
/// participant-based title in the chat parser.
fn ios_title_hint(chat_path: &str, source_name: Option<&str>, chat_text: &str) -> String {
    if let Some((parent, _)) = chat_path.rsplit_once('/') {
        let folder = parent.rsplit('/').next().unwrap_or(parent);
        if !folder.is_empty() && !folder.eq_ignore_ascii_case("whatsapp") {
            let title = title_from_filename(folder);
            if !title.is_empty() {
                return title;
            }
        }
    }

    if let Some(source) = source_name {
        let stem = source
            .rsplit('/')
            .next()
            .unwrap_or(source)
            .trim_end_matches(".zip")
            .trim_end_matches(".ZIP");
        let title = title_from_filename(stem);
        if !title.is_empty() && !title.eq_ignore_ascii_case("whatsapp chat") {
            return title;
        }
    }

    for line in chat_text.lines().take(20) {
        if let Some(caps) = GROUP_SUBJECT.captures(line) {
            return caps[1].to_string();
        }
    }

    "WhatsApp Chat".to_string()
}

/// Attaches cataloged media files to the messages that reference them.
///
/// Keys are the lowercased full filename and its stem; the catalog-order
/// scan stops at the first key contained in the message content. Links
/// are bidirectional and the media side is set only once, so a filename
/// mentioned twice stays attached to its first message.
fn link_media(chat: &mut ParsedChat, media_files: &mut [MediaFile]) {
    let mut keys: Vec<(String, usize)> = Vec::with_capacity(media_files.len() * 2);
    for (idx, media) in media_files.iter().enumerate() {
        let name = media.name.to_lowercase();
        let stem = name
            .rsplit_once('.')
            .map_or(name.clone(), |(stem, _)| stem.to_string());
        keys.push((name, idx));
        if !stem.is_empty() {
            keys.push((stem, idx));
        }
    }

    for message in &mut chat.messages {
        if !message.is_media_message {
            continue;
        }
        let content = message.content.to_lowercase();
        if let Some((_, idx)) = keys.iter().find(|(key, _)| content.contains(key.as_str())) {
            let media = &mut media_files[*idx];
            message.media_path = Some(media.path.clone());
            if media.message_id.is_none() {
                media.message_id = Some(message.id.clone());
                media.message_timestamp = Some(message.timestamp);
                media.message_sender = Some(message.sender.clone());
            }
        }
    }
}
