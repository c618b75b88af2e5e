//! On-demand media resolution with a bounded reference-counted cache.
//!
//! Attachments stay compressed in the archive until a caller asks for
//! them. Resolved entries are cached by archive path with a reference
//! count; the count tracks how many callers currently present the
//! resource, and entries still referenced are never evicted outside
//! [`MediaResolver::cleanup`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::archive::{EntryReader, MediaFile};
use crate::error::Result;

/// Default cache capacity, in resolved entries.
pub const DEFAULT_MEDIA_CACHE_CAPACITY: usize = 50;

/// Preload batch width.
const PRELOAD_BATCH: usize = 5;

/// A resolved, presentable media resource. Cloning is cheap; the bytes
/// are shared.
#[derive(Debug, Clone)]
pub struct MediaResource {
    /// Archive path, the cache key.
    pub path: String,
    pub mime: &'static str,
    pub bytes: Arc<Vec<u8>>,
}

struct CacheEntry {
    resource: MediaResource,
    ref_count: u32,
}

/// Resolves cataloged media files against an open archive.
///
/// Generic over [`EntryReader`] so tests can supply an in-memory reader
/// instead of a real ZIP handle.
pub struct MediaResolver<E: EntryReader> {
    reader: E,
    capacity: usize,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl<E: EntryReader> MediaResolver<E> {
    pub fn new(reader: E) -> Self {
        Self::with_capacity(reader, DEFAULT_MEDIA_CACHE_CAPACITY)
    }

    pub fn with_capacity(reader: E, capacity: usize) -> Self {
        Self {
            reader,
            capacity: capacity.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a media file, decompressing it on first access.
    ///
    /// A cache hit bumps the reference count. A miss decompresses the
    /// entry, evicting unreferenced entries first if the cache is at
    /// capacity, and registers the resource with a count of 1. Balance
    /// every successful `resolve` with a [`release`](Self::release) once
    /// the resource is no longer presented.
    pub fn resolve(&self, media: &MediaFile) -> Result<MediaResource> {
        let mut cache = self.lock_cache();

        if let Some(entry) = cache.get_mut(&media.path) {
            entry.ref_count += 1;
            return Ok(entry.resource.clone());
        }

        if cache.len() >= self.capacity {
            evict_unreferenced(&mut cache);
        }

        let bytes = self.reader.read_entry(&media.path)?;
        debug!(path = %media.path, size = bytes.len(), "media resolved");

        let resource = MediaResource {
            path: media.path.clone(),
            mime: mime_type(&media.name),
            bytes: Arc::new(bytes),
        };
        cache.insert(
            media.path.clone(),
            CacheEntry {
                resource: resource.clone(),
                ref_count: 1,
            },
        );
        Ok(resource)
    }

    /// Drops one reference to a resolved entry. The entry stays cached
    /// at zero references until eviction needs its slot.
    pub fn release(&self, path: &str) {
        let mut cache = self.lock_cache();
        if let Some(entry) = cache.get_mut(path) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
        }
    }

    /// Releases everything, referenced or not. Called when the chat is
    /// discarded.
    pub fn cleanup(&self) {
        self.lock_cache().clear();
    }

    /// Best-effort warm-up of not-yet-resolved entries, in bounded
    /// batches. Individual failures are logged and skipped. Preloaded
    /// entries enter the cache unreferenced, so ones never viewed stay
    /// evictable.
    pub fn preload(&self, files: &[MediaFile])
    where
        E: Sync,
    {
        for batch in files.chunks(PRELOAD_BATCH) {
            std::thread::scope(|scope| {
                for media in batch {
                    if self.is_cached(&media.path) {
                        continue;
                    }
                    scope.spawn(move || match self.resolve(media) {
                        Ok(_) => self.release(&media.path),
                        Err(e) => {
                            warn!(path = %media.path, error = %e, "preload failed");
                        }
                    });
                }
            });
        }
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.lock_cache().contains_key(path)
    }

    /// Number of resolved entries currently cached.
    pub fn cached_count(&self) -> usize {
        self.lock_cache().len()
    }

    /// Current reference count for a cached entry.
    pub fn ref_count(&self, path: &str) -> Option<u32> {
        self.lock_cache().get(path).map(|e| e.ref_count)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Evicts the least-referenced fifth of the cache (at least one entry),
/// considering only entries nobody currently references.
fn evict_unreferenced(cache: &mut HashMap<String, CacheEntry>) {
    let mut candidates: Vec<String> = cache
        .iter()
        .filter(|(_, entry)| entry.ref_count == 0)
        .map(|(path, _)| path.clone())
        .collect();
    if candidates.is_empty() {
        // Every entry is still referenced; the cache temporarily exceeds
        // capacity rather than invalidating a resource in use.
        return;
    }
    candidates.sort();

    let to_remove = (cache.len() / 5).clamp(1, candidates.len());
    for path in candidates.into_iter().take(to_remove) {
        cache.remove(&path);
    }
}

/// MIME type from the file extension. Unknown extensions map to the
/// generic binary type.
pub fn mime_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit('.')
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "3gp" => "video/3gpp",
        "webm" => "video/webm",
        "opus" => "audio/opus",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "vcf" => "text/vcard",
        _ => "application/octet-stream",
    }
}
