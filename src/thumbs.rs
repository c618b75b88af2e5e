//! Bounded thumbnail cache with a decode concurrency limiter.
//!
//! Decoding and resizing images is the most CPU-expensive thing the media
//! layer does, so it is bounded twice: a strict-LRU cache keeps the last
//! 300 thumbnails, and at most 2 decodes run at once with the rest waiting
//! in FIFO order.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Condvar, Mutex};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::Result;

/// Default cache capacity.
pub const DEFAULT_THUMBNAIL_CAPACITY: usize = 300;
/// Maximum concurrent decode operations.
const MAX_CONCURRENT_DECODES: usize = 2;
/// Larger thumbnail dimension, in pixels.
const THUMBNAIL_MAX_DIMENSION: u32 = 256;
/// JPEG re-encode quality.
const THUMBNAIL_JPEG_QUALITY: u8 = 82;

/// An encoded thumbnail. Cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Always `image/jpeg`; thumbnails are re-encoded lossy regardless of
    /// the source format.
    pub mime: &'static str,
    pub bytes: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

struct LruState {
    entries: HashMap<String, Thumbnail>,
    /// Access order, least recent first.
    order: VecDeque<String>,
}

struct LimiterState {
    active: usize,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

/// LRU cache over generated thumbnails, keyed by media path.
pub struct ThumbnailCache {
    capacity: usize,
    state: Mutex<LruState>,
    limiter: Mutex<LimiterState>,
    limiter_cv: Condvar,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_THUMBNAIL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LruState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            limiter: Mutex::new(LimiterState {
                active: 0,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            limiter_cv: Condvar::new(),
        }
    }

    /// Returns the cached thumbnail for `key`, generating it from the
    /// full-size `bytes` on a miss. A hit refreshes the entry's LRU
    /// position. Misses wait for a decode slot in arrival order.
    pub fn get_or_create(&self, key: &str, bytes: &[u8]) -> Result<Thumbnail> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let ticket = self.enqueue();
        let guard = DecodeSlot { cache: self };
        self.wait_for_slot(ticket);

        // Another waiter may have produced the same key meanwhile.
        if let Some(hit) = self.get(key) {
            drop(guard);
            return Ok(hit);
        }

        let thumbnail = generate_thumbnail(bytes)?;
        drop(guard);

        let mut state = self.lock_state();
        if state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
        state.entries.insert(key.to_string(), thumbnail.clone());
        state.order.push_back(key.to_string());
        debug!(key = %key, cached = state.entries.len(), "thumbnail generated");
        Ok(thumbnail)
    }

    /// Cache lookup without generation; refreshes LRU position on hit.
    pub fn get(&self, key: &str) -> Option<Thumbnail> {
        let mut state = self.lock_state();
        let hit = state.entries.get(key).cloned()?;
        if let Some(pos) = state.order.iter().position(|k| k == key) {
            state.order.remove(pos);
            state.order.push_back(key.to_string());
        }
        Some(hit)
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        state.order.clear();
    }

    fn enqueue(&self) -> u64 {
        let mut limiter = self.lock_limiter();
        let ticket = limiter.next_ticket;
        limiter.next_ticket += 1;
        limiter.queue.push_back(ticket);
        ticket
    }

    fn wait_for_slot(&self, ticket: u64) {
        let mut limiter = self.lock_limiter();
        loop {
            let my_turn = limiter.queue.front() == Some(&ticket);
            if my_turn && limiter.active < MAX_CONCURRENT_DECODES {
                limiter.queue.pop_front();
                limiter.active += 1;
                return;
            }
            limiter = self
                .limiter_cv
                .wait(limiter)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    fn release_slot(&self) {
        let mut limiter = self.lock_limiter();
        limiter.active = limiter.active.saturating_sub(1);
        drop(limiter);
        self.limiter_cv.notify_all();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LruState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_limiter(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.limiter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the decode slot even when generation errors out.
struct DecodeSlot<'a> {
    cache: &'a ThumbnailCache,
}

impl Drop for DecodeSlot<'_> {
    fn drop(&mut self) {
        self.cache.release_slot();
    }
}

/// Decodes, downscales to [`THUMBNAIL_MAX_DIMENSION`] and re-encodes as
/// lossy JPEG. Images already small enough skip the resize.
fn generate_thumbnail(bytes: &[u8]) -> Result<Thumbnail> {
    let img = image::load_from_memory(bytes)?;

    let resized = if img.width().max(img.height()) > THUMBNAIL_MAX_DIMENSION {
        img.resize(
            THUMBNAIL_MAX_DIMENSION,
            THUMBNAIL_MAX_DIMENSION,
            FilterType::Triangle,
        )
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    Ok(Thumbnail {
        mime: "image/jpeg",
        bytes: Arc::new(out.into_inner()),
        width: rgb.width(),
        height: rgb.height(),
    })
}
