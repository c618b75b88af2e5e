//! Video scrub-preview frame cache.
//!
//! Actual frame extraction is a platform video-decode concern and happens
//! outside this crate; the core owns the bounded cache the extracted
//! frames live in, plus the timing and sizing math so every caller seeks
//! to the same spots.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Default cache capacity, in videos.
pub const DEFAULT_VIDEO_CACHE_CAPACITY: usize = 20;
/// Default number of preview frames per video.
pub const DEFAULT_FRAME_COUNT: usize = 10;
/// Largest allowed frame dimension, bounding memory per frame regardless
/// of source resolution.
pub const MAX_FRAME_DIMENSION: u32 = 640;

/// Extracted preview frames for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrames {
    /// Encoded frame snapshots, in timestamp order.
    pub frames: Vec<Vec<u8>>,
    /// Total video duration in seconds.
    pub duration: f64,
}

/// Bounded FIFO cache keyed by media id.
///
/// FIFO, not LRU: scrub previews are hovered briefly and in passing, so
/// recency says little. The oldest insertion goes first.
pub struct VideoFrameCache {
    capacity: usize,
    state: Mutex<FifoState>,
}

struct FifoState {
    entries: HashMap<String, VideoFrames>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

impl VideoFrameCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_VIDEO_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(FifoState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Inserts extracted frames, evicting the oldest insertion when full.
    /// Re-inserting an existing id replaces its frames without changing
    /// its queue position.
    pub fn insert(&self, id: &str, frames: VideoFrames) {
        let mut state = self.lock();
        if state.entries.insert(id.to_string(), frames).is_some() {
            return;
        }
        state.order.push_back(id.to_string());
        if state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    /// Lookup by media id. Does not affect eviction order.
    pub fn get(&self, id: &str) -> Option<VideoFrames> {
        self.lock().entries.get(id).cloned()
    }

    pub fn remove(&self, id: &str) {
        let mut state = self.lock();
        state.entries.remove(id);
        if let Some(pos) = state.order.iter().position(|k| k == id) {
            state.order.remove(pos);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FifoState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for VideoFrameCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Seek timestamps for `frame_count` evenly spaced frames, capped at 99%
/// of the duration so the extractor never seeks past the last frame.
pub fn frame_timestamps(duration: f64, frame_count: usize) -> Vec<f64> {
    if frame_count == 0 || duration <= 0.0 {
        return Vec::new();
    }
    let cap = duration * 0.99;
    if frame_count == 1 {
        return vec![0.0];
    }
    #[allow(clippy::cast_precision_loss)]
    (0..frame_count)
        .map(|i| ((duration / (frame_count - 1) as f64) * i as f64).min(cap))
        .collect()
}

/// Scales source dimensions down so neither exceeds
/// [`MAX_FRAME_DIMENSION`], preserving aspect ratio. Small sources pass
/// through.
pub fn capped_dimensions(width: u32, height: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= MAX_FRAME_DIMENSION || largest == 0 {
        return (width, height);
    }
    let scale = f64::from(MAX_FRAME_DIMENSION) / f64::from(largest);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    (
        ((f64::from(width) * scale).round() as u32).max(1),
        ((f64::from(height) * scale).round() as u32).max(1),
    )
}

/// Maps a horizontal hover fraction (0.0 - 1.0) to a frame index.
pub fn frame_index_at(fraction: f64, frame_count: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let clamped = fraction.clamp(0.0, 1.0);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = (clamped * frame_count as f64).floor() as usize;
    index.min(frame_count - 1)
}

/// Formats a duration in seconds as `M:SS` or `H:MM:SS`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
