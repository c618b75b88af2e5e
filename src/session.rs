//! Application state coordination.
//!
//! [`AppSession`] is the orchestration layer a UI talks to: it owns the
//! loaded chats with their indexes and media caches, the search worker,
//! and the transient search state. Queries are debounced and tagged with
//! a generation; results delivered under an older generation are
//! discarded, so the visible state always reflects the newest input
//! (last writer wins).

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::archive::{ArchiveHandle, ChatArchive, parse_archive};
use crate::error::{Result, ZapviewError};
use crate::index::{ChatIndex, spawn_index};
use crate::media::{DEFAULT_MEDIA_CACHE_CAPACITY, MediaResolver};
use crate::progress::ProgressCallback;
use crate::search::{SearchEvent, SearchWorker};
use crate::thumbs::{DEFAULT_THUMBNAIL_CAPACITY, ThumbnailCache};
use crate::video::{DEFAULT_VIDEO_CACHE_CAPACITY, VideoFrameCache};

/// Keystroke debounce interval before a query reaches the worker.
pub const DEBOUNCE: Duration = Duration::from_millis(150);

/// Cache capacities, injectable for tests and small-memory hosts.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub media_cache_capacity: usize,
    pub thumbnail_capacity: usize,
    pub video_cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media_cache_capacity: DEFAULT_MEDIA_CACHE_CAPACITY,
            thumbnail_capacity: DEFAULT_THUMBNAIL_CAPACITY,
            video_cache_capacity: DEFAULT_VIDEO_CACHE_CAPACITY,
        }
    }
}

/// One loaded export with everything derived from it.
pub struct LoadedChat {
    pub archive: ChatArchive,
    pub index: ChatIndex,
    pub resolver: MediaResolver<ArchiveHandle>,
    /// Message id to corpus position, for O(1) bitmap lookups.
    corpus_index: HashMap<String, usize>,
}

/// Events surfaced by [`AppSession::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A debounced query was dispatched to the worker.
    SearchStarted { query: String },
    SearchProgress { progress: u8 },
    SearchCompleted { total_matches: usize },
    SearchCancelled,
}

#[derive(Default)]
struct SearchState {
    query: String,
    bitmap: Vec<u8>,
    navigable: Vec<String>,
    total_matches: usize,
    cursor: Option<usize>,
}

/// Debounce stage: queries go in per keystroke, at most one comes out
/// per quiet period.
struct Debouncer {
    input: mpsc::Sender<(String, u64)>,
    fired: mpsc::Receiver<(String, u64)>,
}

impl Debouncer {
    fn spawn() -> Self {
        let (input_tx, input_rx) = mpsc::channel::<(String, u64)>();
        let (fired_tx, fired_rx) = mpsc::channel();
        thread::Builder::new()
            .name("zapview-debounce".into())
            .spawn(move || debounce_loop(&input_rx, &fired_tx))
            .expect("failed to spawn debounce thread");
        Self {
            input: input_tx,
            fired: fired_rx,
        }
    }
}

fn debounce_loop(input: &mpsc::Receiver<(String, u64)>, fired: &mpsc::Sender<(String, u64)>) {
    while let Ok(mut pending) = input.recv() {
        loop {
            match input.recv_timeout(DEBOUNCE) {
                // A newer keystroke restarts the quiet period.
                Ok(newer) => pending = newer,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let _ = fired.send(pending);
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

/// The coordinator. Single-threaded API; background work (debounce,
/// search, indexing) happens on owned worker threads and is drained via
/// [`poll_events`](Self::poll_events).
pub struct AppSession {
    config: SessionConfig,
    chats: Vec<LoadedChat>,
    active: Option<usize>,
    worker: Option<SearchWorker>,
    state: SearchState,
    /// Current search generation; grows on every query and chat switch.
    generation: u64,
    transcripts: HashMap<String, String>,
    debouncer: Debouncer,
    pub thumbnails: ThumbnailCache,
    pub video_frames: VideoFrameCache,
}

impl AppSession {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            chats: Vec::new(),
            active: None,
            worker: None,
            state: SearchState::default(),
            generation: 0,
            transcripts: HashMap::new(),
            debouncer: Debouncer::spawn(),
            thumbnails: ThumbnailCache::with_capacity(config.thumbnail_capacity),
            video_frames: VideoFrameCache::with_capacity(config.video_cache_capacity),
        }
    }

    /// Ingests an export and indexes it. Returns the chat's slot.
    pub fn load_archive<R: Read + Seek + Send + 'static>(
        &mut self,
        reader: R,
        source_name: Option<&str>,
        progress: &ProgressCallback,
    ) -> Result<usize> {
        let archive = parse_archive(reader, source_name, progress)?;
        let rx = spawn_index(archive.chat.messages.clone(), archive.chat.title.clone());
        let index = rx
            .recv()
            .map_err(|_| ZapviewError::worker_gone("indexing chat"))?;

        let corpus_index = index
            .corpus
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        let resolver =
            MediaResolver::with_capacity(archive.handle.clone(), self.config.media_cache_capacity);

        self.chats.push(LoadedChat {
            archive,
            index,
            resolver,
            corpus_index,
        });
        Ok(self.chats.len() - 1)
    }

    /// Makes a chat active, tearing down any in-flight search session and
    /// loading the chat's corpus into the worker.
    pub fn select_chat(&mut self, slot: usize) -> Result<()> {
        let chat = self
            .chats
            .get(slot)
            .ok_or_else(|| ZapviewError::worker_gone(format!("no chat in slot {slot}")))?;

        // Invalidate anything in flight before switching.
        self.generation += 1;
        if let Some(worker) = &self.worker {
            worker.cancel();
        }
        self.state = SearchState::default();

        let worker = self.worker.take().unwrap_or_else(SearchWorker::spawn);
        worker.load(chat.index.corpus.clone())?;
        worker.wait_ready()?;
        self.worker = Some(worker);
        self.active = Some(slot);
        debug!(slot, title = %chat.index.chat_title, "chat selected");
        Ok(())
    }

    pub fn active_chat(&self) -> Option<&LoadedChat> {
        self.active.and_then(|slot| self.chats.get(slot))
    }

    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    /// Records a keystroke. The query reaches the worker only after the
    /// debounce interval passes without newer input.
    pub fn set_query(&mut self, query: &str) {
        self.generation += 1;
        let _ = self.debouncer.input.send((query.to_string(), self.generation));
    }

    /// Supplies an audio transcript for a message; searched alongside
    /// message text on subsequent queries.
    pub fn set_transcript(&mut self, message_id: &str, text: &str) {
        self.transcripts
            .insert(message_id.to_string(), text.to_string());
    }

    /// Drains debounce firings and worker events, applying completed
    /// results whose generation is still current.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();

        while let Ok((query, generation)) = self.debouncer.fired.try_recv() {
            if generation != self.generation {
                continue; // superseded while debouncing
            }
            if self.active.is_none() {
                continue;
            }
            if let Some(worker) = &self.worker {
                if worker
                    .search(generation, &query, self.transcripts.clone())
                    .is_ok()
                {
                    self.state.query.clone_from(&query);
                    out.push(SessionEvent::SearchStarted { query });
                }
            }
        }

        if let Some(worker) = &self.worker {
            while let Some(event) = worker.try_recv_event() {
                match event {
                    SearchEvent::Progress {
                        search_id,
                        progress,
                    } => {
                        if search_id == self.generation {
                            out.push(SessionEvent::SearchProgress { progress });
                        }
                    }
                    SearchEvent::Complete(results) => {
                        // A stale completion never overwrites fresher state.
                        if results.search_id == self.generation {
                            self.state.bitmap = results.match_bitmap;
                            self.state.navigable = results.matching_ids;
                            self.state.total_matches = results.total_matches;
                            self.state.cursor = None;
                            out.push(SessionEvent::SearchCompleted {
                                total_matches: self.state.total_matches,
                            });
                        }
                    }
                    SearchEvent::Cancelled { .. } => out.push(SessionEvent::SearchCancelled),
                    SearchEvent::Ready { .. } => {}
                }
            }
        }

        out
    }

    /// Blocks until the next batch of events or the timeout passes.
    /// Convenience for non-UI callers without their own event loop.
    pub fn wait_events(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let events = self.poll_events();
            if !events.is_empty() || std::time::Instant::now() >= deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// O(1) match predicate backed by the bitmap and the id index map.
    pub fn is_match(&self, message_id: &str) -> bool {
        let Some(chat) = self.active_chat() else {
            return false;
        };
        chat.corpus_index
            .get(message_id)
            .and_then(|&idx| self.state.bitmap.get(idx))
            .is_some_and(|&flag| flag == 1)
    }

    /// Steps to the next navigable match, wrapping around.
    pub fn next_result(&mut self) -> Option<&str> {
        if self.state.navigable.is_empty() {
            return None;
        }
        let next = match self.state.cursor {
            Some(cursor) => (cursor + 1) % self.state.navigable.len(),
            None => 0,
        };
        self.state.cursor = Some(next);
        Some(&self.state.navigable[next])
    }

    /// Steps to the previous navigable match, wrapping around.
    pub fn prev_result(&mut self) -> Option<&str> {
        if self.state.navigable.is_empty() {
            return None;
        }
        let len = self.state.navigable.len();
        let prev = match self.state.cursor {
            Some(cursor) => (cursor + len - 1) % len,
            None => len - 1,
        };
        self.state.cursor = Some(prev);
        Some(&self.state.navigable[prev])
    }

    pub fn total_matches(&self) -> usize {
        self.state.total_matches
    }

    pub fn query(&self) -> &str {
        &self.state.query
    }

    /// Shuts the worker down, closes every archive and clears all caches.
    pub fn reset(&mut self) {
        self.worker = None;
        self.state = SearchState::default();
        self.generation += 1;
        self.transcripts.clear();
        for chat in &self.chats {
            chat.resolver.cleanup();
            chat.archive.handle.close();
        }
        self.chats.clear();
        self.active = None;
        self.thumbnails.clear();
        self.video_frames.clear();
    }
}

impl Default for AppSession {
    fn default() -> Self {
        Self::new()
    }
}
