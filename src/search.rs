//! Chunked, cancellable substring search over a loaded corpus.
//!
//! The worker owns a dedicated thread and one corpus at a time. The
//! corpus is loaded once per chat; each query then only crosses the
//! channel as a string. Results come back as a dense bitmap aligned with
//! corpus positions plus a bounded id list for next/previous navigation.
//!
//! Cancellation is generation-based: the coordinator bumps a shared
//! counter and the worker checks it between 2000-message chunks, so a
//! superseded search aborts quickly instead of finishing and overwriting
//! fresher state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, ZapviewError};
use crate::message::SearchMessage;

/// Messages scanned between cancellation checks.
const CHUNK_SIZE: usize = 2000;
/// Cap on ids returned for sequential navigation. The total match count
/// still reflects every match.
pub const MAX_NAV_RESULTS: usize = 1000;
/// How long [`SearchWorker::wait_ready`] waits for corpus load.
pub const WORKER_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands into the worker thread.
enum Command {
    LoadData {
        corpus: Vec<SearchMessage>,
    },
    Search {
        search_id: u64,
        query: String,
        transcripts: HashMap<String, String>,
    },
    Shutdown,
}

/// Completed search payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub search_id: u64,
    pub query: String,
    /// First [`MAX_NAV_RESULTS`] matching ids, in corpus order.
    pub matching_ids: Vec<String>,
    /// One byte per corpus position, 1 for a match.
    pub match_bitmap: Vec<u8>,
    pub total_matches: usize,
}

/// Events out of the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// Corpus loaded, queries may be dispatched.
    Ready { corpus_len: usize },
    /// Coarse scan progress, 0-100.
    Progress { search_id: u64, progress: u8 },
    Complete(SearchResults),
    /// The search observed a newer generation and aborted.
    Cancelled { search_id: u64 },
}

/// Handle to the search worker thread.
///
/// Dropping the handle shuts the thread down.
pub struct SearchWorker {
    commands: mpsc::Sender<Command>,
    events: mpsc::Receiver<SearchEvent>,
    latest: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    /// Spawns the worker thread. No corpus is loaded yet.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (event_tx, event_rx) = mpsc::channel::<SearchEvent>();
        let latest = Arc::new(AtomicU64::new(0));
        let latest_worker = Arc::clone(&latest);

        let handle = thread::Builder::new()
            .name("zapview-search".into())
            .spawn(move || worker_loop(&cmd_rx, &event_tx, &latest_worker))
            .expect("failed to spawn search worker thread");

        Self {
            commands: cmd_tx,
            events: event_rx,
            latest,
            handle: Some(handle),
        }
    }

    /// Loads a corpus, replacing any previous one. The worker answers
    /// with [`SearchEvent::Ready`].
    pub fn load(&self, corpus: Vec<SearchMessage>) -> Result<()> {
        self.commands
            .send(Command::LoadData { corpus })
            .map_err(|_| ZapviewError::worker_gone("loading search corpus"))
    }

    /// Blocks until the worker reports the corpus loaded, failing with
    /// [`ZapviewError::WorkerTimeout`] after [`WORKER_READY_TIMEOUT`].
    pub fn wait_ready(&self) -> Result<usize> {
        // One overall deadline; stale events do not extend it.
        let deadline = Instant::now() + WORKER_READY_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(SearchEvent::Ready { corpus_len }) => return Ok(corpus_len),
                Ok(other) => {
                    // Stale event from a superseded search.
                    debug!(?other, "discarding stale event while awaiting ready");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(ZapviewError::WorkerTimeout {
                        seconds: WORKER_READY_TIMEOUT.as_secs(),
                    });
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ZapviewError::worker_gone("awaiting search readiness"));
                }
            }
        }
    }

    /// Dispatches a search under the given generation id. The id becomes
    /// the latest generation, implicitly cancelling any older in-flight
    /// search.
    pub fn search(
        &self,
        search_id: u64,
        query: &str,
        transcripts: HashMap<String, String>,
    ) -> Result<()> {
        self.latest.store(search_id, Ordering::SeqCst);
        self.commands
            .send(Command::Search {
                search_id,
                query: query.to_string(),
                transcripts,
            })
            .map_err(|_| ZapviewError::worker_gone("dispatching search"))
    }

    /// Cancels whatever search is in flight by bumping the generation.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Non-blocking event poll.
    pub fn try_recv_event(&self) -> Option<SearchEvent> {
        self.events.try_recv().ok()
    }

    /// Blocking event poll with a deadline.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SearchEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("search worker thread panicked");
            }
        }
    }
}

fn worker_loop(
    commands: &mpsc::Receiver<Command>,
    events: &mpsc::Sender<SearchEvent>,
    latest: &AtomicU64,
) {
    let mut corpus: Vec<SearchMessage> = Vec::new();
    let mut id_to_index: HashMap<String, usize> = HashMap::new();

    while let Ok(command) = commands.recv() {
        match command {
            Command::LoadData { corpus: new_corpus } => {
                id_to_index = new_corpus
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (m.id.clone(), i))
                    .collect();
                corpus = new_corpus;
                let _ = events.send(SearchEvent::Ready {
                    corpus_len: corpus.len(),
                });
            }
            Command::Search {
                search_id,
                query,
                transcripts,
            } => {
                run_search(
                    &corpus,
                    &id_to_index,
                    search_id,
                    &query,
                    &transcripts,
                    latest,
                    events,
                );
            }
            Command::Shutdown => break,
        }
    }
}

/// One full search pass. Emits progress, then either `Complete` or
/// `Cancelled`, never both.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn run_search(
    corpus: &[SearchMessage],
    id_to_index: &HashMap<String, usize>,
    search_id: u64,
    query: &str,
    transcripts: &HashMap<String, String>,
    latest: &AtomicU64,
    events: &mpsc::Sender<SearchEvent>,
) {
    let cancelled = || latest.load(Ordering::SeqCst) != search_id;
    let count = corpus.len();

    if query.trim().is_empty() {
        let _ = events.send(SearchEvent::Complete(SearchResults {
            search_id,
            query: query.to_string(),
            matching_ids: Vec::new(),
            match_bitmap: vec![0; count],
            total_matches: 0,
        }));
        return;
    }

    let needle = query.to_lowercase();
    let mut bitmap = vec![0u8; count];
    let mut total_matches = 0usize;

    let _ = events.send(SearchEvent::Progress {
        search_id,
        progress: 5,
    });

    let mut start = 0;
    while start < count {
        if cancelled() {
            let _ = events.send(SearchEvent::Cancelled { search_id });
            return;
        }
        let end = (start + CHUNK_SIZE).min(count);
        for (j, message) in corpus.iter().enumerate().take(end).skip(start) {
            if message.content.to_lowercase().contains(&needle)
                || message.sender.to_lowercase().contains(&needle)
            {
                bitmap[j] = 1;
                total_matches += 1;
            }
        }
        let progress = ((end as f64 / count as f64) * 70.0).round() as u8 + 5;
        let _ = events.send(SearchEvent::Progress {
            search_id,
            progress,
        });
        start = end;
    }

    if cancelled() {
        let _ = events.send(SearchEvent::Cancelled { search_id });
        return;
    }

    let _ = events.send(SearchEvent::Progress {
        search_id,
        progress: 80,
    });

    // Audio transcripts can match messages whose text didn't.
    for (msg_id, transcript) in transcripts {
        if let Some(&idx) = id_to_index.get(msg_id) {
            if bitmap[idx] == 0 && transcript.to_lowercase().contains(&needle) {
                bitmap[idx] = 1;
                total_matches += 1;
            }
        }
    }

    if cancelled() {
        let _ = events.send(SearchEvent::Cancelled { search_id });
        return;
    }

    let mut matching_ids = Vec::new();
    for (i, message) in corpus.iter().enumerate() {
        if matching_ids.len() >= MAX_NAV_RESULTS {
            break;
        }
        if bitmap[i] == 1 {
            matching_ids.push(message.id.clone());
        }
    }

    debug!(search_id, total_matches, "search complete");
    let _ = events.send(SearchEvent::Complete(SearchResults {
        search_id,
        query: query.to_string(),
        matching_ids,
        match_bitmap: bitmap,
        total_matches,
    }));
}
