//! Progress reporting for archive ingestion.
//!
//! Ingestion reports three coarse stages, each with a 0-100 value. The
//! values are advisory only and never used for control flow.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zapview::progress::{ParseProgress, ParseStage, ProgressCallback};
//!
//! let callback: ProgressCallback = Arc::new(|p| {
//!     println!("{}: {:.0}%", p.stage, p.progress);
//! });
//!
//! callback(ParseProgress::new(ParseStage::Parsing, 50.0));
//! ```

use std::sync::Arc;

/// Coarse ingestion stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// Opening the ZIP container.
    Extracting,
    /// Enumerating and classifying archive entries.
    Enumerating,
    /// Parsing the chat transcript and linking media.
    Parsing,
}

impl std::fmt::Display for ParseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseStage::Extracting => write!(f, "extracting"),
            ParseStage::Enumerating => write!(f, "enumerating"),
            ParseStage::Parsing => write!(f, "parsing"),
        }
    }
}

/// One progress update: a stage and a 0-100 value within it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseProgress {
    /// Current ingestion stage.
    pub stage: ParseStage,
    /// Progress within the stage, 0.0 - 100.0.
    pub progress: f64,
}

impl ParseProgress {
    /// Creates a progress update, clamping the value to 0-100.
    pub fn new(stage: ParseStage, progress: f64) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 100.0),
        }
    }
}

/// Thread-safe callback receiving [`ParseProgress`] updates.
pub type ProgressCallback = Arc<dyn Fn(ParseProgress) + Send + Sync>;

/// Creates a no-op progress callback for callers that don't need updates.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}
