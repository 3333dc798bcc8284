//! The download pipeline: run-state machine, progress tracking and the
//! dual-source interleaver that drives the container writer.

mod downloader;
mod progress;
mod state;

pub use downloader::{Completion, Downloader, DownloaderConfig};
pub use progress::{Progress, ProgressTracker};
pub use state::{RunState, SharedState};
