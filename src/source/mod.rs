//! The source collaborator contract.
//!
//! A [`Source`] produces an ordered queue of compressed packets for one
//! elementary-stream type (one source for video, optionally a second one for
//! audio) and exposes liveness and timing information. Sources run their own
//! producers; this crate only consumes their queues and observes their
//! status.

use crate::av::StreamDescriptor;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

mod queue;
pub use queue::PacketQueue;

/// Which of the two configured sources a packet or stream came from.
///
/// `Primary` is the driving source (video when both are configured),
/// `Secondary` the audio source. On an exact normalized-timestamp tie the
/// secondary source's packet is forwarded first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceSlot {
    /// The driving source.
    Primary,
    /// The audio source of a dual-source run.
    Secondary,
}

impl std::fmt::Display for SourceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSlot::Primary => write!(f, "primary"),
            SourceSlot::Secondary => write!(f, "secondary"),
        }
    }
}

/// Lifecycle status reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Preparing the input.
    Opening,
    /// Actively producing packets.
    Running,
    /// A pause was requested and is taking effect.
    Pausing,
    /// Production is suspended; queued packets remain.
    Paused,
    /// A stop was requested and is taking effect.
    Stopping,
    /// Production stopped before the input's natural end.
    Stopped,
    /// The input's natural end was reached.
    Ended,
}

impl SourceStatus {
    /// Whether the source is still actively producing packets.
    pub fn is_running(&self) -> bool {
        matches!(self, SourceStatus::Running | SourceStatus::Opening)
    }
}

/// A packet producer for one elementary-stream type.
///
/// Implementations are external to this crate (demuxers, network receivers).
/// All time quantities (`duration`, `start_time`, `current_time`,
/// `buffered_duration`) are in nanoseconds; packet timestamps stay in each
/// stream's own timebase.
#[async_trait]
pub trait Source: Send + Sync {
    /// Opens the given url or path and prepares the stream descriptors.
    async fn open(&self, url: &str) -> Result<()>;

    /// Starts producing packets into [`Source::packets`].
    async fn start(&self) -> Result<()>;

    /// Pauses packet production, keeping already queued packets.
    async fn pause(&self);

    /// Stops packet production.
    async fn stop(&self);

    /// Current lifecycle status.
    fn status(&self) -> SourceStatus;

    /// The source's packet FIFO. The interleaver is the only consumer.
    fn packets(&self) -> Arc<PacketQueue>;

    /// Descriptors of the streams this source produces.
    fn streams(&self) -> Vec<StreamDescriptor>;

    /// Total input duration in nanoseconds, 0 when unknown or live.
    fn duration(&self) -> i64;

    /// Whether the input is a live stream without a known end.
    fn is_live(&self) -> bool;

    /// First timestamp of the input in nanoseconds, used to normalize
    /// cross-source comparisons.
    fn start_time(&self) -> i64;

    /// Current read position in nanoseconds.
    fn current_time(&self) -> i64;

    /// Duration of data buffered ahead of the current position, in
    /// nanoseconds.
    fn buffered_duration(&self) -> i64;

    /// Whether the source was stopped by an external interrupt rather than
    /// reaching its natural end.
    fn interrupted(&self) -> bool;

    /// File extension of the source's native container, used to derive the
    /// output extension when the caller did not specify one.
    fn container_extension(&self) -> String;

    /// The source's internal buffering window.
    fn buffering_window(&self) -> Duration;

    /// Adjusts the source's internal buffering window. The downloader
    /// temporarily shrinks the secondary source's window while both sources
    /// are active so an audio backlog cannot grow unboundedly ahead of a
    /// stalled video source.
    fn set_buffering_window(&self, window: Duration);
}
