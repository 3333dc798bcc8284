#![doc(html_root_url = "https://docs.rs/remuxio/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # remuxio - Media Download & Remux Toolkit
//!
//! `remuxio` downloads or repackages a media input (file, network stream,
//! or live stream) into a different output container without re-encoding
//! payload data. Compressed packets from up to two independently-progressing
//! sources (video and audio) are merged into one globally time-ordered
//! sequence, their timestamps are rebased into the destination container's
//! timebase, and the result is written through a pluggable container muxer.
//!
//! ## What it does
//!
//! - **Dual-source interleaving**: two asynchronously-filled packet queues
//!   are merged by normalized timestamp, one packet at a time, with a
//!   bounded wait whenever a still-live source runs dry.
//! - **Timestamp rebasing**: each stream is anchored at its first decode
//!   timestamp so every output stream starts at zero, rescaled between
//!   timebases without precision loss.
//! - **Container lifecycle**: header, interleaved packet writes and trailer
//!   are serialized through one writer; on failure or cancel a best-effort
//!   trailer write keeps the partial output structurally valid.
//!
//! It does not transcode, does not correct audio/video drift beyond a
//! bounded buffering safeguard, and does not seek during a run.
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! remuxio = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use remuxio::{Downloader, MuxerRegistry};
//! use std::sync::Arc;
//!
//! # async fn example(video: Arc<dyn remuxio::Source>, audio: Arc<dyn remuxio::Source>,
//! #                  registry: MuxerRegistry) -> remuxio::Result<()> {
//! let mut downloader = Downloader::new(registry);
//! downloader.attach_video(video);
//! downloader.attach_audio(audio);
//!
//! downloader.open("https://example.com/stream.m3u8").await?;
//! let completion = downloader.download("movie", true).await?;
//!
//! if completion.wait().await {
//!     println!("done: {:?}", downloader.progress());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: packet, timebase and stream-descriptor types
//! - `source`: the packet-producing collaborator contract and its queue
//! - `mux`: the container muxer trait and extension-based selection
//! - `remux`: stream mapping, timestamp rebasing, container write lifecycle
//! - `download`: the run-state machine, progress tracking and the
//!   interleaver worker
//! - `error`: error types and utilities

/// Audio/Video base types: packets, timebases, stream descriptors
pub mod av;

/// The download pipeline: state machine, progress and the interleaver
pub mod download;

/// Error types and utilities
pub mod error;

/// Container muxer trait and registry
pub mod mux;

/// Stream mapping, timestamp rebasing and the container writer
pub mod remux;

/// Source collaborator contract and packet queues
pub mod source;

pub use av::{Packet, Rational, StreamDescriptor, StreamKind};
pub use download::{Completion, Downloader, DownloaderConfig, Progress, RunState};
pub use error::{RemuxError, Result};
pub use mux::{ContainerMuxer, MuxerRegistry, OutputStream};
pub use remux::ContainerWriter;
pub use source::{PacketQueue, Source, SourceSlot, SourceStatus};
