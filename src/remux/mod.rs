//! Stream mapping, timestamp rebasing and the container write lifecycle.
//!
//! [`StreamMapper`] pairs each accepted input stream with a new output
//! stream, [`TimestampRebaser`] moves packet timing into the output
//! timebase anchored at zero, and [`ContainerWriter`] drives the selected
//! container muxer through header, interleaved packets and trailer.

mod mapper;
mod rebase;
mod writer;

pub use mapper::StreamMapper;
pub use rebase::TimestampRebaser;
pub use writer::ContainerWriter;
