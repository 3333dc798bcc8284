use crate::error::Result;
use bytes::Bytes;

mod packet;
pub mod rational;

pub use packet::Packet;
pub use rational::{rescale_opt, rescale_rnd, to_nanos, Rational};

/// Category of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Compressed video frames.
    Video,
    /// Compressed audio frames.
    Audio,
    /// Subtitle data.
    Subtitle,
    /// Anything else (timed metadata, attachments).
    Data,
}

impl StreamKind {
    /// Only audio and video streams are eligible for remuxing; everything
    /// else is rejected at mapping time.
    pub fn is_remuxable(&self) -> bool {
        matches!(self, StreamKind::Video | StreamKind::Audio)
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Subtitle => write!(f, "subtitle"),
            StreamKind::Data => write!(f, "data"),
        }
    }
}

/// Codec parameters of an elementary stream, copied verbatim between
/// containers (remuxing never transforms them).
#[derive(Debug, Clone, Default)]
pub struct CodecParameters {
    /// Codec identifier, e.g. "h264" or "aac".
    pub codec_id: String,
    /// Container-specific codec tag. Cleared during mapping so the
    /// destination container assigns its own.
    pub codec_tag: u32,
    /// Codec-specific extra data (SPS/PPS, AudioSpecificConfig, ...).
    pub extradata: Bytes,
    /// Average bitrate in bits per second, zero when unknown.
    pub bit_rate: i64,
    /// Video width in pixels, zero for non-video.
    pub width: u32,
    /// Video height in pixels, zero for non-video.
    pub height: u32,
    /// Audio sample rate in Hz, zero for non-audio.
    pub sample_rate: u32,
    /// Audio channel count, zero for non-audio.
    pub channels: u16,
}

/// Description of an input elementary stream as exposed by a source.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Stream index within its source.
    pub index: usize,
    /// Category of the stream.
    pub kind: StreamKind,
    /// Timebase of this stream's packet timestamps.
    pub time_base: Rational,
    /// Codec parameters of the stream.
    pub codec: CodecParameters,
    /// Stream metadata as key/value pairs.
    pub metadata: Vec<(String, String)>,
}

impl StreamDescriptor {
    /// Creates a descriptor with default codec parameters and no metadata.
    pub fn new(index: usize, kind: StreamKind, time_base: Rational) -> Self {
        Self {
            index,
            kind,
            time_base,
            codec: CodecParameters::default(),
            metadata: Vec::new(),
        }
    }

    /// Sets the codec parameters.
    pub fn with_codec(mut self, codec: CodecParameters) -> Self {
        self.codec = codec;
        self
    }

    /// Appends one metadata key/value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

impl StreamDescriptor {
    /// Checks internal consistency, returning a configuration error on
    /// invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.time_base.den <= 0 || self.time_base.num <= 0 {
            return Err(crate::error::RemuxError::Configuration(format!(
                "stream {} has invalid timebase {}",
                self.index, self.time_base
            )));
        }
        Ok(())
    }
}
