use bytes::Bytes;

/// One compressed elementary-stream frame.
///
/// Packets are single-owner: a source queue owns a packet until it is
/// dequeued, after which ownership moves to the consumer. The container
/// writer consumes packets by value; any path that dequeues a packet and
/// does not forward it simply drops it.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Compressed payload.
    pub data: Bytes,
    /// Presentation timestamp in stream timebase ticks. `None` means unset.
    pub pts: Option<i64>,
    /// Decode timestamp in stream timebase ticks. `None` means unset.
    pub dts: Option<i64>,
    /// Duration in stream timebase ticks. Zero when unknown.
    pub duration: i64,
    /// Index of the stream this packet belongs to.
    pub stream_index: usize,
    /// Byte position in the source, -1 when unknown.
    pub position: i64,
    /// Whether this packet starts a keyframe.
    pub is_key: bool,
}

impl Packet {
    /// Creates a packet with unset timestamps on stream 0.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pts: None,
            dts: None,
            duration: 0,
            stream_index: 0,
            position: -1,
            is_key: false,
        }
    }

    /// Sets the presentation timestamp.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Sets the decode timestamp.
    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the stream index.
    pub fn with_stream_index(mut self, index: usize) -> Self {
        self.stream_index = index;
        self
    }

    /// Sets the byte position in the source.
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    /// Sets the keyframe flag.
    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }
}
