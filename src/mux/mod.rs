//! Container muxer interface and selection.
//!
//! The on-disk container format is produced by an external muxer
//! implementation; this crate only drives its header/packet/trailer
//! lifecycle. Muxers are selected from a [`MuxerRegistry`] by the output
//! path's extension.

use crate::av::{CodecParameters, Packet, Rational, StreamKind};
use crate::error::{RemuxError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// An output stream as frozen at header-write time: the destination
/// counterpart of one accepted input stream.
#[derive(Debug, Clone)]
pub struct OutputStream {
    /// Index of this stream in the output container.
    pub index: usize,
    /// Kind of the mapped input stream (always audio or video).
    pub kind: StreamKind,
    /// Timebase packet timestamps are expressed in after rebasing.
    pub time_base: Rational,
    /// Codec parameters copied verbatim from the input (codec tag cleared).
    pub codec: CodecParameters,
    /// Filtered metadata (only language tags survive mapping).
    pub metadata: Vec<(String, String)>,
}

/// Common trait for container muxers.
#[async_trait]
pub trait ContainerMuxer: Send {
    /// Timebase this container uses for streams of the given kind. Queried
    /// at mapping time so timestamps can be rebased into it.
    fn output_time_base(&self, kind: StreamKind) -> Rational;

    /// Opens the sink and writes the container header. Stream layout is
    /// frozen once this succeeds.
    async fn write_header(&mut self, streams: &[OutputStream]) -> Result<()>;

    /// Writes one packet through the container's interleaved writer. The
    /// container may reorder packets for on-disk interleaving correctness;
    /// callers must rely only on timestamp correctness, not on emission
    /// order matching disk layout.
    async fn write_packet(&mut self, packet: Packet) -> Result<()>;

    /// Finalizes container metadata (indices, durations) and closes the
    /// sink.
    async fn write_trailer(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn ContainerMuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContainerMuxer")
    }
}

/// Factory producing a muxer for a given destination path.
pub type MuxerFactory = Box<dyn Fn(&Path) -> Result<Box<dyn ContainerMuxer>> + Send + Sync>;

/// Maps destination file extensions to muxer factories.
#[derive(Default)]
pub struct MuxerRegistry {
    factories: HashMap<String, MuxerFactory>,
}

impl MuxerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for the given extension (case-insensitive).
    pub fn register(
        &mut self,
        extension: &str,
        factory: impl Fn(&Path) -> Result<Box<dyn ContainerMuxer>> + Send + Sync + 'static,
    ) {
        self.factories
            .insert(extension.to_ascii_lowercase(), Box::new(factory));
    }

    /// Creates a muxer for the destination path, selected by its extension.
    pub fn open(&self, path: &Path) -> Result<Box<dyn ContainerMuxer>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| {
                RemuxError::Open(format!("no output extension in {}", path.display()))
            })?;

        let factory = self.factories.get(&extension).ok_or_else(|| {
            RemuxError::Open(format!(
                "no container format for extension .{extension} (registered: {})",
                self.extensions().join(", ")
            ))
        })?;

        factory(path)
    }

    /// Extensions with a registered container format.
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.factories.keys().cloned().collect();
        exts.sort();
        exts
    }
}

pub mod tests {
    //! Muxer test doubles shared by unit and integration tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Everything a [`RecordingMuxer`] observed, inspectable after the
    /// muxer itself has been consumed by the writer.
    #[derive(Debug, Default)]
    pub struct Recording {
        /// Streams as frozen at header-write time.
        pub streams: Vec<OutputStream>,
        /// Packets in emission order.
        pub packets: Vec<Packet>,
        /// Whether `write_header` was called.
        pub header_written: bool,
        /// Whether `write_trailer` was called.
        pub trailer_written: bool,
    }

    /// A muxer that records header, packets and trailer for inspection.
    pub struct RecordingMuxer {
        recording: Arc<Mutex<Recording>>,
        time_base: Rational,
        fail_writes: bool,
        fail_once: bool,
    }

    impl RecordingMuxer {
        /// Creates a muxer and a shared handle to its recording.
        pub fn new() -> (Self, Arc<Mutex<Recording>>) {
            let recording = Arc::new(Mutex::new(Recording::default()));
            let muxer = Self {
                recording: recording.clone(),
                time_base: Rational::MILLISECONDS,
                fail_writes: false,
                fail_once: false,
            };
            (muxer, recording)
        }

        /// Overrides the timebase reported for every stream kind.
        pub fn with_time_base(mut self, time_base: Rational) -> Self {
            self.time_base = time_base;
            self
        }

        /// Makes every `write_packet` call fail with an io error, for
        /// exercising the write-failure policy.
        pub fn with_failing_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }

        /// Makes only the first `write_packet` call fail, with a write
        /// error rather than an io error, so the sink stays usable.
        pub fn with_one_failed_write(mut self) -> Self {
            self.fail_once = true;
            self
        }
    }

    #[async_trait]
    impl ContainerMuxer for RecordingMuxer {
        fn output_time_base(&self, _kind: StreamKind) -> Rational {
            self.time_base
        }

        async fn write_header(&mut self, streams: &[OutputStream]) -> Result<()> {
            let mut rec = self.recording.lock();
            rec.streams = streams.to_vec();
            rec.header_written = true;
            Ok(())
        }

        async fn write_packet(&mut self, packet: Packet) -> Result<()> {
            if self.fail_writes {
                return Err(RemuxError::Io(std::io::Error::other("sink unusable")));
            }
            if self.fail_once {
                self.fail_once = false;
                return Err(RemuxError::Write("transient packet write failure".into()));
            }
            self.recording.lock().packets.push(packet);
            Ok(())
        }

        async fn write_trailer(&mut self) -> Result<()> {
            self.recording.lock().trailer_written = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod registry_tests {
    use super::tests::RecordingMuxer;
    use super::*;
    use std::path::PathBuf;

    fn registry() -> MuxerRegistry {
        let mut registry = MuxerRegistry::new();
        registry.register("mp4", |_| Ok(Box::new(RecordingMuxer::new().0)));
        registry.register("MKV", |_| Ok(Box::new(RecordingMuxer::new().0)));
        registry
    }

    #[test]
    fn selects_by_extension_case_insensitive() {
        let registry = registry();
        assert!(registry.open(&PathBuf::from("out.mp4")).is_ok());
        assert!(registry.open(&PathBuf::from("out.MP4")).is_ok());
        assert!(registry.open(&PathBuf::from("out.mkv")).is_ok());
    }

    #[test]
    fn unknown_extension_is_open_error() {
        let registry = registry();
        match registry.open(&PathBuf::from("out.avi")) {
            Err(RemuxError::Open(_)) => {}
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[test]
    fn lists_registered_extensions_sorted() {
        let registry = registry();
        assert_eq!(registry.extensions(), vec!["mkv", "mp4"]);
    }

    #[test]
    fn missing_extension_is_open_error() {
        let registry = registry();
        assert!(matches!(
            registry.open(&PathBuf::from("out")),
            Err(RemuxError::Open(_))
        ));
    }
}
