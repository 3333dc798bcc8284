use crate::av::{Packet, Rational, StreamDescriptor};
use crate::error::{RemuxError, Result};
use crate::mux::{ContainerMuxer, MuxerRegistry};
use crate::remux::{StreamMapper, TimestampRebaser};
use crate::source::SourceSlot;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Owns the output container context and its write lifecycle: header,
/// interleaved packets, trailer.
///
/// The writer is exclusive to one worker; all sink access is serialized
/// through it and at most one write is in flight at any time. A single
/// failed packet write is logged and counted but does not abort the run;
/// only an unusable sink (an I/O-level failure) escalates to a failed
/// completion at the end of the run.
pub struct ContainerWriter {
    path: PathBuf,
    muxer: Option<Box<dyn ContainerMuxer>>,
    mapper: StreamMapper,
    rebaser: TimestampRebaser,
    input_time_bases: HashMap<(SourceSlot, usize), Rational>,
    header_written: bool,
    trailer_written: bool,
    disposed: bool,
    write_failures: u64,
    sink_unusable: bool,
}

impl ContainerWriter {
    /// Selects a container muxer for `path` by extension and prepares an
    /// empty stream mapping. Fails with [`RemuxError::Open`] when no
    /// registered format matches.
    pub fn open(path: impl Into<PathBuf>, registry: &MuxerRegistry) -> Result<Self> {
        let path = path.into();
        let muxer = registry.open(&path)?;
        Ok(Self {
            path,
            muxer: Some(muxer),
            mapper: StreamMapper::new(),
            rebaser: TimestampRebaser::new(),
            input_time_bases: HashMap::new(),
            header_written: false,
            trailer_written: false,
            disposed: false,
            write_failures: 0,
            sink_unusable: false,
        })
    }

    /// Maps one input stream into the output container. Must be called
    /// before [`ContainerWriter::write_header`].
    pub fn add_stream(&mut self, slot: SourceSlot, input: &StreamDescriptor) -> Result<usize> {
        let muxer = self
            .muxer
            .as_ref()
            .ok_or_else(|| RemuxError::Configuration("writer is disposed".into()))?;
        let output_time_base = muxer.output_time_base(input.kind);
        if output_time_base.num <= 0 || output_time_base.den <= 0 {
            return Err(RemuxError::Configuration(format!(
                "muxer reported invalid {} timebase {output_time_base}",
                input.kind
            )));
        }
        let index = self.mapper.add_stream(slot, input, output_time_base)?;
        self.input_time_bases
            .insert((slot, input.index), input.time_base);
        Ok(index)
    }

    /// Whether at least one stream was accepted into the mapping.
    pub fn has_streams(&self) -> bool {
        self.mapper.has_streams()
    }

    /// Whether the container header has been written.
    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Whether the container trailer has been written.
    pub fn trailer_written(&self) -> bool {
        self.trailer_written
    }

    /// Whether the sink failed at the I/O level and further writes are
    /// pointless.
    pub fn sink_unusable(&self) -> bool {
        self.sink_unusable
    }

    /// Number of individual packet writes that failed and were skipped.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Destination path of the output container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the sink and writes the container header. Requires at least
    /// one mapped stream; freezes the mapping on success.
    pub async fn write_header(&mut self) -> Result<()> {
        if !self.mapper.has_streams() {
            return Err(RemuxError::Configuration(
                "no streams have been mapped for the output container".into(),
            ));
        }
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| RemuxError::Configuration("writer is disposed".into()))?;

        muxer.write_header(self.mapper.outputs()).await?;
        self.mapper.freeze();
        self.header_written = true;
        debug!(
            "header written to {} with {} stream(s)",
            self.path.display(),
            self.mapper.outputs().len()
        );
        Ok(())
    }

    /// Writes one packet: rewrites its stream index to the output index,
    /// rebases its timing and hands it to the container's interleaved
    /// writer. The packet is consumed unconditionally; packets of unmapped
    /// streams are discarded.
    ///
    /// A muxer write failure is absorbed here per the error policy; the
    /// returned error covers only lifecycle misuse.
    pub async fn write(&mut self, slot: SourceSlot, mut packet: Packet) -> Result<()> {
        if !self.header_written || self.trailer_written || self.disposed {
            return Err(RemuxError::Configuration(
                "write requires a written header and an open sink".into(),
            ));
        }

        let Some(output_index) = self.mapper.output_index(slot, packet.stream_index) else {
            // Packet of a rejected or unknown stream, discard it.
            debug!(
                "discarding packet of unmapped {slot} stream {}",
                packet.stream_index
            );
            return Ok(());
        };
        let Some(&input_tb) = self.input_time_bases.get(&(slot, packet.stream_index)) else {
            debug!(
                "discarding packet of {slot} stream {} without a recorded timebase",
                packet.stream_index
            );
            return Ok(());
        };
        // Frozen mapping guarantees the output entry exists.
        let output_tb = self
            .mapper
            .output(output_index)
            .map(|o| o.time_base)
            .unwrap_or(input_tb);

        self.rebaser
            .rebase(slot, packet.stream_index, input_tb, output_tb, &mut packet);
        packet.stream_index = output_index;
        packet.position = -1;

        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| RemuxError::Configuration("writer is disposed".into()))?;
        if let Err(err) = muxer.write_packet(packet).await {
            self.write_failures += 1;
            if matches!(err, RemuxError::Io(_)) {
                self.sink_unusable = true;
            }
            warn!("interleaved write failed (failure #{}): {err}", self.write_failures);
        }
        Ok(())
    }

    /// Finalizes container metadata and closes the sink. Fails if the sink
    /// is already closed.
    pub async fn write_trailer(&mut self) -> Result<()> {
        if self.trailer_written || self.disposed {
            return Err(RemuxError::Write("trailer already written".into()));
        }
        if !self.header_written {
            return Err(RemuxError::Configuration(
                "cannot write a trailer before the header".into(),
            ));
        }
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| RemuxError::Configuration("writer is disposed".into()))?;
        muxer.write_trailer().await?;
        self.trailer_written = true;
        Ok(())
    }

    /// Releases the container context without touching the sink. Callers
    /// that want a structurally valid output attempt
    /// [`ContainerWriter::write_trailer`] first. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.muxer = None;
        self.mapper.clear();
        self.rebaser.clear();
        self.input_time_bases.clear();
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{Rational, StreamKind};
    use crate::mux::tests::RecordingMuxer;
    use pretty_assertions::assert_eq;

    fn recording_registry() -> (MuxerRegistry, std::sync::Arc<parking_lot::Mutex<crate::mux::tests::Recording>>) {
        let (muxer, recording) = RecordingMuxer::new();
        let mut registry = MuxerRegistry::new();
        let slot = parking_lot::Mutex::new(Some(muxer));
        registry.register("mp4", move |_| {
            slot.lock()
                .take()
                .map(|m| Box::new(m) as Box<dyn ContainerMuxer>)
                .ok_or_else(|| RemuxError::Open("muxer already taken".into()))
        });
        (registry, recording)
    }

    fn registry_with(muxer: RecordingMuxer) -> MuxerRegistry {
        let mut registry = MuxerRegistry::new();
        let slot = parking_lot::Mutex::new(Some(muxer));
        registry.register("mp4", move |_| {
            slot.lock()
                .take()
                .map(|m| Box::new(m) as Box<dyn ContainerMuxer>)
                .ok_or_else(|| RemuxError::Open("muxer already taken".into()))
        });
        registry
    }

    fn video() -> StreamDescriptor {
        StreamDescriptor::new(0, StreamKind::Video, Rational::MILLISECONDS)
    }

    #[tokio::test]
    async fn header_requires_mapped_streams() {
        let (registry, _) = recording_registry();
        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        assert!(matches!(
            writer.write_header().await,
            Err(RemuxError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn mapping_after_header_fails() {
        let (registry, _) = recording_registry();
        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        let audio = StreamDescriptor::new(1, StreamKind::Audio, Rational::new(1, 48_000));
        assert!(matches!(
            writer.add_stream(SourceSlot::Secondary, &audio),
            Err(RemuxError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn rewrites_index_and_rebases() {
        let (registry, recording) = recording_registry();
        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        writer
            .write(
                SourceSlot::Primary,
                Packet::new(vec![1]).with_dts(10).with_position(4096),
            )
            .await
            .unwrap();
        writer
            .write(SourceSlot::Primary, Packet::new(vec![2]).with_dts(20))
            .await
            .unwrap();

        let rec = recording.lock();
        assert_eq!(rec.packets.len(), 2);
        assert_eq!(rec.packets[0].dts, Some(0));
        assert_eq!(rec.packets[0].position, -1);
        assert_eq!(rec.packets[1].dts, Some(10));
        assert_eq!(rec.packets[1].stream_index, 0);
    }

    #[tokio::test]
    async fn unmapped_packet_is_discarded() {
        let (registry, recording) = recording_registry();
        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        writer
            .write(
                SourceSlot::Primary,
                Packet::new(vec![0]).with_dts(0).with_stream_index(7),
            )
            .await
            .unwrap();
        assert!(recording.lock().packets.is_empty());
    }

    #[tokio::test]
    async fn trailer_twice_fails() {
        let (registry, recording) = recording_registry();
        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        writer.write_trailer().await.unwrap();
        assert!(recording.lock().trailer_written);
        assert!(matches!(
            writer.write_trailer().await,
            Err(RemuxError::Write(_))
        ));
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_releases() {
        let (registry, recording) = recording_registry();
        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        writer.dispose();
        assert!(!recording.lock().trailer_written);
        assert!(matches!(
            writer.write_trailer().await,
            Err(RemuxError::Write(_))
        ));
        // Second dispose has no additional effect and no error.
        writer.dispose();
    }

    #[tokio::test]
    async fn invalid_muxer_timebase_is_rejected() {
        let (muxer, _) = RecordingMuxer::new();
        let registry = registry_with(muxer.with_time_base(Rational::new(0, 1)));

        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        assert!(matches!(
            writer.add_stream(SourceSlot::Primary, &video()),
            Err(RemuxError::Configuration(_))
        ));
        assert!(!writer.has_streams());
    }

    #[tokio::test]
    async fn non_io_write_failure_keeps_sink_usable() {
        let (muxer, recording) = RecordingMuxer::new();
        let registry = registry_with(muxer.with_one_failed_write());

        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        writer
            .write(SourceSlot::Primary, Packet::new(vec![1]).with_dts(0))
            .await
            .unwrap();
        writer
            .write(SourceSlot::Primary, Packet::new(vec![2]).with_dts(40))
            .await
            .unwrap();

        assert_eq!(writer.write_failures(), 1);
        assert!(!writer.sink_unusable());
        // The failed packet is skipped, the next one lands normally.
        let rec = recording.lock();
        assert_eq!(rec.packets.len(), 1);
        assert_eq!(rec.packets[0].dts, Some(40));
    }

    #[tokio::test]
    async fn failed_writes_are_absorbed_and_mark_sink() {
        let (muxer, recording) = RecordingMuxer::new();
        let registry = registry_with(muxer.with_failing_writes());

        let mut writer = ContainerWriter::open("out.mp4", &registry).unwrap();
        writer.add_stream(SourceSlot::Primary, &video()).unwrap();
        writer.write_header().await.unwrap();

        writer
            .write(SourceSlot::Primary, Packet::new(vec![0]).with_dts(0))
            .await
            .unwrap();

        assert_eq!(writer.write_failures(), 1);
        assert!(writer.sink_unusable());
        assert!(recording.lock().packets.is_empty());
    }
}
