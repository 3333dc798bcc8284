use crate::av::{Rational, StreamDescriptor};
use crate::error::{RemuxError, Result};
use crate::mux::OutputStream;
use crate::source::SourceSlot;
use std::collections::HashMap;

/// Establishes the 1:1 mapping from accepted input streams to output
/// streams.
///
/// Only audio and video streams are accepted; everything else is rejected
/// with a non-fatal [`RemuxError::StreamRejected`]. Codec parameters are
/// copied verbatim apart from the container-specific codec tag, which is
/// cleared so the destination container assigns its own. Of the input
/// metadata only language tags survive; other entries tend to be
/// container-specific or stale and are dropped.
///
/// Streams are keyed by `(source slot, input index)` so two sources with
/// overlapping stream indices cannot collide. The mapping freezes when the
/// container header is written; any later `add_stream` is a configuration
/// error and leaves the frozen mapping untouched.
#[derive(Debug, Default)]
pub struct StreamMapper {
    outputs: Vec<OutputStream>,
    map: HashMap<(SourceSlot, usize), usize>,
    frozen: bool,
}

impl StreamMapper {
    /// Creates an empty, unfrozen mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps one input stream to a new output stream, returning the output
    /// index.
    pub fn add_stream(
        &mut self,
        slot: SourceSlot,
        input: &StreamDescriptor,
        output_time_base: Rational,
    ) -> Result<usize> {
        if self.frozen {
            return Err(RemuxError::Configuration(format!(
                "cannot map {slot} stream {} after the header was written",
                input.index
            )));
        }
        if !input.kind.is_remuxable() {
            return Err(RemuxError::StreamRejected(format!(
                "{slot} stream {} has kind {}, only audio and video are accepted",
                input.index, input.kind
            )));
        }
        input.validate()?;

        let mut codec = input.codec.clone();
        codec.codec_tag = 0;

        let metadata = input
            .metadata
            .iter()
            .filter(|(key, _)| {
                key.eq_ignore_ascii_case("language") || key.eq_ignore_ascii_case("lang")
            })
            .cloned()
            .collect();

        let index = self.outputs.len();
        self.outputs.push(OutputStream {
            index,
            kind: input.kind,
            time_base: output_time_base,
            codec,
            metadata,
        });
        self.map.insert((slot, input.index), index);
        Ok(index)
    }

    /// Freezes the mapping. Called once the container header is written.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the mapping has been frozen by a header write.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Whether at least one stream was accepted.
    pub fn has_streams(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Output index of a mapped input stream, `None` if it was rejected or
    /// never offered.
    pub fn output_index(&self, slot: SourceSlot, input_index: usize) -> Option<usize> {
        self.map.get(&(slot, input_index)).copied()
    }

    /// All output streams in mapping order.
    pub fn outputs(&self) -> &[OutputStream] {
        &self.outputs
    }

    /// The output stream at `index`, if mapped.
    pub fn output(&self, index: usize) -> Option<&OutputStream> {
        self.outputs.get(index)
    }

    /// Drops all mappings, e.g. on writer teardown.
    pub fn clear(&mut self) {
        self.outputs.clear();
        self.map.clear();
        self.frozen = false;
    }
}
