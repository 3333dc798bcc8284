use crate::av::{rescale_opt, rescale_rnd, Packet, Rational};
use crate::source::SourceSlot;
use std::collections::HashMap;

/// Rebases packet timing from input to output timebase, anchored per
/// stream.
///
/// The first valid dts seen on a stream becomes that stream's anchor; every
/// later timestamp on the same stream is shifted by it before rescaling, so
/// each output stream starts at time zero independently. Anchors are never
/// shared across streams: inter-stream skew present in the source is neither
/// removed nor amplified here.
#[derive(Debug, Default)]
pub struct TimestampRebaser {
    anchors: HashMap<(SourceSlot, usize), i64>,
}

impl TimestampRebaser {
    /// Creates a rebaser with no anchors recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites `packet`'s pts, dts and duration from `input` to `output`
    /// timebase.
    ///
    /// A packet with unset dts gets only its pts rescaled, without anchor
    /// subtraction, and its dts stays unset. Duration is rescaled without
    /// anchor adjustment.
    pub fn rebase(
        &mut self,
        slot: SourceSlot,
        input_index: usize,
        input: Rational,
        output: Rational,
        packet: &mut Packet,
    ) {
        if let Some(dts) = packet.dts {
            let anchor = *self.anchors.entry((slot, input_index)).or_insert(dts);
            packet.dts = Some(rescale_rnd(dts - anchor, input, output));
            packet.pts = rescale_opt(packet.pts.map(|pts| pts - anchor), input, output);
        } else {
            packet.pts = rescale_opt(packet.pts, input, output);
        }
        packet.duration = rescale_rnd(packet.duration, input, output);
    }

    /// Forgets all anchors.
    pub fn clear(&mut self) {
        self.anchors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    const MS: Rational = Rational::new(1, 1000);

    fn rebase_all(dts: &[i64], input: Rational, output: Rational) -> Vec<i64> {
        let mut rebaser = TimestampRebaser::new();
        dts.iter()
            .map(|&d| {
                let mut p = Packet::new(vec![]).with_dts(d);
                rebaser.rebase(SourceSlot::Primary, 0, input, output, &mut p);
                p.dts.unwrap()
            })
            .collect()
    }

    #[test]
    fn anchors_first_dts_at_zero() {
        // timebase 1/1000s, input dts [10, 20, 30], anchor = 10
        assert_eq!(rebase_all(&[10, 20, 30], MS, MS), vec![0, 10, 20]);
    }

    #[test]
    fn anchor_is_per_stream() {
        let mut rebaser = TimestampRebaser::new();

        let mut a = Packet::new(vec![]).with_dts(100).with_stream_index(0);
        let mut b = Packet::new(vec![]).with_dts(500).with_stream_index(1);
        rebaser.rebase(SourceSlot::Primary, 0, MS, MS, &mut a);
        rebaser.rebase(SourceSlot::Primary, 1, MS, MS, &mut b);

        assert_eq!(a.dts, Some(0));
        assert_eq!(b.dts, Some(0));

        // Same input index on the other slot anchors independently too.
        let mut c = Packet::new(vec![]).with_dts(900).with_stream_index(0);
        rebaser.rebase(SourceSlot::Secondary, 0, MS, MS, &mut c);
        assert_eq!(c.dts, Some(0));
    }

    #[test]
    fn pts_follows_dts_anchor() {
        let mut rebaser = TimestampRebaser::new();
        let mut first = Packet::new(vec![]).with_dts(10).with_pts(12);
        let mut second = Packet::new(vec![]).with_dts(20).with_pts(24);
        rebaser.rebase(SourceSlot::Primary, 0, MS, MS, &mut first);
        rebaser.rebase(SourceSlot::Primary, 0, MS, MS, &mut second);

        assert_eq!((first.dts, first.pts), (Some(0), Some(2)));
        assert_eq!((second.dts, second.pts), (Some(10), Some(14)));
    }

    #[test]
    fn unset_dts_rescales_pts_without_anchor() {
        let mut rebaser = TimestampRebaser::new();

        // Establish an anchor on the stream first.
        let mut anchored = Packet::new(vec![]).with_dts(1000);
        rebaser.rebase(SourceSlot::Primary, 0, MS, Rational::new(1, 90_000), &mut anchored);

        let mut floating = Packet::new(vec![]).with_pts(2000);
        rebaser.rebase(SourceSlot::Primary, 0, MS, Rational::new(1, 90_000), &mut floating);

        assert_eq!(floating.dts, None);
        // No anchor subtraction on the unset-dts path.
        assert_eq!(floating.pts, Some(180_000));
    }

    #[test]
    fn duration_rescaled_without_anchor() {
        let mut rebaser = TimestampRebaser::new();
        let mut p = Packet::new(vec![]).with_dts(1000).with_duration(40);
        rebaser.rebase(SourceSlot::Primary, 0, MS, Rational::new(1, 90_000), &mut p);
        assert_eq!(p.duration, 3600);
    }

    #[quickcheck]
    fn monotone_input_stays_monotone(mut dts: Vec<i32>) -> bool {
        dts.sort_unstable();
        let dts: Vec<i64> = dts.into_iter().map(i64::from).collect();
        let out = rebase_all(&dts, MS, Rational::new(1, 90_000));
        out.windows(2).all(|w| w[0] <= w[1])
    }
}
