//! Stream reconstruction: partitions the decoded record stream into
//! the four (channel, polarization) sub-streams, rebuilds each as a
//! dense chunk aligned frame array and nulls polarization switch
//! transients.
use crate::{config::RecordLayout, error::ParsingError, record::RawRecord};

use log::{debug, warn};
use num_integer::div_ceil;

/// One reconstructed (channel, polarization) frame stream.
/// `frames` is dense: every index in `0..frames.len()` is populated,
/// gaps are zero filled. A zero filled gap is indistinguishable from
/// a genuine all zero frame by value; `present` keeps the distinction
/// for stages that want it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStream {
    /// Sub-band id, 0 or 1
    pub channel: u32,
    /// Polarization sub-stream id, 0 or 1
    pub polarization: u32,
    /// Dense frame array, length is a multiple of the chunk length
    pub frames: Vec<RawRecord>,
    /// Frame index observation bitmap, parallel to `frames`
    pub present: Vec<bool>,
}

impl FrameStream {
    /// Truncates to `len` frames, keeping alignment concerns to the caller.
    pub fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
        self.present.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// The four reconstructed sub-streams of one capture.
#[derive(Debug, Clone)]
pub struct ChannelStreams {
    pub c0p0: FrameStream,
    pub c0p1: FrameStream,
    pub c1p0: FrameStream,
    pub c1p1: FrameStream,
}

/// Splits the record stream per channel and polarization, then
/// reconstructs each sub-stream as a dense frame array:
/// the stream length is the max observed frame index rounded up to
/// the chunk length, records beyond it are discarded as trailing
/// garbage, unobserved indices are left as zero filled gaps.
pub fn demultiplex(
    records: Vec<RawRecord>,
    layout: &RecordLayout,
    payload_len: usize,
) -> Result<ChannelStreams, ParsingError> {
    let mut partitions: [Vec<RawRecord>; 4] = Default::default();
    for record in records {
        if record.channel > 1 {
            return Err(ParsingError::UnknownChannel(record.channel));
        }
        let pol = u32::from((record.state & layout.polarization_mask) != 0);
        partitions[(record.channel * 2 + pol) as usize].push(record);
    }

    let [c0p0, c0p1, c1p0, c1p1] = partitions;
    Ok(ChannelStreams {
        c0p0: reconstruct(c0p0, 0, 0, layout.chunk_length, payload_len),
        c0p1: reconstruct(c0p1, 0, 1, layout.chunk_length, payload_len),
        c1p0: reconstruct(c1p0, 1, 0, layout.chunk_length, payload_len),
        c1p1: reconstruct(c1p1, 1, 1, layout.chunk_length, payload_len),
    })
}

fn reconstruct(
    records: Vec<RawRecord>,
    channel: u32,
    polarization: u32,
    chunk_length: u32,
    payload_len: usize,
) -> FrameStream {
    let max_index = records.iter().map(|r| r.frame_index).max().unwrap_or(0);

    let aligned_len = if records.is_empty() {
        0
    } else {
        div_ceil(max_index as usize + 1, chunk_length as usize) * chunk_length as usize
    };

    let mut frames = vec![RawRecord::gap(payload_len); aligned_len];
    let mut present = vec![false; aligned_len];
    let mut discarded = 0_usize;

    for record in records {
        let index = record.frame_index as usize;
        if index >= aligned_len {
            // trailing garbage beyond the chunk aligned length
            discarded += 1;
            continue;
        }
        present[index] = true;
        frames[index] = record;
    }

    if discarded > 0 {
        warn!(
            "c{}p{}: discarded {} trailing record(s)",
            channel, polarization, discarded
        );
    }
    debug!(
        "c{}p{}: {} frames reconstructed ({} observed)",
        channel,
        polarization,
        aligned_len,
        present.iter().filter(|p| **p).count()
    );

    FrameStream {
        channel,
        polarization,
        frames,
        present,
    }
}

/// Nulls samples contaminated by polarization switch transients.
///
/// A frame presence transition in one polarization predicts bleed
/// through in the other, offset by a fixed number of frames: each
/// polarization's presence mask (approximated by `frame_index > 0`)
/// is circularly shifted by `shift` and the *other* polarization is
/// zeroed wherever the shifted mask is set.
///
/// Both streams must have been trimmed to a common length.
pub fn remove_polarization_spikes(a: &mut FrameStream, b: &mut FrameStream, shift: isize) {
    let len = a.len();
    assert_eq!(len, b.len(), "spike rejection requires equal stream lengths");
    if len == 0 {
        return;
    }

    let rolled = |frames: &[RawRecord]| -> Vec<bool> {
        (0..len)
            .map(|i| {
                let src = (i as isize - shift).rem_euclid(len as isize) as usize;
                frames[src].frame_index > 0
            })
            .collect()
    };

    let mask_a = rolled(&a.frames);
    let mask_b = rolled(&b.frames);

    let payload_len = a.frames.first().map(|f| f.payload.len()).unwrap_or(0);
    for (frame, flagged) in a.frames.iter_mut().zip(mask_b.iter()) {
        if *flagged {
            *frame = RawRecord::gap(payload_len);
        }
    }
    let payload_len = b.frames.first().map(|f| f.payload.len()).unwrap_or(0);
    for (frame, flagged) in b.frames.iter_mut().zip(mask_a.iter()) {
        if *flagged {
            *frame = RawRecord::gap(payload_len);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::RawRecord;

    fn record(channel: u32, state: u32, frame_index: u32, fill: u64) -> RawRecord {
        RawRecord {
            frame_index,
            avg_kurtosis: 4,
            state,
            channel,
            payload: vec![fill; 8],
        }
    }

    const POL_MASK: u32 = 0x0008_0000;

    fn layout() -> RecordLayout {
        RecordLayout {
            chunk_length: 16,
            polarization_mask: POL_MASK,
            ..Default::default()
        }
    }

    #[test]
    fn partitions_and_aligns() {
        let records = vec![
            record(0, 0, 0, 1),
            record(0, 0, 5, 2),
            record(0, POL_MASK, 3, 3),
            record(1, 0, 17, 4),
            record(1, POL_MASK, 2, 5),
        ];
        let streams = demultiplex(records, &layout(), 8).unwrap();

        // chunk aligned: 0..=5 observed -> 16 frames
        assert_eq!(streams.c0p0.len(), 16);
        assert_eq!(streams.c0p1.len(), 16);
        // 17 observed -> two chunks
        assert_eq!(streams.c1p0.len(), 32);
        assert_eq!(streams.c1p1.len(), 16);

        for stream in [&streams.c0p0, &streams.c0p1, &streams.c1p0, &streams.c1p1] {
            assert_eq!(stream.len() % 16, 0, "alignment invariant");
        }

        // scatter: observed frames land at their index
        assert_eq!(streams.c0p0.frames[5].payload[0], 2);
        assert!(streams.c0p0.present[5]);
        // gaps are zero filled and absent
        assert_eq!(streams.c0p0.frames[4].payload[0], 0);
        assert!(!streams.c0p0.present[4]);
        assert_eq!(streams.c1p0.frames[17].payload[0], 4);
    }

    #[test]
    fn alignment_covers_max_index() {
        for max in [0_u32, 1, 15, 16, 17, 31] {
            let records = vec![record(0, 0, max, 1)];
            let streams = demultiplex(records, &layout(), 8).unwrap();
            assert!(streams.c0p0.len() >= max as usize + 1);
            assert_eq!(streams.c0p0.len() % 16, 0);
        }
    }

    #[test]
    fn empty_capture_yields_empty_streams() {
        let streams = demultiplex(vec![], &layout(), 8).unwrap();
        assert!(streams.c0p0.is_empty());
        assert!(streams.c1p1.is_empty());
    }

    #[test]
    fn rejects_unknown_channel() {
        let records = vec![record(2, 0, 0, 1)];
        assert!(matches!(
            demultiplex(records, &layout(), 8),
            Err(ParsingError::UnknownChannel(2))
        ));
    }

    #[test]
    fn spike_rejection_zeroes_other_polarization() {
        let len = 16_usize;
        let mut a = FrameStream {
            channel: 0,
            polarization: 0,
            frames: (0..len).map(|i| record(0, 0, i as u32, 10)).collect(),
            present: vec![true; len],
        };
        // b present only at frame 8
        let mut b = FrameStream {
            channel: 0,
            polarization: 1,
            frames: (0..len)
                .map(|i| {
                    if i == 8 {
                        record(0, POL_MASK, 8, 20)
                    } else {
                        RawRecord::gap(8)
                    }
                })
                .collect(),
            present: (0..len).map(|i| i == 8).collect(),
        };

        remove_polarization_spikes(&mut a, &mut b, -4);

        // b's lone presence at 8, rolled by -4, nulls a at 4
        assert_eq!(a.frames[4].payload[0], 0);
        assert_eq!(a.frames[4].frame_index, 0);
        // other a frames survive
        assert_eq!(a.frames[5].payload[0], 10);
        // a is present everywhere except frame 0 (frame_index 0 counts
        // as absent), so its rolled mask clears b at source frame 0 only,
        // i.e. index 12, which already was a gap: b keeps no samples
        let b_survivors: Vec<usize> = b
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.payload[0] != 0)
            .map(|(i, _)| i)
            .collect();
        assert!(b_survivors.is_empty());
    }
}
