//! Spectral matrices: unpacks reconstructed frame streams into
//! (time x frequency) amplitude, kurtosis and generator state
//! matrices, and joins the two sub-bands into one frequency axis.
use crate::{
    constants::{AMPLITUDE_MASK, KURTOSIS_SHIFT},
    demux::FrameStream,
    error::ParsingError,
};

use ndarray::{concatenate, s, Array2, Axis};

/// Unpacked spectra of one (channel, polarization) stream,
/// shaped \[time, frequency_bin\].
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumMatrix {
    /// Spectral amplitudes
    pub amplitude: Array2<f32>,
    /// Per bin statistical quality estimates
    pub kurtosis: Array2<f32>,
    /// Record state, replicated along the frequency axis
    pub state: Array2<u32>,
}

impl SpectrumMatrix {
    /// Number of time samples.
    pub fn num_samples(&self) -> usize {
        self.amplitude.nrows()
    }
    /// Number of frequency bins.
    pub fn spectrum_length(&self) -> usize {
        self.amplitude.ncols()
    }
}

/// Joined spectra of one polarization, shaped \[frequency, time\]:
/// channel 0 frequency-reversed, channel 1 appended, transposed.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedSpectra {
    pub amplitude: Array2<f32>,
    pub kurtosis: Array2<f32>,
    pub state: Array2<u32>,
}

/// Reshapes the flat payload stream of `stream` into a
/// \[time, spectrum_length\] matrix, bit extracting amplitude and
/// kurtosis per element. A frame carries one hardware chunk of bins;
/// several consecutive frames make up one full spectrum.
pub fn unpack_stream(
    stream: &FrameStream,
    spectrum_length: usize,
) -> Result<SpectrumMatrix, ParsingError> {
    let payload_len = stream.frames.first().map(|f| f.payload.len()).unwrap_or(0);
    let flat_len = stream.len() * payload_len;
    if spectrum_length == 0 || flat_len % spectrum_length != 0 {
        return Err(ParsingError::MisalignedSpectrum(flat_len, spectrum_length));
    }
    let rows = flat_len / spectrum_length;

    let mut amplitude = Vec::with_capacity(flat_len);
    let mut kurtosis = Vec::with_capacity(flat_len);
    let mut state = Vec::with_capacity(flat_len);
    for frame in stream.frames.iter() {
        for word in frame.payload.iter() {
            amplitude.push((word & AMPLITUDE_MASK) as f32);
            kurtosis.push((word >> KURTOSIS_SHIFT) as f32);
            state.push(frame.state);
        }
    }

    let shape = (rows, spectrum_length);
    Ok(SpectrumMatrix {
        // infallible: lengths were checked above
        amplitude: Array2::from_shape_vec(shape, amplitude).unwrap(),
        kurtosis: Array2::from_shape_vec(shape, kurtosis).unwrap(),
        state: Array2::from_shape_vec(shape, state).unwrap(),
    })
}

/// Concatenates the two sub-band matrices of one polarization into a
/// single contiguous frequency axis. The low sub-band is recorded in
/// descending frequency order and is flipped first; the result is
/// transposed to \[frequency, time\].
///
/// Both sub-bands must share the time dimension.
pub fn join_subbands(low: &SpectrumMatrix, high: &SpectrumMatrix) -> Result<JoinedSpectra, ParsingError> {
    Ok(JoinedSpectra {
        amplitude: join_matrices(&low.amplitude, &high.amplitude)?,
        kurtosis: join_matrices(&low.kurtosis, &high.kurtosis)?,
        state: join_matrices(&low.state, &high.state)?,
    })
}

/// Joins one \[time, freq\] matrix pair into \[freq, time\].
pub fn join_matrices<T: Copy>(
    low: &Array2<T>,
    high: &Array2<T>,
) -> Result<Array2<T>, ParsingError> {
    if low.nrows() != high.nrows() {
        return Err(ParsingError::SubBandShapeMismatch(low.nrows(), high.nrows()));
    }
    let flipped = low.slice(s![.., ..;-1]);
    let joined = concatenate(Axis(1), &[flipped, high.view()])
        .map_err(|_| ParsingError::SubBandShapeMismatch(low.nrows(), high.nrows()))?;
    Ok(joined.reversed_axes().as_standard_layout().to_owned())
}

/// Splits a joined \[freq, time\] matrix back into its two
/// \[time, freq\] sub-band matrices (inverse of [join_matrices]).
/// `low_len` is the spectrum length of the low sub-band.
pub fn split_joined<T: Copy>(joined: &Array2<T>, low_len: usize) -> (Array2<T>, Array2<T>) {
    let back = joined.t();
    let low = back.slice(s![.., ..low_len; -1]).to_owned();
    let high = back.slice(s![.., low_len..]).to_owned();
    (low, high)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::demux::FrameStream;
    use crate::record::{PackedSample, RawRecord};
    use ndarray::array;

    #[test]
    fn unpacks_amplitude_and_kurtosis() {
        // 4 frames of 4 words, spectrum length 8 -> 2 spectra
        let frames: Vec<RawRecord> = (0..4)
            .map(|i| RawRecord {
                frame_index: i,
                avg_kurtosis: 0,
                state: 0xA0 + i,
                channel: 0,
                payload: (0..4)
                    .map(|j| PackedSample::pack((i * 4 + j) as u64, 7).0)
                    .collect(),
            })
            .collect();
        let stream = FrameStream {
            channel: 0,
            polarization: 0,
            frames,
            present: vec![true; 4],
        };

        let matrix = unpack_stream(&stream, 8).unwrap();
        assert_eq!(matrix.num_samples(), 2);
        assert_eq!(matrix.spectrum_length(), 8);
        assert_eq!(matrix.amplitude[[0, 0]], 0.0);
        assert_eq!(matrix.amplitude[[0, 7]], 7.0);
        assert_eq!(matrix.amplitude[[1, 0]], 8.0);
        assert_eq!(matrix.kurtosis[[1, 3]], 7.0);
        // state replicated from the frame each bin came from
        assert_eq!(matrix.state[[0, 0]], 0xA0);
        assert_eq!(matrix.state[[0, 7]], 0xA1);
        assert_eq!(matrix.state[[1, 0]], 0xA2);
    }

    #[test]
    fn rejects_misaligned_payload() {
        let stream = FrameStream {
            channel: 0,
            polarization: 0,
            frames: vec![RawRecord::gap(5)],
            present: vec![false],
        };
        assert!(matches!(
            unpack_stream(&stream, 8),
            Err(ParsingError::MisalignedSpectrum(5, 8))
        ));
    }

    #[test]
    fn join_reverses_low_subband() {
        let low = array![[1.0_f32, 2.0], [3.0, 4.0]]; // [time=2, freq=2]
        let high = array![[10.0_f32, 20.0], [30.0, 40.0]];
        let joined = join_matrices(&low, &high).unwrap();
        // frequency leading: 4 rows (2 flipped low + 2 high), 2 samples
        assert_eq!(joined.nrows(), 4);
        assert_eq!(joined.ncols(), 2);
        // first frequency row is the *last* low sub-band bin
        assert_eq!(joined[[0, 0]], 2.0);
        assert_eq!(joined[[1, 0]], 1.0);
        assert_eq!(joined[[2, 0]], 10.0);
        assert_eq!(joined[[3, 1]], 40.0);
    }

    #[test]
    fn join_split_roundtrip() {
        let low = array![[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let high = array![[7.0_f32, 8.0], [9.0, 10.0]];
        let joined = join_matrices(&low, &high).unwrap();
        let (low_back, high_back) = split_joined(&joined, 3);
        assert_eq!(low_back, low);
        assert_eq!(high_back, high);

        // and back again: join(split(M)) == M
        let rejoined = join_matrices(&low_back, &high_back).unwrap();
        assert_eq!(rejoined, joined);
    }

    #[test]
    fn join_rejects_shape_mismatch() {
        let low = array![[1.0_f32, 2.0]];
        let high = array![[1.0_f32, 2.0], [3.0, 4.0]];
        assert!(matches!(
            join_matrices(&low, &high),
            Err(ParsingError::SubBandShapeMismatch(1, 2))
        ));
    }
}
