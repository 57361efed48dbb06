//! Absolute time axis recovery. The acquisition clock is not
//! disciplined: only two calibration pulses, fired at known offsets
//! around the scheduled culmination, anchor the record to absolute
//! time. Their exact sample positions are recovered from a generator
//! state bit embedded in the telemetry.
use crate::{
    config::Config,
    descriptor::Descriptor,
    epoch::LocalEpoch,
    error::TimingError,
    sun::{SolarEphemeris, SolarPosition},
};

use hifitime::Unit;
use log::debug;
use ndarray::Array2;

/// Exact sample positions of the two calibration pulse edges.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PulseEdges {
    /// Falling edge of the first pulse (before the record midpoint)
    pub low: usize,
    /// Rising edge of the second pulse (at or after the midpoint)
    pub high: usize,
}

/// Scans the generator bit of both polarizations' joined state
/// matrices for the calibration pulse edges.
///
/// Row 0 (the first frequency row) is taken as representative. The
/// time axis is split at its midpoint: the last active bit before the
/// midpoint is the first pulse's falling edge, the first active bit at
/// or after it is the second pulse's rising edge. Across polarizations
/// the pessimistic bound is kept: only the region where both agree a
/// pulse exists is trusted. A polarization without an edge is excluded;
/// if neither polarization shows an edge the search fails.
pub fn locate_pulse_edges(
    states: [&Array2<u32>; 2],
    generator_bit: u32,
) -> Result<PulseEdges, TimingError> {
    let mut lows = Vec::with_capacity(2);
    let mut highs = Vec::with_capacity(2);

    for (pol, state) in states.iter().enumerate() {
        if state.nrows() == 0 || state.ncols() == 0 {
            // an absent polarization contributes no edge
            continue;
        }
        let row = state.row(0);
        let active = |i: usize| (row[i] >> generator_bit) & 1 != 0;
        let mid = row.len() / 2;

        let low = (0..mid).rev().find(|i| active(*i));
        let high = (mid..row.len()).find(|i| active(*i));
        debug!("pol{}: pulse edges low={:?} high={:?}", pol, low, high);

        if let Some(low) = low {
            lows.push(low);
        }
        if let Some(high) = high {
            highs.push(high);
        }
    }

    match (lows.iter().max(), highs.iter().min()) {
        (Some(&low), Some(&high)) => Ok(PulseEdges { low, high }),
        _ => Err(TimingError::PulseEdgeNotFound),
    }
}

/// Complete timing solution of one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSolution {
    pub edges: PulseEdges,
    /// Culmination reference, seconds since sample 0
    pub ref_time_s: f64,
    /// Culmination reference sample
    pub ref_sample: usize,
    /// Scan scale \[arcsec/s\]
    pub arcsec_per_second: f64,
    /// Scan scale \[arcsec/sample\]
    pub arcsec_per_sample: f64,
    /// Registration start
    pub reg_start: LocalEpoch,
    /// Registration stop
    pub reg_stop: LocalEpoch,
    /// Ephemeris predicted culmination (descriptor)
    pub culmination_efrat: LocalEpoch,
    /// Culmination corrected for the feed horn offset
    pub culmination_feed_horn: LocalEpoch,
    /// Solar geometry at culmination
    pub sun: SolarPosition,
    /// Sun altitude at culmination \[deg\]
    pub altitude_deg: f64,
}

/// Derives the absolute time axis and solar geometry from the located
/// pulse edges, the descriptor fields and the ephemeris collaborator.
///
/// The first pulse's falling edge is fired `pulse1_rlc[1]` seconds
/// relative to the scheduled culmination, which anchors the
/// culmination reference sample; registration start and stop follow
/// from the record length.
pub fn derive(
    descriptor: &Descriptor,
    edges: PulseEdges,
    num_samples: usize,
    config: &Config,
    ephemeris: &dyn SolarEphemeris,
) -> Result<TimingSolution, TimingError> {
    let sps = config.adc.samples_per_second();

    let edge_low_s = edges.low as f64 / sps;
    let ref_time_s = edge_low_s - descriptor.pulse1_rlc[1];
    let ref_sample = (ref_time_s * sps).round() as usize;

    let culmination_efrat = descriptor.culmination;
    let culmination_feed_horn =
        culmination_efrat.shift(descriptor.feed_offset_time * Unit::Second);

    let reg_start = culmination_efrat.shift(-ref_time_s * Unit::Second);
    let reg_stop = reg_start.shift((num_samples as f64 / sps) * Unit::Second);

    let sun = ephemeris.solar_position(culmination_efrat.utc)?;
    let arcsec_per_second = ephemeris.drift_rate_arcsec_per_second(
        culmination_efrat.utc,
        config.adc.obs_time_delay * Unit::Second,
    )?;
    let arcsec_per_sample = arcsec_per_second / sps;

    // upper culmination altitude of the disk center
    let altitude_deg = 90.0 - (config.site.latitude_deg - sun.declination_deg).abs();

    debug!(
        "timing: ref_sample={} ref_time={:.3}s arcsec/s={:.4}",
        ref_sample, ref_time_s, arcsec_per_second
    );

    Ok(TimingSolution {
        edges,
        ref_time_s,
        ref_sample,
        arcsec_per_second,
        arcsec_per_sample,
        reg_start,
        reg_stop,
        culmination_efrat,
        culmination_feed_horn,
        sun,
        altitude_deg,
    })
}

/// Time axis: seconds since registration start, one entry per sample.
pub fn time_axis(num_samples: usize, samples_per_second: f64) -> Vec<f64> {
    (0..num_samples)
        .map(|i| i as f64 / samples_per_second)
        .collect()
}

/// Arcsecond axis: position along the solar scan, zero at the
/// culmination reference, descending along the record.
pub fn arcsec_axis(time_s: &[f64], ref_time_s: f64, arcsec_per_second: f64) -> Vec<f64> {
    time_s
        .iter()
        .map(|t| -(t - ref_time_s) * arcsec_per_second)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn state_matrix(len: usize, pulse_samples: &[usize], bit: u32) -> Array2<u32> {
        let mut m = Array2::<u32>::zeros((4, len));
        for &s in pulse_samples {
            m.column_mut(s).fill(1 << bit);
        }
        m
    }

    #[test]
    fn locates_known_pulses() {
        // generator pulses at samples 10 and 240 of a 256 sample record
        let m0 = state_matrix(256, &[10, 240], 20);
        let m1 = state_matrix(256, &[10, 240], 20);
        let edges = locate_pulse_edges([&m0, &m1], 20).unwrap();
        assert_eq!(edges, PulseEdges { low: 10, high: 240 });
    }

    #[test]
    fn pessimistic_bound_across_polarizations() {
        let m0 = state_matrix(256, &[8, 238], 20);
        let m1 = state_matrix(256, &[12, 244], 20);
        let edges = locate_pulse_edges([&m0, &m1], 20).unwrap();
        // trust only where both polarizations agree
        assert_eq!(edges, PulseEdges { low: 12, high: 238 });
    }

    #[test]
    fn single_polarization_contributes() {
        // pol1 shows no pulse at all: pol0 decides alone
        let m0 = state_matrix(256, &[10, 240], 20);
        let m1 = state_matrix(256, &[], 20);
        let edges = locate_pulse_edges([&m0, &m1], 20).unwrap();
        assert_eq!(edges, PulseEdges { low: 10, high: 240 });
    }

    #[test]
    fn fails_without_any_pulse() {
        let m0 = state_matrix(256, &[], 20);
        let m1 = state_matrix(256, &[], 20);
        assert!(matches!(
            locate_pulse_edges([&m0, &m1], 20),
            Err(TimingError::PulseEdgeNotFound)
        ));
    }

    #[test]
    fn wide_pulses_yield_inner_edges() {
        // first pulse spans 5..=20, second spans 230..=250
        let pulse1: Vec<usize> = (5..=20).collect();
        let pulse2: Vec<usize> = (230..=250).collect();
        let all: Vec<usize> = pulse1.iter().chain(pulse2.iter()).copied().collect();
        let m = state_matrix(256, &all, 3);
        let edges = locate_pulse_edges([&m, &m], 3).unwrap();
        assert_eq!(edges, PulseEdges { low: 20, high: 230 });
    }

    #[test]
    fn axes_shapes() {
        let t = time_axis(4, 2.0);
        assert_eq!(t, vec![0.0, 0.5, 1.0, 1.5]);
        let a = arcsec_axis(&t, 1.0, 10.0);
        assert_eq!(a, vec![10.0, 5.0, 0.0, -5.0]);
    }
}
