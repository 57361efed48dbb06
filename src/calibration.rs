//! Quiet sun anchored flux calibration. Raw averaged ADC counts are
//! rescaled to solar flux units by comparing the spectrum at an
//! empirically located quiet sun reference point against a known
//! quiet sun flux table.
use crate::{
    config::{CalibrationParams, Filtration, ValueReplacement},
    error::CalibrationError,
};

use log::debug;
use ndarray::{Array2, Axis};
use std::path::Path;

/// Amplitudes below this raw threshold are treated as gaps while
/// searching for the quiet sun point and interpolated over.
const LOW_AMPLITUDE_THRESHOLD: f32 = 10.0;

/// Reference quiet sun flux density table.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxTable {
    /// Frequency grid \[MHz\], ascending
    pub frequency_mhz: Vec<f64>,
    /// Quiet sun flux \[sfu\] per grid point
    pub flux_sfu: Vec<f64>,
}

impl FluxTable {
    /// Builds a table from (frequency, flux) pairs, sorted by frequency.
    pub fn new(mut entries: Vec<(f64, f64)>) -> Result<Self, CalibrationError> {
        if entries.len() < 2 {
            return Err(CalibrationError::FluxTableTooShort);
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self {
            frequency_mhz: entries.iter().map(|e| e.0).collect(),
            flux_sfu: entries.iter().map(|e| e.1).collect(),
        })
    }

    /// Reads a whitespace separated two column text table,
    /// '#' introduces comments.
    pub fn from_file(path: &Path) -> Result<Self, CalibrationError> {
        let content = std::fs::read_to_string(path)?;
        let mut entries = Vec::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut columns = line.split_whitespace();
            let entry = (|| {
                let freq = columns.next()?.parse::<f64>().ok()?;
                let flux = columns.next()?.parse::<f64>().ok()?;
                Some((freq, flux))
            })();
            match entry {
                Some(entry) => entries.push(entry),
                None => return Err(CalibrationError::FluxTableEntry(line.to_string())),
            }
        }
        Self::new(entries)
    }

    /// Linear interpolation onto `frequencies`, clamped to the
    /// table bounds (no extrapolation).
    pub fn interpolate(&self, frequencies: &[f64]) -> Vec<f64> {
        frequencies
            .iter()
            .map(|f| interp_clamped(*f, &self.frequency_mhz, &self.flux_sfu))
            .collect()
    }
}

fn interp_clamped(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[xp.len() - 1] {
        return fp[fp.len() - 1];
    }
    let i = xp.partition_point(|v| *v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (fp[i - 1], fp[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Calibration products of one observation.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    /// Calibrated matrices, \[freq, time\], one per polarization input
    pub calibrated: [Array2<f32>; 2],
    /// Per frequency coefficients, one set per polarization input
    pub coefficients: [Vec<f64>; 2],
    /// Quiet sun anchor coordinate \[arcsec\]
    pub quiet_sun_point_arcsec: f64,
    /// Physical unit of the calibrated data
    pub unit: String,
}

/// Runs the quiet sun anchored calibration over one polarization pair.
///
/// `pols[0]` drives the quiet sun search (sum over frequency of its
/// gap interpolated scan); both polarizations are then anchored to
/// their own nearest valid scan position and rescaled independently.
pub fn calibrate(
    pols: [&Array2<f32>; 2],
    frequency_mhz: &[f64],
    arcsec: &[f64],
    flux_table: &FluxTable,
    params: &CalibrationParams,
    sentinels: &ValueReplacement,
    filtration: &Filtration,
) -> Result<CalibrationOutcome, CalibrationError> {
    let [first, second] = pols;
    if first.dim() != second.dim() {
        return Err(CalibrationError::ShapeMismatch(first.dim(), second.dim()));
    }

    // working copies: sub-threshold samples become gaps,
    // then rows are gap interpolated
    let originals = [first.clone(), second.clone()];
    let masked: Vec<Array2<f32>> = originals
        .iter()
        .map(|m| m.mapv(|v| if v < LOW_AMPLITUDE_THRESHOLD { f32::NAN } else { v }))
        .collect();
    let interpolated: Vec<Array2<f32>> = masked
        .iter()
        .map(|m| {
            let mut m = m.clone();
            interpolate_rows(&mut m);
            m
        })
        .collect();

    // angular search window
    let window: Vec<usize> = arcsec
        .iter()
        .enumerate()
        .filter(|(_, a)| **a > params.arcsec_min && **a < params.arcsec_max)
        .map(|(i, _)| i)
        .collect();
    // inner quiet sun search window
    let inner: Vec<usize> = window
        .iter()
        .copied()
        .filter(|i| arcsec[*i].abs() <= params.scan_half_width)
        .collect();
    if inner.is_empty() {
        return Err(CalibrationError::EmptySearchWindow);
    }

    // total intensity scan of the driving polarization:
    // its global minimum marks the tentative quiet sun point
    let drive_scan = nansum_columns(&interpolated[0]);
    let suggested = *inner
        .iter()
        .min_by(|a, b| drive_scan[**a].total_cmp(&drive_scan[**b]))
        .unwrap();
    let suggested_arcsec = arcsec[suggested];
    debug!("tentative quiet sun point: {:.1} arcsec", suggested_arcsec);

    // per polarization, scan positions with non degenerate data
    let valid: Vec<Vec<usize>> = masked
        .iter()
        .map(|m| {
            let sums = nansum_columns(m);
            inner
                .iter()
                .copied()
                .filter(|i| sums[*i] != 0.0)
                .collect()
        })
        .collect();

    // reconcile: the overall nearest valid position to the tentative
    // point is authoritative for its polarization, the other is then
    // re-anchored to its own nearest valid position to that coordinate
    let nearest = |candidates: &[usize], target: f64| -> Option<usize> {
        candidates
            .iter()
            .copied()
            .min_by(|a, b| {
                (arcsec[*a] - target)
                    .abs()
                    .total_cmp(&(arcsec[*b] - target).abs())
            })
    };
    let best0 = nearest(&valid[0], suggested_arcsec);
    let best1 = nearest(&valid[1], suggested_arcsec);

    let (anchor0, anchor1) = match (best0, best1) {
        (Some(b0), Some(b1)) => {
            if (arcsec[b0] - suggested_arcsec).abs() <= (arcsec[b1] - suggested_arcsec).abs() {
                // pols[0] wins: re-anchor pols[1] to it
                (b0, nearest(&valid[1], arcsec[b0]).unwrap_or(b1))
            } else {
                (nearest(&valid[0], arcsec[b1]).unwrap_or(b0), b1)
            }
        },
        _ => return Err(CalibrationError::NoQuietSunPoint),
    };
    debug!(
        "anchors: {:.1} / {:.1} arcsec",
        arcsec[anchor0], arcsec[anchor1]
    );

    let reference_flux = flux_table.interpolate(frequency_mhz);

    let mut calibrated = Vec::with_capacity(2);
    let mut coefficients = Vec::with_capacity(2);
    for (pol, anchor) in [(0_usize, anchor0), (1, anchor1)] {
        let matrix = &interpolated[pol];
        let mut coeffs = Vec::with_capacity(matrix.nrows());
        for (row, flux) in matrix.outer_iter().zip(reference_flux.iter()) {
            let amplitude = row[anchor] as f64;
            if amplitude.is_nan() {
                // all-missing row: propagates as missing
                coeffs.push(f64::NAN);
            } else if amplitude <= 0.0 {
                return Err(CalibrationError::IllDefinedCoefficient(
                    frequency_mhz[coeffs.len()],
                ));
            } else {
                coeffs.push(flux / amplitude);
            }
        }

        let mut scaled = matrix.clone();
        for (mut row, coeff) in scaled.outer_iter_mut().zip(coeffs.iter()) {
            row.mapv_inplace(|v| (v as f64 * coeff) as f32);
        }

        // excluded frequency bands are zeroed
        for band in filtration.filter_bands.iter() {
            for (f, mut row) in frequency_mhz.iter().zip(scaled.outer_iter_mut()) {
                if *f >= band[0] && *f <= band[1] {
                    row.fill(0.0);
                }
            }
        }

        // restore the sentinel markers at their original positions,
        // so flux scaled noise never masquerades as data
        for (scaled_v, original_v) in scaled.iter_mut().zip(originals[pol].iter()) {
            if *original_v == sentinels.raw_missing {
                *scaled_v = sentinels.calibrated_missing;
            } else if *original_v == sentinels.raw_kurtosis {
                *scaled_v = sentinels.calibrated_kurtosis;
            }
        }

        calibrated.push(scaled);
        coefficients.push(coeffs);
    }

    let calibrated: [Array2<f32>; 2] = calibrated.try_into().unwrap();
    let coefficients: [Vec<f64>; 2] = coefficients.try_into().unwrap();
    Ok(CalibrationOutcome {
        calibrated,
        coefficients,
        quiet_sun_point_arcsec: suggested_arcsec,
        unit: crate::constants::CALIBRATED_UNIT.to_string(),
    })
}

/// Row wise linear gap interpolation: NaN runs are filled from their
/// same-row neighbors, never across frequency rows. Leading and
/// trailing gaps (and all-gap rows) are left unchanged.
pub fn interpolate_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let known: Vec<usize> = (0..row.len()).filter(|i| !row[*i].is_nan()).collect();
        if known.is_empty() || known.len() == row.len() {
            continue;
        }
        for gap in 0..row.len() {
            if !row[gap].is_nan() {
                continue;
            }
            // neighbors within the row, no extrapolation at the edges
            let after = known.partition_point(|k| *k < gap);
            if after == 0 || after == known.len() {
                continue;
            }
            let (x0, x1) = (known[after - 1], known[after]);
            let (y0, y1) = (row[x0] as f64, row[x1] as f64);
            let t = (gap - x0) as f64 / (x1 - x0) as f64;
            row[gap] = (y0 + (y1 - y0) * t) as f32;
        }
    }
}

/// Column sums, NaN counted as zero.
fn nansum_columns(matrix: &Array2<f32>) -> Vec<f64> {
    let mut sums = vec![0.0_f64; matrix.ncols()];
    for row in matrix.outer_iter() {
        for (sum, v) in sums.iter_mut().zip(row.iter()) {
            if !v.is_nan() {
                *sum += *v as f64;
            }
        }
    }
    sums
}
