//! Observation metadata: everything the pipeline derives besides the
//! data cube itself. Plain data aggregates, assembled once by the
//! reader and completed by the calibration stage.
use crate::epoch::LocalEpoch;
use crate::sun::SolarPosition;

use serde::Deserialize;

/// Physical polarization of a logical receiver channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarization {
    /// Left hand circular
    Lhcp,
    /// Right hand circular
    Rhcp,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Lhcp => f.write_str("LHCP"),
            Self::Rhcp => f.write_str("RHCP"),
        }
    }
}

impl std::str::FromStr for Polarization {
    type Err = crate::error::ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lhcp" => Ok(Self::Lhcp),
            "rhcp" => Ok(Self::Rhcp),
            _ => Err(crate::error::ParsingError::ConfigValue(format!(
                "unknown polarization \"{}\"",
                s
            ))),
        }
    }
}

/// Assignment of the two logical polarization channels to physical
/// polarizations. The wiring may change between deployments, so the
/// assignment is configuration driven, never hardwired.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelMapping {
    /// Physical polarization recorded on logical channel 0
    pub pol_ch0: Polarization,
    /// Physical polarization recorded on logical channel 1
    pub pol_ch1: Polarization,
}

impl Default for ChannelMapping {
    fn default() -> Self {
        Self {
            pol_ch0: Polarization::Lhcp,
            pol_ch1: Polarization::Rhcp,
        }
    }
}

impl ChannelMapping {
    /// Physical polarization of logical channel `id` (0 or 1).
    pub fn polarization(&self, id: usize) -> Polarization {
        if id == 0 {
            self.pol_ch0
        } else {
            self.pol_ch1
        }
    }
    /// Logical channel carrying physical polarization `pol`.
    pub fn channel(&self, pol: Polarization) -> usize {
        if self.pol_ch0 == pol {
            0
        } else {
            1
        }
    }
}

/// Coordinate axes of the reconstructed data cube.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoordinateAxes {
    /// Frequency of each spectral row \[MHz\], ascending.
    pub frequency_mhz: Vec<f64>,
    /// Time of each sample since registration start \[s\].
    pub time_s: Vec<f64>,
    /// Position along the solar scan \[arcsec\], zero at the
    /// culmination reference sample, descending along the record.
    pub arcsec: Vec<f64>,
}

/// Receiver attenuator settings, from the descriptor sidecar \[dB\].
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Attenuators {
    pub common: f64,
    pub band_12ghz: f64,
    pub band_23ghz: f64,
}

/// Hardware kurtosis acceptance interval, per sub-band.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct KurtosisBounds {
    pub lower_12ghz: f64,
    pub upper_12ghz: f64,
    pub lower_23ghz: f64,
    pub upper_23ghz: f64,
}

impl KurtosisBounds {
    /// Half width of the acceptance interval, serialized to the
    /// output header. Both sub-bands share it in practice.
    pub fn half_width(&self) -> f64 {
        self.upper_12ghz
    }
}

/// Flux calibration products, recorded for persistence once the
/// calibration stage ran.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationInfo {
    /// Quiet sun anchor coordinate \[arcsec\]
    pub quiet_sun_point_arcsec: f64,
    /// Physical unit of the calibrated data
    pub unit: String,
    /// Per frequency coefficients applied to logical channel 0
    pub coefficients_pol_ch0: Vec<f64>,
    /// Per frequency coefficients applied to logical channel 1
    pub coefficients_pol_ch1: Vec<f64>,
}

/// Everything known about one observation besides the samples.
/// Immutable after construction, except for the calibration stage
/// completing `calibration`/`is_calibrated`/`unit`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMetadata {
    /// Observed object, from the descriptor ("sun")
    pub object: String,
    /// Telescope azimuth setting \[deg\]
    pub azimuth: f64,
    /// Sun altitude at culmination \[deg\]
    pub altitude_deg: f64,

    /// Registration start
    pub reg_start: LocalEpoch,
    /// Registration stop
    pub reg_stop: LocalEpoch,
    /// Culmination predicted by the ephemeris service
    pub culmination_efrat: LocalEpoch,
    /// Culmination corrected for the feed horn offset
    pub culmination_feed_horn: LocalEpoch,

    /// Feed horn offset \[cm\]
    pub feed_offset_cm: f64,
    /// Feed horn offset expressed in time \[s\]
    pub feed_offset_time_s: f64,

    /// Solar geometry at culmination
    pub sun: SolarPosition,

    /// Logical channel to polarization assignment
    pub mapping: ChannelMapping,
    /// Cube coordinate axes
    pub axes: CoordinateAxes,

    /// Number of time samples
    pub num_samples: usize,
    /// Number of frequency rows
    pub num_frequencies: usize,

    /// Culmination reference, seconds since registration start
    pub ref_time_s: f64,
    /// Culmination reference sample index
    pub ref_sample: usize,

    /// Scan scale \[arcsec/s\]
    pub arcsec_per_second: f64,
    /// Scan scale \[arcsec/sample\]
    pub arcsec_per_sample: f64,

    /// Sampling time resolution \[s\]
    pub time_resolution_s: f64,
    /// Actual (polarization switched) time resolution \[s\]
    pub switch_time_resolution_s: f64,
    /// Frequency resolution \[MHz\]
    pub frequency_resolution_mhz: f64,

    /// Attenuator settings
    pub attenuators: Attenuators,
    /// Kurtosis acceptance interval
    pub kurtosis_bounds: KurtosisBounds,

    /// Unit of the data cube
    pub unit: String,
    /// Set once flux calibration ran
    pub is_calibrated: bool,
    /// Calibration products, present once flux calibration ran
    pub calibration: Option<CalibrationInfo>,

    /// Data quality flag. The pipeline itself aborts on invariant
    /// violations; this flag is persisted for operator tooling that
    /// inspects partially recovered observations.
    pub is_bad: bool,

    /// Capture file this observation was read from, when known.
    pub source_file: Option<std::path::PathBuf>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_mapping_lookup() {
        let mapping = ChannelMapping::default();
        assert_eq!(mapping.polarization(0), Polarization::Lhcp);
        assert_eq!(mapping.polarization(1), Polarization::Rhcp);
        assert_eq!(mapping.channel(Polarization::Lhcp), 0);
        assert_eq!(mapping.channel(Polarization::Rhcp), 1);

        let swapped = ChannelMapping {
            pol_ch0: Polarization::Rhcp,
            pol_ch1: Polarization::Lhcp,
        };
        assert_eq!(swapped.channel(Polarization::Lhcp), 1);
        assert_eq!(swapped.polarization(0), Polarization::Rhcp);
    }

    #[test]
    fn polarization_parsing() {
        use std::str::FromStr;
        assert_eq!(Polarization::from_str("lhcp").unwrap(), Polarization::Lhcp);
        assert_eq!(Polarization::from_str("RHCP").unwrap(), Polarization::Rhcp);
        assert!(Polarization::from_str("linear").is_err());
        assert_eq!(format!("{}", Polarization::Lhcp), "LHCP");
    }
}
