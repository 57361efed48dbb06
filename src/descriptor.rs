//! Descriptor sidecar (".desc"): a JSON-like text file written by the
//! acquisition scheduler next to each ".bin" capture. The format is
//! relaxed JSON: python boolean literals ("True"/"False", any case)
//! appear in the wild and are rewritten before parsing, and lines
//! starting with '#' are treated as comments.
use crate::{epoch::LocalEpoch, error::ParsingError};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

lazy_static! {
    static ref TRUE_RE: Regex = Regex::new(r"(?i)\bTrue\b").unwrap();
    static ref FALSE_RE: Regex = Regex::new(r"(?i)\bFalse\b").unwrap();
}

/// Receiver settings at acquisition time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AcquisitionParameters {
    /// On board averaging length
    pub average_points: u32,
    pub kurtosis_lower_bound_12ghz: f64,
    pub kurtosis_upper_bound_12ghz: f64,
    pub kurtosis_lower_bound_23ghz: f64,
    pub kurtosis_upper_bound_23ghz: f64,
    /// Common attenuator \[dB\]
    pub attenuator_common: f64,
    /// 1-2 GHz sub-band attenuator \[dB\]
    pub attenuator_12ghz: f64,
    /// 2-3 GHz sub-band attenuator \[dB\]
    pub attenuator_23ghz: f64,
    /// Manual polarization selector
    pub polarization: u32,
    /// Noise generator state
    pub noise_generator: u32,
    /// Automatic polarization switching enabled
    pub auto_polarization_switch: u32,
}

/*
 * Wire representation: datetimes come in as strings, converted
 * after json decoding.
 */
#[derive(Debug, Deserialize)]
struct RawDescriptor {
    object: String,
    azimuth: f64,
    culmination: String,
    #[serde(default)]
    start_time: Option<String>,
    feed_offset: f64,
    feed_offset_time: f64,
    #[serde(default)]
    record_duration_rlc: Option<[f64; 2]>,
    pulse1_rlc: [f64; 2],
    pulse2_rlc: [f64; 2],
    #[serde(default)]
    acquisition_parameters: AcquisitionParameters,
}

/// Decoded descriptor sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Observed object ("sun")
    pub object: String,
    /// Telescope azimuth setting \[deg\]
    pub azimuth: f64,
    /// Scheduled culmination, local time with UTC offset
    pub culmination: LocalEpoch,
    /// Scheduler registration start, when recorded
    pub start_time: Option<LocalEpoch>,
    /// Feed horn offset \[cm\]
    pub feed_offset: f64,
    /// Feed horn offset expressed in time \[s\]
    pub feed_offset_time: f64,
    /// Registration span relative to culmination \[s, s\]
    pub record_duration_rlc: Option<[f64; 2]>,
    /// First calibration pulse, rise and fall \[s\] relative to culmination
    pub pulse1_rlc: [f64; 2],
    /// Second calibration pulse, rise and fall \[s\] relative to culmination
    pub pulse2_rlc: [f64; 2],
    /// Receiver settings
    pub acquisition_parameters: AcquisitionParameters,
}

impl Descriptor {
    /// Parses descriptor content (relaxed JSON).
    pub fn from_str(content: &str) -> Result<Self, ParsingError> {
        let cleaned: String = content
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .collect::<Vec<_>>()
            .join("\n");
        let cleaned = TRUE_RE.replace_all(&cleaned, "true");
        let cleaned = FALSE_RE.replace_all(&cleaned, "false");

        let raw: RawDescriptor = serde_json::from_str(&cleaned)?;
        Ok(Self {
            culmination: LocalEpoch::from_iso8601(&raw.culmination)?,
            start_time: match raw.start_time {
                Some(s) => Some(LocalEpoch::from_iso8601(&s)?),
                None => None,
            },
            object: raw.object,
            azimuth: raw.azimuth,
            feed_offset: raw.feed_offset,
            feed_offset_time: raw.feed_offset_time,
            record_duration_rlc: raw.record_duration_rlc,
            pulse1_rlc: raw.pulse1_rlc,
            pulse2_rlc: raw.pulse2_rlc,
            acquisition_parameters: raw.acquisition_parameters,
        })
    }

    /// Reads the descriptor sidecar from `path`.
    pub fn from_file(path: &Path) -> Result<Self, ParsingError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ParsingError::MissingDescriptor(path.display().to_string()))?;
        Self::from_str(&content)
    }

    /// Descriptor path associated to a capture file:
    /// same base name, ".desc" extension (".bin.gz" drops both suffixes).
    pub fn sidecar_path(bin_path: &Path) -> std::path::PathBuf {
        let mut path = bin_path.to_path_buf();
        if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false)
        {
            path.set_extension("");
        }
        path.set_extension("desc");
        path
    }
}
