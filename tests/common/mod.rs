#![allow(dead_code)]
//! Shared toolkit: a synthetic capture mimicking one short solar scan
//! of the fast acquisition receiver, with polarization switching,
//! calibration pulses, a handful of defects, and the matching
//! descriptor and configuration.
use fastacq::config::Config;
use fastacq::descriptor::Descriptor;
use fastacq::prelude::*;
use fastacq::TimingError;

use hifitime::Epoch;

/// Frames per channel in the synthetic capture. Long enough that the
/// quiet sun search window sits fully inside valid scan data.
pub const NUM_FRAMES: u32 = 384;
/// Payload words per record; matches the spectrum length so one
/// frame maps to exactly one time sample.
pub const PAYLOAD_LEN: usize = 512;
/// Polarization selector block length, frames.
pub const BLOCK: u32 = 16;
/// Polarization selector bit.
pub const POL_MASK: u32 = 1 << 19;
/// Calibration generator bit.
pub const GENERATOR_BIT: u32 = 20;

/// First pulse active over these frames (polarization 0 blocks).
pub const PULSE1: std::ops::RangeInclusive<u32> = 8..=12;
/// Second pulse active over these frames (polarization 1 blocks).
pub const PULSE2: std::ops::RangeInclusive<u32> = 240..=244;

/// Frame whose payload carries explicit zero amplitudes.
pub const ZERO_AMPLITUDE_FRAME: u32 = 33;
/// Frame carrying a low kurtosis estimate on `LOW_KURTOSIS_BIN`.
pub const LOW_KURTOSIS_FRAME: u32 = 100;
pub const LOW_KURTOSIS_BIN: usize = 3;
/// Frame where the whole spectrum dips to half amplitude: the
/// quiet sun point of the synthetic scan.
pub const DIP_FRAME: u32 = 200;

/// Ephemeris stub with fixed solar geometry and drift rate.
pub struct FixedSun;

impl SolarEphemeris for FixedSun {
    fn solar_position(&self, _t: Epoch) -> Result<SolarPosition, TimingError> {
        Ok(SolarPosition {
            right_ascension_deg: 73.9,
            declination_deg: 22.6,
            apparent_radius_arcsec: 945.8,
            position_angle_deg: -13.7,
            b0_angle_deg: -0.1,
            distance_au: 1.014,
        })
    }

    fn drift_rate_arcsec_per_second(
        &self,
        _t: Epoch,
        _window: Duration,
    ) -> Result<f64, TimingError> {
        Ok(15.0)
    }
}

/// Test configuration: unit sampling rate (one sample per second,
/// so sample indices read directly as seconds), 512 word payloads.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.adc.clock = 1.0;
    config.adc.factor1 = 1.0;
    config.adc.factor2 = 1.0;
    config.adc.kurt_threshold = 100.0;
    config.adc.generator_bit = GENERATOR_BIT;
    config.bin_data.chunk_length = 128;
    config.bin_data.polarization_mask = POL_MASK;
    for field in config.bin_data.fields.iter_mut() {
        if field.name == "data" {
            field.count = PAYLOAD_LEN;
        }
    }
    config
}

pub fn flux_table() -> FluxTable {
    FluxTable::new(vec![(1000.0, 100.0), (3000.0, 300.0)]).unwrap()
}

pub fn descriptor() -> Descriptor {
    Descriptor::from_str(
        r#"{
            "feed_offset": 43,
            "record_duration_rlc": [-205, 205],
            "pulse1_rlc": [-200, -195],
            "pulse2_rlc": [195, 200],
            "acquisition_parameters": {
                "average_points": 32,
                "kurtosis_lower_bound_12ghz": -20,
                "kurtosis_upper_bound_12ghz": 20,
                "kurtosis_lower_bound_23ghz": -20,
                "kurtosis_upper_bound_23ghz": 20,
                "attenuator_12ghz": 0,
                "attenuator_23ghz": 0,
                "attenuator_common": -20,
                "polarization": 0,
                "noise_generator": 0,
                "auto_polarization_switch": 1
            },
            "azimuth": 0,
            "object": "sun",
            "culmination": "2024-06-05T12:12:12.890000+03:00",
            "feed_offset_time": 44.208052,
            "start_time": "2024-06-05T12:08:32.098052+03:00"
        }"#,
    )
    .unwrap()
}

/// Polarization selector of frame `f`: blocks of [BLOCK] frames
/// alternate between the two polarizations.
pub fn polarization_of(f: u32) -> u32 {
    (f / BLOCK) % 2
}

/// Builds the synthetic record stream: both channels, alternating
/// polarization blocks, generator pulses around the scheduled
/// offsets, a zero amplitude frame, a low kurtosis bin and a half
/// amplitude dip marking the quiet sun point.
pub fn build_records() -> Vec<RawRecord> {
    let mut records = Vec::new();
    for channel in 0..2_u32 {
        for f in 0..NUM_FRAMES {
            let mut state = 0_u32;
            if polarization_of(f) == 1 {
                state |= POL_MASK;
            }
            if PULSE1.contains(&f) || PULSE2.contains(&f) {
                state |= 1 << GENERATOR_BIT;
            }

            let payload: Vec<u64> = (0..PAYLOAD_LEN)
                .map(|bin| {
                    let mut amplitude = 1000 + bin as u64;
                    if f == ZERO_AMPLITUDE_FRAME {
                        amplitude = 0;
                    } else if f == DIP_FRAME {
                        amplitude /= 2;
                    }
                    let kurtosis = if channel == 0
                        && f == LOW_KURTOSIS_FRAME
                        && bin == LOW_KURTOSIS_BIN
                    {
                        5
                    } else {
                        200
                    };
                    PackedSample::pack(amplitude, kurtosis).0
                })
                .collect();

            records.push(RawRecord {
                frame_index: f,
                avg_kurtosis: 4, // 8192 >> 4 = 512 bins
                state,
                channel,
                payload,
            });
        }
    }
    records
}

/// The fully reconstructed (uncalibrated) observation.
pub fn build_observation() -> Observation {
    Observation::from_records(build_records(), &descriptor(), &test_config(), &FixedSun)
        .expect("reconstruction of the synthetic capture failed")
}
