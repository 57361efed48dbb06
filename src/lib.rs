#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * fastacq: RATAN-600 fast acquisition receiver (1-3 GHz) toolbox.
 * Parses raw binary telemetry, reconstructs the calibrated
 * time / frequency / polarization data cube and serializes it
 * to a self describing FITS container.
 */

pub mod calibration;
pub mod cleaning;
pub mod config;
pub mod demux;
pub mod descriptor;
pub mod epoch;
pub mod metadata;
pub mod observation;
pub mod production;
pub mod record;
pub mod spectra;
pub mod sun;
pub mod timing;

mod constants;
mod error;
mod reader;
mod writer;

pub use constants::{AMPLITUDE_MASK, HARDWARE_FFT_SIZE, KURTOSIS_SHIFT};
pub use error::{CalibrationError, Error, FormattingError, ParsingError, TimingError};

pub mod prelude {
    pub use crate::calibration::FluxTable;
    pub use crate::config::Config;
    pub use crate::descriptor::Descriptor;
    pub use crate::epoch::LocalEpoch;
    pub use crate::error::Error;
    pub use crate::metadata::{ChannelMapping, ObservationMetadata, Polarization};
    pub use crate::observation::Observation;
    pub use crate::record::{PackedSample, RawRecord, RecordSchema};
    pub use crate::sun::{AnalyticSunEphemeris, SolarEphemeris, SolarPosition};
    // pub re-export
    pub use hifitime::{Duration, Epoch, TimeScale};
}
