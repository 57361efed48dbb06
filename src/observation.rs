//! One observation: metadata, the two joined polarization matrices,
//! and (until dropped) the raw per channel intermediates needed for
//! re-processing. Pipeline stages consume and return the observation,
//! so ownership replaces the defensive deep copying of older designs:
//! `Observation::from_file(..)?.remove_spikes(..)?.calibrate(..)?`.
use crate::{
    calibration::{self, FluxTable},
    cleaning,
    config::Config,
    constants::RAW_UNIT,
    demux::{self, ChannelStreams},
    descriptor::Descriptor,
    error::{CalibrationError, Error, ParsingError},
    metadata::{
        Attenuators, CalibrationInfo, CoordinateAxes, KurtosisBounds, ObservationMetadata,
        Polarization,
    },
    record::{self, RawRecord},
    reader::BufferedReader,
    spectra::{self, JoinedSpectra, SpectrumMatrix},
    timing,
};

use log::debug;
use ndarray::Array2;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Frame offset of the polarization switch transient bleed through.
pub const SPIKE_SHIFT: isize = -4;

/// The two joined polarization matrices, \[frequency, time\] each,
/// indexed by logical channel. Physical polarization access goes
/// through the channel mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarizationData {
    /// Logical channel 0
    pub pol_channel0: Array2<f32>,
    /// Logical channel 1
    pub pol_channel1: Array2<f32>,
}

impl PolarizationData {
    /// Matrix of logical channel `id`.
    pub fn channel(&self, id: usize) -> &Array2<f32> {
        if id == 0 {
            &self.pol_channel0
        } else {
            &self.pol_channel1
        }
    }
}

/// Pre-join per channel intermediates, kept for pulse edge recovery
/// and the kurtosis substitution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAcquisition {
    pub c0p0: SpectrumMatrix,
    pub c0p1: SpectrumMatrix,
    pub c1p0: SpectrumMatrix,
    pub c1p1: SpectrumMatrix,
}

/// A complete fast acquisition observation.
#[derive(Debug, Clone)]
pub struct Observation {
    pub metadata: ObservationMetadata,
    pub data: PolarizationData,
    /// Raw intermediates; `None` once deliberately dropped to shed memory
    pub raw: Option<RawAcquisition>,
}

impl Observation {
    /// Parses a ".bin" or ".bin.gz" capture and its ".desc" sidecar,
    /// reconstructs the joined polarization matrices and derives the
    /// timing metadata. Any decoding, descriptor or timing failure
    /// aborts the observation.
    pub fn from_file(
        path: &Path,
        config: &Config,
        ephemeris: &dyn crate::sun::SolarEphemeris,
    ) -> Result<Self, Error> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !name.ends_with(".bin") && !name.ends_with(".bin.gz") {
            return Err(ParsingError::UnsupportedFileExtension(name).into());
        }

        let mut buffer = Vec::new();
        BufferedReader::open(path)
            .and_then(|mut reader| reader.read_to_end(&mut buffer))
            .map_err(ParsingError::IoError)?;

        let schema = config.bin_data.schema()?;
        let records = record::decode_records(&buffer, &schema)?;
        debug!("{}: {} records decoded", name, records.len());

        let descriptor = Descriptor::from_file(&Descriptor::sidecar_path(path))?;

        let mut observation = Self::from_records(records, &descriptor, config, ephemeris)?;
        observation.metadata.source_file = Some(path.to_path_buf());
        Ok(observation)
    }

    /// Builds the observation from an already decoded record stream.
    /// This is the whole reconstruction pipeline: demultiplex, spike
    /// rejection, unpacking, missing value substitution, sub-band
    /// joining and timing recovery.
    pub fn from_records(
        records: Vec<RawRecord>,
        descriptor: &Descriptor,
        config: &Config,
        ephemeris: &dyn crate::sun::SolarEphemeris,
    ) -> Result<Self, Error> {
        let spectrum_length = record::spectrum_length(&records, config.adc.fft_size)?;
        let payload_len = config.bin_data.schema()?.payload_len();

        let ChannelStreams {
            mut c0p0,
            mut c0p1,
            mut c1p0,
            mut c1p1,
        } = demux::demultiplex(records, &config.bin_data, payload_len)?;

        // polarization switch transients, per channel. A channel with
        // one polarization entirely absent is left untouched.
        for (a, b) in [(&mut c0p0, &mut c0p1), (&mut c1p0, &mut c1p1)] {
            let common = a.len().min(b.len());
            if common > 0 {
                a.truncate(common);
                b.truncate(common);
                demux::remove_polarization_spikes(a, b, SPIKE_SHIFT);
            }
        }

        let unpack = |stream: &demux::FrameStream| spectra::unpack_stream(stream, spectrum_length);
        let mut c0p0 = unpack(&c0p0)?;
        let mut c0p1 = unpack(&c0p1)?;
        let mut c1p0 = unpack(&c1p0)?;
        let mut c1p1 = unpack(&c1p1)?;

        // missing value pass, before joining
        for matrix in [&mut c0p0, &mut c0p1, &mut c1p0, &mut c1p1] {
            cleaning::replace_missing(&mut matrix.amplitude, config.value_replacement.raw_missing);
        }

        let joined0 = spectra::join_subbands(&c0p0, &c1p0)?;
        let joined1 = spectra::join_subbands(&c0p1, &c1p1)?;

        let edges =
            timing::locate_pulse_edges([&joined0.state, &joined1.state], config.adc.generator_bit)?;

        let num_samples = joined0.amplitude.ncols();
        let solution = timing::derive(descriptor, edges, num_samples, config, ephemeris)?;

        let metadata = Self::build_metadata(descriptor, &solution, &joined0, config);

        Ok(Self {
            metadata,
            data: PolarizationData {
                pol_channel0: joined0.amplitude,
                pol_channel1: joined1.amplitude,
            },
            raw: Some(RawAcquisition {
                c0p0,
                c0p1,
                c1p0,
                c1p1,
            }),
        })
    }

    fn build_metadata(
        descriptor: &Descriptor,
        solution: &timing::TimingSolution,
        joined: &JoinedSpectra,
        config: &Config,
    ) -> ObservationMetadata {
        let num_frequencies = joined.amplitude.nrows();
        let num_samples = joined.amplitude.ncols();
        let sps = config.adc.samples_per_second();

        let frequency_mhz = linspace(config.adc.freq_min, config.adc.freq_max, num_frequencies);
        let frequency_resolution_mhz = if num_frequencies > 1 {
            (config.adc.freq_max - config.adc.freq_min) / (num_frequencies - 1) as f64
        } else {
            0.0
        };
        let time_s = timing::time_axis(num_samples, sps);
        let arcsec = timing::arcsec_axis(&time_s, solution.ref_time_s, solution.arcsec_per_second);

        let acq = &descriptor.acquisition_parameters;
        ObservationMetadata {
            object: descriptor.object.clone(),
            azimuth: descriptor.azimuth,
            altitude_deg: solution.altitude_deg,
            reg_start: solution.reg_start,
            reg_stop: solution.reg_stop,
            culmination_efrat: solution.culmination_efrat,
            culmination_feed_horn: solution.culmination_feed_horn,
            feed_offset_cm: descriptor.feed_offset,
            feed_offset_time_s: descriptor.feed_offset_time,
            sun: solution.sun,
            mapping: config.channels,
            axes: CoordinateAxes {
                frequency_mhz,
                time_s,
                arcsec,
            },
            num_samples,
            num_frequencies,
            ref_time_s: solution.ref_time_s,
            ref_sample: solution.ref_sample,
            arcsec_per_second: solution.arcsec_per_second,
            arcsec_per_sample: solution.arcsec_per_sample,
            time_resolution_s: 1.0 / sps,
            switch_time_resolution_s: 1.0 / config.adc.switch_polarization_frequency,
            frequency_resolution_mhz,
            attenuators: Attenuators {
                common: acq.attenuator_common,
                band_12ghz: acq.attenuator_12ghz,
                band_23ghz: acq.attenuator_23ghz,
            },
            kurtosis_bounds: KurtosisBounds {
                lower_12ghz: acq.kurtosis_lower_bound_12ghz,
                upper_12ghz: acq.kurtosis_upper_bound_12ghz,
                lower_23ghz: acq.kurtosis_lower_bound_23ghz,
                upper_23ghz: acq.kurtosis_upper_bound_23ghz,
            },
            unit: RAW_UNIT.to_string(),
            is_calibrated: false,
            calibration: None,
            is_bad: false,
            source_file: None,
        }
    }

    /// Kurtosis substitution pass: samples flagged as statistically
    /// invalid by the hardware estimator are replaced by the kurtosis
    /// sentinel on the raw per channel matrices, and the polarization
    /// matrices are rebuilt from them. Requires the raw intermediates.
    pub fn remove_spikes(mut self, config: &Config) -> Result<Self, Error> {
        let raw = self
            .raw
            .as_mut()
            .ok_or(CalibrationError::RawDataUnavailable)?;

        for matrix in [&mut raw.c0p0, &mut raw.c0p1, &mut raw.c1p0, &mut raw.c1p1] {
            cleaning::flag_low_kurtosis(
                &mut matrix.amplitude,
                &matrix.kurtosis,
                config.adc.kurt_threshold,
                config.value_replacement.raw_missing,
                config.value_replacement.raw_kurtosis,
            );
        }

        self.data.pol_channel0 = spectra::join_matrices(&raw.c0p0.amplitude, &raw.c1p0.amplitude)?;
        self.data.pol_channel1 = spectra::join_matrices(&raw.c0p1.amplitude, &raw.c1p1.amplitude)?;
        Ok(self)
    }

    /// Flux calibration against `flux_table`, anchored at the quiet
    /// sun point. Physical polarizations are resolved through the
    /// channel mapping; coefficients are recorded per logical channel.
    pub fn calibrate(mut self, config: &Config, flux_table: &FluxTable) -> Result<Self, Error> {
        let lhcp_channel = self.metadata.mapping.channel(Polarization::Lhcp);
        let rhcp_channel = 1 - lhcp_channel;

        let outcome = calibration::calibrate(
            [
                self.data.channel(lhcp_channel),
                self.data.channel(rhcp_channel),
            ],
            &self.metadata.axes.frequency_mhz,
            &self.metadata.axes.arcsec,
            flux_table,
            &config.calibration,
            &config.value_replacement,
            &config.filtration,
        )?;

        let [lhcp, rhcp] = outcome.calibrated;
        let [coeff_lhcp, coeff_rhcp] = outcome.coefficients;
        let (ch0, ch1, coeff0, coeff1) = if lhcp_channel == 0 {
            (lhcp, rhcp, coeff_lhcp, coeff_rhcp)
        } else {
            (rhcp, lhcp, coeff_rhcp, coeff_lhcp)
        };

        self.data.pol_channel0 = ch0;
        self.data.pol_channel1 = ch1;
        self.metadata.is_calibrated = true;
        self.metadata.unit = outcome.unit.clone();
        self.metadata.calibration = Some(CalibrationInfo {
            quiet_sun_point_arcsec: outcome.quiet_sun_point_arcsec,
            unit: outcome.unit,
            coefficients_pol_ch0: coeff0,
            coefficients_pol_ch1: coeff1,
        });
        Ok(self)
    }

    /// Matrix of physical polarization `pol`, through the mapping.
    pub fn polarization(&self, pol: Polarization) -> &Array2<f32> {
        self.data.channel(self.metadata.mapping.channel(pol))
    }

    /// Drops the raw intermediates to shed memory once no further
    /// re-processing is needed.
    pub fn drop_raw(mut self) -> Self {
        self.raw = None;
        self
    }

    /// Serializes to the FITS container at `path` (".fits" or ".fits.gz").
    pub fn to_fits_file(&self, path: &Path, overwrite: bool) -> Result<(), Error> {
        crate::production::to_fits_file(self, path, overwrite)?;
        Ok(())
    }

    /// Conventional output location under `root`:
    /// `<root>/<year>/<month>/<source base name>.fits`, dated by the
    /// Efrat culmination.
    pub fn output_fits_path(&self, root: &Path) -> PathBuf {
        let (year, month, _, _, _, _, _) = self.metadata.culmination_efrat.utc.to_gregorian_utc();
        let base = self
            .metadata
            .source_file
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy())
            .map(|n| n.split('.').next().unwrap_or("observation").to_string())
            .unwrap_or_else(|| "observation".to_string());
        root.join(format!("{:04}", year))
            .join(format!("{:02}", month))
            .join(format!("{}.fits", base))
    }
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (stop - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn linspace_endpoints() {
        let axis = linspace(1000.0, 3000.0, 5);
        assert_eq!(axis, vec![1000.0, 1500.0, 2000.0, 2500.0, 3000.0]);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(linspace(1.0, 2.0, 0).is_empty());
    }
}
