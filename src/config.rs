//! Acquisition configuration. One explicit [Config] value is built at
//! startup (from a TOML file or from defaults) and passed by reference
//! into each pipeline stage: there is no global configuration state.
use crate::{
    error::ParsingError,
    metadata::ChannelMapping,
    record::{Endianness, FieldKind, FieldSpec, RecordSchema},
};

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// One field of the `[bin_data]` record layout table.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaField {
    pub name: String,
    /// "u32"/"u64", numpy style "<u4"/"<u8" also accepted
    pub kind: String,
    /// Element count, 1 when omitted
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

/// Binary stream layout parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordLayout {
    /// Ethernet frame payload granularity: reconstructed stream
    /// lengths are rounded up to a multiple of this.
    pub chunk_length: u32,
    /// State bit selecting the polarization sub-stream.
    pub polarization_mask: u32,
    /// "little" or "big"
    pub byte_order: String,
    /// Record fields, in wire order.
    pub fields: Vec<SchemaField>,
}

impl Default for RecordLayout {
    fn default() -> Self {
        let schema = RecordSchema::default();
        Self {
            chunk_length: 0x80,
            polarization_mask: 0x0008_0000,
            byte_order: "little".to_string(),
            fields: schema
                .fields
                .iter()
                .map(|f| SchemaField {
                    name: f.name.clone(),
                    kind: match f.kind {
                        FieldKind::U32 => "u32".to_string(),
                        FieldKind::U64 => "u64".to_string(),
                    },
                    count: f.count,
                })
                .collect(),
        }
    }
}

impl RecordLayout {
    /// Builds the decoder schema from the configured field table.
    pub fn schema(&self) -> Result<RecordSchema, ParsingError> {
        let byte_order = match self.byte_order.to_lowercase().as_str() {
            "little" | "le" | "<" => Endianness::Little,
            "big" | "be" | ">" => Endianness::Big,
            other => {
                return Err(ParsingError::ConfigValue(format!(
                    "unknown byte order \"{}\"",
                    other
                )))
            },
        };
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            fields.push(FieldSpec {
                name: field.name.clone(),
                kind: FieldKind::from_str(&field.kind)?,
                count: field.count,
            });
        }
        let schema = RecordSchema { byte_order, fields };
        schema.validate()?;
        Ok(schema)
    }
}

/// ADC and receiver timing parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdcParams {
    /// ADC clock \[Hz\]
    pub clock: f64,
    /// First decimation factor
    pub factor1: f64,
    /// Second decimation factor
    pub factor2: f64,
    /// Hardware FFT size, prior to on board averaging
    pub fft_size: u32,
    /// Samples below or at this kurtosis estimate are flagged
    pub kurt_threshold: f32,
    /// State bit driven by the calibration pulse generator
    pub generator_bit: u32,
    /// Polarization switch frequency \[Hz\]
    pub switch_polarization_frequency: f64,
    /// Low edge of the joined band \[MHz\]
    pub freq_min: f64,
    /// High edge of the joined band \[MHz\]
    pub freq_max: f64,
    /// Finite difference window for the ephemeris drift rate \[s\]
    pub obs_time_delay: f64,
}

impl Default for AdcParams {
    fn default() -> Self {
        Self {
            clock: 1.0e9,
            factor1: 8192.0,
            factor2: 1024.0,
            fft_size: crate::constants::HARDWARE_FFT_SIZE,
            kurt_threshold: 0.0,
            generator_bit: 20,
            switch_polarization_frequency: 2.0,
            freq_min: 1000.0,
            freq_max: 3000.0,
            obs_time_delay: 60.0,
        }
    }
}

impl AdcParams {
    /// Effective sampling rate of each polarization stream \[samples/s\].
    pub fn samples_per_second(&self) -> f64 {
        self.clock / self.factor1 / self.factor2
    }
}

/// Observatory geographic location, geodetic degrees and meters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GeodeticSite {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_m: f64,
}

impl Default for GeodeticSite {
    /// RATAN-600, Zelenchukskaya.
    fn default() -> Self {
        Self {
            latitude_deg: 43.82633,
            longitude_deg: 41.58683,
            height_m: 970.0,
        }
    }
}

/// Flux calibration parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Reference quiet sun flux table (frequency \[MHz\], flux \[sfu\])
    pub flux_table: String,
    /// Angular search window, low bound \[arcsec\]
    pub arcsec_min: f64,
    /// Angular search window, high bound \[arcsec\]
    pub arcsec_max: f64,
    /// Half width of the inner quiet sun search window \[arcsec\]
    pub scan_half_width: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            flux_table: "flux_dm.txt".to_string(),
            arcsec_min: -2000.0,
            arcsec_max: 2000.0,
            scan_half_width: 700.0,
        }
    }
}

/// Sentinel constants standing in for missing and flagged samples.
/// Raw and calibrated sentinels are distinct so the markers survive
/// the flux scaling without corrupting physical values.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ValueReplacement {
    /// Never observed (or genuinely zero) raw amplitude
    pub raw_missing: f32,
    /// Kurtosis flagged raw amplitude
    pub raw_kurtosis: f32,
    /// Missing marker after calibration
    pub calibrated_missing: f32,
    /// Kurtosis marker after calibration
    pub calibrated_kurtosis: f32,
}

impl Default for ValueReplacement {
    fn default() -> Self {
        Self {
            raw_missing: 2.0,
            raw_kurtosis: 1.0,
            calibrated_missing: 0.02,
            calibrated_kurtosis: 0.01,
        }
    }
}

/// Frequency filtering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Filtration {
    /// Excluded bands (known RFI): rows inside \[low, high\] MHz
    /// are zeroed after calibration.
    pub filter_bands: Vec<[f64; 2]>,
}

/// Complete acquisition configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channels: ChannelMapping,
    pub bin_data: RecordLayout,
    pub adc: AdcParams,
    pub site: GeodeticSite,
    pub calibration: CalibrationParams,
    pub value_replacement: ValueReplacement,
    pub filtration: Filtration,
}

impl Config {
    /// Parses [Config] from TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, ParsingError> {
        let config: Config = toml::from_str(content)?;
        // fail early on a bad schema table
        config.bin_data.schema()?;
        Ok(config)
    }

    /// Parses [Config] from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ParsingError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
