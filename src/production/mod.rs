//! FITS container production. The observation is serialized as three
//! HDUs: a primary header of scalar metadata, an IMAGE extension with
//! the \[frequency, polarization, time\] cube (float32 when calibrated,
//! int64 raw counts otherwise) and a binary table of per frequency
//! values (frequency axis, plus calibration coefficients per logical
//! channel once calibrated). A ".fits.gz" output path compresses the
//! whole container on the fly.
use crate::{
    constants::{BAND_LABEL, RECEIVER_NAME, TELESCOPE_NAME},
    error::FormattingError,
    observation::Observation,
    writer::BufferedWriter,
};

use log::debug;
use std::io::Write;
use std::path::Path;

mod card;
use self::card::Card;

/// FITS block granularity, bytes.
const BLOCK_LEN: usize = 2880;

/// Serializes `observation` to `path`. Unless `overwrite` is set, an
/// existing output aborts the production (nothing is rewritten).
pub fn to_fits_file(
    observation: &Observation,
    path: &Path,
    overwrite: bool,
) -> Result<(), FormattingError> {
    if path.exists() && !overwrite {
        return Err(FormattingError::OutputExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufferedWriter::create(path)?;
    write_fits(observation, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Streams the FITS container to `w`.
pub fn write_fits<W: Write>(observation: &Observation, w: &mut W) -> Result<(), FormattingError> {
    let data = &observation.data;
    if data.pol_channel0.dim() != data.pol_channel1.dim() {
        return Err(FormattingError::ShapeMismatch);
    }

    write_primary_header(observation, w)?;
    write_data_cube(observation, w)?;
    write_values_table(observation, w)?;
    Ok(())
}

fn write_primary_header<W: Write>(
    observation: &Observation,
    w: &mut W,
) -> Result<(), FormattingError> {
    let metadata = &observation.metadata;
    let sun = &metadata.sun;

    let mut cards: Vec<Card> = Vec::with_capacity(40);
    cards.push(card::logical(
        "SIMPLE",
        true,
        Some(&format!(
            "Written by {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )),
    )?);
    cards.push(card::integer("BITPIX", 8, Some("array data type"))?);
    cards.push(card::integer("NAXIS", 0, Some("number of array dimensions"))?);
    cards.push(card::logical("EXTEND", true, None)?);

    cards.push(card::string("TELESCOP", TELESCOPE_NAME, None)?);
    cards.push(card::string("ORIGIN", RECEIVER_NAME, None)?);
    cards.push(card::string("BAND", BAND_LABEL, None)?);
    cards.push(card::string(
        "DATE-OBS",
        &metadata.culmination_feed_horn.local_date(),
        None,
    )?);
    cards.push(card::string(
        "TIME-OBS",
        &metadata.culmination_feed_horn.local_time(),
        None,
    )?);

    cards.push(card::string(
        "CULM_EFR",
        &metadata.culmination_efrat.to_iso8601_utc(),
        Some("Culmination by EFRAT, UTC"),
    )?);
    cards.push(card::string(
        "CULM_FEE",
        &metadata.culmination_feed_horn.to_iso8601_utc(),
        Some("Culmination FeedHorn Offset, UTC"),
    )?);
    cards.push(card::string(
        "T_START",
        &metadata.reg_start.to_iso8601_utc(),
        Some("Observation Start Time, UTC"),
    )?);
    cards.push(card::string(
        "T_STOP",
        &metadata.reg_stop.to_iso8601_utc(),
        Some("Observation Stop Time, UTC"),
    )?);

    cards.push(card::string("OBJECT", &metadata.object, None)?);
    cards.push(card::real("AZIMUTH", metadata.azimuth, Some("Unit: deg"))?);
    cards.push(card::real("ALTITUDE", metadata.altitude_deg, Some("Unit: deg"))?);
    cards.push(card::real("SOL_DEC", sun.declination_deg, Some("Unit: deg"))?);
    cards.push(card::real("SOL_RA", sun.right_ascension_deg, Some("Unit: deg"))?);
    cards.push(card::real(
        "SOLAR_R",
        sun.apparent_radius_arcsec,
        Some("Unit: arcsec"),
    )?);
    cards.push(card::real("SOLAR_P", sun.position_angle_deg, Some("Unit: deg"))?);
    cards.push(card::real("SOLAR_B", sun.b0_angle_deg, Some("Unit: deg"))?);

    cards.push(card::real(
        "FEED_OFF",
        metadata.feed_offset_cm,
        Some("Feed Horn Offset, cm"),
    )?);
    cards.push(card::real(
        "FE_OFF_T",
        metadata.feed_offset_time_s,
        Some("Feed Horn Offset by Time, s"),
    )?);

    cards.push(card::string(
        "POL_CH0",
        &metadata.mapping.pol_ch0.to_string(),
        None,
    )?);
    cards.push(card::string(
        "POL_CH1",
        &metadata.mapping.pol_ch1.to_string(),
        None,
    )?);
    cards.push(card::logical("CALIBR", metadata.is_calibrated, Some("Is calibrated"))?);
    if let Some(calibration) = &metadata.calibration {
        cards.push(card::real(
            "QSP",
            calibration.quiet_sun_point_arcsec,
            Some("Quiet Sun Point, arcsec"),
        )?);
    }
    cards.push(card::string("UNIT", &metadata.unit, Some("Data unit"))?);
    cards.push(card::logical("CLEAN", false, Some("Additional data cleaning"))?);

    cards.push(card::real(
        "ARCPSAM",
        metadata.arcsec_per_sample,
        Some("Arcsec per sample"),
    )?);
    cards.push(card::real(
        "ARCPSEC",
        metadata.arcsec_per_second,
        Some("Arcsec per second"),
    )?);
    cards.push(card::integer(
        "NSAMPLES",
        metadata.num_samples as i64,
        Some("Number of samples"),
    )?);
    cards.push(card::integer(
        "NFREQS",
        metadata.num_frequencies as i64,
        Some("Number of frequencies"),
    )?);
    cards.push(card::real(
        "REF_TIME",
        metadata.ref_time_s,
        Some("Reference time culm, s"),
    )?);
    cards.push(card::integer(
        "REF_SAMP",
        metadata.ref_sample as i64,
        Some("Reference sample culm"),
    )?);

    cards.push(card::real(
        "DTIME",
        metadata.time_resolution_s,
        Some("Sampling time resolution, s"),
    )?);
    cards.push(card::real(
        "DACTIME",
        metadata.switch_time_resolution_s,
        Some("Actual time resolution, s"),
    )?);
    cards.push(card::real(
        "DFREQ",
        metadata.frequency_resolution_mhz,
        Some("Frequency resolution, MHz"),
    )?);
    cards.push(card::real(
        "KURTOSIS",
        metadata.kurtosis_bounds.half_width(),
        Some("Half width of kurtosis interval"),
    )?);
    cards.push(card::real(
        "ATT1",
        metadata.attenuators.common,
        Some("Common attenuation"),
    )?);
    cards.push(card::real(
        "ATT2",
        metadata.attenuators.band_12ghz,
        Some("1-2 GHz channels attenuation"),
    )?);
    cards.push(card::real(
        "ATT3",
        metadata.attenuators.band_23ghz,
        Some("2-3 GHz channels attenuation"),
    )?);
    cards.push(card::end());

    write_header_block(w, &cards)
}

fn write_data_cube<W: Write>(observation: &Observation, w: &mut W) -> Result<(), FormattingError> {
    let metadata = &observation.metadata;
    let channels = [
        &observation.data.pol_channel0,
        &observation.data.pol_channel1,
    ];
    let (num_frequencies, num_samples) = channels[0].dim();

    let bitpix: i64 = if metadata.is_calibrated { -32 } else { 64 };
    let mut cards: Vec<Card> = Vec::with_capacity(12);
    cards.push(card::string("XTENSION", "IMAGE", Some("Image extension"))?);
    cards.push(card::integer("BITPIX", bitpix, Some("array data type"))?);
    cards.push(card::integer("NAXIS", 3, Some("number of array dimensions"))?);
    cards.push(card::integer("NAXIS1", num_samples as i64, None)?);
    cards.push(card::integer("NAXIS2", channels.len() as i64, None)?);
    cards.push(card::integer("NAXIS3", num_frequencies as i64, None)?);
    cards.push(card::integer("PCOUNT", 0, None)?);
    cards.push(card::integer("GCOUNT", 1, None)?);
    cards.push(card::string("EXTNAME", "DATA", None)?);
    cards.push(card::string("BUNIT", &metadata.unit, None)?);
    cards.push(card::end());
    write_header_block(w, &cards)?;

    // [frequency, polarization, time], NAXIS1 (time) varying fastest
    let element_len = if metadata.is_calibrated { 4 } else { 8 };
    let mut block = Vec::with_capacity(num_frequencies * channels.len() * num_samples * element_len);
    for frequency in 0..num_frequencies {
        for channel in channels.iter() {
            for sample in 0..num_samples {
                let value = channel[[frequency, sample]];
                if metadata.is_calibrated {
                    block.extend_from_slice(&value.to_be_bytes());
                } else {
                    // raw ADC counts are integers by construction
                    block.extend_from_slice(&(value as i64).to_be_bytes());
                }
            }
        }
    }
    debug!("data cube: {} bytes", block.len());
    write_data_block(w, &block)
}

fn write_values_table<W: Write>(
    observation: &Observation,
    w: &mut W,
) -> Result<(), FormattingError> {
    let metadata = &observation.metadata;
    let frequency = &metadata.axes.frequency_mhz;

    let mut columns: Vec<(&str, &[f64])> = vec![("freq", frequency.as_slice())];
    if let Some(calibration) = &metadata.calibration {
        columns.push(("cal_p0", calibration.coefficients_pol_ch0.as_slice()));
        columns.push(("cal_p1", calibration.coefficients_pol_ch1.as_slice()));
    }

    let row_len = 8 * columns.len();
    let mut cards: Vec<Card> = Vec::with_capacity(12 + 2 * columns.len());
    cards.push(card::string("XTENSION", "BINTABLE", Some("Binary table extension"))?);
    cards.push(card::integer("BITPIX", 8, None)?);
    cards.push(card::integer("NAXIS", 2, None)?);
    cards.push(card::integer("NAXIS1", row_len as i64, Some("length of dimension 1"))?);
    cards.push(card::integer(
        "NAXIS2",
        frequency.len() as i64,
        Some("length of dimension 2"),
    )?);
    cards.push(card::integer("PCOUNT", 0, None)?);
    cards.push(card::integer("GCOUNT", 1, None)?);
    cards.push(card::integer("TFIELDS", columns.len() as i64, None)?);
    for (i, (name, _)) in columns.iter().enumerate() {
        cards.push(card::string(&format!("TTYPE{}", i + 1), name, None)?);
        cards.push(card::string(&format!("TFORM{}", i + 1), "D", None)?);
    }
    cards.push(card::string("EXTNAME", "VALUES_TABLE", None)?);
    cards.push(card::end());
    write_header_block(w, &cards)?;

    let mut block = Vec::with_capacity(frequency.len() * row_len);
    for row in 0..frequency.len() {
        for (_, column) in columns.iter() {
            let value = column.get(row).copied().unwrap_or(f64::NAN);
            block.extend_from_slice(&value.to_be_bytes());
        }
    }
    write_data_block(w, &block)
}

/*
 * Header blocks are padded with ASCII spaces, data blocks with zeros.
 */
fn write_header_block<W: Write>(w: &mut W, cards: &[Card]) -> Result<(), FormattingError> {
    let mut written = 0;
    for c in cards.iter() {
        w.write_all(c)?;
        written += c.len();
    }
    pad(w, written, b' ')
}

fn write_data_block<W: Write>(w: &mut W, block: &[u8]) -> Result<(), FormattingError> {
    w.write_all(block)?;
    pad(w, block.len(), 0)
}

fn pad<W: Write>(w: &mut W, written: usize, fill: u8) -> Result<(), FormattingError> {
    let remainder = written % BLOCK_LEN;
    if remainder != 0 {
        let padding = vec![fill; BLOCK_LEN - remainder];
        w.write_all(&padding)?;
    }
    Ok(())
}
