//! Hardware and physical constants of the 1-3 GHz fast acquisition receiver.

/// Number of points of the hardware FFT, prior to on-board averaging.
pub const HARDWARE_FFT_SIZE: u32 = 8192;

/// Low 6 bits of the `avg_kurt` record field hold the log2 averaging factor.
pub const AVERAGING_EXPONENT_MASK: u32 = 0b11_1111;

/// Amplitude occupies the low 55 bits of a packed payload word.
pub const AMPLITUDE_MASK: u64 = 0x7F_FFFF_FFFF_FFFF;

/// Kurtosis estimate occupies the bits above the amplitude.
pub const KURTOSIS_SHIFT: u32 = 55;

/// Reporting name of the instrument.
pub const TELESCOPE_NAME: &str = "RATAN-600";

/// Receiver identifier, also serialized as FITS ORIGIN.
pub const RECEIVER_NAME: &str = "FAST_ACQUISITION_1_3GHZ";

/// Frequency band label.
pub const BAND_LABEL: &str = "1-3 GHz";

/// Physical unit of calibrated data (solar flux units).
pub const CALIBRATED_UNIT: &str = "s.f.u.";

/// Unit of raw (uncalibrated) data.
pub const RAW_UNIT: &str = "counts";

/// Mean sidereal day duration in seconds.
pub const SIDEREAL_DAY_SECONDS: f64 = 86164.0905;

/// Solar apparent radius at 1 AU, in arcseconds.
pub const SOLAR_RADIUS_1AU_ARCSEC: f64 = 959.63;
