//! Error taxonomy. Any error aborts the observation being processed:
//! there is no retry and no partially written output.
use thiserror::Error;

/// Errors that may rise while decoding the telemetry stream
/// or the descriptor sidecar.
#[derive(Error, Debug)]
pub enum ParsingError {
    #[error("file i/o error")]
    IoError(#[from] std::io::Error),
    #[error("unsupported file extension \"{0}\"")]
    UnsupportedFileExtension(String),
    #[error("record stream length is not a multiple of the record size")]
    TruncatedRecordStream,
    #[error("record schema misses required field \"{0}\"")]
    IncompleteSchema(String),
    #[error("unknown schema field kind \"{0}\"")]
    UnknownFieldKind(String),
    #[error("unknown channel id #{0}: must be 0 or 1")]
    UnknownChannel(u32),
    #[error("averaging exponent is not uniform across the capture")]
    NonUniformAveraging,
    #[error("payload stream of {0} words does not divide into {1} bin spectra")]
    MisalignedSpectrum(usize, usize),
    #[error("joined sub-bands have mismatched time dimensions: {0} != {1}")]
    SubBandShapeMismatch(usize, usize),
    #[error("descriptor file not found: {0}")]
    MissingDescriptor(String),
    #[error("invalid descriptor json")]
    DescriptorJson(#[from] serde_json::Error),
    #[error("descriptor misses required key \"{0}\"")]
    MissingDescriptorKey(String),
    #[error("expecting iso8601 datetime, found \"{0}\"")]
    DateTimeParsing(String),
    #[error("invalid toml configuration")]
    ConfigToml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    ConfigValue(String),
}

/// Errors that may rise while recovering the absolute time axis.
#[derive(Error, Debug)]
pub enum TimingError {
    #[error("calibration pulse edge not found in either polarization")]
    PulseEdgeNotFound,
    #[error("ephemeris evaluation failed: {0}")]
    Ephemeris(String),
}

/// Errors that may rise during flux calibration.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("polarization arrays have different shapes: {0:?} != {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),
    #[error("empty angular search window")]
    EmptySearchWindow,
    #[error("no valid quiet sun candidate in either polarization")]
    NoQuietSunPoint,
    #[error("non positive anchor amplitude at {0:.3} MHz: calibration is ill defined")]
    IllDefinedCoefficient(f64),
    #[error("flux table i/o error")]
    FluxTableIo(#[from] std::io::Error),
    #[error("malformed flux table line \"{0}\"")]
    FluxTableEntry(String),
    #[error("flux table requires at least two entries")]
    FluxTableTooShort,
    #[error("raw acquisition data was dropped: cannot run this stage")]
    RawDataUnavailable,
}

/// Errors that may rise in the FITS production process.
#[derive(Error, Debug)]
pub enum FormattingError {
    #[error("file i/o error")]
    IoError(#[from] std::io::Error),
    #[error("fits keyword \"{0}\" exceeds 8 characters")]
    KeywordTooLong(String),
    #[error("output already exists: {0}")]
    OutputExists(String),
    #[error("polarization matrices have mismatched shapes")]
    ShapeMismatch,
}

/// Top level error, aggregating all processing stages.
#[derive(Error, Debug)]
pub enum Error {
    #[error("parsing error: {0}")]
    Parsing(#[from] ParsingError),
    #[error("timing recovery error: {0}")]
    Timing(#[from] TimingError),
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("formatting error: {0}")]
    Formatting(#[from] FormattingError),
}
