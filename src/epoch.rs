//! Datetime helpers. Descriptor files timestamp events in observatory
//! local time with an explicit UTC offset: we keep the UTC instant and
//! the recorded offset side by side, so both renditions can be formatted
//! again at production time.
use crate::error::ParsingError;
use hifitime::{Duration, Epoch, Unit};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ISO8601_RE: Regex = Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$"
    )
    .unwrap();
}

/// An instant, expressed in UTC, paired with the UTC offset it
/// was originally recorded with.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalEpoch {
    /// Instant in [hifitime::TimeScale::UTC]
    pub utc: Epoch,
    /// Offset of the local rendition with respect to UTC
    pub offset: Duration,
}

impl LocalEpoch {
    /// Interprets "yyyy-mm-ddThh:mm:ss[.ffffff][+hh:mm]" as recorded by
    /// the acquisition software. A missing offset (or "Z") means UTC.
    pub fn from_iso8601(s: &str) -> Result<Self, ParsingError> {
        let caps = ISO8601_RE
            .captures(s.trim())
            .ok_or_else(|| ParsingError::DateTimeParsing(s.to_string()))?;

        let bad = || ParsingError::DateTimeParsing(s.to_string());

        let y = caps[1].parse::<i32>().map_err(|_| bad())?;
        let m = caps[2].parse::<u8>().map_err(|_| bad())?;
        let d = caps[3].parse::<u8>().map_err(|_| bad())?;
        let hh = caps[4].parse::<u8>().map_err(|_| bad())?;
        let mm = caps[5].parse::<u8>().map_err(|_| bad())?;
        let ss = caps[6].parse::<u8>().map_err(|_| bad())?;

        let nanos = match caps.get(7) {
            Some(frac) => {
                let frac = &frac.as_str()[1..]; // skip '.'
                let frac = &frac[..frac.len().min(9)];
                let scale = 10_u64.pow(9 - frac.len() as u32);
                frac.parse::<u64>().map_err(|_| bad())? * scale
            },
            None => 0,
        };

        let offset = match caps.get(8) {
            Some(tz) => parse_utc_offset(tz.as_str()).ok_or_else(bad)?,
            None => Duration::ZERO,
        };

        // Epoch::from_gregorian panics on out of range fields
        if !(1..=12).contains(&m) || !(1..=31).contains(&d) || hh > 23 || mm > 59 || ss > 60 {
            return Err(bad());
        }

        // local wall clock reading, then back to UTC
        let local = Epoch::from_gregorian_utc(y, m, d, hh, mm, ss, nanos as u32);
        Ok(Self {
            utc: local - offset,
            offset,
        })
    }

    /// Builds [LocalEpoch] from a UTC instant, local offset set to zero.
    pub fn from_utc(utc: Epoch) -> Self {
        Self {
            utc,
            offset: Duration::ZERO,
        }
    }

    /// Local wall clock rendition of this instant.
    pub fn local(&self) -> Epoch {
        self.utc + self.offset
    }

    /// Shifts by `dt`, preserving the recorded offset.
    pub fn shift(&self, dt: Duration) -> Self {
        Self {
            utc: self.utc + dt,
            offset: self.offset,
        }
    }

    /// ISO-8601 UTC rendition, to microsecond resolution ("+00:00" suffix).
    pub fn to_iso8601_utc(&self) -> String {
        format!("{}+00:00", format_gregorian(self.utc))
    }

    /// ISO-8601 rendition in the recorded local offset.
    pub fn to_iso8601_local(&self) -> String {
        let offset_s = self.offset.to_seconds();
        let sign = if offset_s < 0.0 { '-' } else { '+' };
        let total = offset_s.abs().round() as u64 / 60;
        format!(
            "{}{}{:02}:{:02}",
            format_gregorian(self.local()),
            sign,
            total / 60,
            total % 60
        )
    }

    /// Local calendar date, "yyyy-mm-dd".
    pub fn local_date(&self) -> String {
        let (y, m, d, _, _, _, _) = self.local().to_gregorian_utc();
        format!("{:04}-{:02}-{:02}", y, m, d)
    }

    /// Local time of day, "hh:mm:ss".
    pub fn local_time(&self) -> String {
        let (_, _, _, hh, mm, ss, _) = self.local().to_gregorian_utc();
        format!("{:02}:{:02}:{:02}", hh, mm, ss)
    }
}

impl std::fmt::Display for LocalEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_iso8601_utc())
    }
}

/*
 * "+03:00" / "-0330" style UTC offset
 */
fn parse_utc_offset(s: &str) -> Option<Duration> {
    if s == "Z" {
        return Some(Duration::ZERO);
    }
    let sign = match s.chars().next()? {
        '+' => 1.0,
        '-' => -1.0,
        _ => return None,
    };
    let digits: String = s[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    let hh = digits[0..2].parse::<f64>().ok()?;
    let mm = digits[2..4].parse::<f64>().ok()?;
    Some((sign * (hh * 3600.0 + mm * 60.0)) * Unit::Second)
}

/*
 * "yyyy-mm-ddThh:mm:ss.ffffff" (no offset suffix)
 */
fn format_gregorian(e: Epoch) -> String {
    let (y, m, d, hh, mm, ss, nanos) = e.to_gregorian_utc();
    // round to microseconds, saturating just below the carry
    let micros = (((nanos as f64) / 1000.0).round() as u32).min(999_999);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
        y, m, d, hh, mm, ss, micros
    )
}
