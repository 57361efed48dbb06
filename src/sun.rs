//! Solar ephemeris collaborator. The pipeline only needs the apparent
//! solar geometry at culmination and the beam crossing rate of the sun
//! past the fixed meridian; both are answered through the
//! [SolarEphemeris] trait so alternate providers (spice kernels,
//! tabulated services) can be substituted. The built in provider
//! implements the classical low accuracy analytic expressions
//! (Meeus, "Astronomical Algorithms", ch. 25/29), amply sufficient
//! for the arcsecond-per-second scale derivation.
use crate::constants::{SIDEREAL_DAY_SECONDS, SOLAR_RADIUS_1AU_ARCSEC};
use crate::error::TimingError;

use hifitime::{Duration, Epoch};

/// Apparent solar geometry at one instant.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct SolarPosition {
    /// Apparent right ascension \[deg\]
    pub right_ascension_deg: f64,
    /// Apparent declination \[deg\]
    pub declination_deg: f64,
    /// Apparent angular radius \[arcsec\]
    pub apparent_radius_arcsec: f64,
    /// Position angle of the solar rotation axis \[deg\]
    pub position_angle_deg: f64,
    /// Heliographic latitude of the disk center \[deg\]
    pub b0_angle_deg: f64,
    /// Earth-sun distance \[AU\]
    pub distance_au: f64,
}

/// Astronomical ephemeris collaborator.
pub trait SolarEphemeris {
    /// Apparent solar geometry at UTC instant `t`.
    fn solar_position(&self, t: Epoch) -> Result<SolarPosition, TimingError>;

    /// Apparent drift rate of the sun past a fixed observing meridian,
    /// in arcsec of cross-scan angle per second, derived from the
    /// sidereal rate corrected for the sun's own right ascension
    /// motion over a short finite difference `window`.
    fn drift_rate_arcsec_per_second(
        &self,
        t: Epoch,
        window: Duration,
    ) -> Result<f64, TimingError> {
        let dt = window.to_seconds();
        if dt <= 0.0 {
            return Err(TimingError::Ephemeris(
                "finite difference window must be positive".to_string(),
            ));
        }
        let p0 = self.solar_position(t)?;
        let p1 = self.solar_position(t + window)?;

        let mut dra = p1.right_ascension_deg - p0.right_ascension_deg;
        // ra wraps at 360 deg around the equinox
        if dra > 180.0 {
            dra -= 360.0;
        } else if dra < -180.0 {
            dra += 360.0;
        }

        let sidereal_deg_s = 360.0 / SIDEREAL_DAY_SECONDS;
        let rate_deg_s = sidereal_deg_s - dra / dt;
        Ok(rate_deg_s * 3600.0 * p0.declination_deg.to_radians().cos())
    }
}

/// Low accuracy analytic solar ephemeris.
#[derive(Debug, Default, Copy, Clone)]
pub struct AnalyticSunEphemeris;

impl SolarEphemeris for AnalyticSunEphemeris {
    fn solar_position(&self, t: Epoch) -> Result<SolarPosition, TimingError> {
        let jde = t.to_jde_utc_days();
        let century = (jde - 2451545.0) / 36525.0;

        // geometric mean longitude and anomaly
        let l0 = 280.46646 + 36000.76983 * century + 0.0003032 * century * century;
        let m = (357.52911 + 35999.05029 * century - 0.0001537 * century * century).to_radians();
        let eccentricity =
            0.016708634 - 0.000042037 * century - 0.0000001267 * century * century;

        // equation of center
        let center = (1.914602 - 0.004817 * century - 0.000014 * century * century) * m.sin()
            + (0.019993 - 0.000101 * century) * (2.0 * m).sin()
            + 0.000289 * (3.0 * m).sin();

        let true_longitude = l0 + center;
        let true_anomaly = m.to_degrees() + center;

        let distance_au = 1.000001018 * (1.0 - eccentricity * eccentricity)
            / (1.0 + eccentricity * true_anomaly.to_radians().cos());

        // apparent longitude, corrected for nutation and aberration
        let omega = (125.04 - 1934.136 * century).to_radians();
        let apparent_longitude = (true_longitude - 0.00569 - 0.00478 * omega.sin()).to_radians();

        // true obliquity
        let obliquity0 = 23.0 + (26.0 + 21.448 / 60.0) / 60.0
            - (46.8150 * century + 0.00059 * century * century) / 3600.0;
        let obliquity = (obliquity0 + 0.00256 * omega.cos()).to_radians();

        let right_ascension = (obliquity.cos() * apparent_longitude.sin())
            .atan2(apparent_longitude.cos())
            .to_degrees()
            .rem_euclid(360.0);
        let declination = (obliquity.sin() * apparent_longitude.sin()).asin().to_degrees();

        // solar rotation axis orientation (Meeus ch. 29)
        let inclination = 7.25_f64.to_radians();
        let node = (73.6667 + 1.3958333 * (jde - 2396758.0) / 36525.0).to_radians();

        let x = (-apparent_longitude.cos() * obliquity.tan()).atan();
        let y = (-(apparent_longitude - node).cos() * inclination.tan()).atan();
        let position_angle = (x + y).to_degrees();
        let b0 = ((apparent_longitude - node).sin() * inclination.sin())
            .asin()
            .to_degrees();

        Ok(SolarPosition {
            right_ascension_deg: right_ascension,
            declination_deg: declination,
            apparent_radius_arcsec: SOLAR_RADIUS_1AU_ARCSEC / distance_au,
            position_angle_deg: position_angle,
            b0_angle_deg: b0,
            distance_au,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hifitime::{Epoch, Unit};

    #[test]
    fn summer_solstice_geometry() {
        // near the June solstice the sun sits close to +23.4 deg
        let t = Epoch::from_gregorian_utc(2024, 6, 20, 21, 0, 0, 0);
        let sun = AnalyticSunEphemeris.solar_position(t).unwrap();
        assert!(
            (sun.declination_deg - 23.43).abs() < 0.1,
            "solstice declination: {}",
            sun.declination_deg
        );
        assert!((sun.right_ascension_deg - 90.0).abs() < 1.0);
        // aphelion side of the orbit: a bit more than 1 AU
        assert!(sun.distance_au > 1.01 && sun.distance_au < 1.02);
        assert!(sun.apparent_radius_arcsec > 940.0 && sun.apparent_radius_arcsec < 950.0);
    }

    #[test]
    fn equinox_geometry() {
        let t = Epoch::from_gregorian_utc(2024, 3, 20, 3, 0, 0, 0);
        let sun = AnalyticSunEphemeris.solar_position(t).unwrap();
        assert!(sun.declination_deg.abs() < 0.1);
        // b0 stays within +/- 7.25 deg by construction
        assert!(sun.b0_angle_deg.abs() <= 7.25);
        // position angle range is about +/- 26.3 deg
        assert!(sun.position_angle_deg.abs() < 26.5);
    }

    #[test]
    fn drift_rate_magnitude() {
        // around 15"/s * cos(dec), slightly reduced by the sun's own motion
        let t = Epoch::from_gregorian_utc(2024, 6, 5, 9, 12, 0, 0);
        let rate = AnalyticSunEphemeris
            .drift_rate_arcsec_per_second(t, 60.0 * Unit::Second)
            .unwrap();
        assert!(rate > 13.0 && rate < 14.0, "drift rate: {}", rate);
    }

    #[test]
    fn rejects_degenerate_window() {
        let t = Epoch::from_gregorian_utc(2024, 6, 5, 9, 12, 0, 0);
        assert!(AnalyticSunEphemeris
            .drift_rate_arcsec_per_second(t, Duration::ZERO)
            .is_err());
    }
}
