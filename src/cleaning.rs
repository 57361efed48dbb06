//! Sentinel substitution passes. Missing and statistically invalid
//! samples are replaced by small distinct integer markers rather than
//! NaN, so the matrices keep a uniform numeric representation all the
//! way to flux calibration (which restores the markers afterwards).
use ndarray::{Array2, Zip};

/// Missing value pass: a packed amplitude of exactly zero either was
/// never observed (gap frame) or measured a true zero; both read back
/// as `replacement` from here on. The ambiguity is accepted by design.
pub fn replace_missing(amplitude: &mut Array2<f32>, replacement: f32) {
    amplitude.mapv_inplace(|v| if v == 0.0 { replacement } else { v });
}

/// Kurtosis flag pass: samples whose paired kurtosis estimate is at or
/// below `threshold` are statistically invalid and replaced by
/// `replacement`, unless they already carry the missing marker.
/// Applying the pass twice yields the same result as applying it once.
pub fn flag_low_kurtosis(
    amplitude: &mut Array2<f32>,
    kurtosis: &Array2<f32>,
    threshold: f32,
    missing_marker: f32,
    replacement: f32,
) {
    Zip::from(amplitude).and(kurtosis).for_each(|amp, &kurt| {
        if kurt <= threshold && *amp != missing_marker {
            *amp = replacement;
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn missing_pass_marks_zeros() {
        let mut amplitude = array![[0.0_f32, 5.0], [7.0, 0.0]];
        replace_missing(&mut amplitude, 2.0);
        assert_eq!(amplitude, array![[2.0, 5.0], [7.0, 2.0]]);
    }

    #[test]
    fn kurtosis_pass_spares_missing_marker() {
        let mut amplitude = array![[2.0_f32, 5.0, 9.0]];
        let kurtosis = array![[0.0_f32, 0.0, 300.0]];
        flag_low_kurtosis(&mut amplitude, &kurtosis, 100.0, 2.0, 1.0);
        // missing marker kept, low kurtosis sample flagged, good sample kept
        assert_eq!(amplitude, array![[2.0, 1.0, 9.0]]);
    }

    #[test]
    fn kurtosis_pass_is_idempotent() {
        let mut amplitude = array![[2.0_f32, 5.0, 9.0, 0.5]];
        let kurtosis = array![[0.0_f32, 20.0, 300.0, 50.0]];
        flag_low_kurtosis(&mut amplitude, &kurtosis, 100.0, 2.0, 1.0);
        let once = amplitude.clone();
        flag_low_kurtosis(&mut amplitude, &kurtosis, 100.0, 2.0, 1.0);
        assert_eq!(amplitude, once);
    }
}
