//! Mixing primitives - decibel gain and saturating sums

/// Lowest representable normalized sample
pub const SAMPLE_MIN: f32 = -1.0;
/// Highest representable normalized sample
pub const SAMPLE_MAX: f32 = 1.0;

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Hard clip to the normalized sample range
#[inline(always)]
pub fn saturate(x: f32) -> f32 {
    x.clamp(SAMPLE_MIN, SAMPLE_MAX)
}

/// Add `src` onto `dst` sample by sample, saturating each sum.
///
/// Only `dst.len()` samples are touched; a longer `src` is cut off.
pub fn mix_saturating(dst: &mut [f32], src: &[f32]) {
    for (out, &sample) in dst.iter_mut().zip(src) {
        *out = saturate(*out + sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conversions() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0206) - 0.5).abs() < 1e-4);
        assert!((db_to_gain(6.0206) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_background_attenuation_factor() {
        // -15 dB is roughly 0.178 linear
        assert!((db_to_gain(-15.0) - 0.17783).abs() < 1e-4);
    }

    #[test]
    fn test_mix_saturating() {
        let mut dst = vec![0.9, -0.9, 0.0];
        mix_saturating(&mut dst, &[0.5, -0.5, 0.25, 1.0]);
        assert_eq!(dst, vec![1.0, -1.0, 0.25]);
    }
}
