use crate::shared::constants::ACCELERATION_MAX;

/// Number of distance buckets, in pixels per frame.
pub const CURVE_LEN: usize = 30;

/// Gain applied to a motion step as a function of its length.
///
/// Bucket `i` holds the gain for steps of length `i` (rounded), the last
/// bucket covers everything longer.
#[derive(Debug, Clone, PartialEq)]
pub struct AccelerationCurve {
    gains: [f32; CURVE_LEN],
}

impl AccelerationCurve {
    /// Curve for a profile level, clamped to `0..=5`. Level 0 is flat.
    pub fn from_level(level: u8) -> Self {
        match level.min(ACCELERATION_MAX) {
            0 => Self::flat(),
            1 => Self::two_step(9, 1.5),
            2 => Self::two_step(7, 1.5),
            3 => Self::three_step(7, 1.5, 14, 2.0),
            4 => Self::three_step(5, 1.5, 10, 3.0),
            _ => Self::three_step(3, 1.5, 8, 3.0),
        }
    }

    pub fn flat() -> Self {
        Self::three_step(CURVE_LEN, 1.0, CURVE_LEN, 1.0)
    }

    fn two_step(delta0: usize, factor0: f32) -> Self {
        Self::three_step(delta0, factor0, CURVE_LEN, 1.0)
    }

    /// Unity gain below `delta0`, `factor0` up to `delta1`, then
    /// `factor0 * factor1` growing by 0.1 per bucket.
    fn three_step(delta0: usize, factor0: f32, delta1: usize, factor1: f32) -> Self {
        let delta0 = delta0.min(CURVE_LEN);
        let delta1 = delta1.clamp(delta0, CURVE_LEN);
        let mut gains = [1.0; CURVE_LEN];
        gains[delta0..delta1].fill(factor0);
        let mut ramp = 0.0f32;
        for gain in &mut gains[delta1..] {
            *gain = factor0 * factor1 + ramp;
            ramp += 0.1;
        }
        Self { gains }
    }

    pub fn gains(&self) -> &[f32; CURVE_LEN] {
        &self.gains
    }

    /// Gain for a step of `distance` pixels.
    pub fn gain(&self, distance: f32) -> f32 {
        let bucket = ((distance + 0.5) as usize).min(CURVE_LEN - 1);
        self.gains[bucket]
    }
}

impl Default for AccelerationCurve {
    fn default() -> Self {
        Self::flat()
    }
}
