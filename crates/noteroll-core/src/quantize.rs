use crate::config::EditorConfig;
use crate::model::MAX_PITCH;

/// Round `value` to the nearest `1 / subdivision` of a beat.
///
/// NaN snaps to zero, so every result is a fixed point of `snap`.
pub fn snap(value: f64, subdivision: u32) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let division = f64::from(subdivision.max(1));
    (value * division).round() / division
}

/// Snaps beat positions to the grid and keeps durations above a floor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantizer {
    subdivision: u32,
    min_duration: f64,
}

impl Quantizer {
    pub fn new(subdivision: u32, min_duration: f64) -> Self {
        Self {
            subdivision: subdivision.max(1),
            min_duration: if min_duration.is_finite() && min_duration > 0.0 {
                min_duration
            } else {
                0.25
            },
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.snap_division, config.min_duration)
    }

    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    pub fn snap(&self, value: f64) -> f64 {
        snap(value, self.subdivision)
    }

    /// Snapped start position; never negative.
    pub fn snap_start(&self, start: f64) -> f64 {
        self.snap(start).max(0.0)
    }

    /// `max(min_duration, snap(raw))`.
    pub fn snap_duration(&self, raw: f64) -> f64 {
        let snapped = self.snap(raw);
        if snapped.is_finite() {
            snapped.max(self.min_duration)
        } else {
            self.min_duration
        }
    }

    pub fn snap_pitch(&self, pitch: f32) -> u8 {
        if pitch.is_nan() {
            return 0;
        }
        pitch.round().clamp(0.0, f32::from(MAX_PITCH)) as u8
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new(4, 0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_sixteenths() {
        assert_eq!(snap(130.0 / 60.0, 4), 2.25);
        assert_eq!(snap(1.5, 4), 1.5);
        assert_eq!(snap(0.12, 4), 0.0);
        assert_eq!(snap(0.13, 4), 0.25);
    }

    #[test]
    fn zero_subdivision_behaves_like_whole_beats() {
        assert_eq!(snap(2.6, 0), 3.0);
    }

    #[test]
    fn zero_length_duration_hits_the_floor() {
        let q = Quantizer::default();
        assert_eq!(q.snap_duration(0.0), 0.25);
        assert_eq!(q.snap_duration(-1.0), 0.25);
        assert_eq!(q.snap_duration(0.1), 0.25);
        assert_eq!(q.snap_duration(1.1), 1.0);
    }

    #[test]
    fn triplet_grid_is_idempotent() {
        let q = Quantizer::new(3, 0.25);
        let once = q.snap(1.4);
        assert_eq!(q.snap(once), once);
    }

    #[test]
    fn nan_is_a_fixed_point() {
        assert_eq!(snap(f64::NAN, 4), 0.0);
        assert_eq!(snap(snap(f64::NAN, 4), 4), 0.0);
    }

    #[test]
    fn pitch_snaps_and_clamps() {
        let q = Quantizer::default();
        assert_eq!(q.snap_pitch(60.4), 60);
        assert_eq!(q.snap_pitch(300.0), 127);
        assert_eq!(q.snap_pitch(-2.0), 0);
    }
}
