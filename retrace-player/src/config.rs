//! Playback configuration.

use std::time::Duration;

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 16.0;

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Playback rate multiplier, clamped to [`MIN_SPEED`, `MAX_SPEED`].
    /// Default: 1.0.
    pub speed: f64,
    /// Wall-clock time between frames while playing. Default: 16ms.
    pub frame_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl PlayerConfig {
    /// Config for testing (coarse 100ms frames).
    pub fn for_testing() -> Self {
        Self {
            speed: 1.0,
            frame_interval: Duration::from_millis(100),
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = clamp_speed(speed);
        self
    }
}

/// Clamp a requested speed into the supported range. NaN falls back to 1.0.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return 1.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_clamping() {
        assert_eq!(clamp_speed(0.0), MIN_SPEED);
        assert_eq!(clamp_speed(100.0), MAX_SPEED);
        assert_eq!(clamp_speed(2.0), 2.0);
        assert_eq!(clamp_speed(f64::NAN), 1.0);
        assert_eq!(PlayerConfig::default().with_speed(-3.0).speed, MIN_SPEED);
    }
}
