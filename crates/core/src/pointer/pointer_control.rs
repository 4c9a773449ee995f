use serde::{Deserialize, Serialize};

use crate::pointer::acceleration::AccelerationCurve;
use crate::shared::constants::{
    ACCELERATION_DEFAULT, AXIS_SPEED_DEFAULT, AXIS_SPEED_MAX, AXIS_SPEED_MIN,
    MOTION_SMOOTHING_DEFAULT, MOTION_SMOOTHING_MAX, MOTION_THRESHOLD_DEFAULT,
    MOTION_THRESHOLD_MAX,
};
use crate::shared::geometry::{FrameSize, Point2f};

/// How head motion maps to pointer motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerSettings {
    pub horizontal_speed: u8,
    pub vertical_speed: u8,
    pub acceleration: u8,
    pub smoothing: u8,
    pub threshold: u8,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            horizontal_speed: AXIS_SPEED_DEFAULT,
            vertical_speed: AXIS_SPEED_DEFAULT,
            acceleration: ACCELERATION_DEFAULT,
            smoothing: MOTION_SMOOTHING_DEFAULT,
            threshold: MOTION_THRESHOLD_DEFAULT,
        }
    }
}

/// Gain for an axis speed level: `6^(speed / 6)`.
pub fn speed_factor(speed: u8) -> f32 {
    6.0f32.powf(f32::from(speed.clamp(AXIS_SPEED_MIN, AXIS_SPEED_MAX)) / 6.0)
}

/// Low-pass weight for a smoothing level: `log10(level + 1)`.
pub fn smoothing_weight(level: u8) -> f32 {
    (f32::from(level.min(MOTION_SMOOTHING_MAX)) + 1.0).log10()
}

/// Integrates head velocity into an on-screen pointer position.
///
/// Per update the velocity is scaled per axis, low-pass filtered against
/// the previous output, amplified by the acceleration curve, zeroed per
/// axis inside the dead zone, and finally added to the pointer, which is
/// clamped to the screen.
#[derive(Debug, Clone)]
pub struct PointerControl {
    horizontal_speed: f32,
    vertical_speed: f32,
    curve: AccelerationCurve,
    filter_weight: f32,
    threshold: f32,
    previous_motion: Point2f,
    location: Point2f,
    screen: FrameSize,
}

impl PointerControl {
    /// Pointer centred on `screen`.
    pub fn new(settings: PointerSettings, screen: FrameSize) -> Self {
        let mut control = Self {
            horizontal_speed: 1.0,
            vertical_speed: 1.0,
            curve: AccelerationCurve::flat(),
            filter_weight: 0.0,
            threshold: 0.0,
            previous_motion: Point2f::ZERO,
            location: Point2f::ZERO,
            screen,
        };
        control.apply(settings);
        control.reset();
        control
    }

    /// Takes new settings without moving the pointer. Levels out of range
    /// are clamped.
    pub fn apply(&mut self, settings: PointerSettings) {
        self.horizontal_speed = speed_factor(settings.horizontal_speed);
        self.vertical_speed = speed_factor(settings.vertical_speed);
        self.curve = AccelerationCurve::from_level(settings.acceleration);
        self.filter_weight = smoothing_weight(settings.smoothing);
        self.threshold = f32::from(settings.threshold.min(MOTION_THRESHOLD_MAX));
    }

    /// Centres the pointer.
    pub fn reset(&mut self) {
        self.location = Point2f::new(
            (self.screen.width / 2) as f32,
            (self.screen.height / 2) as f32,
        );
    }

    pub fn screen(&self) -> FrameSize {
        self.screen
    }

    /// Changes the screen and recentres the pointer.
    pub fn set_screen(&mut self, screen: FrameSize) {
        self.screen = screen;
        self.reset();
    }

    pub fn location(&self) -> Point2f {
        self.location
    }

    /// Moves the pointer by one frame of head `velocity` and returns the new
    /// location.
    pub fn update(&mut self, velocity: Point2f) -> Point2f {
        let motion = self.step(velocity);
        self.location = Point2f::new(
            clamp_axis(self.location.x + motion.x, self.screen.width),
            clamp_axis(self.location.y + motion.y, self.screen.height),
        );
        self.location
    }

    /// Pointer displacement for one frame of head velocity.
    fn step(&mut self, velocity: Point2f) -> Point2f {
        let scaled = Point2f::new(
            velocity.x * self.horizontal_speed,
            velocity.y * self.vertical_speed,
        );

        let w = self.filter_weight;
        let filtered = Point2f::new(
            scaled.x * (1.0 - w) + self.previous_motion.x * w,
            scaled.y * (1.0 - w) + self.previous_motion.y * w,
        );
        self.previous_motion = filtered;

        let gain = self.curve.gain(filtered.x.hypot(filtered.y));
        Point2f::new(
            dead_zone(filtered.x * gain, self.threshold),
            dead_zone(filtered.y * gain, self.threshold),
        )
    }
}

fn dead_zone(value: f32, threshold: f32) -> f32 {
    if -threshold < value && value < threshold {
        0.0
    } else {
        value
    }
}

fn clamp_axis(value: f32, extent: u32) -> f32 {
    value.clamp(0.0, extent.saturating_sub(1) as f32)
}
