//! User interaction events: pointer, keyboard, scroll, viewport, navigation.
//!
//! Continuous motion is recorded as a [`Sample`]: a start and end value plus
//! the time it took to get from one to the other. Replay interpolates
//! linearly across the sample's duration.

use serde::{Deserialize, Serialize};

use crate::id::SyntheticId;

/// Position in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation toward `target` by factor `t` ∈ [0, 1], rounded
    /// to the nearest pixel.
    pub fn lerp(&self, target: &Point, t: f64) -> Point {
        let mix = |a: i32, b: i32| (a as f64 + (b as f64 - a as f64) * t).round() as i32;
        Point {
            x: mix(self.x, target.x),
            y: mix(self.y, target.y),
        }
    }
}

/// Interpolate between two points of a sample.
pub trait Interpolate: Copy {
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

impl Interpolate for Point {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        self.lerp(to, t)
    }
}

/// A value moving from `from` to `to` over `duration` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample<T> {
    pub from: T,
    pub to: T,
    pub duration: u32,
}

impl<T: Interpolate> Sample<T> {
    pub fn new(from: T, to: T, duration: u32) -> Self {
        Self { from, to, duration }
    }

    /// Value `elapsed` ms after the sample started. A zero-length sample is
    /// always at `to`.
    pub fn at(&self, elapsed: u32) -> T {
        if self.duration == 0 {
            return self.to;
        }
        let t = (elapsed as f64 / self.duration as f64).clamp(0.0, 1.0);
        self.from.interpolate(&self.to, t)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PointerState {
    #[default]
    Up = 0,
    Down = 1,
}

impl PointerState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PointerState::Up),
            1 => Some(PointerState::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyState {
    Up = 0,
    Down = 1,
}

impl KeyState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(KeyState::Up),
            1 => Some(KeyState::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Interaction {
    PointerMove {
        sample: Sample<Point>,
    },
    PointerState {
        state: PointerState,
        position: Point,
    },
    Click {
        target: Option<SyntheticId>,
        position: Point,
    },
    Scroll {
        target: SyntheticId,
        sample: Sample<Point>,
    },
    ViewportResize {
        sample: Sample<Point>,
    },
    Key {
        state: KeyState,
        key: String,
        target: Option<SyntheticId>,
    },
    PageTransition {
        url: String,
    },
}

impl Interaction {
    /// Duration of the embedded sample, if this interaction is continuous.
    pub fn sample_duration(&self) -> Option<u32> {
        match self {
            Interaction::PointerMove { sample }
            | Interaction::Scroll { sample, .. }
            | Interaction::ViewportResize { sample } => Some(sample.duration),
            _ => None,
        }
    }
}
