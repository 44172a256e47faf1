//! Screen scaling and screen edge lock
//!
//! Remaps source positions so content authored against the nominal
//! reference screen lands on the reproduction screen
//! (Rec. ITU-R BS.2127-1 sec. 7.3.3 to 7.3.5).

use serde::{Deserialize, Serialize};

use crate::metadata::{HorizontalEdge, ScreenEdgeLock, VerticalEdge};
use crate::position::PolarPosition;

/// Polar screen descriptor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Screen {
    /// Azimuth of the screen centre, degrees
    pub centre_azimuth: f64,
    /// Total azimuth width of the screen, degrees
    pub width_azimuth: f64,
    /// Picture aspect ratio (width over height)
    pub aspect_ratio: f64,
}

impl Screen {
    /// The nominal reference screen of BS.2076
    pub fn nominal() -> Self {
        Self {
            centre_azimuth: 0.0,
            width_azimuth: 58.0,
            aspect_ratio: 1.78,
        }
    }

    /// Azimuth of the left edge
    pub fn left_edge(&self) -> f64 {
        self.centre_azimuth + self.width_azimuth * 0.5
    }

    /// Azimuth of the right edge
    pub fn right_edge(&self) -> f64 {
        self.centre_azimuth - self.width_azimuth * 0.5
    }

    /// Elevation of the top edge, derived from the aspect ratio
    pub fn top_edge(&self) -> f64 {
        ((self.width_azimuth * 0.5).to_radians().tan() / self.aspect_ratio)
            .atan()
            .to_degrees()
    }

    /// Elevation of the bottom edge
    pub fn bottom_edge(&self) -> f64 {
        -self.top_edge()
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::nominal()
    }
}

/// Piecewise-linear warp through [-180, right, left, 180] (azimuth) or
/// [-90, bottom, top, 90] (elevation)
fn warp(value: f64, lo: f64, from_a: f64, from_b: f64, to_a: f64, to_b: f64, hi: f64) -> f64 {
    if value <= from_a {
        if (from_a - lo).abs() < 1e-12 {
            return to_a;
        }
        lo + (value - lo) / (from_a - lo) * (to_a - lo)
    } else if value <= from_b {
        to_a + (value - from_a) / (from_b - from_a) * (to_b - to_a)
    } else {
        if (hi - from_b).abs() < 1e-12 {
            return to_b;
        }
        to_b + (value - from_b) / (hi - from_b) * (hi - to_b)
    }
}

/// Scales screen-referenced positions onto the reproduction screen
pub struct ScreenScaleHandler {
    reproduction: Option<Screen>,
    nominal: Screen,
}

impl ScreenScaleHandler {
    /// `reproduction` is the installed screen; `None` disables scaling
    pub fn new(reproduction: Option<Screen>) -> Self {
        Self {
            reproduction,
            nominal: Screen::nominal(),
        }
    }

    /// Remap a polar position; untouched unless `screen_ref` is set
    /// and a reproduction screen is configured.
    pub fn handle(&self, position: PolarPosition, screen_ref: bool) -> PolarPosition {
        let screen = match (&self.reproduction, screen_ref) {
            (Some(s), true) => s,
            _ => return position,
        };

        let azimuth = warp(
            position.azimuth,
            -180.0,
            self.nominal.right_edge(),
            self.nominal.left_edge(),
            screen.right_edge(),
            screen.left_edge(),
            180.0,
        );
        let elevation = warp(
            position.elevation,
            -90.0,
            self.nominal.bottom_edge(),
            self.nominal.top_edge(),
            screen.bottom_edge(),
            screen.top_edge(),
            90.0,
        );
        PolarPosition::new(azimuth, elevation, position.distance)
    }
}

/// Snaps positions to the reproduction screen edges
pub struct ScreenEdgeLockHandler {
    screen: Option<Screen>,
}

impl ScreenEdgeLockHandler {
    pub fn new(screen: Option<Screen>) -> Self {
        Self { screen }
    }

    /// Apply the edge lock flags to a polar position
    pub fn handle(&self, position: PolarPosition, edge_lock: &ScreenEdgeLock) -> PolarPosition {
        let screen = match &self.screen {
            Some(s) => s,
            None => return position,
        };

        let mut out = position;
        match edge_lock.horizontal {
            Some(HorizontalEdge::Left) => out.azimuth = screen.left_edge(),
            Some(HorizontalEdge::Right) => out.azimuth = screen.right_edge(),
            None => {}
        }
        match edge_lock.vertical {
            Some(VerticalEdge::Top) => out.elevation = screen.top_edge(),
            Some(VerticalEdge::Bottom) => out.elevation = screen.bottom_edge(),
            None => {}
        }
        out
    }
}
