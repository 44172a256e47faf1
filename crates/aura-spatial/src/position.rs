//! Polar and cartesian position types
//!
//! Uses the BS.2127 axis convention: x points right, y points front,
//! z points up, and azimuth is measured anti-clockwise from the front
//! (positive azimuth is to the left).

use serde::{Deserialize, Serialize};

/// Polar position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPosition {
    /// Azimuth in degrees, (-180, 180], positive to the left
    pub azimuth: f64,
    /// Elevation in degrees, [-90, 90], positive upwards
    pub elevation: f64,
    /// Distance from the origin
    pub distance: f64,
}

impl PolarPosition {
    /// Create a new polar position
    pub fn new(azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self {
            azimuth,
            elevation,
            distance,
        }
    }

    /// Convert to cartesian coordinates
    pub fn to_cartesian(&self) -> CartesianPosition {
        let az = self.azimuth.to_radians();
        let el = self.elevation.to_radians();
        let cos_el = el.cos();

        CartesianPosition {
            x: -self.distance * az.sin() * cos_el,
            y: self.distance * az.cos() * cos_el,
            z: self.distance * el.sin(),
        }
    }

    /// Unit direction vector for this position
    pub fn direction(&self) -> CartesianPosition {
        PolarPosition::new(self.azimuth, self.elevation, 1.0).to_cartesian()
    }
}

impl Default for PolarPosition {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Cartesian position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartesianPosition {
    /// X coordinate (positive = right)
    pub x: f64,
    /// Y coordinate (positive = front)
    pub y: f64,
    /// Z coordinate (positive = up)
    pub z: f64,
}

impl CartesianPosition {
    /// Create a new position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Origin position
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Magnitude (distance from origin)
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Normalize to a unit vector; the origin maps to straight ahead
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n < 1e-12 {
            return Self::new(0.0, 1.0, 0.0);
        }
        Self::new(self.x / n, self.y / n, self.z / n)
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Difference vector `self - other`
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Sum vector
    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Scale by a factor
    pub fn scale(&self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.sub(other).norm()
    }

    /// Convert to polar coordinates
    pub fn to_polar(&self) -> PolarPosition {
        let distance = self.norm();
        if distance < 1e-12 {
            return PolarPosition::new(0.0, 0.0, 0.0);
        }
        let azimuth = (-self.x).atan2(self.y).to_degrees();
        let elevation = (self.z / distance).clamp(-1.0, 1.0).asin().to_degrees();
        PolarPosition::new(azimuth, elevation, distance)
    }

    /// True if all components are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A position in either convention
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Position {
    /// Listener-relative polar position
    Polar(PolarPosition),
    /// Cartesian position (ADM cube for cartesian metadata)
    Cartesian(CartesianPosition),
}

impl Position {
    /// True for the polar variant
    pub fn is_polar(&self) -> bool {
        matches!(self, Position::Polar(_))
    }

    /// The polar position, converting geometrically if needed
    pub fn polar(&self) -> PolarPosition {
        match self {
            Position::Polar(p) => *p,
            Position::Cartesian(c) => c.to_polar(),
        }
    }

    /// The cartesian position, converting geometrically if needed
    pub fn cartesian(&self) -> CartesianPosition {
        match self {
            Position::Polar(p) => p.to_cartesian(),
            Position::Cartesian(c) => *c,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::Polar(PolarPosition::default())
    }
}

impl From<PolarPosition> for Position {
    fn from(p: PolarPosition) -> Self {
        Position::Polar(p)
    }
}

impl From<CartesianPosition> for Position {
    fn from(c: CartesianPosition) -> Self {
        Position::Cartesian(c)
    }
}
