//! ADM object metadata consumed by the gain calculator

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Object divergence: splits a source into symmetric virtual sources
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectDivergence {
    /// Divergence amount in [0, 1]
    pub value: f64,
    /// Offset of the auxiliary sources in degrees (polar processing)
    pub azimuth_range: f64,
    /// Offset of the auxiliary sources along x (cartesian processing)
    pub position_range: f64,
}

impl Default for ObjectDivergence {
    fn default() -> Self {
        Self {
            value: 0.0,
            azimuth_range: 45.0,
            position_range: 0.0,
        }
    }
}

/// Channel lock: snap the object to the nearest loudspeaker
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelLock {
    /// Only lock to speakers closer than this. `None` locks regardless
    /// of distance.
    pub max_distance: Option<f64>,
}

/// A zone of loudspeakers to exclude from rendering
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ExclusionZone {
    /// Polar zone: azimuth arc (anti-clockwise from min to max) and
    /// elevation range, degrees
    Polar {
        min_azimuth: f64,
        max_azimuth: f64,
        min_elevation: f64,
        max_elevation: f64,
    },
    /// Cartesian zone: axis-aligned box in room coordinates
    Cartesian {
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        min_z: f64,
        max_z: f64,
    },
}

/// Horizontal screen edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalEdge {
    Left,
    Right,
}

/// Vertical screen edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalEdge {
    Top,
    Bottom,
}

/// Screen edge lock flags
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScreenEdgeLock {
    /// Snap azimuth to the left/right screen edge
    pub horizontal: Option<HorizontalEdge>,
    /// Snap elevation to the top/bottom screen edge
    pub vertical: Option<VerticalEdge>,
}

/// Position jump flag carried with the metadata block
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JumpPosition {
    /// Jump to the new position instead of interpolating
    pub flag: bool,
    /// Interpolation length in seconds when not jumping
    pub interpolation_length: Option<f64>,
}

/// Metadata for a single object in one block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Source position
    pub position: Position,
    /// Cartesian processing flag from the ADM block
    pub cartesian: bool,
    /// Extent width: degrees when polar, cube units when cartesian
    pub width: f64,
    /// Extent height
    pub height: f64,
    /// Extent depth
    pub depth: f64,
    /// Linear gain
    pub gain: f64,
    /// Diffuse fraction in [0, 1]
    pub diffuse: f64,
    /// Optional divergence
    pub object_divergence: Option<ObjectDivergence>,
    /// Optional channel lock
    pub channel_lock: Option<ChannelLock>,
    /// Loudspeaker exclusion zones
    pub exclusion_zones: Vec<ExclusionZone>,
    /// Scale the position with the reproduction screen
    pub screen_ref: bool,
    /// Screen edge lock flags
    pub screen_edge_lock: ScreenEdgeLock,
    /// Position jump flag
    pub jump_position: JumpPosition,
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        Self {
            position: Position::default(),
            cartesian: false,
            width: 0.0,
            height: 0.0,
            depth: 0.0,
            gain: 1.0,
            diffuse: 0.0,
            object_divergence: None,
            channel_lock: None,
            exclusion_zones: Vec::new(),
            screen_ref: false,
            screen_edge_lock: ScreenEdgeLock::default(),
            jump_position: JumpPosition::default(),
        }
    }
}

impl ObjectMetadata {
    /// Export to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Import from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
