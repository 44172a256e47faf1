//! Loudspeaker channels, layouts and the BS.2051 catalogue

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{SpatialError, SpatialResult};
use crate::position::{CartesianPosition, PolarPosition};

/// Vertical layer of a loudspeaker, taken from its channel name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// Bottom layer (`B+xxx`)
    Bottom,
    /// Mid (ear-level) layer (`M+xxx`)
    Mid,
    /// Upper layer (`U+xxx`)
    Upper,
    /// Top (overhead) layer (`T+xxx`)
    Top,
}

impl Layer {
    /// Classify a channel name by its prefix
    pub fn of(name: &str) -> Layer {
        match name.as_bytes().first() {
            Some(b'B') => Layer::Bottom,
            Some(b'U') => Layer::Upper,
            Some(b'T') => Layer::Top,
            _ => Layer::Mid,
        }
    }

    /// Channel-lock tie-break priority; larger wins. Mid is preferred,
    /// then upper, bottom, top.
    pub fn lock_priority(&self) -> i32 {
        match self {
            Layer::Mid => 3,
            Layer::Upper => 2,
            Layer::Bottom => 1,
            Layer::Top => 0,
        }
    }
}

/// Single loudspeaker channel definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel label, e.g. `M+030`
    pub name: String,
    /// Real loudspeaker position
    pub polar_position: PolarPosition,
    /// Nominal position from the layout definition
    pub polar_nominal_position: PolarPosition,
    /// Is this a low-frequency effects channel
    pub is_lfe: bool,
}

impl Channel {
    /// Create a channel at its nominal position
    pub fn new(name: &str, azimuth: f64, elevation: f64) -> Self {
        let pos = PolarPosition::new(azimuth, elevation, 1.0);
        Self {
            name: name.to_string(),
            polar_position: pos,
            polar_nominal_position: pos,
            is_lfe: name.starts_with("LFE"),
        }
    }

    /// Override the real position, keeping the nominal one
    pub fn with_real_position(mut self, azimuth: f64, elevation: f64) -> Self {
        self.polar_position = PolarPosition::new(azimuth, elevation, 1.0);
        self
    }

    /// Vertical layer of this channel
    pub fn layer(&self) -> Layer {
        Layer::of(&self.name)
    }
}

/// Allocentric (room) coordinates for the known channel names,
/// x in [-1, 1] left to right, y in [-1, 1] back to front,
/// z in {-1, 0, 1} for bottom/mid/upper layers.
static ALLO_POSITIONS: Lazy<HashMap<&'static str, CartesianPosition>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let mut put = |name: &'static str, x: f64, y: f64, z: f64| {
        m.insert(name, CartesianPosition::new(x, y, z));
    };
    put("M+000", 0.0, 1.0, 0.0);
    put("M+030", -1.0, 1.0, 0.0);
    put("M-030", 1.0, 1.0, 0.0);
    put("M+SC", -0.414214, 1.0, 0.0);
    put("M-SC", 0.414214, 1.0, 0.0);
    put("M+060", -1.0, 0.577350, 0.0);
    put("M-060", 1.0, 0.577350, 0.0);
    put("M+090", -1.0, 0.0, 0.0);
    put("M-090", 1.0, 0.0, 0.0);
    put("M+110", -1.0, -1.0, 0.0);
    put("M-110", 1.0, -1.0, 0.0);
    put("M+135", -1.0, -1.0, 0.0);
    put("M-135", 1.0, -1.0, 0.0);
    put("M+180", 0.0, -1.0, 0.0);
    put("U+000", 0.0, 1.0, 1.0);
    put("U+030", -1.0, 1.0, 1.0);
    put("U-030", 1.0, 1.0, 1.0);
    put("U+045", -1.0, 1.0, 1.0);
    put("U-045", 1.0, 1.0, 1.0);
    put("U+090", -1.0, 0.0, 1.0);
    put("U-090", 1.0, 0.0, 1.0);
    put("U+110", -1.0, -1.0, 1.0);
    put("U-110", 1.0, -1.0, 1.0);
    put("U+135", -1.0, -1.0, 1.0);
    put("U-135", 1.0, -1.0, 1.0);
    put("U+180", 0.0, -1.0, 1.0);
    put("T+000", 0.0, 0.0, 1.0);
    put("B+000", 0.0, 1.0, -1.0);
    put("B+045", -1.0, 1.0, -1.0);
    put("B-045", 1.0, 1.0, -1.0);
    m
});

/// Allocentric coordinates for a channel name, if known
pub fn allocentric_position(name: &str) -> Option<CartesianPosition> {
    ALLO_POSITIONS.get(name).copied()
}

/// Ordered loudspeaker layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    /// Layout identifier, e.g. `0+5+0`
    pub name: String,
    /// Channels in output order
    pub channels: Vec<Channel>,
    /// Use cartesian/allocentric processing for this layout
    pub allocentric: bool,
}

impl Layout {
    /// Create an ad-hoc layout from a channel list
    pub fn new(name: &str, channels: Vec<Channel>) -> Self {
        Self {
            name: name.to_string(),
            channels,
            allocentric: false,
        }
    }

    /// Construct a catalogue layout by its BS.2051 name
    pub fn named(name: &str) -> SpatialResult<Self> {
        let channels: Vec<Channel> = match name {
            "0+2+0" => vec![Channel::new("M+030", 30.0, 0.0), Channel::new("M-030", -30.0, 0.0)],
            "0+5+0" => vec![
                Channel::new("M+030", 30.0, 0.0),
                Channel::new("M-030", -30.0, 0.0),
                Channel::new("M+000", 0.0, 0.0),
                Channel::new("LFE1", 45.0, -30.0),
                Channel::new("M+110", 110.0, 0.0),
                Channel::new("M-110", -110.0, 0.0),
            ],
            "2+5+0" => {
                let mut ch = Self::named("0+5+0")?.channels;
                ch.push(Channel::new("U+030", 30.0, 30.0));
                ch.push(Channel::new("U-030", -30.0, 30.0));
                ch
            }
            "4+5+0" => {
                let mut ch = Self::named("0+5+0")?.channels;
                ch.push(Channel::new("U+030", 30.0, 30.0));
                ch.push(Channel::new("U-030", -30.0, 30.0));
                ch.push(Channel::new("U+110", 110.0, 30.0));
                ch.push(Channel::new("U-110", -110.0, 30.0));
                ch
            }
            "4+9+0" => vec![
                Channel::new("M+030", 30.0, 0.0),
                Channel::new("M-030", -30.0, 0.0),
                Channel::new("M+000", 0.0, 0.0),
                Channel::new("LFE1", 45.0, -30.0),
                Channel::new("M+090", 90.0, 0.0),
                Channel::new("M-090", -90.0, 0.0),
                Channel::new("M+135", 135.0, 0.0),
                Channel::new("M-135", -135.0, 0.0),
                Channel::new("U+045", 45.0, 30.0),
                Channel::new("U-045", -45.0, 30.0),
                Channel::new("U+135", 135.0, 30.0),
                Channel::new("U-135", -135.0, 30.0),
                Channel::new("M+SC", 25.0, 0.0),
                Channel::new("M-SC", -25.0, 0.0),
            ],
            "9+10+3" => vec![
                Channel::new("M+060", 60.0, 0.0),
                Channel::new("M-060", -60.0, 0.0),
                Channel::new("M+000", 0.0, 0.0),
                Channel::new("LFE1", 45.0, -30.0),
                Channel::new("M+135", 135.0, 0.0),
                Channel::new("M-135", -135.0, 0.0),
                Channel::new("M+030", 30.0, 0.0),
                Channel::new("M-030", -30.0, 0.0),
                Channel::new("M+180", 180.0, 0.0),
                Channel::new("LFE2", -45.0, -30.0),
                Channel::new("M+090", 90.0, 0.0),
                Channel::new("M-090", -90.0, 0.0),
                Channel::new("U+045", 45.0, 30.0),
                Channel::new("U-045", -45.0, 30.0),
                Channel::new("U+000", 0.0, 30.0),
                Channel::new("T+000", 0.0, 90.0),
                Channel::new("U+135", 135.0, 30.0),
                Channel::new("U-135", -135.0, 30.0),
                Channel::new("U+090", 90.0, 30.0),
                Channel::new("U-090", -90.0, 30.0),
                Channel::new("U+180", 180.0, 30.0),
                Channel::new("B+000", 0.0, -30.0),
                Channel::new("B+045", 45.0, -30.0),
                Channel::new("B-045", -45.0, -30.0),
            ],
            _ => return Err(SpatialError::UnsupportedLayout(name.to_string())),
        };
        Ok(Self {
            name: name.to_string(),
            channels,
            allocentric: false,
        })
    }

    /// Opt the layout into cartesian/allocentric processing. Every
    /// non-LFE channel must have a known allocentric coordinate.
    pub fn with_allocentric(mut self, allocentric: bool) -> SpatialResult<Self> {
        if allocentric {
            for ch in self.channels.iter().filter(|c| !c.is_lfe) {
                if allocentric_position(&ch.name).is_none() {
                    return Err(SpatialError::UnsupportedLayout(format!(
                        "{}: no allocentric coordinates for {}",
                        self.name, ch.name
                    )));
                }
            }
        }
        self.allocentric = allocentric;
        Ok(self)
    }

    /// Total channel count (including LFE)
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Channel count excluding LFE
    pub fn num_channels_no_lfe(&self) -> usize {
        self.channels.iter().filter(|c| !c.is_lfe).count()
    }

    /// Index of a channel by name
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// The same layout with LFE channels removed
    pub fn without_lfe(&self) -> Layout {
        Layout {
            name: self.name.clone(),
            channels: self.channels.iter().filter(|c| !c.is_lfe).cloned().collect(),
            allocentric: self.allocentric,
        }
    }

    /// Indices of the LFE channels in output order
    pub fn lfe_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_lfe)
            .map(|(i, _)| i)
            .collect()
    }

    /// True if a gain calculator can be built for this layout
    pub fn is_supported(&self) -> bool {
        const TABLED: [&str; 5] = ["0+2+0", "2+5+0", "4+5+0", "4+9+0", "9+10+3"];
        (self.is_horizontal_only() && self.num_channels_no_lfe() >= 2)
            || TABLED.contains(&self.name.as_str())
    }

    /// True if every non-LFE channel sits on the mid layer
    pub fn is_horizontal_only(&self) -> bool {
        self.channels
            .iter()
            .filter(|c| !c.is_lfe)
            .all(|c| c.layer() == Layer::Mid && c.polar_nominal_position.elevation.abs() < 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_layouts() {
        let stereo = Layout::named("0+2+0").unwrap();
        assert_eq!(stereo.num_channels(), 2);
        assert_eq!(stereo.num_channels_no_lfe(), 2);

        let surround = Layout::named("0+5+0").unwrap();
        assert_eq!(surround.num_channels(), 6);
        assert_eq!(surround.num_channels_no_lfe(), 5);
        assert_eq!(surround.channel_index("M+110"), Some(4));
        assert_eq!(surround.lfe_indices(), vec![3]);

        let full = Layout::named("9+10+3").unwrap();
        assert_eq!(full.num_channels(), 24);
        assert_eq!(full.num_channels_no_lfe(), 22);

        assert!(Layout::named("13+13+13").is_err());
    }

    #[test]
    fn test_layers() {
        assert_eq!(Layer::of("M+030"), Layer::Mid);
        assert_eq!(Layer::of("U-135"), Layer::Upper);
        assert_eq!(Layer::of("T+000"), Layer::Top);
        assert_eq!(Layer::of("B+045"), Layer::Bottom);
        assert!(Layer::Mid.lock_priority() > Layer::Upper.lock_priority());
    }

    #[test]
    fn test_without_lfe() {
        let layout = Layout::named("0+5+0").unwrap();
        let stripped = layout.without_lfe();
        assert_eq!(stripped.num_channels(), 5);
        assert!(stripped.channels.iter().all(|c| !c.is_lfe));
    }

    #[test]
    fn test_horizontal_only() {
        assert!(Layout::named("0+5+0").unwrap().is_horizontal_only());
        assert!(!Layout::named("4+5+0").unwrap().is_horizontal_only());
    }

    #[test]
    fn test_is_supported() {
        for name in ["0+2+0", "0+5+0", "4+5+0", "9+10+3"] {
            assert!(Layout::named(name).unwrap().is_supported(), "{name}");
        }
        let odd = Layout::new(
            "odd",
            vec![
                Channel::new("M+010", 10.0, 0.0),
                Channel::new("U+010", 10.0, 30.0),
            ],
        );
        assert!(!odd.is_supported());
    }

    #[test]
    fn test_allocentric_flag() {
        let layout = Layout::named("0+5+0").unwrap().with_allocentric(true).unwrap();
        assert!(layout.allocentric);

        // A made-up channel name has no allocentric coordinates
        let odd = Layout::new("odd", vec![Channel::new("M+017", 17.0, 0.0)]);
        assert!(odd.with_allocentric(true).is_err());
    }
}
