//! Zone exclusion: mask loudspeakers out and redistribute their energy
//!
//! See Rec. ITU-R BS.2127-1 sec. 7.3.12. Each excluded speaker's
//! power moves to its highest-priority group of surviving speakers;
//! groups are precomputed per channel at construction.

use crate::conversion::point_polar_to_cart;
use crate::geometry::inside_angle_range;
use crate::layout::{allocentric_position, Layer, Layout};
use crate::metadata::ExclusionZone;
use crate::position::CartesianPosition;

const ZONE_TOL: f64 = 1e-6;

fn layer_index(layer: Layer) -> usize {
    match layer {
        Layer::Bottom => 0,
        Layer::Mid => 1,
        Layer::Upper => 2,
        Layer::Top => 3,
    }
}

/// Priority of moving gain from an input layer (row) to an output
/// layer (column); lower is better.
const LAYER_PRIORITY: [[i32; 4]; 4] = [
    [0, 1, 2, 3],
    [3, 0, 1, 2],
    [3, 2, 0, 1],
    [3, 2, 1, 0],
];

/// Zone exclusion handler for one layout (LFE excluded)
pub struct ZoneExclusionHandler {
    num_channels: usize,
    /// Nominal polar angles per channel
    angles: Vec<(f64, f64)>,
    /// Room coordinates per channel, for cartesian zones
    room_positions: Vec<CartesianPosition>,
    /// Per channel: groups of candidate receivers, best first
    downmix_groups: Vec<Vec<Vec<usize>>>,
    /// Scratch: exclusion flags
    excluded: Vec<bool>,
    /// Scratch: output power per channel
    power: Vec<f64>,
}

impl ZoneExclusionHandler {
    pub fn new(layout: &Layout) -> Self {
        debug_assert!(layout.channels.iter().all(|c| !c.is_lfe));
        let num_channels = layout.num_channels();
        let angles: Vec<(f64, f64)> = layout
            .channels
            .iter()
            .map(|c| {
                (
                    c.polar_nominal_position.azimuth,
                    c.polar_nominal_position.elevation,
                )
            })
            .collect();
        let room_positions = layout
            .channels
            .iter()
            .map(|c| {
                allocentric_position(&c.name)
                    .unwrap_or_else(|| point_polar_to_cart(c.polar_nominal_position))
            })
            .collect();

        // Group the candidate receivers of each channel by priority:
        // the layer cascade first, then elevation and azimuth
        // proximity. Symmetric pairs share a group and split power.
        let mut downmix_groups = Vec::with_capacity(num_channels);
        for i in 0..num_channels {
            let in_layer = layout.channels[i].layer();
            let mut keyed: Vec<((i32, i64, i64), usize)> = Vec::with_capacity(num_channels);
            for (j, ch) in layout.channels.iter().enumerate() {
                let layer_priority = LAYER_PRIORITY[layer_index(in_layer)][layer_index(ch.layer())];
                let el_diff = (angles[i].1 - angles[j].1).abs().round() as i64;
                let az_diff = {
                    let d = (angles[i].0 - angles[j].0).abs() % 360.0;
                    d.min(360.0 - d).round() as i64
                };
                keyed.push(((layer_priority, el_diff, az_diff), j));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));

            let mut groups: Vec<Vec<usize>> = Vec::new();
            let mut last_key = None;
            for (key, j) in keyed {
                if last_key != Some(key) {
                    groups.push(Vec::new());
                    last_key = Some(key);
                }
                groups.last_mut().unwrap().push(j);
            }
            downmix_groups.push(groups);
        }

        Self {
            num_channels,
            angles,
            room_positions,
            downmix_groups,
            excluded: vec![false; num_channels],
            power: vec![0.0; num_channels],
        }
    }

    /// Compute the exclusion flags for the given zones
    pub fn get_excluded(&self, zones: &[ExclusionZone], excluded: &mut Vec<bool>) {
        excluded.clear();
        excluded.resize(self.num_channels, false);
        for (i, flag) in excluded.iter_mut().enumerate() {
            let (az, el) = self.angles[i];
            let room = &self.room_positions[i];
            for zone in zones {
                let inside = match zone {
                    ExclusionZone::Polar {
                        min_azimuth,
                        max_azimuth,
                        min_elevation,
                        max_elevation,
                    } => {
                        el >= min_elevation - ZONE_TOL
                            && el <= max_elevation + ZONE_TOL
                            && inside_angle_range(az, *min_azimuth, *max_azimuth, ZONE_TOL)
                    }
                    ExclusionZone::Cartesian {
                        min_x,
                        max_x,
                        min_y,
                        max_y,
                        min_z,
                        max_z,
                    } => {
                        room.x >= min_x - ZONE_TOL
                            && room.x <= max_x + ZONE_TOL
                            && room.y >= min_y - ZONE_TOL
                            && room.y <= max_y + ZONE_TOL
                            && room.z >= min_z - ZONE_TOL
                            && room.z <= max_z + ZONE_TOL
                    }
                };
                if inside {
                    *flag = true;
                    break;
                }
            }
        }
    }

    /// Exclusion flags for cartesian/allocentric processing; feeds the
    /// channel-lock mask and is identical to [`Self::get_excluded`].
    pub fn get_cartesian_excluded(&self, zones: &[ExclusionZone], excluded: &mut Vec<bool>) {
        self.get_excluded(zones, excluded);
    }

    /// Redistribute the gains of excluded speakers in place. Power is
    /// conserved; with every speaker excluded the result is silence.
    pub fn handle(&mut self, zones: &[ExclusionZone], gains: &mut [f64]) {
        debug_assert_eq!(gains.len(), self.num_channels);
        let mut excluded = std::mem::take(&mut self.excluded);
        self.get_excluded(zones, &mut excluded);
        let num_excluded = excluded.iter().filter(|&&e| e).count();

        if num_excluded == 0 {
            self.excluded = excluded;
            return;
        }
        if num_excluded == self.num_channels {
            gains.iter_mut().for_each(|g| *g = 0.0);
            self.excluded = excluded;
            return;
        }

        self.power.iter_mut().for_each(|p| *p = 0.0);
        for (i, g) in gains.iter().enumerate() {
            let p = g * g;
            if p == 0.0 {
                continue;
            }
            if !excluded[i] {
                self.power[i] += p;
                continue;
            }
            // Walk the priority groups for the first surviving one
            let group = self.downmix_groups[i]
                .iter()
                .find_map(|group| {
                    let alive: Vec<usize> =
                        group.iter().copied().filter(|&j| !excluded[j]).collect();
                    if alive.is_empty() {
                        None
                    } else {
                        Some(alive)
                    }
                })
                .unwrap_or_default();
            if group.is_empty() {
                continue;
            }
            let share = p / group.len() as f64;
            for j in group {
                self.power[j] += share;
            }
        }

        for (g, p) in gains.iter_mut().zip(self.power.iter()) {
            *g = p.sqrt();
        }
        self.excluded = excluded;
    }
}
