//! Channel lock: snap an object position to the nearest loudspeaker
//!
//! See Rec. ITU-R BS.2127-1 sec. 7.3.6. Polar and allocentric
//! processing differ only in the distance function.

use crate::layout::{allocentric_position, Layout};
use crate::metadata::ChannelLock;
use crate::position::CartesianPosition;

const DISTANCE_TOL: f64 = 1e-6;

/// Distance convention used when locking
enum DistanceMode {
    /// Great-circle angle in radians between unit direction vectors
    Polar,
    /// Euclidean distance between cube coordinates
    Allocentric,
}

/// Channel lock handler for one layout (LFE excluded)
pub struct ChannelLockHandler {
    mode: DistanceMode,
    /// Candidate positions: unit vectors (polar) or cube coordinates
    speaker_positions: Vec<CartesianPosition>,
    /// (lock priority, |nominal azimuth|, |nominal elevation|) per
    /// speaker, for the deterministic tie-break
    tie_break: Vec<(i32, f64, f64)>,
    /// Scratch for candidate distances
    distances: Vec<f64>,
}

impl ChannelLockHandler {
    /// Handler for polar processing: distances on the unit sphere
    pub fn polar(layout: &Layout) -> Self {
        let speaker_positions = layout
            .channels
            .iter()
            .map(|c| c.polar_position.direction())
            .collect();
        Self::build(layout, DistanceMode::Polar, speaker_positions)
    }

    /// Handler for cartesian processing: distances in room coordinates
    pub fn allocentric(layout: &Layout) -> Self {
        let speaker_positions = layout
            .channels
            .iter()
            .map(|c| allocentric_position(&c.name).unwrap_or_else(CartesianPosition::origin))
            .collect();
        Self::build(layout, DistanceMode::Allocentric, speaker_positions)
    }

    fn build(
        layout: &Layout,
        mode: DistanceMode,
        speaker_positions: Vec<CartesianPosition>,
    ) -> Self {
        debug_assert!(layout.channels.iter().all(|c| !c.is_lfe));
        let tie_break = layout
            .channels
            .iter()
            .map(|c| {
                (
                    c.layer().lock_priority(),
                    c.polar_nominal_position.azimuth.abs(),
                    c.polar_nominal_position.elevation.abs(),
                )
            })
            .collect();
        Self {
            mode,
            speaker_positions,
            tie_break,
            distances: Vec::new(),
        }
    }

    fn distance(&self, source: &CartesianPosition, speaker: &CartesianPosition) -> f64 {
        match self.mode {
            DistanceMode::Polar => {
                let src = source.normalized();
                src.dot(speaker).clamp(-1.0, 1.0).acos()
            }
            DistanceMode::Allocentric => source.distance_to(speaker),
        }
    }

    /// Return the locked position, or the original when no lock is
    /// requested or no speaker qualifies. Speakers flagged in
    /// `excluded` (when non-empty) never participate.
    pub fn handle(
        &mut self,
        channel_lock: &Option<ChannelLock>,
        position: CartesianPosition,
        excluded: &[bool],
    ) -> CartesianPosition {
        let lock = match channel_lock {
            Some(l) => l,
            None => return position,
        };

        self.distances.clear();
        for (i, spk) in self.speaker_positions.iter().enumerate() {
            let skip = !excluded.is_empty() && excluded[i];
            self.distances.push(if skip {
                f64::INFINITY
            } else {
                self.distance(&position, spk)
            });
        }

        // Optional distance gate
        if let Some(max_distance) = lock.max_distance {
            for d in self.distances.iter_mut() {
                if *d > max_distance {
                    *d = f64::INFINITY;
                }
            }
        }

        let d_min = self.distances.iter().copied().fold(f64::INFINITY, f64::min);
        if !d_min.is_finite() {
            return position;
        }

        // Stable min-selection over the tied candidates: the tuple
        // (-priority, |az|, |el|) orders them deterministically
        let mut winner: Option<usize> = None;
        for (i, &d) in self.distances.iter().enumerate() {
            if d > d_min + DISTANCE_TOL {
                continue;
            }
            let candidate = (
                -self.tie_break[i].0,
                self.tie_break[i].1,
                self.tie_break[i].2,
            );
            let better = match winner {
                None => true,
                Some(w) => {
                    let best = (-self.tie_break[w].0, self.tie_break[w].1, self.tie_break[w].2);
                    candidate
                        .partial_cmp(&best)
                        .map(|o| o.is_lt())
                        .unwrap_or(false)
                }
            };
            if better {
                winner = Some(i);
            }
        }

        match winner {
            Some(i) => self.speaker_positions[i],
            None => position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PolarPosition;

    fn layout() -> Layout {
        Layout::named("0+5+0").unwrap().without_lfe()
    }

    #[test]
    fn test_no_lock_returns_position() {
        let mut h = ChannelLockHandler::polar(&layout());
        let pos = PolarPosition::new(29.0, 0.0, 1.0).to_cartesian();
        let out = h.handle(&None, pos, &[]);
        assert!((out.x - pos.x).abs() < 1e-12);
    }

    #[test]
    fn test_lock_within_distance() {
        let mut h = ChannelLockHandler::polar(&layout());
        let pos = PolarPosition::new(29.0, 0.0, 1.0).to_cartesian();
        // 10 degrees expressed as an angle in radians
        let lock = Some(ChannelLock {
            max_distance: Some(10f64.to_radians()),
        });
        let out = h.handle(&lock, pos, &[]);
        let expected = PolarPosition::new(30.0, 0.0, 1.0).to_cartesian();
        assert!(out.distance_to(&expected) < 1e-9);
    }

    #[test]
    fn test_lock_outside_distance_keeps_position() {
        let mut h = ChannelLockHandler::polar(&layout());
        let pos = PolarPosition::new(60.0, 0.0, 1.0).to_cartesian();
        let lock = Some(ChannelLock {
            max_distance: Some(10f64.to_radians()),
        });
        let out = h.handle(&lock, pos, &[]);
        assert!(out.distance_to(&pos) < 1e-12);
    }

    #[test]
    fn test_unbounded_lock_picks_nearest() {
        let mut h = ChannelLockHandler::polar(&layout());
        let pos = PolarPosition::new(170.0, 0.0, 1.0).to_cartesian();
        let out = h.handle(&Some(ChannelLock::default()), pos, &[]);
        let expected = PolarPosition::new(110.0, 0.0, 1.0).to_cartesian();
        assert!(out.distance_to(&expected) < 1e-9);
    }

    #[test]
    fn test_tie_break_prefers_smaller_azimuth() {
        // Exactly between M+030 and M+110 the smaller |azimuth| wins
        let mut h = ChannelLockHandler::polar(&layout());
        let pos = PolarPosition::new(70.0, 0.0, 1.0).to_cartesian();
        let out = h.handle(&Some(ChannelLock::default()), pos, &[]);
        let expected = PolarPosition::new(30.0, 0.0, 1.0).to_cartesian();
        assert!(out.distance_to(&expected) < 1e-9);
    }

    #[test]
    fn test_excluded_speakers_never_lock() {
        let l = layout();
        let mut h = ChannelLockHandler::polar(&l);
        let mut excluded = vec![false; 5];
        excluded[l.channel_index("M+030").unwrap()] = true;
        let pos = PolarPosition::new(29.0, 0.0, 1.0).to_cartesian();
        let out = h.handle(&Some(ChannelLock::default()), pos, &excluded);
        // Locks to the next nearest speaker instead
        let expected = PolarPosition::new(0.0, 0.0, 1.0).to_cartesian();
        assert!(out.distance_to(&expected) < 1e-9);
    }

    #[test]
    fn test_growing_distance_expands_candidates() {
        // Monotonicity: a larger max distance never loses a candidate
        let mut h = ChannelLockHandler::polar(&layout());
        let pos = PolarPosition::new(29.0, 0.0, 1.0).to_cartesian();
        let mut locked = Vec::new();
        for deg in [0.5f64, 2.0, 10.0, 60.0, 180.0] {
            let lock = Some(ChannelLock {
                max_distance: Some(deg.to_radians()),
            });
            let out = h.handle(&lock, pos, &[]);
            locked.push(out.distance_to(&pos) > 1e-9);
        }
        // Once locking starts it never reverts to the raw position
        let first = locked.iter().position(|&l| l).unwrap();
        assert!(locked[first..].iter().all(|&l| l));
    }
}
