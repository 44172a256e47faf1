//! Allocentric (room-relative) panner and extent
//!
//! Positions are cube coordinates: x in [-1, 1] left to right, y in
//! [-1, 1] back to front, z in [-1, 1] floor to ceiling. Gains are
//! separable per axis: a plane is selected by z, a row within the
//! plane by y, and speakers within the row by x.

use std::f64::consts::FRAC_PI_2;

use crate::error::{SpatialError, SpatialResult};
use crate::layout::{allocentric_position, Layout};
use crate::position::CartesianPosition;
use crate::region::TOL;

/// One-dimensional constant-power pan of `p` over sorted coordinates.
/// Returns a gain per coordinate; outside the span the nearest end
/// takes full gain.
fn axis_gains(coords: &[f64], p: f64, gains: &mut [f64]) {
    gains.iter_mut().for_each(|g| *g = 0.0);
    let first = coords[0];
    let last = coords[coords.len() - 1];
    if p <= first {
        gains[0] = 1.0;
        return;
    }
    if p >= last {
        gains[coords.len() - 1] = 1.0;
        return;
    }
    for i in 0..coords.len() - 1 {
        let (lo, hi) = (coords[i], coords[i + 1]);
        if p >= lo && p <= hi {
            if (hi - lo).abs() < 1e-12 {
                gains[i] = 1.0;
            } else {
                let t = (p - lo) / (hi - lo);
                gains[i] = (t * FRAC_PI_2).cos();
                gains[i + 1] = (t * FRAC_PI_2).sin();
            }
            return;
        }
    }
}

/// Allocentric panner for one layout (LFE excluded)
pub struct AllocentricPanner {
    /// Cube position per channel
    positions: Vec<CartesianPosition>,
    /// Planes sorted by z; rows sorted by y; speakers sorted by x.
    /// Leaves are channel indices.
    planes: Vec<Plane>,
}

struct Plane {
    z: f64,
    rows: Vec<Row>,
}

struct Row {
    y: f64,
    /// (x, channel index) sorted by x
    speakers: Vec<(f64, usize)>,
}

const COORD_TOL: f64 = 1e-6;

impl AllocentricPanner {
    /// Build from a layout; every channel needs a cube coordinate.
    pub fn new(layout: &Layout) -> SpatialResult<Self> {
        debug_assert!(layout.channels.iter().all(|c| !c.is_lfe));
        let mut positions = Vec::with_capacity(layout.num_channels());
        for ch in &layout.channels {
            let pos = allocentric_position(&ch.name).ok_or_else(|| {
                SpatialError::UnsupportedLayout(format!(
                    "{}: no allocentric coordinates for {}",
                    layout.name, ch.name
                ))
            })?;
            positions.push(pos);
        }

        // Group into planes by z, rows by y
        let mut planes: Vec<Plane> = Vec::new();
        for (idx, pos) in positions.iter().enumerate() {
            let plane_idx = planes
                .iter()
                .position(|pl| (pl.z - pos.z).abs() < COORD_TOL)
                .unwrap_or_else(|| {
                    planes.push(Plane {
                        z: pos.z,
                        rows: Vec::new(),
                    });
                    planes.len() - 1
                });
            let plane = &mut planes[plane_idx];
            let row_idx = plane
                .rows
                .iter()
                .position(|r| (r.y - pos.y).abs() < COORD_TOL)
                .unwrap_or_else(|| {
                    plane.rows.push(Row {
                        y: pos.y,
                        speakers: Vec::new(),
                    });
                    plane.rows.len() - 1
                });
            plane.rows[row_idx].speakers.push((pos.x, idx));
        }
        for plane in &mut planes {
            plane.rows.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap());
            for row in &mut plane.rows {
                row.speakers.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            }
        }
        planes.sort_by(|a, b| a.z.partial_cmp(&b.z).unwrap());

        Ok(Self { positions, planes })
    }

    /// Cube coordinates per channel, in layout order
    pub fn positions(&self) -> &[CartesianPosition] {
        &self.positions
    }

    /// Channel count of the emitted gain vectors
    pub fn num_channels(&self) -> usize {
        self.positions.len()
    }

    /// Calculate per-speaker gains for a cube position, writing into
    /// `gains` (resized to the channel count). Speakers flagged in
    /// `excluded` (when non-empty) are skipped and the remaining set
    /// re-panned without them.
    pub fn calculate_gains(
        &self,
        position: &CartesianPosition,
        excluded: &[bool],
        gains: &mut Vec<f64>,
    ) {
        gains.clear();
        gains.resize(self.positions.len(), 0.0);

        let keep = |idx: usize| excluded.is_empty() || !excluded[idx];

        // Plane gains along z over the planes that still have speakers
        let mut plane_coords: Vec<f64> = Vec::with_capacity(self.planes.len());
        let mut live_planes: Vec<&Plane> = Vec::with_capacity(self.planes.len());
        for plane in &self.planes {
            if plane
                .rows
                .iter()
                .any(|r| r.speakers.iter().any(|&(_, idx)| keep(idx)))
            {
                plane_coords.push(plane.z);
                live_planes.push(plane);
            }
        }
        if live_planes.is_empty() {
            return;
        }
        let mut plane_gains = vec![0.0; live_planes.len()];
        axis_gains(&plane_coords, position.z, &mut plane_gains);

        for (plane, &g_z) in live_planes.iter().zip(plane_gains.iter()) {
            if g_z <= TOL {
                continue;
            }
            // Row gains along y within the plane
            let live_rows: Vec<&Row> = plane
                .rows
                .iter()
                .filter(|r| r.speakers.iter().any(|&(_, idx)| keep(idx)))
                .collect();
            let row_coords: Vec<f64> = live_rows.iter().map(|r| r.y).collect();
            let mut row_gains = vec![0.0; live_rows.len()];
            axis_gains(&row_coords, position.y, &mut row_gains);

            for (row, &g_y) in live_rows.iter().zip(row_gains.iter()) {
                if g_y <= TOL {
                    continue;
                }
                // Speaker gains along x within the row
                let live: Vec<(f64, usize)> = row
                    .speakers
                    .iter()
                    .copied()
                    .filter(|&(_, idx)| keep(idx))
                    .collect();
                let x_coords: Vec<f64> = live.iter().map(|&(x, _)| x).collect();
                let mut x_gains = vec![0.0; live.len()];
                axis_gains(&x_coords, position.x, &mut x_gains);

                for (&(_, idx), &g_x) in live.iter().zip(x_gains.iter()) {
                    gains[idx] += g_z * g_y * g_x;
                }
            }
        }

        let norm = gains.iter().map(|g| g * g).sum::<f64>().sqrt();
        if norm > TOL {
            for g in gains.iter_mut() {
                *g /= norm;
            }
        } else {
            gains.iter_mut().for_each(|g| *g = 0.0);
        }
    }
}

/// Extent rendering in cube coordinates: a box of virtual sources
/// around the position, integrated through the allocentric panner.
pub struct AllocentricExtent {
    panner: AllocentricPanner,
    scratch: Vec<f64>,
}

/// Grid points per axis for the box integration
const GRID: usize = 5;
/// Extent below this size blends back into a point source
const FADE_SIZE: f64 = 0.2;

impl AllocentricExtent {
    pub fn new(layout: &Layout) -> SpatialResult<Self> {
        Ok(Self {
            panner: AllocentricPanner::new(layout)?,
            scratch: Vec::new(),
        })
    }

    /// Channel count of the emitted gain vectors
    pub fn num_channels(&self) -> usize {
        self.panner.num_channels()
    }

    /// Calculate gains for a cube position with box extent sizes,
    /// honouring the excluded-speaker mask.
    pub fn handle(
        &mut self,
        position: &CartesianPosition,
        size_x: f64,
        size_y: f64,
        size_z: f64,
        excluded: &[bool],
        gains: &mut Vec<f64>,
    ) {
        let n = self.panner.num_channels();
        self.panner.calculate_gains(position, excluded, gains);

        let max_size = size_x.max(size_y).max(size_z);
        if max_size <= 0.0 {
            return;
        }
        let amount_spread = (max_size / FADE_SIZE).min(1.0);
        let amount_point = 1.0 - amount_spread;

        // Power-sum the panner over a box of virtual sources clamped
        // to the cube
        let mut spread = vec![0.0; n];
        let half = [size_x * 0.5, size_y * 0.5, size_z * 0.5];
        for ix in 0..GRID {
            for iy in 0..GRID {
                for iz in 0..GRID {
                    let frac = |i: usize| (i as f64 / (GRID - 1) as f64) * 2.0 - 1.0;
                    let sample = CartesianPosition::new(
                        (position.x + frac(ix) * half[0]).clamp(-1.0, 1.0),
                        (position.y + frac(iy) * half[1]).clamp(-1.0, 1.0),
                        (position.z + frac(iz) * half[2]).clamp(-1.0, 1.0),
                    );
                    self.panner
                        .calculate_gains(&sample, excluded, &mut self.scratch);
                    for (s, g) in spread.iter_mut().zip(self.scratch.iter()) {
                        *s += g * g;
                    }
                }
            }
        }
        let norm = spread.iter().sum::<f64>().sqrt();
        if norm > TOL {
            for s in &mut spread {
                *s = s.sqrt() / norm;
            }
        }

        // Power-domain blend of point and spread gains
        for (g, s) in gains.iter_mut().zip(spread.iter()) {
            *g = (amount_point * *g * *g + amount_spread * s * s).sqrt();
        }
        let norm = gains.iter().map(|g| g * g).sum::<f64>().sqrt();
        if norm > TOL {
            for g in gains.iter_mut() {
                *g /= norm;
            }
        }
    }
}
