//! Extent panning: spatial integration of a panner over a spread source
//!
//! A spread source is integrated over a fixed grid of virtual point
//! sources weighted by a stadium-shaped window around the source
//! direction (Rec. ITU-R BS.2127-1 sec. 7.3.8). The same integration
//! drives either loudspeaker gains or Ambisonic coefficients.

use crate::error::SpatialResult;
use crate::geometry::local_coordinate_system;
use crate::hoa::{encode_direction, AmbisonicOrder};
use crate::layout::Layout;
use crate::point_source::PointSourcePanner;
use crate::position::{CartesianPosition, PolarPosition};
use crate::region::TOL;

/// Fade width of the spread window, degrees
const FADE_WIDTH: f64 = 10.0;
/// Elevation rows of the virtual source grid (5 degree spacing)
const N_ROWS: usize = 37;

/// Modify an extent angle for the distance of the source: a nearby
/// source subtends a larger angle. See BS.2127-1 sec. 7.3.8.2.1.
fn extent_mod(extent: f64, distance: f64) -> f64 {
    let min_size = 0.2;
    let size = min_size + (1.0 - min_size) * extent / 360.0;
    let extent_1 = 4.0 * size.atan2(1.0).to_degrees();
    let e = 4.0 * size.atan2(distance).to_degrees();

    // Piecewise-linear map through [0, extent_1, 360] -> [0, extent, 360]
    if e <= extent_1 {
        e / extent_1 * extent
    } else {
        extent + (e - extent_1) / (360.0 - extent_1) * (360.0 - extent)
    }
}

/// The virtual source grid: evenly spaced elevation rows with azimuth
/// counts proportional to the row circumference.
fn generate_grid() -> Vec<PolarPosition> {
    let mut positions = Vec::new();
    for row in 0..N_ROWS {
        let el = -90.0 + 180.0 * row as f64 / (N_ROWS - 1) as f64;
        let n_points = ((2 * (N_ROWS - 1)) as f64 * el.to_radians().cos())
            .round()
            .max(1.0) as usize;
        for i in 0..n_points {
            positions.push(PolarPosition::new(i as f64 * 360.0 / n_points as f64, el, 1.0));
        }
    }
    positions
}

/// Stadium-shaped weight window around a source direction
struct WeightFunction {
    /// Rows of the local frame at the source direction
    basis: [[f64; 3]; 3],
    /// Half extent along the major axis, degrees
    half_major: f64,
    /// Circle radius (half extent of the minor axis), degrees
    radius: f64,
    /// The major axis is azimuth when true, elevation otherwise
    azimuth_major: bool,
}

impl WeightFunction {
    fn new(position: &CartesianPosition, width: f64, height: f64) -> Self {
        let polar = position.to_polar();
        let basis = local_coordinate_system(polar.azimuth, polar.elevation);
        let half_w = width * 0.5;
        let half_h = height * 0.5;
        Self {
            basis,
            half_major: half_w.max(half_h),
            radius: half_w.min(half_h),
            azimuth_major: half_w >= half_h,
        }
    }

    /// Weight in [0, 1] for a virtual source direction
    fn evaluate(&self, direction: &CartesianPosition) -> f64 {
        // Project into the local frame: x right, y front, z up
        let local = CartesianPosition::new(
            self.basis[0][0] * direction.x + self.basis[0][1] * direction.y + self.basis[0][2] * direction.z,
            self.basis[1][0] * direction.x + self.basis[1][1] * direction.y + self.basis[1][2] * direction.z,
            self.basis[2][0] * direction.x + self.basis[2][1] * direction.y + self.basis[2][2] * direction.z,
        );
        let local_az = (-local.x).atan2(local.y).to_degrees();
        let local_el = local.z.clamp(-1.0, 1.0).asin().to_degrees();

        // Clamp onto the segment between the two circle centres and
        // measure the great-circle distance from there
        let span = (self.half_major - self.radius).max(0.0);
        let centre = if self.azimuth_major {
            let c_az = local_az.clamp(-span, span);
            PolarPosition::new(c_az, 0.0, 1.0)
        } else {
            let c_el = local_el.clamp(-span, span);
            PolarPosition::new(0.0, c_el, 1.0)
        };
        let centre_dir = centre.to_cartesian();
        let dot = (centre_dir.x * local.x + centre_dir.y * local.y + centre_dir.z * local.z)
            .clamp(-1.0, 1.0);
        let distance = dot.acos().to_degrees();

        // Flat inside the stadium, linear fade outside
        if distance <= self.radius {
            1.0
        } else if distance >= self.radius + FADE_WIDTH {
            0.0
        } else {
            1.0 - (distance - self.radius) / FADE_WIDTH
        }
    }
}

/// Integrates a gain vector source over the virtual grid
struct SpreadingPanner {
    directions: Vec<CartesianPosition>,
    /// Precomputed vectors per grid position, flattened
    values: Vec<f64>,
    width: usize,
}

impl SpreadingPanner {
    fn new<F: FnMut(&PolarPosition, &mut Vec<f64>)>(width: usize, mut source: F) -> Self {
        let grid = generate_grid();
        let mut values = Vec::with_capacity(grid.len() * width);
        let mut scratch = Vec::new();
        for pos in &grid {
            source(pos, &mut scratch);
            values.extend_from_slice(&scratch);
        }
        Self {
            directions: grid.iter().map(|p| p.direction()).collect(),
            values,
            width,
        }
    }

    /// Weighted sum of the per-position vectors, unit L2 normalized
    fn values_for_weight(&self, weight: &WeightFunction, out: &mut Vec<f64>) {
        out.clear();
        out.resize(self.width, 0.0);
        for (i, dir) in self.directions.iter().enumerate() {
            let w = weight.evaluate(dir);
            if w <= 0.0 {
                continue;
            }
            let row = &self.values[i * self.width..(i + 1) * self.width];
            for (o, v) in out.iter_mut().zip(row.iter()) {
                *o += w * v;
            }
        }
        let norm = out.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > TOL {
            for o in out.iter_mut() {
                *o /= norm;
            }
        }
    }
}

/// Polar extent handler over a loudspeaker point-source panner
pub struct PolarExtentHandler {
    panner: PointSourcePanner,
    spreading: SpreadingPanner,
    point_scratch: Vec<f64>,
    spread_scratch: Vec<f64>,
    pv_scratch: Vec<f64>,
}

impl PolarExtentHandler {
    /// Build for a layout (LFE excluded)
    pub fn new(layout: &Layout) -> SpatialResult<Self> {
        let panner = PointSourcePanner::new(layout)?;
        let width = panner.num_channels();
        let spreading = SpreadingPanner::new(width, |pos, out| {
            panner.calculate_gains(&pos.to_cartesian(), out);
        });
        Ok(Self {
            panner,
            spreading,
            point_scratch: Vec::new(),
            spread_scratch: Vec::new(),
            pv_scratch: Vec::new(),
        })
    }

    /// Channel count of the emitted gain vectors
    pub fn num_channels(&self) -> usize {
        self.panner.num_channels()
    }

    /// Calculate gains for a source with polar extent. Width and
    /// height are angles in degrees, depth is a distance.
    pub fn handle(
        &mut self,
        position: &CartesianPosition,
        width: f64,
        height: f64,
        depth: f64,
        gains: &mut Vec<f64>,
    ) {
        let n = self.panner.num_channels();
        gains.clear();
        gains.resize(n, 0.0);

        let distance = position.norm();
        let mut distances = [distance, 0.0];
        let n_distances = if depth != 0.0 {
            distances[0] = (distance + depth * 0.5).max(0.0);
            distances[1] = (distance - depth * 0.5).max(0.0);
            2
        } else {
            1
        };

        for &d in &distances[..n_distances] {
            let w = extent_mod(width, d);
            let h = extent_mod(height, d);
            self.calc_pv_spread(position, w, h);
            for (g, pv) in gains.iter_mut().zip(self.pv_scratch.iter()) {
                *g += pv * pv / n_distances as f64;
            }
        }
        for g in gains.iter_mut() {
            *g = g.sqrt();
        }
    }

    /// Crossfade between the point-source gains and the spread
    /// integration, in the power domain.
    fn calc_pv_spread(&mut self, position: &CartesianPosition, width: f64, height: f64) {
        let n = self.panner.num_channels();
        let amount_spread = (width.max(height) / FADE_WIDTH).clamp(0.0, 1.0);
        let amount_point = 1.0 - amount_spread;

        self.pv_scratch.clear();
        self.pv_scratch.resize(n, 0.0);

        if amount_point > 1e-10 {
            self.panner.calculate_gains(position, &mut self.point_scratch);
            for (pv, p) in self.pv_scratch.iter_mut().zip(self.point_scratch.iter()) {
                *pv += amount_point * p * p;
            }
        }
        if amount_spread > 1e-10 {
            // The spread window never collapses below half the fade
            let width = width.max(FADE_WIDTH / 2.0);
            let height = height.max(FADE_WIDTH / 2.0);
            let weight = WeightFunction::new(position, width, height);
            self.spreading.values_for_weight(&weight, &mut self.spread_scratch);
            for (pv, s) in self.pv_scratch.iter_mut().zip(self.spread_scratch.iter()) {
                *pv += amount_spread * s * s;
            }
        }
        for pv in self.pv_scratch.iter_mut() {
            *pv = pv.sqrt();
        }
    }
}

/// Polar extent handler producing Ambisonic coefficients
pub struct AmbisonicPolarExtentHandler {
    order: AmbisonicOrder,
    spreading: SpreadingPanner,
    point_scratch: Vec<f64>,
    spread_scratch: Vec<f64>,
}

impl AmbisonicPolarExtentHandler {
    pub fn new(order: AmbisonicOrder) -> Self {
        let width = order.channel_count();
        let spreading = SpreadingPanner::new(width, |pos, out| {
            encode_direction(pos.azimuth, pos.elevation, order, out);
        });
        Self {
            order,
            spreading,
            point_scratch: Vec::new(),
            spread_scratch: Vec::new(),
        }
    }

    /// Coefficient count of the emitted vectors
    pub fn num_channels(&self) -> usize {
        self.order.channel_count()
    }

    /// Calculate Ambisonic coefficients for a source with polar
    /// extent. A zero extent reproduces the plain encoding of the
    /// direction; spread sources keep its L2 norm.
    pub fn handle(
        &mut self,
        position: &CartesianPosition,
        width: f64,
        height: f64,
        depth: f64,
        coeffs: &mut Vec<f64>,
    ) {
        let n = self.order.channel_count();
        coeffs.clear();
        coeffs.resize(n, 0.0);

        let polar = position.to_polar();
        encode_direction(polar.azimuth, polar.elevation, self.order, &mut self.point_scratch);
        let reference_norm = self
            .point_scratch
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt();

        let distance = position.norm();
        let mut distances = [distance, 0.0];
        let n_distances = if depth != 0.0 {
            distances[0] = (distance + depth * 0.5).max(0.0);
            distances[1] = (distance - depth * 0.5).max(0.0);
            2
        } else {
            1
        };

        // Coefficients are signed: blend amplitudes, not powers
        for &d in &distances[..n_distances] {
            let w = extent_mod(width, d);
            let h = extent_mod(height, d);
            let amount_spread = (w.max(h) / FADE_WIDTH).clamp(0.0, 1.0);
            let amount_point = 1.0 - amount_spread;

            if amount_point > 1e-10 {
                for (c, p) in coeffs.iter_mut().zip(self.point_scratch.iter()) {
                    *c += amount_point * p / n_distances as f64;
                }
            }
            if amount_spread > 1e-10 {
                let w = w.max(FADE_WIDTH / 2.0);
                let h = h.max(FADE_WIDTH / 2.0);
                let weight = WeightFunction::new(position, w, h);
                self.spreading.values_for_weight(&weight, &mut self.spread_scratch);
                for (c, s) in coeffs.iter_mut().zip(self.spread_scratch.iter()) {
                    *c += amount_spread * s * reference_norm / n_distances as f64;
                }
            }
        }

        // Rescale to the reference encoding energy
        let norm = coeffs.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > TOL && reference_norm > TOL {
            let k = reference_norm / norm;
            for c in coeffs.iter_mut() {
                *c *= k;
            }
        }
    }
}
