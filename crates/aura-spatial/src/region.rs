//! Region handlers for the point-source panner
//!
//! Each handler solves loudspeaker gains within one region of the
//! sphere partition and returns all zeros when the queried direction
//! falls outside it.

use smallvec::SmallVec;

use crate::geometry::{inverse, ngon_vertex_order, Mat3};
use crate::position::{CartesianPosition, PolarPosition};

/// Gain tolerance: slightly negative gains are rounding noise
pub const TOL: f64 = 1e-6;

/// Gains for one region; inline-allocated for every catalogue region
pub type RegionGains = SmallVec<[f64; 16]>;

fn l2_norm(gains: &[f64]) -> f64 {
    gains.iter().map(|g| g * g).sum::<f64>().sqrt()
}

/// Loudspeaker triplet solved by vector base amplitude panning
#[derive(Debug, Clone)]
pub struct Triplet {
    channels: [usize; 3],
    inverse_directions: Mat3,
}

impl Triplet {
    /// Build from three channel indices and their polar positions;
    /// distances are ignored, only the directions matter.
    pub fn new(channels: [usize; 3], positions: [PolarPosition; 3]) -> Self {
        let mut directions: Mat3 = [[0.0; 3]; 3];
        for (row, pos) in positions.iter().enumerate() {
            let unit = pos.direction();
            directions[row] = [unit.x, unit.y, unit.z];
        }
        Self {
            channels,
            inverse_directions: inverse(&directions),
        }
    }

    /// Channel indices, in input order
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    /// Gains for a unit direction; all zeros if the direction is not
    /// inside the triplet.
    pub fn calculate_gains(&self, direction: &CartesianPosition) -> [f64; 3] {
        let d = [direction.x, direction.y, direction.z];
        let mut gains = [0.0; 3];
        for (i, g) in gains.iter_mut().enumerate() {
            for (j, dj) in d.iter().enumerate() {
                *g += dj * self.inverse_directions[j][i];
            }
        }

        if gains.iter().any(|&g| g < -TOL || !g.is_finite()) {
            return [0.0; 3];
        }

        let norm = l2_norm(&gains);
        if norm <= TOL {
            return [0.0; 3];
        }
        for g in &mut gains {
            *g /= norm;
        }
        gains
    }
}

/// N-gon of loudspeakers closed by a virtual centre speaker whose gain
/// is redistributed onto the real ones.
#[derive(Debug, Clone)]
pub struct VirtualNgon {
    channels: SmallVec<[usize; 16]>,
    triplets: Vec<Triplet>,
    downmix_coefficient: f64,
}

impl VirtualNgon {
    /// Build from the channel indices, their positions and the virtual
    /// centre position. See Rec. ITU-R BS.2127-0 sec. 6.1.3.1.
    pub fn new(
        channels: &[usize],
        positions: &[PolarPosition],
        centre_position: PolarPosition,
    ) -> Self {
        let n = channels.len();
        let downmix_coefficient = 1.0 / (n as f64).sqrt();

        // Order the speakers anti-clockwise around the virtual centre
        let cart: Vec<CartesianPosition> = positions.iter().map(|p| p.direction()).collect();
        let vert_order = ngon_vertex_order(&cart, &centre_position.direction());

        // One triplet per adjacent pair plus the centre; local index n
        // denotes the virtual centre speaker
        let mut triplets = Vec::with_capacity(n);
        for i in 0..n {
            let spk1 = vert_order[i];
            let spk2 = vert_order[(i + 1) % n];
            triplets.push(Triplet::new(
                [spk1, spk2, n],
                [positions[spk1], positions[spk2], centre_position],
            ));
        }

        Self {
            channels: channels.iter().copied().collect(),
            triplets,
            downmix_coefficient,
        }
    }

    /// Channel indices, in input order
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    /// Gains for a unit direction, length `channels().len()`
    pub fn calculate_gains(&self, direction: &CartesianPosition) -> RegionGains {
        let n = self.channels.len();
        let mut gains: RegionGains = SmallVec::from_elem(0.0, n);

        // Scan for the first triplet containing the direction
        let mut triplet_gains = [0.0; 3];
        let mut found = None;
        for triplet in &self.triplets {
            triplet_gains = triplet.calculate_gains(direction);
            let sum: f64 = triplet_gains.iter().sum();
            if sum > TOL {
                found = Some(triplet);
                break;
            }
        }
        let triplet = match found {
            Some(t) => t,
            None => return gains,
        };

        // Two real speakers take their own gain; the virtual centre is
        // spread over all of them, preserving energy
        for i in 0..2 {
            gains[triplet.channels()[i]] += triplet_gains[i];
        }
        for g in gains.iter_mut() {
            *g += self.downmix_coefficient * triplet_gains[2];
        }

        let norm = l2_norm(&gains);
        for g in gains.iter_mut() {
            *g /= norm;
        }
        gains
    }
}

/// Quadrilateral region solved by splitting the bilinear panning
/// system into two univariate polynomials.
#[derive(Debug, Clone)]
pub struct QuadRegion {
    channels: [usize; 4],
    vert_order: [usize; 4],
    quad_vertices: [CartesianPosition; 4],
    poly_x: [CartesianPosition; 3],
    poly_y: [CartesianPosition; 3],
}

impl QuadRegion {
    /// Build from four channel indices and their polar positions
    pub fn new(channels: [usize; 4], positions: [PolarPosition; 4]) -> Self {
        let cart: Vec<CartesianPosition> = positions.iter().map(|p| p.direction()).collect();

        // Order the vertices anti-clockwise around their mean
        let mut centre = CartesianPosition::origin();
        for c in &cart {
            centre = centre.add(&c.scale(0.25));
        }
        let order = ngon_vertex_order(&cart, &centre);
        let vert_order = [order[0], order[1], order[2], order[3]];
        let quad_vertices = [
            cart[vert_order[0]],
            cart[vert_order[1]],
            cart[vert_order[2]],
            cart[vert_order[3]],
        ];

        // X polynomial from the ordered vertices, Y from the rotated order
        let poly_x = Self::poly_cross_terms(&quad_vertices);
        let rotated = [
            quad_vertices[1],
            quad_vertices[2],
            quad_vertices[3],
            quad_vertices[0],
        ];
        let poly_y = Self::poly_cross_terms(&rotated);

        Self {
            channels,
            vert_order,
            quad_vertices,
            poly_x,
            poly_y,
        }
    }

    /// Channel indices, in input order
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    /// Quadratic, linear and constant cross-product coefficients of the
    /// panning polynomial. See Rec. ITU-R BS.2127-0 sec. 6.1.2.3.
    fn poly_cross_terms(v: &[CartesianPosition; 4]) -> [CartesianPosition; 3] {
        let (p1, p2, p3, p4) = (v[0], v[1], v[2], v[3]);
        [
            p2.sub(&p1).cross(&p3.sub(&p4)),
            p1.cross(&p3.sub(&p4)).add(&p2.sub(&p1).cross(&p4)),
            p1.cross(&p4),
        ]
    }

    /// Solve one panning parameter; -1 when no root lands in [0, 1]
    fn panning_value(direction: &CartesianPosition, terms: &[CartesianPosition; 3]) -> f64 {
        let a = terms[0].dot(direction);
        let b = terms[1].dot(direction);
        let c = terms[2].dot(direction);

        // No quadratic term: solve bx + c = 0
        if a.abs() < TOL {
            return -c / b;
        }

        let d = b * b - 4.0 * a * c;
        if d >= 0.0 {
            let sqrt_term = d.sqrt();
            for root in [(-b + sqrt_term) / (2.0 * a), (-b - sqrt_term) / (2.0 * a)] {
                if (0.0..=1.0).contains(&root) {
                    return root;
                }
            }
        }

        -1.0
    }

    /// Gains for a unit direction, in input channel order; all zeros
    /// if the direction is not inside the region.
    pub fn calculate_gains(&self, direction: &CartesianPosition) -> [f64; 4] {
        let mut gains = [0.0; 4];

        let x = Self::panning_value(direction, &self.poly_x);
        let y = Self::panning_value(direction, &self.poly_y);
        if !(-TOL..=1.0 + TOL).contains(&x) || !(-TOL..=1.0 + TOL).contains(&y) {
            return gains;
        }

        let mut tmp = [
            (1.0 - x) * (1.0 - y),
            x * (1.0 - y),
            x * y,
            (1.0 - x) * y,
        ];

        // The reconstructed panning vector must point with the query
        let mut reconstructed = CartesianPosition::origin();
        for (g, v) in tmp.iter().zip(self.quad_vertices.iter()) {
            reconstructed = reconstructed.add(&v.scale(*g));
        }
        if reconstructed.dot(direction) < 0.0 {
            return gains;
        }

        let norm = l2_norm(&tmp);
        if norm <= TOL {
            return gains;
        }
        for g in &mut tmp {
            *g /= norm;
        }

        // Map back to the order the channels were supplied in
        for (i, g) in tmp.iter().enumerate() {
            gains[self.vert_order[i]] = *g;
        }
        gains
    }
}

/// One region of the sphere partition
#[derive(Debug, Clone)]
pub enum Region {
    Triplet(Triplet),
    VirtualNgon(VirtualNgon),
    Quad(QuadRegion),
}

impl Region {
    /// Channel indices this region pans between
    pub fn channels(&self) -> &[usize] {
        match self {
            Region::Triplet(t) => t.channels(),
            Region::VirtualNgon(n) => n.channels(),
            Region::Quad(q) => q.channels(),
        }
    }

    /// Gains for a unit direction, one per channel of this region
    pub fn calculate_gains(&self, direction: &CartesianPosition) -> RegionGains {
        match self {
            Region::Triplet(t) => t.calculate_gains(direction).iter().copied().collect(),
            Region::VirtualNgon(n) => n.calculate_gains(direction),
            Region::Quad(q) => q.calculate_gains(direction).iter().copied().collect(),
        }
    }
}
