//! Angle and matrix helpers shared by the panners

use crate::position::{CartesianPosition, PolarPosition};

/// A 3x3 matrix as rows
pub type Mat3 = [[f64; 3]; 3];

/// Map `angle` onto [0, 360)
fn wrap360(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

/// Test if `az` lies on the arc swept anti-clockwise from `start` to
/// `end`, inclusive at both ends with tolerance. `end < start` denotes
/// an arc wrapping through 360.
pub fn inside_angle_range(az: f64, start: f64, end: f64, tol: f64) -> bool {
    let span = end - start;
    let az = wrap360(az - start);
    let end = wrap360(span);
    // A whole-turn span covers the full circle; end == start covers
    // only that angle
    if span != 0.0 && end == 0.0 {
        return true;
    }
    az <= end + tol || az >= 360.0 - tol
}

/// The representative of `az` in [ref, ref + 360)
pub fn relative_angle(reference: f64, az: f64) -> f64 {
    let mut a = az;
    while a < reference {
        a += 360.0;
    }
    while a >= reference + 360.0 {
        a -= 360.0;
    }
    a
}

/// Sign of `x` as -1, 0 or 1
pub fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Local coordinate system at direction (az, el): rows are the local
/// right, front and up unit vectors.
pub fn local_coordinate_system(az: f64, el: f64) -> Mat3 {
    let right = PolarPosition::new(az - 90.0, 0.0, 1.0).to_cartesian();
    let front = PolarPosition::new(az, el, 1.0).to_cartesian();
    let up = PolarPosition::new(az, el + 90.0, 1.0).to_cartesian();
    [
        [right.x, right.y, right.z],
        [front.x, front.y, front.z],
        [up.x, up.y, up.z],
    ]
}

/// Determinant of a 3x3 matrix
pub fn determinant(m: &Mat3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Inverse of a 3x3 matrix by the cofactor formula. A singular matrix
/// yields non-finite entries which downstream gain checks reject.
pub fn inverse(m: &Mat3) -> Mat3 {
    let det = determinant(m);
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

/// Multiply a row vector by a matrix: `v * m`
pub fn row_times_mat(v: &[f64; 3], m: &Mat3) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (j, o) in out.iter_mut().enumerate() {
        for i in 0..3 {
            *o += v[i] * m[i][j];
        }
    }
    out
}

/// Order the vertices of a spherical polygon anti-clockwise as seen
/// from the origin looking towards `centre`. Returns indices into
/// `positions`.
pub fn ngon_vertex_order(positions: &[CartesianPosition], centre: &CartesianPosition) -> Vec<usize> {
    let c = centre.normalized();
    // Build a basis in the plane perpendicular to the centre direction
    let pole = if c.z.abs() < 0.9 {
        CartesianPosition::new(0.0, 0.0, 1.0)
    } else {
        CartesianPosition::new(1.0, 0.0, 0.0)
    };
    let u = pole.cross(&c).normalized();
    let v = c.cross(&u).normalized();

    let mut order: Vec<usize> = (0..positions.len()).collect();
    let angle = |p: &CartesianPosition| -> f64 { p.dot(&v).atan2(p.dot(&u)) };
    order.sort_by(|&a, &b| {
        angle(&positions[a])
            .partial_cmp(&angle(&positions[b]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}
