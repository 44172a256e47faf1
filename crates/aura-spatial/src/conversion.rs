//! ADM metadata conversion between polar and cartesian conventions
//!
//! This is not a geometric coordinate conversion: the ADM `cartesian`
//! flag selects a piecewise remapping of the sphere onto the unit cube
//! (Rec. ITU-R BS.2127-1 sec. 10). Use [`crate::position`] for plain
//! coordinate transforms.

use std::f64::consts::PI;

use crate::geometry::{inside_angle_range, local_coordinate_system, relative_angle, sgn};
use crate::metadata::ObjectMetadata;
use crate::position::{CartesianPosition, PolarPosition, Position};

const EL_TOP: f64 = 30.0;
const EL_DASH_TOP: f64 = 45.0;
const TOL: f64 = 1e-10;

/// One azimuth sector of the mapping: the azimuth range and the cube
/// vertices its ends map to.
struct Sector {
    az_l: f64,
    az_r: f64,
    pos_l: (f64, f64),
    pos_r: (f64, f64),
}

static SECTORS: [Sector; 5] = [
    Sector { az_l: 30.0, az_r: 0.0, pos_l: (-1.0, 1.0), pos_r: (0.0, 1.0) },
    Sector { az_l: 0.0, az_r: -30.0, pos_l: (0.0, 1.0), pos_r: (1.0, 1.0) },
    Sector { az_l: -30.0, az_r: -110.0, pos_l: (1.0, 1.0), pos_r: (1.0, -1.0) },
    Sector { az_l: -110.0, az_r: 110.0, pos_l: (1.0, -1.0), pos_r: (-1.0, -1.0) },
    Sector { az_l: 110.0, az_r: 30.0, pos_l: (-1.0, -1.0), pos_r: (-1.0, 1.0) },
];

/// Sector lookup for the polar-to-cartesian direction
fn find_sector(az: f64) -> &'static Sector {
    const RANGES: [(f64, f64); 5] = [
        (0.0, 30.0),
        (-30.0, 0.0),
        (-110.0, -30.0),
        (110.0, -110.0),
        (30.0, 110.0),
    ];
    for (i, (start, end)) in RANGES.iter().enumerate() {
        if inside_angle_range(az, *start, *end, TOL) {
            return &SECTORS[i];
        }
    }
    // Unreachable for finite azimuths; the ranges tile the circle
    &SECTORS[3]
}

/// Sector lookup for the cartesian-to-polar direction: the same five
/// cube regions reached through 45-degree boundaries.
fn find_cart_sector(az: f64) -> &'static Sector {
    const RANGES: [(f64, f64); 5] = [
        (0.0, 45.0),
        (-45.0, 0.0),
        (-135.0, -45.0),
        (135.0, -135.0),
        (45.0, 135.0),
    ];
    for (i, (start, end)) in RANGES.iter().enumerate() {
        if inside_angle_range(az, *start, *end, TOL) {
            return &SECTORS[i];
        }
    }
    &SECTORS[3]
}

/// Map an azimuth between `az_l` and `az_r` to a linear coordinate in
/// [0, 1]. Angles in degrees. See Rec. ITU-R BS.2127-1 sec. 10.1.
pub fn map_az_to_linear(az_l: f64, az_r: f64, az: f64) -> f64 {
    let az_mid = 0.5 * (az_l + az_r);
    let az_range = az_r - az_mid;
    let az_rel = az - az_mid;
    let g_r = 0.5 * (1.0 + (az_rel.to_radians()).tan() / (az_range.to_radians()).tan());

    2.0 / PI * g_r.atan2(1.0 - g_r)
}

/// Inverse of [`map_az_to_linear`]
pub fn map_linear_to_az(az_l: f64, az_r: f64, x: f64) -> f64 {
    let az_mid = 0.5 * (az_l + az_r);
    let az_range = az_r - az_mid;
    let g_dash_l = (x * PI / 2.0).cos();
    let g_dash_r = (x * PI / 2.0).sin();
    let g_r = g_dash_r / (g_dash_l + g_dash_r);
    let az_rel = (2.0 * (g_r - 0.5) * (az_range.to_radians()).tan()).atan().to_degrees();

    az_mid + az_rel
}

/// Convert an ADM polar position to the ADM cartesian convention
pub fn point_polar_to_cart(polar: PolarPosition) -> CartesianPosition {
    let az = polar.azimuth;
    let el = polar.elevation;
    let d = polar.distance;

    let (z, r_xy) = if el.abs() > EL_TOP {
        let el_dash = EL_DASH_TOP + (90.0 - EL_DASH_TOP) * (el.abs() - EL_TOP) / (90.0 - EL_TOP);
        (d * sgn(el), d * ((90.0 - el_dash).to_radians()).tan())
    } else {
        let el_dash = EL_DASH_TOP * el / EL_TOP;
        (d * (el_dash.to_radians()).tan(), d)
    };

    let sector = find_sector(az);
    let (x_l, y_l) = sector.pos_l;
    let (x_r, y_r) = sector.pos_r;

    let az_dash = relative_angle(sector.az_r, az);
    let az_dash_l = relative_angle(sector.az_r, sector.az_l);
    let p = map_az_to_linear(az_dash_l, sector.az_r, az_dash);
    let x = r_xy * (x_l + p * (x_r - x_l));
    let y = r_xy * (y_l + p * (y_r - y_l));

    CartesianPosition::new(x, y, z)
}

/// Convert an ADM cartesian position to the ADM polar convention
pub fn point_cart_to_polar(cart: CartesianPosition) -> PolarPosition {
    let (x, y, z) = (cart.x, cart.y, cart.z);

    if x.abs() < TOL && y.abs() < TOL {
        if z.abs() < TOL {
            return PolarPosition::new(0.0, 0.0, 0.0);
        }
        return PolarPosition::new(0.0, 90.0 * sgn(z), z.abs());
    }

    let az_dash = -x.atan2(y).to_degrees();
    let sector = find_cart_sector(az_dash);
    let (x_l, y_l) = sector.pos_l;
    let (x_r, y_r) = sector.pos_r;

    let det = x_l * y_r - y_l * x_r;
    let inv = [[y_r / det, -y_l / det], [-x_r / det, x_l / det]];
    let g = [
        x * inv[0][0] + y * inv[1][0],
        x * inv[0][1] + y * inv[1][1],
    ];
    let r_xy = g[0] + g[1];
    let az_dash_l = relative_angle(sector.az_r, sector.az_l);
    let az_rel = map_linear_to_az(az_dash_l, sector.az_r, g[1] / r_xy);
    let az = relative_angle(-180.0, az_rel);
    let el_dash = (z / r_xy).atan().to_degrees();

    let (el, d) = if el_dash.abs() > EL_DASH_TOP {
        let el = (EL_TOP + (90.0 - EL_TOP) * (el_dash.abs() - EL_DASH_TOP) / (90.0 - EL_DASH_TOP))
            .abs()
            * sgn(el_dash);
        (el, z.abs())
    } else {
        (el_dash * EL_TOP / EL_DASH_TOP, r_xy)
    };

    PolarPosition::new(az, el, d)
}

/// Polar extent (width, height, depth in degrees/distance) to cartesian
/// extent sizes. See Rec. ITU-R BS.2127-1 sec. 10.2.1.
pub fn whd2xyz(w: f64, h: f64, d: f64) -> (f64, f64, f64) {
    let s_xw = if w < 180.0 { (w * 0.5).to_radians().sin() } else { 1.0 };
    let s_yw = 0.5 * (1.0 - (w * 0.5).to_radians().cos());
    let s_zh = if h < 180.0 { (h * 0.5).to_radians().sin() } else { 1.0 };
    let s_yh = 0.5 * (1.0 - (h * 0.5).to_radians().cos());

    (s_xw, s_yw.max(s_yh).max(d), s_zh)
}

/// Cartesian extent sizes back to polar width, height and depth.
/// See Rec. ITU-R BS.2127-1 sec. 10.2.2.
pub fn xyz2whd(s_x: f64, s_y: f64, s_z: f64) -> (f64, f64, f64) {
    let w_sx = 2.0 * s_x.clamp(-1.0, 1.0).asin().to_degrees();
    let w_sy = 2.0 * (1.0 - 2.0 * s_y).clamp(-1.0, 1.0).acos().to_degrees();
    let w = w_sx + s_x * (w_sy - w_sx).max(0.0);

    let h_sz = 2.0 * s_z.clamp(-1.0, 1.0).asin().to_degrees();
    let h_sy = 2.0 * (1.0 - 2.0 * s_y).clamp(-1.0, 1.0).acos().to_degrees();
    let h = h_sz + s_z * (h_sy - h_sz).max(0.0);

    let (_, s_eq_y, _) = whd2xyz(w, h, 0.0);
    let d = (s_y - s_eq_y).max(0.0);

    (w, h, d)
}

/// Project extent sizes through the local coordinate system at the
/// source direction and take the per-column norms.
fn rotate_extent(az: f64, el: f64, sizes: [f64; 3]) -> [f64; 3] {
    let basis = local_coordinate_system(az, el);
    let mut out = [0.0; 3];
    for (col, o) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for row in 0..3 {
            let v = sizes[row] * basis[row][col];
            sum += v * v;
        }
        *o = sum.sqrt();
    }
    out
}

/// Cartesian position + extent to polar position + (width, height, depth)
pub fn extent_cart_to_polar(
    pos: CartesianPosition,
    s_x: f64,
    s_y: f64,
    s_z: f64,
) -> (PolarPosition, [f64; 3]) {
    let polar = point_cart_to_polar(pos);
    let rotated = rotate_extent(polar.azimuth, polar.elevation, [s_x, s_y, s_z]);
    let (w, h, d) = xyz2whd(rotated[0], rotated[1], rotated[2]);
    (polar, [w, h, d])
}

/// Polar position + extent to cartesian position + (s_x, s_y, s_z)
pub fn extent_polar_to_cart(
    polar: PolarPosition,
    width: f64,
    height: f64,
    depth: f64,
) -> (CartesianPosition, [f64; 3]) {
    let cart = point_polar_to_cart(polar);
    let (s_x, s_y, s_z) = whd2xyz(width, height, depth);
    let rotated = rotate_extent(polar.azimuth, polar.elevation, [s_x, s_y, s_z]);
    (cart, rotated)
}

/// Convert a metadata block to the polar convention. Blocks that are
/// already polar are returned unchanged.
pub fn to_polar(metadata: &ObjectMetadata) -> ObjectMetadata {
    let mut out = metadata.clone();
    if metadata.cartesian && !metadata.position.is_polar() {
        let cart = metadata.position.cartesian();
        let (polar, whd) =
            extent_cart_to_polar(cart, metadata.width, metadata.height, metadata.depth);
        out.position = Position::Polar(polar);
        out.width = whd[0];
        out.height = whd[1];
        out.depth = whd[2];

        // Divergence is deliberately carried over unchanged: the
        // conversion of BS.2127-1 sec. 10.3 gives implausible values.
        out.cartesian = false;
    }
    out
}

/// Convert a metadata block to the cartesian convention. Blocks that
/// are already cartesian are returned unchanged.
pub fn to_cartesian(metadata: &ObjectMetadata) -> ObjectMetadata {
    let mut out = metadata.clone();
    if !metadata.cartesian && metadata.position.is_polar() {
        let polar = metadata.position.polar();
        let (cart, sizes) =
            extent_polar_to_cart(polar, metadata.width, metadata.height, metadata.depth);
        out.position = Position::Cartesian(cart);
        out.width = sizes[0];
        out.height = sizes[1];
        out.depth = sizes[2];

        // Divergence carried over unchanged, as in to_polar.
        out.cartesian = true;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_corners() {
        // The five sector vertices land on the cube corners
        let cases = [
            (30.0, (-1.0, 1.0)),
            (0.0, (0.0, 1.0)),
            (-30.0, (1.0, 1.0)),
            (-110.0, (1.0, -1.0)),
            (110.0, (-1.0, -1.0)),
        ];
        for (az, (x, y)) in cases {
            let c = point_polar_to_cart(PolarPosition::new(az, 0.0, 1.0));
            assert!((c.x - x).abs() < 1e-9, "x at az={az}");
            assert!((c.y - y).abs() < 1e-9, "y at az={az}");
            assert!(c.z.abs() < 1e-9, "z at az={az}");
        }
    }

    #[test]
    fn test_elevation_split() {
        // 30 degrees elevation maps to the cube diagonal (el' = 45)
        let c = point_polar_to_cart(PolarPosition::new(0.0, 30.0, 1.0));
        assert!((c.z - 1.0).abs() < 1e-9);
        assert!((c.y - 1.0).abs() < 1e-9);

        // Straight up
        let c = point_polar_to_cart(PolarPosition::new(0.0, 90.0, 1.0));
        assert!(c.x.abs() < 1e-9 && c.y.abs() < 1e-9);
        assert!((c.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_round_trip() {
        for az_i in -17..=18 {
            for el_i in -8..=8 {
                for &d in &[0.3, 1.0] {
                    let p = PolarPosition::new(az_i as f64 * 10.0, el_i as f64 * 11.0, d);
                    let back = point_cart_to_polar(point_polar_to_cart(p));
                    let mut az_err = (back.azimuth - p.azimuth).abs() % 360.0;
                    if az_err > 180.0 {
                        az_err = 360.0 - az_err;
                    }
                    if p.elevation.abs() < 90.0 - 1e-6 {
                        assert!(az_err < 1e-8, "azimuth {p:?} -> {back:?}");
                    }
                    assert!((back.elevation - p.elevation).abs() < 1e-8, "elevation {p:?}");
                    assert!((back.distance - p.distance).abs() < 1e-8, "distance {p:?}");
                }
            }
        }
    }

    #[test]
    fn test_degenerate_axis() {
        let p = point_cart_to_polar(CartesianPosition::new(0.0, 0.0, 0.5));
        assert!((p.elevation - 90.0).abs() < 1e-12);
        assert!((p.distance - 0.5).abs() < 1e-12);

        let p = point_cart_to_polar(CartesianPosition::new(0.0, 0.0, -0.5));
        assert!((p.elevation + 90.0).abs() < 1e-12);

        let p = point_cart_to_polar(CartesianPosition::origin());
        assert!(p.distance.abs() < 1e-12);
    }

    #[test]
    fn test_extent_round_trip() {
        // The correction terms cancel when width == height and the
        // depth stays below the dome term, making the pair inverse.
        let (x, y, z) = whd2xyz(60.0, 60.0, 0.02);
        let (w, h, d) = xyz2whd(x, y, z);
        assert!((w - 60.0).abs() < 1e-6);
        assert!((h - 60.0).abs() < 1e-6);
        assert!((d - 0.02).abs() < 1e-6);

        // Sizes beyond 180 are recovered through the y component
        let (x, y, z) = whd2xyz(200.0, 200.0, 0.0);
        let (w, h, _) = xyz2whd(x, y, z);
        assert!((w - 200.0).abs() < 1e-6);
        assert!((h - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_extent_inverse_is_lossy_off_diagonal() {
        // A rectangular extent picks up the larger dimension's dome
        // term on the way back; the dominant dimension survives.
        let (x, y, z) = whd2xyz(60.0, 30.0, 0.0);
        let (w, h, _) = xyz2whd(x, y, z);
        assert!((w - 60.0).abs() < 1e-6);
        assert!(h >= 30.0);
    }

    #[test]
    fn test_metadata_round_trip_front() {
        // Straight ahead the local frame is the identity, so the
        // extent rotation cancels exactly even for anisotropic sizes.
        let md = ObjectMetadata {
            position: PolarPosition::new(0.0, 0.0, 0.8).into(),
            width: 35.0,
            height: 15.0,
            depth: 0.1,
            ..Default::default()
        };
        let back = to_polar(&to_cartesian(&md));
        let p = back.position.polar();
        assert!(p.azimuth.abs() < 1e-6);
        assert!(p.elevation.abs() < 1e-6);
        assert!((p.distance - 0.8).abs() < 1e-6);
        assert!((back.width - 35.0).abs() < 1e-6);
        assert!((back.height - 15.0).abs() < 1e-6);
        assert!((back.depth - 0.1).abs() < 1e-6);
        assert!(!back.cartesian);
    }

    #[test]
    fn test_metadata_round_trip_oblique_position() {
        // The position survives the round trip at any direction; the
        // extent rotation is only guaranteed to cancel at the front.
        let md = ObjectMetadata {
            position: PolarPosition::new(42.0, 12.0, 1.0).into(),
            width: 60.0,
            height: 60.0,
            depth: 0.0,
            ..Default::default()
        };
        let back = to_polar(&to_cartesian(&md));
        let p = back.position.polar();
        assert!((p.azimuth - 42.0).abs() < 1e-6);
        assert!((p.elevation - 12.0).abs() < 1e-6);
        assert!((p.distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_divergence_untouched_by_conversion() {
        let md = ObjectMetadata {
            position: PolarPosition::new(0.0, 0.0, 1.0).into(),
            object_divergence: Some(crate::metadata::ObjectDivergence {
                value: 0.4,
                azimuth_range: 30.0,
                position_range: 0.0,
            }),
            ..Default::default()
        };
        let converted = to_cartesian(&md);
        let div = converted.object_divergence.unwrap();
        assert!((div.value - 0.4).abs() < 1e-12);
        assert!((div.azimuth_range - 30.0).abs() < 1e-12);
    }
}
