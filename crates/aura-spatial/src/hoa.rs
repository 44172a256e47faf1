//! Spherical-harmonic encoding for the ambisonic extent path
//!
//! ACN channel ordering with SN3D normalization, orders 0 to 3.

use serde::{Deserialize, Serialize};

use crate::error::{SpatialError, SpatialResult};

/// Ambisonic order (determines spatial resolution)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbisonicOrder {
    /// First order (4 channels)
    First = 1,
    /// Second order (9 channels)
    Second = 2,
    /// Third order (16 channels)
    Third = 3,
}

impl AmbisonicOrder {
    /// Channel count for this order
    pub fn channel_count(&self) -> usize {
        let n = *self as usize;
        (n + 1) * (n + 1)
    }

    /// Create from an order number
    pub fn from_order(order: usize) -> SpatialResult<Self> {
        match order {
            1 => Ok(AmbisonicOrder::First),
            2 => Ok(AmbisonicOrder::Second),
            3 => Ok(AmbisonicOrder::Third),
            _ => Err(SpatialError::InvalidAmbisonicOrder(order)),
        }
    }

    /// Order number
    pub fn as_usize(&self) -> usize {
        *self as usize
    }
}

/// ACN channel index from (order, degree)
pub fn acn_index(order: i32, degree: i32) -> usize {
    (order * order + order + degree) as usize
}

/// Encode a direction into spherical-harmonic coefficients, ACN
/// ordering, SN3D normalization. `coeffs` is resized to the channel
/// count of `order`.
pub fn encode_direction(azimuth: f64, elevation: f64, order: AmbisonicOrder, coeffs: &mut Vec<f64>) {
    let az = azimuth.to_radians();
    let el = elevation.to_radians();

    let cos_el = el.cos();
    let sin_el = el.sin();

    coeffs.clear();
    coeffs.resize(order.channel_count(), 0.0);

    let n = order.as_usize();

    // Order 0 (omnidirectional)
    coeffs[0] = 1.0;

    if n >= 1 {
        coeffs[1] = cos_el * az.sin(); // Y
        coeffs[2] = sin_el; // Z
        coeffs[3] = cos_el * az.cos(); // X
    }

    if n >= 2 {
        let cos2_az = (2.0 * az).cos();
        let sin2_az = (2.0 * az).sin();
        let cos2_el = cos_el * cos_el;

        coeffs[4] = 0.866_025_403_784_438_6 * cos2_el * sin2_az; // V
        coeffs[5] = 0.866_025_403_784_438_6 * (2.0 * el).sin() * az.sin(); // T
        coeffs[6] = 0.5 * (3.0 * sin_el * sin_el - 1.0); // R
        coeffs[7] = 0.866_025_403_784_438_6 * (2.0 * el).sin() * az.cos(); // S
        coeffs[8] = 0.866_025_403_784_438_6 * cos2_el * cos2_az; // U
    }

    if n >= 3 {
        let cos2_az = (2.0 * az).cos();
        let sin2_az = (2.0 * az).sin();
        let cos3_az = (3.0 * az).cos();
        let sin3_az = (3.0 * az).sin();
        let cos3_el = cos_el * cos_el * cos_el;

        coeffs[9] = 0.790_569_415_042_094_8 * cos3_el * sin3_az; // Q
        coeffs[10] = 1.936_491_673_103_708 * sin_el * cos_el * cos_el * sin2_az; // O
        coeffs[11] = 0.612_372_435_695_794_5 * cos_el * (5.0 * sin_el * sin_el - 1.0) * az.sin(); // M
        coeffs[12] = 0.5 * sin_el * (5.0 * sin_el * sin_el - 3.0); // K
        coeffs[13] = 0.612_372_435_695_794_5 * cos_el * (5.0 * sin_el * sin_el - 1.0) * az.cos(); // L
        coeffs[14] = 1.936_491_673_103_708 * sin_el * cos_el * cos_el * cos2_az; // N
        coeffs[15] = 0.790_569_415_042_094_8 * cos3_el * cos3_az; // P
    }
}
