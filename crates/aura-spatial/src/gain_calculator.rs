//! The gain calculator: object metadata in, direct and diffuse
//! loudspeaker gains out
//!
//! Composes screen scaling, screen edge lock, channel lock,
//! divergence, point-source or extent panning, zone exclusion and LFE
//! insertion in the order mandated by Rec. ITU-R BS.2127-1 sec. 7.3.

use crate::allocentric::{AllocentricExtent, AllocentricPanner};
use crate::channel_lock::ChannelLockHandler;
use crate::conversion::{to_cartesian, to_polar};
use crate::error::{SpatialError, SpatialResult};
use crate::extent::PolarExtentHandler;
use crate::layout::Layout;
use crate::metadata::{ObjectDivergence, ObjectMetadata};
use crate::point_source::PointSourcePanner;
use crate::position::{CartesianPosition, Position};
use crate::screen::{Screen, ScreenEdgeLockHandler, ScreenScaleHandler};
use crate::zone::ZoneExclusionHandler;

/// Handlers used only for cartesian/allocentric processing
struct AllocentricPath {
    panner: AllocentricPanner,
    extent: AllocentricExtent,
    lock: ChannelLockHandler,
}

/// Gain calculator for one loudspeaker layout
///
/// Holds per-instance scratch buffers: one instance must not be
/// shared between threads mid-call, but independent instances may run
/// in parallel, and the layout data behind them is immutable.
pub struct GainCalculator {
    layout: Layout,
    num_channels: usize,
    num_channels_no_lfe: usize,
    cartesian_layout: bool,

    point_source: PointSourcePanner,
    extent: PolarExtentHandler,
    allocentric: Option<AllocentricPath>,

    screen_scale: ScreenScaleHandler,
    screen_edge_lock: ScreenEdgeLockHandler,
    polar_lock: ChannelLockHandler,
    zone_exclusion: ZoneExclusionHandler,

    gains: Vec<f64>,
    gains_tmp: Vec<f64>,
    diverged_pos: Vec<CartesianPosition>,
    diverged_gains: Vec<f64>,
    excluded: Vec<bool>,
}

impl GainCalculator {
    /// Build a calculator for `layout` (LFE channels included; they
    /// come back as exact zeros in the output).
    pub fn new(layout: Layout) -> SpatialResult<Self> {
        let no_lfe = layout.without_lfe();
        let cartesian_layout = layout.allocentric;

        let point_source = PointSourcePanner::new(&no_lfe)?;
        let extent = PolarExtentHandler::new(&no_lfe)?;
        let allocentric = if cartesian_layout {
            Some(AllocentricPath {
                panner: AllocentricPanner::new(&no_lfe)?,
                extent: AllocentricExtent::new(&no_lfe)?,
                lock: ChannelLockHandler::allocentric(&no_lfe),
            })
        } else {
            None
        };

        Ok(Self {
            num_channels: layout.num_channels(),
            num_channels_no_lfe: no_lfe.num_channels(),
            cartesian_layout,
            point_source,
            extent,
            allocentric,
            screen_scale: ScreenScaleHandler::new(None),
            screen_edge_lock: ScreenEdgeLockHandler::new(None),
            polar_lock: ChannelLockHandler::polar(&no_lfe),
            zone_exclusion: ZoneExclusionHandler::new(&no_lfe),
            layout,
            gains: Vec::new(),
            gains_tmp: Vec::new(),
            diverged_pos: Vec::new(),
            diverged_gains: Vec::new(),
            excluded: Vec::new(),
        })
    }

    /// Configure the reproduction screen used by screen scaling and
    /// screen edge lock.
    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screen_scale = ScreenScaleHandler::new(Some(screen));
        self.screen_edge_lock = ScreenEdgeLockHandler::new(Some(screen));
        self
    }

    /// The layout this calculator renders to
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Calculate the direct and diffuse gains to apply to a mono
    /// signal for the given object metadata. Both vectors come back
    /// with one entry per layout channel, LFE included (as zeros).
    pub fn calculate_gains(
        &mut self,
        metadata: &ObjectMetadata,
        direct: &mut Vec<f64>,
        diffuse: &mut Vec<f64>,
    ) -> SpatialResult<()> {
        validate(metadata)?;

        // Bring the metadata into the convention the layout processes
        let md = if !self.cartesian_layout && metadata.cartesian {
            to_polar(metadata)
        } else if self.cartesian_layout && !metadata.cartesian {
            to_cartesian(metadata)
        } else {
            metadata.clone()
        };

        // Screen scaling, then screen edge lock, on the polar form
        let screen_active = md.screen_ref
            || md.screen_edge_lock.horizontal.is_some()
            || md.screen_edge_lock.vertical.is_some();
        let mut position = if self.cartesian_layout {
            let mut cart = md.position.cartesian();
            if screen_active {
                let polar = crate::conversion::point_cart_to_polar(cart);
                let polar = self.screen_scale.handle(polar, md.screen_ref);
                let polar = self.screen_edge_lock.handle(polar, &md.screen_edge_lock);
                cart = crate::conversion::point_polar_to_cart(polar);
            }
            cart
        } else {
            let polar = md.position.polar();
            let polar = self.screen_scale.handle(polar, md.screen_ref);
            let polar = self.screen_edge_lock.handle(polar, &md.screen_edge_lock);
            polar.to_cartesian()
        };

        // The exclusion mask gates channel locking on the cartesian
        // path; panning itself stays unmasked and the downmix below
        // moves the energy out.
        if self.cartesian_layout {
            self.zone_exclusion
                .get_cartesian_excluded(&md.exclusion_zones, &mut self.excluded);
        } else {
            self.excluded.clear();
        }

        position = match &mut self.allocentric {
            Some(allo) => allo.lock.handle(&md.channel_lock, position, &self.excluded),
            None => self
                .polar_lock
                .handle(&md.channel_lock, position, &self.excluded),
        };

        diverged_positions_and_gains(
            &md.object_divergence,
            position,
            self.cartesian_layout,
            &mut self.diverged_pos,
            &mut self.diverged_gains,
        );

        // Pan every diverged source and mix by the divergence gains
        self.gains.clear();
        self.gains.resize(self.num_channels_no_lfe, 0.0);
        let has_extent = md.width > 0.0 || md.height > 0.0 || md.depth > 0.0;
        for (pos, &div_gain) in self.diverged_pos.iter().zip(self.diverged_gains.iter()) {
            match &mut self.allocentric {
                Some(allo) => {
                    if has_extent {
                        allo.extent
                            .handle(pos, md.width, md.height, md.depth, &[], &mut self.gains_tmp);
                    } else {
                        allo.panner.calculate_gains(pos, &[], &mut self.gains_tmp);
                    }
                }
                None => {
                    if has_extent {
                        self.extent
                            .handle(pos, md.width, md.height, md.depth, &mut self.gains_tmp);
                    } else {
                        self.point_source.calculate_gains(pos, &mut self.gains_tmp);
                    }
                }
            }
            // Power-domain mix keeps unit energy for any divergence
            for (g, t) in self.gains.iter_mut().zip(self.gains_tmp.iter()) {
                *g += div_gain * t * t;
            }
        }
        for g in self.gains.iter_mut() {
            *g = g.sqrt();
        }

        // Zone exclusion downmix
        self.zone_exclusion
            .handle(&md.exclusion_zones, &mut self.gains);

        if self.gains.iter().all(|&g| g == 0.0) {
            log::debug!("no region accepted the panning direction; emitting silence");
        }

        // Split into direct and diffuse and restore the LFE slots
        let direct_scale = md.gain * (1.0 - md.diffuse).sqrt();
        let diffuse_scale = md.gain * md.diffuse.sqrt();
        insert_lfe(&self.layout, &self.gains, direct_scale, direct);
        insert_lfe(&self.layout, &self.gains, diffuse_scale, diffuse);
        debug_assert_eq!(direct.len(), self.num_channels);

        Ok(())
    }
}

/// Diverged source positions and gains.
/// See Rec. ITU-R BS.2127-1 sec. 7.3.7.
fn diverged_positions_and_gains(
    divergence: &Option<ObjectDivergence>,
    position: CartesianPosition,
    cartesian: bool,
    positions: &mut Vec<CartesianPosition>,
    gains: &mut Vec<f64>,
) {
    positions.clear();
    gains.clear();

    let div = match divergence {
        Some(d) if d.value > 0.0 => d,
        _ => {
            positions.push(position);
            gains.push(1.0);
            return;
        }
    };

    let v = div.value.clamp(0.0, 1.0);
    positions.push(position);
    if cartesian {
        // Auxiliary sources sit along x
        let range = div.position_range;
        positions.push(CartesianPosition::new(
            (position.x + range).clamp(-1.0, 1.0),
            position.y,
            position.z,
        ));
        positions.push(CartesianPosition::new(
            (position.x - range).clamp(-1.0, 1.0),
            position.y,
            position.z,
        ));
    } else {
        // Auxiliary sources rotated about the origin in azimuth
        let polar = position.to_polar();
        for offset in [div.azimuth_range, -div.azimuth_range] {
            positions.push(
                crate::position::PolarPosition::new(
                    polar.azimuth + offset,
                    polar.elevation,
                    polar.distance,
                )
                .to_cartesian(),
            );
        }
    }

    // Unit power for any v
    gains.push((1.0 - v) / (1.0 + v));
    gains.push(v / (1.0 + v));
    gains.push(v / (1.0 + v));
}

/// Expand a no-LFE gain vector to the full layout, scaling as it goes;
/// LFE slots are exactly zero.
fn insert_lfe(layout: &Layout, gains_no_lfe: &[f64], scale: f64, out: &mut Vec<f64>) {
    out.clear();
    out.resize(layout.num_channels(), 0.0);
    let mut src = 0;
    for (slot, ch) in out.iter_mut().zip(layout.channels.iter()) {
        if ch.is_lfe {
            continue;
        }
        *slot = scale * gains_no_lfe[src];
        src += 1;
    }
}

fn validate(metadata: &ObjectMetadata) -> SpatialResult<()> {
    match &metadata.position {
        Position::Polar(p) => {
            if !p.azimuth.is_finite() || !p.elevation.is_finite() || !p.distance.is_finite() {
                return Err(SpatialError::InvalidMetadata("non-finite position".into()));
            }
            if p.elevation < -90.0 || p.elevation > 90.0 {
                return Err(SpatialError::InvalidMetadata(format!(
                    "elevation {} out of [-90, 90]",
                    p.elevation
                )));
            }
            if p.distance < 0.0 {
                return Err(SpatialError::InvalidMetadata("negative distance".into()));
            }
        }
        Position::Cartesian(c) => {
            if !c.is_finite() {
                return Err(SpatialError::InvalidMetadata("non-finite position".into()));
            }
        }
    }
    if !metadata.gain.is_finite() || metadata.gain < 0.0 {
        return Err(SpatialError::InvalidMetadata(format!(
            "gain {} out of range",
            metadata.gain
        )));
    }
    if !metadata.diffuse.is_finite() || !(0.0..=1.0).contains(&metadata.diffuse) {
        return Err(SpatialError::InvalidMetadata(format!(
            "diffuse {} out of [0, 1]",
            metadata.diffuse
        )));
    }
    if metadata.width < 0.0 || metadata.height < 0.0 || metadata.depth < 0.0 {
        return Err(SpatialError::InvalidMetadata("negative extent".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PolarPosition;

    #[test]
    fn test_divergence_gains_unit_power() {
        let mut positions = Vec::new();
        let mut gains = Vec::new();
        for v in [0.0, 0.25, 0.5, 0.75, 1.0] {
            diverged_positions_and_gains(
                &Some(ObjectDivergence {
                    value: v,
                    azimuth_range: 45.0,
                    position_range: 0.0,
                }),
                PolarPosition::new(0.0, 0.0, 1.0).to_cartesian(),
                false,
                &mut positions,
                &mut gains,
            );
            let sum: f64 = gains.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "v={v}");
            if v > 0.0 {
                assert_eq!(positions.len(), 3);
                // Left and right sources sit at the rotated azimuths
                let left = positions[1].to_polar();
                assert!((left.azimuth - 45.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_divergence_absent() {
        let mut positions = Vec::new();
        let mut gains = Vec::new();
        diverged_positions_and_gains(
            &None,
            PolarPosition::new(10.0, 0.0, 1.0).to_cartesian(),
            false,
            &mut positions,
            &mut gains,
        );
        assert_eq!(positions.len(), 1);
        assert_eq!(gains, vec![1.0]);
    }

    #[test]
    fn test_cartesian_divergence_clamps() {
        let mut positions = Vec::new();
        let mut gains = Vec::new();
        diverged_positions_and_gains(
            &Some(ObjectDivergence {
                value: 0.5,
                azimuth_range: 0.0,
                position_range: 0.6,
            }),
            CartesianPosition::new(0.8, 1.0, 0.0),
            true,
            &mut positions,
            &mut gains,
        );
        assert!((positions[1].x - 1.0).abs() < 1e-12);
        assert!((positions[2].x - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_insert_lfe() {
        let layout = Layout::named("0+5+0").unwrap();
        let mut out = Vec::new();
        insert_lfe(&layout, &[0.1, 0.2, 0.3, 0.4, 0.5], 2.0, &mut out);
        assert_eq!(out.len(), 6);
        assert_eq!(out[3], 0.0);
        assert!((out[0] - 0.2).abs() < 1e-12);
        assert!((out[4] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_validation() {
        let mut md = ObjectMetadata::default();
        md.gain = -1.0;
        assert!(validate(&md).is_err());

        let mut md = ObjectMetadata::default();
        md.diffuse = 1.5;
        assert!(validate(&md).is_err());

        let mut md = ObjectMetadata::default();
        md.position = PolarPosition::new(f64::NAN, 0.0, 1.0).into();
        assert!(validate(&md).is_err());

        assert!(validate(&ObjectMetadata::default()).is_ok());
    }

    #[test]
    fn test_unsupported_layout_at_construction() {
        let layout = Layout::new(
            "weird",
            vec![
                crate::layout::Channel::new("M+010", 10.0, 0.0),
                crate::layout::Channel::new("U+010", 10.0, 30.0),
            ],
        );
        assert!(GainCalculator::new(layout).is_err());
    }
}
