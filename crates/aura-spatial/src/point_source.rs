//! Point-source panner: partitions the loudspeaker sphere into regions
//! at construction and dispatches gain queries to them

use once_cell::sync::Lazy;
use smallvec::SmallVec;

use crate::error::{SpatialError, SpatialResult};
use crate::layout::Layout;
use crate::position::{CartesianPosition, PolarPosition};
use crate::region::{QuadRegion, Region, Triplet, VirtualNgon, TOL};

/// A region of a layout partition, by channel name
enum RegionDef {
    Triplet([&'static str; 3]),
    Quad([&'static str; 4]),
    /// N-gon closed by a virtual centre at (azimuth, elevation)
    Ngon(&'static [&'static str], f64, f64),
}

use RegionDef::{Ngon, Quad as QuadDef, Triplet as TripletDef};

/// Sphere partitions for the multi-layer catalogue layouts. Horizontal
/// layouts are handled generically; see `build_horizontal_regions`.
static REGION_TABLES: Lazy<Vec<(&'static str, Vec<RegionDef>)>> = Lazy::new(|| {
    vec![
        (
            "2+5+0",
            vec![
                Ngon(&["U+030", "U-030", "M+110", "M-110"], 0.0, 90.0),
                TripletDef(["M+030", "M+000", "U+030"]),
                TripletDef(["M+000", "M-030", "U+030"]),
                TripletDef(["M-030", "U-030", "U+030"]),
                TripletDef(["M+030", "M+110", "U+030"]),
                TripletDef(["M-030", "M-110", "U-030"]),
                Ngon(&["M+030", "M-030", "M+000", "M+110", "M-110"], 0.0, -90.0),
            ],
        ),
        (
            "4+5+0",
            vec![
                Ngon(&["U+030", "U-030", "U+110", "U-110"], 0.0, 90.0),
                TripletDef(["M+000", "M+030", "U+030"]),
                TripletDef(["M+000", "U+030", "U-030"]),
                TripletDef(["M+000", "U-030", "M-030"]),
                QuadDef(["M+030", "M+110", "U+110", "U+030"]),
                QuadDef(["M-030", "M-110", "U-110", "U-030"]),
                QuadDef(["M+110", "M-110", "U-110", "U+110"]),
                Ngon(&["M+030", "M-030", "M+000", "M+110", "M-110"], 0.0, -90.0),
            ],
        ),
        (
            "4+9+0",
            vec![
                Ngon(&["U+045", "U-045", "U+135", "U-135"], 0.0, 90.0),
                TripletDef(["M+000", "M+SC", "U+045"]),
                TripletDef(["M+SC", "M+030", "U+045"]),
                TripletDef(["M+000", "U+045", "U-045"]),
                TripletDef(["M+000", "M-SC", "U-045"]),
                TripletDef(["M-SC", "M-030", "U-045"]),
                TripletDef(["M+030", "M+090", "U+045"]),
                TripletDef(["M+090", "M+135", "U+045"]),
                TripletDef(["M+135", "U+135", "U+045"]),
                TripletDef(["M-030", "M-090", "U-045"]),
                TripletDef(["M-090", "M-135", "U-045"]),
                TripletDef(["M-135", "U-135", "U-045"]),
                QuadDef(["M+135", "M-135", "U-135", "U+135"]),
                Ngon(
                    &[
                        "M+000", "M+SC", "M+030", "M+090", "M+135", "M-135", "M-090", "M-030",
                        "M-SC",
                    ],
                    0.0,
                    -90.0,
                ),
            ],
        ),
        (
            "9+10+3",
            vec![
                // Top cap around the real overhead speaker
                TripletDef(["U+000", "U+045", "T+000"]),
                TripletDef(["U+045", "U+090", "T+000"]),
                TripletDef(["U+090", "U+135", "T+000"]),
                TripletDef(["U+135", "U+180", "T+000"]),
                TripletDef(["U+180", "U-135", "T+000"]),
                TripletDef(["U-135", "U-090", "T+000"]),
                TripletDef(["U-090", "U-045", "T+000"]),
                TripletDef(["U-045", "U+000", "T+000"]),
                // Mid-to-upper band, left then right
                TripletDef(["M+000", "M+030", "U+000"]),
                TripletDef(["M+030", "U+045", "U+000"]),
                TripletDef(["M+030", "M+060", "U+045"]),
                TripletDef(["M+060", "M+090", "U+045"]),
                TripletDef(["M+090", "U+090", "U+045"]),
                QuadDef(["M+090", "M+135", "U+135", "U+090"]),
                QuadDef(["M+135", "M+180", "U+180", "U+135"]),
                TripletDef(["M+000", "M-030", "U+000"]),
                TripletDef(["M-030", "U-045", "U+000"]),
                TripletDef(["M-030", "M-060", "U-045"]),
                TripletDef(["M-060", "M-090", "U-045"]),
                TripletDef(["M-090", "U-090", "U-045"]),
                QuadDef(["M-090", "M-135", "U-135", "U-090"]),
                QuadDef(["M-135", "M+180", "U+180", "U-135"]),
                // Mid-to-bottom band across the front
                TripletDef(["M+000", "M+030", "B+000"]),
                TripletDef(["M+030", "B+045", "B+000"]),
                TripletDef(["M+030", "M+060", "B+045"]),
                TripletDef(["M+000", "M-030", "B+000"]),
                TripletDef(["M-030", "B-045", "B+000"]),
                TripletDef(["M-030", "M-060", "B-045"]),
                // Bottom cap ring mixes the bottom and mid layers
                Ngon(
                    &[
                        "B+000", "B+045", "M+060", "M+090", "M+135", "M+180", "M-135", "M-090",
                        "M-060", "B-045",
                    ],
                    0.0,
                    -90.0,
                ),
            ],
        ),
    ]
});

/// Downmix of a virtual 0+5+0 panning onto stereo, rows L then R
const STEREO_DOWNMIX: [[f64; 5]; 2] = [
    // M+030  M-030  M+000            M+110            M-110
    [1.0, 0.0, std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2, 0.0],
    [0.0, 1.0, std::f64::consts::FRAC_1_SQRT_2, 0.0, std::f64::consts::FRAC_1_SQRT_2],
];

enum PannerKind {
    /// Accumulate over a region list
    Regions(Vec<Region>),
    /// 0+2+0: pan over a virtual 0+5+0 and downmix
    StereoDownmix(Vec<Region>),
}

/// Point-source panner for one loudspeaker layout (LFE excluded)
pub struct PointSourcePanner {
    kind: PannerKind,
    num_channels: usize,
}

impl PointSourcePanner {
    /// Partition the sphere for `layout`. The layout must not contain
    /// LFE channels.
    pub fn new(layout: &Layout) -> SpatialResult<Self> {
        debug_assert!(layout.channels.iter().all(|c| !c.is_lfe));
        let num_channels = layout.num_channels();

        if layout.name == "0+2+0" {
            let virtual_layout = Layout::named("0+5+0")?.without_lfe();
            let regions = build_horizontal_regions(&virtual_layout);
            log::debug!("point-source panner: stereo via virtual 0+5+0");
            return Ok(Self {
                kind: PannerKind::StereoDownmix(regions),
                num_channels,
            });
        }

        if layout.is_horizontal_only() {
            if num_channels < 2 {
                return Err(SpatialError::UnsupportedLayout(layout.name.clone()));
            }
            let regions = build_horizontal_regions(layout);
            return Ok(Self {
                kind: PannerKind::Regions(regions),
                num_channels,
            });
        }

        let table = REGION_TABLES
            .iter()
            .find(|(name, _)| *name == layout.name)
            .map(|(_, defs)| defs)
            .ok_or_else(|| SpatialError::UnsupportedLayout(layout.name.clone()))?;

        let mut regions = Vec::with_capacity(table.len());
        for def in table {
            regions.push(resolve_region(layout, def)?);
        }
        log::debug!(
            "point-source panner: {} regions for {}",
            regions.len(),
            layout.name
        );
        Ok(Self {
            kind: PannerKind::Regions(regions),
            num_channels,
        })
    }

    /// Channel count of the gain vectors this panner emits
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Calculate gains for a source position, writing into `gains`
    /// (resized to the channel count). All zeros when no region
    /// accepts the direction.
    pub fn calculate_gains(&self, position: &CartesianPosition, gains: &mut Vec<f64>) {
        gains.clear();
        gains.resize(self.num_channels, 0.0);
        let direction = position.normalized();

        match &self.kind {
            PannerKind::Regions(regions) => {
                accumulate_regions(regions, &direction, gains);
                normalize(gains);
            }
            PannerKind::StereoDownmix(regions) => {
                let mut five = [0.0f64; 5];
                accumulate_regions(regions, &direction, &mut five);
                for (row, g) in STEREO_DOWNMIX.iter().zip(gains.iter_mut()) {
                    *g = row.iter().zip(five.iter()).map(|(d, v)| d * v).sum();
                }
                normalize(gains);
            }
        }
    }
}

fn accumulate_regions(regions: &[Region], direction: &CartesianPosition, gains: &mut [f64]) {
    for region in regions {
        let region_gains = region.calculate_gains(direction);
        for (chan, g) in region.channels().iter().zip(region_gains.iter()) {
            gains[*chan] += g;
        }
    }
}

fn normalize(gains: &mut [f64]) {
    let norm = gains.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > TOL {
        for g in gains.iter_mut() {
            *g /= norm;
        }
    } else {
        gains.iter_mut().for_each(|g| *g = 0.0);
    }
}

/// Horizontal-only layouts pan inside two pole-capped N-gons
fn build_horizontal_regions(layout: &Layout) -> Vec<Region> {
    let channels: Vec<usize> = (0..layout.num_channels()).collect();
    let positions: Vec<PolarPosition> = layout
        .channels
        .iter()
        .map(|c| c.polar_position)
        .collect();
    vec![
        Region::VirtualNgon(VirtualNgon::new(
            &channels,
            &positions,
            PolarPosition::new(0.0, 90.0, 1.0),
        )),
        Region::VirtualNgon(VirtualNgon::new(
            &channels,
            &positions,
            PolarPosition::new(0.0, -90.0, 1.0),
        )),
    ]
}

fn resolve_region(layout: &Layout, def: &RegionDef) -> SpatialResult<Region> {
    let lookup = |name: &str| -> SpatialResult<(usize, PolarPosition)> {
        let idx = layout
            .channel_index(name)
            .ok_or_else(|| SpatialError::UnknownChannel(name.to_string()))?;
        Ok((idx, layout.channels[idx].polar_position))
    };

    Ok(match def {
        RegionDef::Triplet(names) => {
            let mut inds = [0usize; 3];
            let mut pos = [PolarPosition::default(); 3];
            for (i, name) in names.iter().enumerate() {
                let (idx, p) = lookup(name)?;
                inds[i] = idx;
                pos[i] = p;
            }
            Region::Triplet(Triplet::new(inds, pos))
        }
        RegionDef::Quad(names) => {
            let mut inds = [0usize; 4];
            let mut pos = [PolarPosition::default(); 4];
            for (i, name) in names.iter().enumerate() {
                let (idx, p) = lookup(name)?;
                inds[i] = idx;
                pos[i] = p;
            }
            Region::Quad(QuadRegion::new(inds, pos))
        }
        RegionDef::Ngon(names, az, el) => {
            let mut inds: SmallVec<[usize; 16]> = SmallVec::new();
            let mut pos: SmallVec<[PolarPosition; 16]> = SmallVec::new();
            for name in *names {
                let (idx, p) = lookup(name)?;
                inds.push(idx);
                pos.push(p);
            }
            Region::VirtualNgon(VirtualNgon::new(
                &inds,
                &pos,
                PolarPosition::new(*az, *el, 1.0),
            ))
        }
    })
}
