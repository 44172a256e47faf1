//! # aura-spatial : loudspeaker gains for object-based audio
//!
//! The core of an ADM object renderer following Rec. ITU-R BS.2127-1:
//! per-object metadata (position, extent, divergence, channel lock,
//! zone exclusion, screen scaling) goes in, a pair of equal-length
//! direct and diffuse gain vectors for a known loudspeaker layout
//! comes out.
//!
//! ## Architecture
//!
//! - **[`layout`]**: loudspeaker channels, the BS.2051 layout
//!   catalogue and allocentric room coordinates.
//! - **[`metadata`]**: the ADM object metadata consumed per block.
//! - **[`conversion`]**: the ADM polar/cartesian metadata remapping
//!   (not a geometric conversion).
//! - **[`point_source`]** and **[`region`]**: the sphere partition
//!   into triplets, virtual N-gons and quad regions, and the gain
//!   solvers for each.
//! - **[`allocentric`]**: room-relative panning and extent.
//! - **[`extent`]**: spread-source integration, loudspeaker and
//!   Ambisonic flavours.
//! - **[`screen`]**, **[`channel_lock`]**, **[`zone`]**: position
//!   remapping and loudspeaker masking stages.
//! - **[`gain_calculator`]**: the pipeline tying it all together.
//!
//! ## Quick start
//!
//! ```rust
//! use aura_spatial::{GainCalculator, Layout, ObjectMetadata, PolarPosition};
//!
//! let layout = Layout::named("0+5+0").unwrap();
//! let mut calc = GainCalculator::new(layout).unwrap();
//!
//! let metadata = ObjectMetadata {
//!     position: PolarPosition::new(0.0, 0.0, 1.0).into(),
//!     ..Default::default()
//! };
//!
//! let (mut direct, mut diffuse) = (Vec::new(), Vec::new());
//! calc.calculate_gains(&metadata, &mut direct, &mut diffuse).unwrap();
//! assert_eq!(direct.len(), 6); // five speakers plus silent LFE
//! ```
//!
//! No I/O, no sample processing: upstream code parses ADM/BW64 and
//! owns the audio, downstream code applies the gains.

pub mod allocentric;
pub mod channel_lock;
pub mod conversion;
pub mod extent;
pub mod gain_calculator;
pub mod geometry;
pub mod hoa;
pub mod layout;
pub mod metadata;
pub mod point_source;
pub mod position;
pub mod region;
pub mod screen;
pub mod zone;

mod error;

pub use error::{SpatialError, SpatialResult};
pub use extent::{AmbisonicPolarExtentHandler, PolarExtentHandler};
pub use gain_calculator::GainCalculator;
pub use hoa::AmbisonicOrder;
pub use layout::{Channel, Layer, Layout};
pub use metadata::{
    ChannelLock, ExclusionZone, HorizontalEdge, JumpPosition, ObjectDivergence, ObjectMetadata,
    ScreenEdgeLock, VerticalEdge,
};
pub use point_source::PointSourcePanner;
pub use position::{CartesianPosition, PolarPosition, Position};
pub use screen::Screen;
