//! CorrStereo computes dense stereo disparity over lazily materialized views.
//!
//! Images are wrapped in immutable view nodes (`view`) that produce pixels
//! only for the bounding box asked of them. `CorrelatorView` is such a node:
//! materializing a box pulls padded tiles from the left and right sources and
//! runs the coarse-to-fine ZNCC `PyramidCorrelator` on them. Unreliable
//! matches come back as missing disparities rather than errors.
//!
//! Optional features: `rayon` (row- and tile-parallel search), `simd`
//! (`wide` kernels), `image-io` (file loading and debug PNGs) and `tracing`.

pub mod correlate;
mod debug;
pub mod image;
pub mod kernel;
pub mod lowlevel;
pub mod optimize;
pub mod preprocess;
pub mod stereo;
mod trace;
pub mod util;
pub mod view;

pub use correlate::{
    CorrelatorConfig, Disparity, DisparityMap, PyramidCorrelator, SearchRange, SubpixelMode,
};
pub use debug::tile_prefix;
pub use image::pyramid::ImagePyramid;
pub use image::{
    ChannelType, ImageF32, ImageFormat, PixelBuffer, PixelLayout, Raster, RasterData, Rect,
};
pub use preprocess::{BlurPreprocess, LogPreprocess, NullPreprocess, Preprocess, SlogPreprocess};
pub use stereo::CorrelatorView;
pub use util::{CorrStereoError, CorrStereoResult};
pub use view::{
    preferred_block_size, shared, ConvertView, CropView, EdgeExtendView, EdgeExtension,
    ImageSource, MemoryImage, SharedSource,
};
