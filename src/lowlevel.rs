//! Low-level building blocks for custom correlation pipelines.
//!
//! These expose the scoring kernels, pyramid and filter helpers, and the
//! sub-pixel fit used inside `PyramidCorrelator`. Most users should prefer
//! `CorrelatorView`.

pub use crate::correlate::subpixel::{quad_peak_offset_1d, quad_peak_offset_2d};
pub use crate::correlate::Artifact;
pub use crate::image::convert::{convert, read_region};
pub use crate::image::filter::{convolve_separable, gaussian_kernel, laplacian, BINOMIAL5};
pub use crate::image::pyramid::downsample_2x;
pub use crate::kernel::scalar::ZnccScalar;
#[cfg(feature = "simd")]
pub use crate::kernel::simd::ZnccSimd;
pub use crate::kernel::{IntegralImage, Kernel, Overlap, ScorePlan};
pub use crate::optimize::{levenberg_marquardt, LeastSquaresModel, LmConfig, LmSolution};
pub use crate::view::tiles::{materialize_tiled, materialize_tiles, tile_grid};
