//! Raster formats, strided buffers and working tiles.
//!
//! `PixelBuffer` is a borrowed view with element strides over interleaved
//! samples; `Raster` owns packed samples of one tagged type; `ImageF32` is the
//! single-channel float tile the correlator operates on. Crops of a
//! `PixelBuffer` are zero-copy and retain the parent strides.

mod buffer;
pub mod convert;
pub mod filter;
mod format;
#[cfg(feature = "image-io")]
pub mod io;
pub mod pyramid;
mod raster;
mod rect;

pub use buffer::{AnyBuffer, PixelBuffer};
pub use format::{Channel, ChannelType, ImageFormat, PixelLayout};
pub use raster::{ImageF32, Raster, RasterData};
pub use rect::Rect;
