//! Lazy, composable image views.
//!
//! A view is an immutable node in an expression tree. Leaves own pixels
//! (`MemoryImage`); inner nodes (`CropView`, `EdgeExtendView`, `ConvertView`,
//! and the stereo `CorrelatorView`) share their inputs through `Arc` and
//! produce pixels only when `materialize` is asked for a bounding box. Nodes
//! are never mutated after construction, so any number of threads may
//! materialize overlapping regions of the same graph at once.
//!
//! Optional capabilities are separate traits queried through
//! `ImageSource::block_aligned` / `ImageSource::nodata`, which return `None`
//! when the node does not provide them.

mod convert;
mod crop;
pub mod edge;
mod memory;
pub mod tiles;

pub use convert::ConvertView;
pub use crop::CropView;
pub use edge::{EdgeExtendView, EdgeExtension};
pub use memory::MemoryImage;

use crate::image::{ChannelType, ImageFormat, PixelLayout, Raster, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};
use std::sync::Arc;

/// Read-only source of raster regions.
pub trait ImageSource: Send + Sync {
    /// Nominal extent and pixel description of the view.
    fn format(&self) -> ImageFormat;

    /// Produces the pixels of `bbox`.
    ///
    /// Must be deterministic: repeated calls with the same `bbox` on an
    /// unchanged graph return identical rasters. Empty boxes are rejected
    /// with `InvalidRegion`.
    ///
    /// The result is not always `bbox`-sized: a `CropView` clips to its box
    /// and returns only `bbox ∩ crop`. Callers that need exact sizes (such as
    /// `tiles::materialize_tiled`, which reports `FormatMismatch`) read
    /// through an `EdgeExtendView`.
    fn materialize(&self, bbox: Rect) -> CorrStereoResult<Raster>;

    fn cols(&self) -> usize {
        self.format().cols
    }

    fn rows(&self) -> usize {
        self.format().rows
    }

    fn planes(&self) -> usize {
        self.format().planes
    }

    fn channels(&self) -> usize {
        self.format().channels()
    }

    fn layout(&self) -> PixelLayout {
        self.format().layout
    }

    fn channel_type(&self) -> ChannelType {
        self.format().channel
    }

    /// Block-size hint, when the source reads most efficiently in blocks.
    fn block_aligned(&self) -> Option<&dyn BlockAligned> {
        None
    }

    /// Nodata sentinel, when the source defines one.
    fn nodata(&self) -> Option<&dyn NodataAware> {
        None
    }
}

/// Sources that prefer to be read in fixed-size blocks.
pub trait BlockAligned {
    fn block_size(&self) -> (usize, usize);
}

/// Sources that mark invalid pixels with a sentinel value.
pub trait NodataAware {
    fn nodata_value(&self) -> f64;
}

/// Shared handle to a view node.
pub type SharedSource = Arc<dyn ImageSource>;

/// Wraps a concrete view into a shared node handle.
pub fn shared<S: ImageSource + 'static>(source: S) -> SharedSource {
    Arc::new(source)
}

/// Restricts `parent` to `bbox`.
pub fn crop(parent: &SharedSource, bbox: Rect) -> CorrStereoResult<SharedSource> {
    Ok(shared(CropView::new(Arc::clone(parent), bbox)?))
}

/// Removes the domain bounds of `parent`, filling outside reads per `policy`.
pub fn edge_extend(parent: &SharedSource, policy: EdgeExtension) -> SharedSource {
    shared(EdgeExtendView::new(Arc::clone(parent), policy))
}

/// Converts `parent` to another layout and channel type.
pub fn convert(
    parent: &SharedSource,
    layout: PixelLayout,
    channel: ChannelType,
    rescale: bool,
) -> CorrStereoResult<SharedSource> {
    Ok(shared(ConvertView::new(
        Arc::clone(parent),
        layout,
        channel,
        rescale,
    )?))
}

/// Preferred read block of `source`, or `Unsupported` if it gives no hint.
pub fn preferred_block_size(source: &dyn ImageSource) -> CorrStereoResult<(usize, usize)> {
    source
        .block_aligned()
        .map(BlockAligned::block_size)
        .ok_or(CorrStereoError::Unsupported {
            capability: "block size hint",
        })
}

pub(crate) fn require_non_empty(bbox: Rect) -> CorrStereoResult<()> {
    if bbox.is_empty() {
        return Err(CorrStereoError::InvalidRegion {
            bbox,
            reason: "empty region",
        });
    }
    Ok(())
}
