//! In-memory leaf view.

use crate::image::{ImageFormat, Raster, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};
use crate::view::{require_non_empty, BlockAligned, ImageSource, NodataAware};
use std::sync::Arc;

/// Leaf node owning its pixels.
///
/// Reads must stay inside the nominal extent; wrap the node in an
/// `EdgeExtendView` to read past it.
#[derive(Clone, Debug)]
pub struct MemoryImage {
    raster: Arc<Raster>,
    block_size: Option<(usize, usize)>,
    nodata: Option<f64>,
}

impl MemoryImage {
    pub fn new(raster: Raster) -> Self {
        Self {
            raster: Arc::new(raster),
            block_size: None,
            nodata: None,
        }
    }

    /// Advertises a preferred read block size.
    pub fn with_block_size(mut self, cols: usize, rows: usize) -> Self {
        self.block_size = Some((cols, rows));
        self
    }

    /// Declares a nodata sentinel value.
    pub fn with_nodata(mut self, value: f64) -> Self {
        self.nodata = Some(value);
        self
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }
}

impl ImageSource for MemoryImage {
    fn format(&self) -> ImageFormat {
        self.raster.format()
    }

    fn materialize(&self, bbox: Rect) -> CorrStereoResult<Raster> {
        require_non_empty(bbox)?;
        let domain = Rect::of_size(self.raster.cols(), self.raster.rows());
        if !domain.contains_rect(&bbox) {
            return Err(CorrStereoError::InvalidRegion {
                bbox,
                reason: "region exceeds source bounds",
            });
        }
        if bbox == domain {
            return Ok(self.raster.as_ref().clone());
        }
        self.raster.crop(bbox)
    }

    fn block_aligned(&self) -> Option<&dyn BlockAligned> {
        self.block_size.map(|_| self as &dyn BlockAligned)
    }

    fn nodata(&self) -> Option<&dyn NodataAware> {
        self.nodata.map(|_| self as &dyn NodataAware)
    }
}

impl BlockAligned for MemoryImage {
    fn block_size(&self) -> (usize, usize) {
        self.block_size
            .unwrap_or((self.raster.cols(), self.raster.rows()))
    }
}

impl NodataAware for MemoryImage {
    fn nodata_value(&self) -> f64 {
        self.nodata.unwrap_or(f64::NAN)
    }
}
