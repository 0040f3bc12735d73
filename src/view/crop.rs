//! Crop node.

use crate::image::{ImageFormat, Raster, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};
use crate::view::{require_non_empty, ImageSource, NodataAware, SharedSource};

/// Restricts and re-origins the coordinate domain of its parent.
///
/// Pixel `(0, 0)` of the crop is pixel `bbox.min` of the parent. The crop
/// box may extend past the parent's nominal extent when the parent is edge
/// extended.
#[derive(Clone)]
pub struct CropView {
    parent: SharedSource,
    bbox: Rect,
}

impl CropView {
    pub fn new(parent: SharedSource, bbox: Rect) -> CorrStereoResult<Self> {
        require_non_empty(bbox)?;
        Ok(Self { parent, bbox })
    }

    /// Crop box in parent coordinates.
    pub fn bbox(&self) -> Rect {
        self.bbox
    }
}

impl ImageSource for CropView {
    fn format(&self) -> ImageFormat {
        self.parent
            .format()
            .with_size(self.bbox.width() as usize, self.bbox.height() as usize)
    }

    /// Materializes `bbox ∩ b` of the parent, where `b` is translated into
    /// parent coordinates. The raster is smaller than `b` when `b` reaches
    /// past the crop.
    fn materialize(&self, b: Rect) -> CorrStereoResult<Raster> {
        require_non_empty(b)?;
        let region = b
            .translate(self.bbox.min_x, self.bbox.min_y)
            .intersect(&self.bbox);
        if region.is_empty() {
            return Err(CorrStereoError::InvalidRegion {
                bbox: b,
                reason: "region lies outside the crop",
            });
        }
        self.parent.materialize(region)
    }

    fn nodata(&self) -> Option<&dyn NodataAware> {
        self.parent.nodata()
    }
}
