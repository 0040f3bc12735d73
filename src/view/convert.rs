//! Format conversion node.

use crate::image::convert::convert;
use crate::image::{ChannelType, ImageFormat, PixelLayout, Raster, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};
use crate::view::{ImageSource, SharedSource};

/// Converts the pixels of its parent to another layout and channel type.
#[derive(Clone)]
pub struct ConvertView {
    parent: SharedSource,
    layout: PixelLayout,
    channel: ChannelType,
    rescale: bool,
}

impl ConvertView {
    /// Fails with `FormatMismatch` if the parent's layout cannot be converted.
    pub fn new(
        parent: SharedSource,
        layout: PixelLayout,
        channel: ChannelType,
        rescale: bool,
    ) -> CorrStereoResult<Self> {
        let src = parent.format();
        let dst = ImageFormat {
            layout,
            channel,
            ..src
        };
        if !src.simple_convert(&dst) {
            return Err(CorrStereoError::format_mismatch(dst, src));
        }
        Ok(Self {
            parent,
            layout,
            channel,
            rescale,
        })
    }
}

impl ImageSource for ConvertView {
    fn format(&self) -> ImageFormat {
        ImageFormat {
            layout: self.layout,
            channel: self.channel,
            ..self.parent.format()
        }
    }

    fn materialize(&self, bbox: Rect) -> CorrStereoResult<Raster> {
        let src = self.parent.materialize(bbox)?;
        convert(&src.buffer(), self.layout, self.channel, self.rescale)
    }
}
