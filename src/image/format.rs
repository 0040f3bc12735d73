//! Pixel layouts, channel types and image formats.

use crate::image::RasterData;
use std::fmt;

/// Arrangement of channels within a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    #[default]
    Unknown,
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    /// Arbitrary channel count without color semantics.
    Generic(usize),
}

impl PixelLayout {
    /// Number of channels, zero for an unknown layout.
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Unknown => 0,
            PixelLayout::Gray => 1,
            PixelLayout::GrayAlpha => 2,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
            PixelLayout::Generic(n) => n,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::GrayAlpha | PixelLayout::Rgba)
    }

    fn is_color_model(self) -> bool {
        matches!(
            self,
            PixelLayout::Gray | PixelLayout::GrayAlpha | PixelLayout::Rgb | PixelLayout::Rgba
        )
    }

    /// Returns true if pixels in this layout can be converted to `dst`.
    ///
    /// Color layouts convert freely among themselves; generic layouts only
    /// reinterpret to a layout with the same channel count.
    pub fn converts_to(self, dst: PixelLayout) -> bool {
        if self == PixelLayout::Unknown || dst == PixelLayout::Unknown {
            return false;
        }
        if self == dst || (self.is_color_model() && dst.is_color_model()) {
            return true;
        }
        self.channels() == dst.channels()
    }
}

/// Numeric type of a single channel sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelType {
    #[default]
    Unknown,
    U8,
    U16,
    F32,
}

impl ChannelType {
    /// Size of one sample in bytes, zero for an unknown type.
    pub fn size_bytes(self) -> usize {
        match self {
            ChannelType::Unknown => 0,
            ChannelType::U8 => 1,
            ChannelType::U16 => 2,
            ChannelType::F32 => 4,
        }
    }
}

/// Shape and pixel description of a raster region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageFormat {
    pub cols: usize,
    pub rows: usize,
    pub planes: usize,
    pub layout: PixelLayout,
    pub channel: ChannelType,
}

impl ImageFormat {
    pub fn new(
        cols: usize,
        rows: usize,
        planes: usize,
        layout: PixelLayout,
        channel: ChannelType,
    ) -> Self {
        Self {
            cols,
            rows,
            planes,
            layout,
            channel,
        }
    }

    /// Single-plane grayscale format.
    pub fn gray(cols: usize, rows: usize, channel: ChannelType) -> Self {
        Self::new(cols, rows, 1, PixelLayout::Gray, channel)
    }

    /// Returns true when every dimension is non-zero and both descriptors are known.
    pub fn complete(&self) -> bool {
        self.cols != 0
            && self.rows != 0
            && self.planes != 0
            && self.layout.channels() > 0
            && self.channel.size_bytes() > 0
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn same_size(&self, other: &ImageFormat) -> bool {
        self.cols == other.cols && self.rows == other.rows && self.planes == other.planes
    }

    /// Returns true if a buffer in this format can be converted into `other` element-wise.
    pub fn simple_convert(&self, other: &ImageFormat) -> bool {
        self.same_size(other)
            && self.channel != ChannelType::Unknown
            && other.channel != ChannelType::Unknown
            && self.layout.converts_to(other.layout)
    }

    /// Total number of channel samples described by the format.
    pub fn element_count(&self) -> usize {
        self.cols * self.rows * self.planes * self.channels()
    }

    /// Same format with a different extent.
    pub fn with_size(&self, cols: usize, rows: usize) -> Self {
        Self { cols, rows, ..*self }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} {:?}/{:?}",
            self.cols, self.rows, self.planes, self.layout, self.channel
        )
    }
}

/// Numeric channel sample stored in rasters.
pub trait Channel: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Tag identifying the sample type.
    const TYPE: ChannelType;
    /// Nominal full-scale value used when rescaling between types.
    const FULL_SCALE: f32;

    fn to_f32(self) -> f32;

    /// Converts from `f32`, rounding and saturating for integer types.
    fn from_f32(value: f32) -> Self;

    /// Wraps owned samples into the tagged raster storage.
    fn into_data(values: Vec<Self>) -> RasterData;

    /// Borrows the samples if `data` holds this type.
    fn slice_of(data: &RasterData) -> Option<&[Self]>;
}

impl Channel for u8 {
    const TYPE: ChannelType = ChannelType::U8;
    const FULL_SCALE: f32 = 255.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value.round().clamp(0.0, 255.0) as u8
    }

    fn into_data(values: Vec<Self>) -> RasterData {
        RasterData::U8(values)
    }

    fn slice_of(data: &RasterData) -> Option<&[Self]> {
        match data {
            RasterData::U8(values) => Some(values),
            _ => None,
        }
    }
}

impl Channel for u16 {
    const TYPE: ChannelType = ChannelType::U16;
    const FULL_SCALE: f32 = 65535.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value.round().clamp(0.0, 65535.0) as u16
    }

    fn into_data(values: Vec<Self>) -> RasterData {
        RasterData::U16(values)
    }

    fn slice_of(data: &RasterData) -> Option<&[Self]> {
        match data {
            RasterData::U16(values) => Some(values),
            _ => None,
        }
    }
}

impl Channel for f32 {
    const TYPE: ChannelType = ChannelType::F32;
    const FULL_SCALE: f32 = 1.0;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }

    fn into_data(values: Vec<Self>) -> RasterData {
        RasterData::F32(values)
    }

    fn slice_of(data: &RasterData) -> Option<&[Self]> {
        match data {
            RasterData::F32(values) => Some(values),
            _ => None,
        }
    }
}
