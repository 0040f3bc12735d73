//! Owned rasters and the single-channel `f32` working tile.

use crate::image::{AnyBuffer, Channel, ChannelType, ImageFormat, PixelBuffer, PixelLayout, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};

/// Tagged owned sample storage.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl RasterData {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            RasterData::U8(_) => ChannelType::U8,
            RasterData::U16(_) => ChannelType::U16,
            RasterData::F32(_) => ChannelType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RasterData::U8(v) => v.len(),
            RasterData::U16(v) => v.len(),
            RasterData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned, packed raster produced by materializing a view.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    format: ImageFormat,
    data: RasterData,
}

impl Raster {
    /// Wraps packed samples; the sample type and length must match `format`.
    pub fn new(format: ImageFormat, data: RasterData) -> CorrStereoResult<Self> {
        if !format.complete() {
            return Err(CorrStereoError::InvalidRegion {
                bbox: Rect::of_size(format.cols, format.rows),
                reason: "incomplete image format",
            });
        }
        if data.channel_type() != format.channel {
            return Err(CorrStereoError::format_mismatch(
                format!("{:?} samples", format.channel),
                format!("{:?} samples", data.channel_type()),
            ));
        }
        let needed = format.element_count();
        if data.len() != needed {
            return Err(CorrStereoError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self { format, data })
    }

    /// Builds a single-plane raster from packed samples.
    pub fn from_vec<T: Channel>(
        cols: usize,
        rows: usize,
        layout: PixelLayout,
        data: Vec<T>,
    ) -> CorrStereoResult<Self> {
        let format = ImageFormat::new(cols, rows, 1, layout, T::TYPE);
        Self::new(format, T::into_data(data))
    }

    /// Raster of `format` with every sample set to `value`.
    pub fn filled(format: ImageFormat, value: f32) -> CorrStereoResult<Self> {
        let len = format.element_count();
        let data = match format.channel {
            ChannelType::U8 => RasterData::U8(vec![u8::from_f32(value); len]),
            ChannelType::U16 => RasterData::U16(vec![u16::from_f32(value); len]),
            ChannelType::F32 => RasterData::F32(vec![value; len]),
            ChannelType::Unknown => {
                return Err(CorrStereoError::InvalidRegion {
                    bbox: Rect::of_size(format.cols, format.rows),
                    reason: "incomplete image format",
                })
            }
        };
        Self::new(format, data)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn cols(&self) -> usize {
        self.format.cols
    }

    pub fn rows(&self) -> usize {
        self.format.rows
    }

    pub fn planes(&self) -> usize {
        self.format.planes
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn data(&self) -> &RasterData {
        &self.data
    }

    pub fn into_data(self) -> RasterData {
        self.data
    }

    /// Typed strided accessor, if the raster stores `T` samples.
    pub fn typed<T: Channel>(&self) -> Option<PixelBuffer<'_, T>> {
        let values = T::slice_of(&self.data)?;
        PixelBuffer::new(values, self.format).ok()
    }

    /// Strided accessor over the tagged sample storage.
    pub fn buffer(&self) -> AnyBuffer<'_> {
        // Construction validated the format against the storage.
        match &self.data {
            RasterData::U8(v) => AnyBuffer::U8(packed(v, self.format)),
            RasterData::U16(v) => AnyBuffer::U16(packed(v, self.format)),
            RasterData::F32(v) => AnyBuffer::F32(packed(v, self.format)),
        }
    }

    /// Sample at `(i, j)` in plane `p`, channel `c`, widened to `f32`.
    pub fn get_f32(&self, i: usize, j: usize, p: usize, c: usize) -> Option<f32> {
        match self.buffer() {
            AnyBuffer::U8(buf) => buf.get(i, j, p, c).map(Channel::to_f32),
            AnyBuffer::U16(buf) => buf.get(i, j, p, c).map(Channel::to_f32),
            AnyBuffer::F32(buf) => buf.get(i, j, p, c),
        }
    }

    /// Packed copy of `bbox`.
    pub fn crop(&self, bbox: Rect) -> CorrStereoResult<Raster> {
        let view = self.buffer().cropped(bbox)?;
        let format = view.format();
        let data = match view {
            AnyBuffer::U8(buf) => RasterData::U8(buf.to_packed_vec()),
            AnyBuffer::U16(buf) => RasterData::U16(buf.to_packed_vec()),
            AnyBuffer::F32(buf) => RasterData::F32(buf.to_packed_vec()),
        };
        Raster::new(format, data)
    }
}

fn packed<T: Channel>(values: &[T], format: ImageFormat) -> PixelBuffer<'_, T> {
    match PixelBuffer::new(values, format) {
        Ok(buf) => buf,
        Err(err) => unreachable!("raster invariant violated: {err}"),
    }
}

/// Owned single-channel `f32` tile used by filters, pyramids and the correlator.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ImageF32 {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> CorrStereoResult<Self> {
        if width == 0 || height == 0 {
            return Err(CorrStereoError::InvalidRegion {
                bbox: Rect::of_size(width, height),
                reason: "zero-sized tile",
            });
        }
        let needed = width * height;
        if data.len() != needed {
            return Err(CorrStereoError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Builds a tile by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Widens a single-channel, single-plane raster to `f32`.
    ///
    /// The sample type is matched once here; callers then run their inner
    /// loops on plain `f32` data.
    pub fn from_raster(raster: &Raster) -> CorrStereoResult<Self> {
        let format = raster.format();
        if format.channels() != 1 || format.planes != 1 {
            return Err(CorrStereoError::format_mismatch(
                "single-channel single-plane raster",
                format,
            ));
        }
        let data = match raster.data() {
            RasterData::U8(v) => v.iter().map(|&s| s.to_f32()).collect(),
            RasterData::U16(v) => v.iter().map(|&s| s.to_f32()).collect(),
            RasterData::F32(v) => v.clone(),
        };
        Self::new(format.cols, format.rows, data)
    }

    /// Converts into a grayscale `f32` raster.
    pub fn into_raster(self) -> Raster {
        let format = ImageFormat::gray(self.width, self.height, ChannelType::F32);
        Raster {
            format,
            data: RasterData::F32(self.data),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Value at `(x, y)`; panics when out of bounds.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Bilinear sample at a pixel-center coordinate, `None` outside the tile.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> Option<f32> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
            return None;
        }
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x1, y0) * fx;
        let bottom = self.at(x0, y1) * (1.0 - fx) + self.at(x1, y1) * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }
}
