//! Strided, non-owning pixel buffers.
//!
//! `PixelBuffer` is the single place where `(base, strides, bounds)` offset
//! arithmetic happens. Strides count elements, not bytes: `cstride` is the
//! distance between adjacent pixels in a row, `rstride` between row starts and
//! `pstride` between plane starts. Cropping moves the base offset and shrinks
//! the extent; the backing slice is never copied.

use crate::image::{Channel, ChannelType, ImageFormat, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};

/// Borrowed strided view over interleaved channel samples.
#[derive(Clone, Copy, Debug)]
pub struct PixelBuffer<'a, T> {
    data: &'a [T],
    base: usize,
    format: ImageFormat,
    cstride: usize,
    rstride: usize,
    pstride: usize,
}

impl<'a, T: Channel> PixelBuffer<'a, T> {
    /// Creates a buffer with packed interleaved strides.
    pub fn new(data: &'a [T], format: ImageFormat) -> CorrStereoResult<Self> {
        let cstride = format.channels();
        let rstride = cstride * format.cols;
        let pstride = rstride * format.rows;
        Self::with_strides(data, format, cstride, rstride, pstride)
    }

    /// Creates a buffer with explicit element strides.
    pub fn with_strides(
        data: &'a [T],
        format: ImageFormat,
        cstride: usize,
        rstride: usize,
        pstride: usize,
    ) -> CorrStereoResult<Self> {
        if format.channel != T::TYPE {
            return Err(CorrStereoError::format_mismatch(
                format!("{:?} samples", format.channel),
                format!("{:?} samples", T::TYPE),
            ));
        }
        if !format.complete() {
            return Err(CorrStereoError::InvalidRegion {
                bbox: Rect::of_size(format.cols, format.rows),
                reason: "incomplete image format",
            });
        }
        if cstride < format.channels() {
            return Err(CorrStereoError::format_mismatch(
                format!("channel stride >= {}", format.channels()),
                cstride,
            ));
        }
        let last = (format.cols - 1) * cstride
            + (format.rows - 1) * rstride
            + (format.planes - 1) * pstride
            + format.channels();
        if data.len() < last {
            return Err(CorrStereoError::BufferTooSmall {
                needed: last,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            base: 0,
            format,
            cstride,
            rstride,
            pstride,
        })
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

    /// Element strides `(channel, row, plane)`.
    pub fn strides(&self) -> (usize, usize, usize) {
        (self.cstride, self.rstride, self.pstride)
    }

    /// Bytes spanned by all planes of the buffer.
    pub fn byte_size(&self) -> usize {
        self.format.planes * self.pstride * T::TYPE.size_bytes()
    }

    /// Element offset of pixel `(i, j)` in plane `p`, relative to the backing slice.
    pub fn offset(&self, i: usize, j: usize, p: usize) -> usize {
        debug_assert!(i < self.format.cols && j < self.format.rows && p < self.format.planes);
        self.base + i * self.cstride + j * self.rstride + p * self.pstride
    }

    /// Channel samples of pixel `(i, j)` in plane `p`.
    pub fn pixel(&self, i: usize, j: usize, p: usize) -> Option<&'a [T]> {
        if i >= self.format.cols || j >= self.format.rows || p >= self.format.planes {
            return None;
        }
        let start = self.offset(i, j, p);
        self.data.get(start..start + self.format.channels())
    }

    /// Single channel sample of pixel `(i, j)` in plane `p`.
    pub fn get(&self, i: usize, j: usize, p: usize, c: usize) -> Option<T> {
        if c >= self.format.channels() {
            return None;
        }
        self.pixel(i, j, p).map(|px| px[c])
    }

    /// Contiguous samples of row `j` when pixels are packed without gaps.
    pub fn row(&self, j: usize, p: usize) -> Option<&'a [T]> {
        if self.cstride != self.format.channels() {
            return None;
        }
        if j >= self.format.rows || p >= self.format.planes {
            return None;
        }
        let start = self.offset(0, j, p);
        self.data.get(start..start + self.format.cols * self.cstride)
    }

    /// Zero-copy view of `bbox`, expressed in this buffer's pixel coordinates.
    pub fn cropped(&self, bbox: Rect) -> CorrStereoResult<Self> {
        if bbox.is_empty() {
            return Err(CorrStereoError::InvalidRegion {
                bbox,
                reason: "empty crop",
            });
        }
        if !Rect::of_size(self.format.cols, self.format.rows).contains_rect(&bbox) {
            return Err(CorrStereoError::InvalidRegion {
                bbox,
                reason: "crop exceeds buffer bounds",
            });
        }
        let mut out = *self;
        out.base = self.offset(bbox.min_x as usize, bbox.min_y as usize, 0);
        out.format.cols = bbox.width() as usize;
        out.format.rows = bbox.height() as usize;
        Ok(out)
    }

    /// Copies the samples into a packed, owned vector.
    pub fn to_packed_vec(&self) -> Vec<T> {
        let channels = self.format.channels();
        let mut out = Vec::with_capacity(self.format.element_count());
        for p in 0..self.format.planes {
            for j in 0..self.format.rows {
                if let Some(row) = self.row(j, p) {
                    out.extend_from_slice(row);
                    continue;
                }
                for i in 0..self.format.cols {
                    let start = self.offset(i, j, p);
                    out.extend_from_slice(&self.data[start..start + channels]);
                }
            }
        }
        out
    }
}

/// Pixel buffer over one of the supported sample types.
#[derive(Clone, Copy, Debug)]
pub enum AnyBuffer<'a> {
    U8(PixelBuffer<'a, u8>),
    U16(PixelBuffer<'a, u16>),
    F32(PixelBuffer<'a, f32>),
}

impl<'a> AnyBuffer<'a> {
    pub fn format(&self) -> ImageFormat {
        match self {
            AnyBuffer::U8(buf) => buf.format(),
            AnyBuffer::U16(buf) => buf.format(),
            AnyBuffer::F32(buf) => buf.format(),
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        self.format().channel
    }

    /// Zero-copy view of `bbox`.
    pub fn cropped(&self, bbox: Rect) -> CorrStereoResult<Self> {
        Ok(match self {
            AnyBuffer::U8(buf) => AnyBuffer::U8(buf.cropped(bbox)?),
            AnyBuffer::U16(buf) => AnyBuffer::U16(buf.cropped(bbox)?),
            AnyBuffer::F32(buf) => AnyBuffer::F32(buf.cropped(bbox)?),
        })
    }
}
