//! Pixel layout and channel type conversion.
//!
//! Conversion reads the source through its typed accessor into an `f32`
//! scratch row, remaps channels, and packs into the destination type. Each
//! sample type is matched once per call, never per pixel.

use crate::image::{AnyBuffer, Channel, ChannelType, ImageFormat, PixelBuffer, PixelLayout};
use crate::image::{Raster, RasterData, Rect};
use crate::util::{CorrStereoError, CorrStereoResult};

const LUMA_WEIGHTS: [f32; 3] = [0.30, 0.59, 0.11];

/// Converts `src` to `layout` / `channel`, keeping its extent and planes.
///
/// With `rescale`, samples are mapped between the nominal full-scale ranges
/// of the two channel types (`255`, `65535`, `1.0`); otherwise values are
/// carried over numerically and saturated by the destination type.
pub fn convert(
    src: &AnyBuffer<'_>,
    layout: PixelLayout,
    channel: ChannelType,
    rescale: bool,
) -> CorrStereoResult<Raster> {
    let src_format = src.format();
    let dst_format = ImageFormat {
        layout,
        channel,
        ..src_format
    };
    if !src_format.simple_convert(&dst_format) {
        return Err(CorrStereoError::format_mismatch(dst_format, src_format));
    }

    let src_scale = if rescale {
        src_full_scale(src)
    } else {
        1.0
    };
    let samples = match src {
        AnyBuffer::U8(buf) => read_samples(buf, layout, src_scale),
        AnyBuffer::U16(buf) => read_samples(buf, layout, src_scale),
        AnyBuffer::F32(buf) => read_samples(buf, layout, src_scale),
    };

    let data = match channel {
        ChannelType::U8 => pack::<u8>(&samples, rescale),
        ChannelType::U16 => pack::<u16>(&samples, rescale),
        ChannelType::F32 => pack::<f32>(&samples, rescale),
        ChannelType::Unknown => {
            return Err(CorrStereoError::format_mismatch(dst_format, src_format))
        }
    };
    Raster::new(dst_format, data)
}

/// Converts the `bbox` region of `src` into a new raster.
pub fn read_region(
    src: &AnyBuffer<'_>,
    bbox: Rect,
    layout: PixelLayout,
    channel: ChannelType,
    rescale: bool,
) -> CorrStereoResult<Raster> {
    let region = src.cropped(bbox)?;
    convert(&region, layout, channel, rescale)
}

fn src_full_scale(src: &AnyBuffer<'_>) -> f32 {
    match src {
        AnyBuffer::U8(_) => u8::FULL_SCALE,
        AnyBuffer::U16(_) => u16::FULL_SCALE,
        AnyBuffer::F32(_) => f32::FULL_SCALE,
    }
}

/// Reads all samples in destination channel order, divided by `scale`.
///
/// When `scale != 1` the output is normalized to `[0, 1]` and an inserted
/// alpha channel is `1.0`; otherwise inserted alpha is `NaN` and resolved to
/// the destination full scale by `pack`.
fn read_samples<T: Channel>(buf: &PixelBuffer<'_, T>, dst: PixelLayout, scale: f32) -> Vec<f32> {
    let format = buf.format();
    let src_layout = format.layout;
    let mut out = Vec::with_capacity(format.cols * format.rows * format.planes * dst.channels());
    let mut px = vec![0.0f32; src_layout.channels()];
    let inv = 1.0 / scale;
    let opaque = if scale == 1.0 { f32::NAN } else { 1.0 };

    for p in 0..format.planes {
        for j in 0..format.rows {
            for i in 0..format.cols {
                if let Some(samples) = buf.pixel(i, j, p) {
                    for (dst_v, &s) in px.iter_mut().zip(samples) {
                        *dst_v = s.to_f32() * inv;
                    }
                }
                remap(src_layout, &px, dst, opaque, &mut out);
            }
        }
    }
    out
}

fn remap(src: PixelLayout, px: &[f32], dst: PixelLayout, opaque: f32, out: &mut Vec<f32>) {
    if src == dst || src.channels() == dst.channels() {
        out.extend_from_slice(px);
        return;
    }

    let (luma, rgb, alpha) = match src {
        PixelLayout::Gray => (px[0], [px[0]; 3], opaque),
        PixelLayout::GrayAlpha => (px[0], [px[0]; 3], px[1]),
        PixelLayout::Rgb => (weighted(px), [px[0], px[1], px[2]], opaque),
        PixelLayout::Rgba => (weighted(px), [px[0], px[1], px[2]], px[3]),
        PixelLayout::Generic(_) | PixelLayout::Unknown => {
            out.extend_from_slice(px);
            return;
        }
    };

    match dst {
        PixelLayout::Gray => out.push(luma),
        PixelLayout::GrayAlpha => out.extend_from_slice(&[luma, alpha]),
        PixelLayout::Rgb => out.extend_from_slice(&rgb),
        PixelLayout::Rgba => out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]),
        PixelLayout::Generic(_) | PixelLayout::Unknown => out.extend_from_slice(px),
    }
}

fn weighted(px: &[f32]) -> f32 {
    LUMA_WEIGHTS[0] * px[0] + LUMA_WEIGHTS[1] * px[1] + LUMA_WEIGHTS[2] * px[2]
}

fn pack<T: Channel>(samples: &[f32], rescale: bool) -> RasterData {
    let scale = if rescale { T::FULL_SCALE } else { 1.0 };
    let values: Vec<T> = samples
        .iter()
        .map(|&v| {
            if v.is_nan() {
                T::from_f32(T::FULL_SCALE)
            } else {
                T::from_f32(v * scale)
            }
        })
        .collect();
    T::into_data(values)
}

#[cfg(test)]
mod tests {
    use super::convert;
    use crate::image::{ChannelType, PixelLayout, Raster, RasterData};
    use crate::util::CorrStereoError;

    #[test]
    fn rgb_to_gray_uses_luma_weights() {
        let raster = Raster::from_vec(1, 1, PixelLayout::Rgb, vec![100u8, 200, 40]).unwrap();
        let gray = convert(&raster.buffer(), PixelLayout::Gray, ChannelType::U8, false).unwrap();
        assert_eq!(gray.data(), &RasterData::U8(vec![152]));
    }

    #[test]
    fn gray_to_rgba_inserts_opaque_alpha() {
        let raster = Raster::from_vec(2, 1, PixelLayout::Gray, vec![10u8, 20]).unwrap();
        let rgba = convert(&raster.buffer(), PixelLayout::Rgba, ChannelType::U8, false).unwrap();
        assert_eq!(
            rgba.data(),
            &RasterData::U8(vec![10, 10, 10, 255, 20, 20, 20, 255])
        );

        let rescaled =
            convert(&raster.buffer(), PixelLayout::GrayAlpha, ChannelType::F32, true).unwrap();
        match rescaled.data() {
            RasterData::F32(v) => {
                assert!((v[0] - 10.0 / 255.0).abs() < 1e-6);
                assert_eq!(v[1], 1.0);
            }
            other => panic!("unexpected storage {other:?}"),
        }
    }

    #[test]
    fn rescale_maps_full_scale_ranges() {
        let raster = Raster::from_vec(2, 1, PixelLayout::Gray, vec![0u8, 255]).unwrap();
        let wide = convert(&raster.buffer(), PixelLayout::Gray, ChannelType::U16, true).unwrap();
        assert_eq!(wide.data(), &RasterData::U16(vec![0, 65535]));
        let plain = convert(&raster.buffer(), PixelLayout::Gray, ChannelType::U16, false).unwrap();
        assert_eq!(plain.data(), &RasterData::U16(vec![0, 255]));
    }

    #[test]
    fn generic_layouts_refuse_channel_count_changes() {
        let raster = Raster::from_vec(1, 1, PixelLayout::Generic(2), vec![1.0f32, 2.0]).unwrap();
        assert!(matches!(
            convert(&raster.buffer(), PixelLayout::Gray, ChannelType::F32, false),
            Err(CorrStereoError::FormatMismatch { .. })
        ));
    }
}
