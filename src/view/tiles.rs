//! Tiled materialization of large regions.
//!
//! Tiles are independent, so with the `rayon` feature they are materialized
//! on the global thread pool. Results are stitched in tile order and do not
//! depend on scheduling.

use crate::image::{Channel, ChannelType, ImageFormat, Raster, RasterData, Rect};
use crate::trace::trace_span;
use crate::util::{CorrStereoError, CorrStereoResult};
use crate::view::{require_non_empty, ImageSource};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Splits `bbox` into row-major tiles of at most `tile_cols x tile_rows`.
pub fn tile_grid(bbox: Rect, tile_cols: usize, tile_rows: usize) -> CorrStereoResult<Vec<Rect>> {
    require_non_empty(bbox)?;
    if tile_cols == 0 || tile_rows == 0 {
        return Err(CorrStereoError::Config {
            reason: "tile size must be non-zero",
        });
    }
    let (tw, th) = (tile_cols as i32, tile_rows as i32);
    let mut tiles = Vec::new();
    let mut y = bbox.min_y;
    while y < bbox.max_y {
        let y1 = (y + th).min(bbox.max_y);
        let mut x = bbox.min_x;
        while x < bbox.max_x {
            let x1 = (x + tw).min(bbox.max_x);
            tiles.push(Rect::from_corners(x, y, x1, y1));
            x = x1;
        }
        y = y1;
    }
    Ok(tiles)
}

/// Materializes every tile, in parallel when the `rayon` feature is enabled.
pub fn materialize_tiles(source: &dyn ImageSource, tiles: &[Rect]) -> CorrStereoResult<Vec<Raster>> {
    #[cfg(feature = "rayon")]
    {
        tiles.par_iter().map(|t| source.materialize(*t)).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        tiles.iter().map(|t| source.materialize(*t)).collect()
    }
}

/// Materializes `bbox` tile by tile and stitches the result.
///
/// Each tile must come back at its requested size; views that clip their
/// output (such as a crop read past its box) yield `FormatMismatch`.
pub fn materialize_tiled(
    source: &dyn ImageSource,
    bbox: Rect,
    tile_cols: usize,
    tile_rows: usize,
) -> CorrStereoResult<Raster> {
    let _span = trace_span!("materialize_tiled", cols = bbox.width(), rows = bbox.height()).entered();
    let tiles = tile_grid(bbox, tile_cols, tile_rows)?;
    let rasters = materialize_tiles(source, &tiles)?;
    let format = source
        .format()
        .with_size(bbox.width() as usize, bbox.height() as usize);

    let mut data = match format.channel {
        ChannelType::U8 => RasterData::U8(vec![0; format.element_count()]),
        ChannelType::U16 => RasterData::U16(vec![0; format.element_count()]),
        ChannelType::F32 => RasterData::F32(vec![0.0; format.element_count()]),
        ChannelType::Unknown => {
            return Err(CorrStereoError::format_mismatch("known channel type", format))
        }
    };
    for (tile, raster) in tiles.iter().zip(&rasters) {
        let expected = format.with_size(tile.width() as usize, tile.height() as usize);
        if raster.format() != expected {
            return Err(CorrStereoError::format_mismatch(expected, raster.format()));
        }
        let x0 = (tile.min_x - bbox.min_x) as usize;
        let y0 = (tile.min_y - bbox.min_y) as usize;
        match (&mut data, raster.data()) {
            (RasterData::U8(dst), RasterData::U8(src)) => paste(dst, format, src, expected, x0, y0),
            (RasterData::U16(dst), RasterData::U16(src)) => {
                paste(dst, format, src, expected, x0, y0)
            }
            (RasterData::F32(dst), RasterData::F32(src)) => {
                paste(dst, format, src, expected, x0, y0)
            }
            _ => return Err(CorrStereoError::format_mismatch(format, raster.format())),
        }
    }
    Raster::new(format, data)
}

fn paste<T: Channel>(
    dst: &mut [T],
    dst_format: ImageFormat,
    src: &[T],
    src_format: ImageFormat,
    x0: usize,
    y0: usize,
) {
    let ch = dst_format.channels();
    let src_row = src_format.cols * ch;
    let dst_row = dst_format.cols * ch;
    for p in 0..src_format.planes {
        let src_plane = p * src_row * src_format.rows;
        let dst_plane = p * dst_row * dst_format.rows;
        for j in 0..src_format.rows {
            let s = src_plane + j * src_row;
            let d = dst_plane + (y0 + j) * dst_row + x0 * ch;
            dst[d..d + src_row].copy_from_slice(&src[s..s + src_row]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tile_grid;
    use crate::image::Rect;

    #[test]
    fn grid_covers_box_without_overlap() {
        let bbox = Rect::new(-3, 2, 10, 7);
        let tiles = tile_grid(bbox, 4, 4).unwrap();
        assert_eq!(tiles.len(), 3 * 2);
        assert_eq!(tiles[0], Rect::new(-3, 2, 4, 4));
        assert_eq!(tiles[2], Rect::from_corners(5, 2, 7, 6));
        assert_eq!(tiles[5], Rect::from_corners(5, 6, 7, 9));
        let total: usize = tiles.iter().map(Rect::area).sum();
        assert_eq!(total, bbox.area());
    }
}
