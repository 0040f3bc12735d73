//! Edge extension node and index mapping policies.

use crate::image::{Channel, ImageFormat, Raster, RasterData, Rect};
use crate::util::CorrStereoResult;
use crate::view::{require_non_empty, ImageSource, NodataAware, SharedSource};

/// How reads outside the parent's nominal extent are answered.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum EdgeExtension {
    /// Outside pixels read as zero in every channel.
    #[default]
    Zero,
    /// Outside pixels read as the given value, saturated to the sample type.
    Constant(f32),
    /// Nearest in-range pixel.
    Clamp,
    /// Mirror without repeating the edge pixel (`dcb|abcd|cba`).
    Reflect101,
}

impl EdgeExtension {
    /// Maps a possibly out-of-range index into `[0, len)`.
    ///
    /// Returns `None` when the pixel must be synthesized from the fill value.
    pub fn map_index(self, i: isize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        if i >= 0 && (i as usize) < len {
            return Some(i as usize);
        }
        match self {
            EdgeExtension::Zero | EdgeExtension::Constant(_) => None,
            EdgeExtension::Clamp => Some(if i < 0 { 0 } else { len - 1 }),
            EdgeExtension::Reflect101 => {
                if len == 1 {
                    return Some(0);
                }
                let period = (2 * len - 2) as isize;
                let r = i.rem_euclid(period) as usize;
                Some(if r < len { r } else { 2 * len - 2 - r })
            }
        }
    }

    fn fill_value(self) -> f32 {
        match self {
            EdgeExtension::Constant(v) => v,
            _ => 0.0,
        }
    }
}

/// Removes the domain bounds of its parent.
///
/// The nominal extent stays that of the parent; any box, including one
/// entirely outside, can be materialized.
#[derive(Clone)]
pub struct EdgeExtendView {
    parent: SharedSource,
    policy: EdgeExtension,
}

impl EdgeExtendView {
    pub fn new(parent: SharedSource, policy: EdgeExtension) -> Self {
        Self { parent, policy }
    }

    pub fn policy(&self) -> EdgeExtension {
        self.policy
    }
}

impl ImageSource for EdgeExtendView {
    fn format(&self) -> ImageFormat {
        self.parent.format()
    }

    fn materialize(&self, bbox: Rect) -> CorrStereoResult<Raster> {
        require_non_empty(bbox)?;
        let format = self.parent.format();
        let domain = Rect::of_size(format.cols, format.rows);
        if domain.contains_rect(&bbox) {
            return self.parent.materialize(bbox);
        }

        let xs = self.axis_map(bbox.min_x, bbox.max_x, format.cols);
        let ys = self.axis_map(bbox.min_y, bbox.max_y, format.rows);
        let out_format = format.with_size(bbox.width() as usize, bbox.height() as usize);
        let fill = self.policy.fill_value();

        // Read the smallest parent box covering every mapped index once.
        let (Some(sx), Some(sy)) = (span(&xs), span(&ys)) else {
            return Raster::filled(out_format, fill);
        };
        let source_box = Rect::from_corners(sx.0 as i32, sy.0 as i32, sx.1 as i32, sy.1 as i32);
        let src = self.parent.materialize(source_box)?;
        let xs: Vec<Option<usize>> = xs.iter().map(|x| x.map(|x| x - sx.0)).collect();
        let ys: Vec<Option<usize>> = ys.iter().map(|y| y.map(|y| y - sy.0)).collect();

        let data = match src.data() {
            RasterData::U8(_) => gather::<u8>(&src, &xs, &ys, fill),
            RasterData::U16(_) => gather::<u16>(&src, &xs, &ys, fill),
            RasterData::F32(_) => gather::<f32>(&src, &xs, &ys, fill),
        };
        Raster::new(out_format, data)
    }

    fn nodata(&self) -> Option<&dyn NodataAware> {
        self.parent.nodata()
    }
}

impl EdgeExtendView {
    fn axis_map(&self, start: i32, end: i32, len: usize) -> Vec<Option<usize>> {
        (start..end)
            .map(|i| self.policy.map_index(i as isize, len))
            .collect()
    }
}

/// Half-open `[min, max)` range covered by the mapped indices.
fn span(indices: &[Option<usize>]) -> Option<(usize, usize)> {
    let mut it = indices.iter().flatten();
    let first = *it.next()?;
    let (lo, hi) = it.fold((first, first), |(lo, hi), &i| (lo.min(i), hi.max(i)));
    Some((lo, hi + 1))
}

fn gather<T: Channel>(
    src: &Raster,
    xs: &[Option<usize>],
    ys: &[Option<usize>],
    fill: f32,
) -> RasterData {
    let format = src.format();
    let channels = format.channels();
    let fill = T::from_f32(fill);
    let mut out = Vec::with_capacity(xs.len() * ys.len() * format.planes * channels);
    let Some(buf) = src.typed::<T>() else {
        return T::into_data(out);
    };
    for p in 0..format.planes {
        for y in ys {
            for x in xs {
                match (x, y) {
                    (Some(x), Some(y)) => match buf.pixel(*x, *y, p) {
                        Some(px) => out.extend_from_slice(px),
                        None => out.extend(std::iter::repeat(fill).take(channels)),
                    },
                    _ => out.extend(std::iter::repeat(fill).take(channels)),
                }
            }
        }
    }
    T::into_data(out)
}

#[cfg(test)]
mod tests {
    use super::EdgeExtension;

    #[test]
    fn clamp_maps_to_nearest_edge() {
        let mode = EdgeExtension::Clamp;
        assert_eq!(mode.map_index(-3, 5), Some(0));
        assert_eq!(mode.map_index(2, 5), Some(2));
        assert_eq!(mode.map_index(5, 5), Some(4));
        assert_eq!(mode.map_index(99, 5), Some(4));
    }

    #[test]
    fn reflect101_mirrors_without_repeating_edge() {
        let mode = EdgeExtension::Reflect101;
        let expected = [(-4, 4), (-3, 3), (-1, 1), (0, 0), (4, 4), (5, 3), (8, 0)];
        for (i, want) in expected {
            assert_eq!(mode.map_index(i, 5), Some(want), "index {i}");
        }
        for i in -3..=3 {
            assert_eq!(mode.map_index(i, 1), Some(0));
        }
    }

    #[test]
    fn constant_policies_only_map_inside() {
        assert_eq!(EdgeExtension::Zero.map_index(-1, 4), None);
        assert_eq!(EdgeExtension::Constant(7.0).map_index(3, 4), Some(3));
        assert_eq!(EdgeExtension::Constant(7.0).map_index(4, 4), None);
        assert_eq!(EdgeExtension::Clamp.map_index(0, 0), None);
    }
}
