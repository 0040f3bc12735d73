//! Pyramid area correlator.
//!
//! `PyramidCorrelator::correlate` takes two equally sized single-channel
//! tiles padded by half the kernel on every side, where the right tile already
//! covers the search range, and returns one `Disparity` per pixel of the
//! logical (unpadded) tile.
//!
//! The pipeline is: build smoothing pyramids, preprocess every level, search
//! coarse-to-fine (`search`), reject matches under the score threshold or
//! failing the left/right check (`consistency`), then refine survivors to
//! sub-pixel precision (`subpixel`). Rejected pixels are reported as missing,
//! never as errors.

pub(crate) mod consistency;
pub(crate) mod search;
pub mod subpixel;

use crate::image::pyramid::ImagePyramid;
use crate::image::{ChannelType, ImageF32, ImageFormat, PixelLayout, Raster, RasterData, Rect};
use crate::kernel::ScorePlan;
use crate::optimize::LmConfig;
use crate::preprocess::Preprocess;
use crate::trace::{trace_event, trace_span};
use crate::util::math::level_extent;
use crate::util::{CorrStereoError, CorrStereoResult};
use std::fmt;

/// Offset from a left-image pixel to its right-image correspondent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disparity {
    pub dx: f32,
    pub dy: f32,
    /// When set, `dx` and `dy` carry no meaning.
    pub missing: bool,
}

impl Disparity {
    pub const MISSING: Disparity = Disparity {
        dx: 0.0,
        dy: 0.0,
        missing: true,
    };

    pub fn new(dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            missing: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.missing
    }

    /// Adds `(ox, oy)` to a valid disparity; missing values stay missing.
    pub fn offset(self, ox: f32, oy: f32) -> Self {
        if self.missing {
            self
        } else {
            Self::new(self.dx + ox, self.dy + oy)
        }
    }
}

/// Row-major tile of disparities.
#[derive(Clone, Debug, PartialEq)]
pub struct DisparityMap {
    width: usize,
    height: usize,
    data: Vec<Disparity>,
}

impl DisparityMap {
    pub fn new(width: usize, height: usize, data: Vec<Disparity>) -> CorrStereoResult<Self> {
        if data.len() != width * height {
            return Err(CorrStereoError::BufferTooSmall {
                needed: width * height,
                got: data.len(),
            });
        }
        Ok(Self::from_parts(width, height, data))
    }

    pub(crate) fn from_parts(width: usize, height: usize, data: Vec<Disparity>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    /// Map of the given size with every pixel missing.
    pub fn missing(width: usize, height: usize) -> Self {
        Self::from_parts(width, height, vec![Disparity::MISSING; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[Disparity] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Disparity> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|d| d.missing).count()
    }

    /// Adds `(ox, oy)` to every valid disparity.
    pub fn offset_all(&mut self, ox: f32, oy: f32) {
        for d in &mut self.data {
            *d = d.offset(ox, oy);
        }
    }

    /// Copy of `bbox`, which must lie inside the map.
    pub fn crop(&self, bbox: Rect) -> CorrStereoResult<DisparityMap> {
        if bbox.is_empty() || !Rect::of_size(self.width, self.height).contains_rect(&bbox) {
            return Err(CorrStereoError::InvalidRegion {
                bbox,
                reason: "crop outside the disparity map",
            });
        }
        let mut data = Vec::with_capacity(bbox.area());
        for y in bbox.min_y..bbox.max_y {
            let start = y as usize * self.width;
            data.extend_from_slice(
                &self.data[start + bbox.min_x as usize..start + bbox.max_x as usize],
            );
        }
        Ok(Self::from_parts(
            bbox.width() as usize,
            bbox.height() as usize,
            data,
        ))
    }

    /// Three-channel `f32` raster of `(dx, dy, valid)`; missing pixels are `(0, 0, 0)`.
    pub fn to_raster(&self) -> Raster {
        let mut data = Vec::with_capacity(self.data.len() * 3);
        for d in &self.data {
            if d.missing {
                data.extend_from_slice(&[0.0, 0.0, 0.0]);
            } else {
                data.extend_from_slice(&[d.dx, d.dy, 1.0]);
            }
        }
        let format = Self::raster_format(self.width, self.height);
        match Raster::new(format, RasterData::F32(data)) {
            Ok(raster) => raster,
            Err(err) => unreachable!("disparity raster invariant violated: {err}"),
        }
    }

    /// Format of rasters produced by `to_raster`.
    pub fn raster_format(width: usize, height: usize) -> ImageFormat {
        ImageFormat::new(width, height, 1, PixelLayout::Generic(3), ChannelType::F32)
    }

    /// Splits into `dx` / `dy` tiles with `NaN` at missing pixels.
    pub fn to_planes(&self) -> (ImageF32, ImageF32) {
        let pick = |f: fn(&Disparity) -> f32| {
            ImageF32::from_fn(self.width, self.height, |x, y| {
                let d = &self.data[y * self.width + x];
                if d.missing {
                    f32::NAN
                } else {
                    f(d)
                }
            })
        };
        (pick(|d| d.dx), pick(|d| d.dy))
    }
}

/// Rectangle of candidate `(dx, dy)` offsets; `max` is exclusive.
pub type SearchRange = Rect;

/// Independent sub-pixel refinement switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubpixelMode {
    pub horizontal: bool,
    pub vertical: bool,
    pub affine: bool,
}

impl Default for SubpixelMode {
    fn default() -> Self {
        Self {
            horizontal: true,
            vertical: true,
            affine: false,
        }
    }
}

impl SubpixelMode {
    /// Integer disparities only.
    pub const NONE: SubpixelMode = SubpixelMode {
        horizontal: false,
        vertical: false,
        affine: false,
    };
}

/// Configuration for the pyramid correlator.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelatorConfig {
    /// Correlation window `(width, height)`.
    pub kernel_size: (usize, usize),
    pub search_range: SearchRange,
    /// Maximum left/right disagreement in pixels; negative disables the check.
    pub cross_corr_threshold: f32,
    /// Minimum ZNCC score of an accepted match.
    pub score_threshold: f32,
    pub subpixel: SubpixelMode,
    /// Upper bound on pyramid levels, including the base.
    pub max_levels: usize,
    /// Levels stop being added once the coarsest search extent is at most this.
    pub coarse_search_extent: usize,
    /// Growth of the propagated offset box at each finer level.
    pub refine_radius: i32,
    /// Per-pixel window variance floor; flatter windows do not match.
    pub min_variance: f32,
    pub affine_max_iterations: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            kernel_size: (24, 24),
            search_range: Rect::new(-50, -50, 100, 100),
            cross_corr_threshold: 2.0,
            score_threshold: 0.5,
            subpixel: SubpixelMode::default(),
            max_levels: 5,
            coarse_search_extent: 8,
            refine_radius: 1,
            min_variance: 1e-4,
            affine_max_iterations: 20,
        }
    }
}

impl CorrelatorConfig {
    pub fn validate(&self) -> CorrStereoResult<()> {
        if self.kernel_size.0 == 0 || self.kernel_size.1 == 0 {
            return Err(CorrStereoError::Config {
                reason: "kernel dimensions must be positive",
            });
        }
        if self.search_range.is_empty() {
            return Err(CorrStereoError::Config {
                reason: "search range is empty or inverted",
            });
        }
        if !self.cross_corr_threshold.is_finite() {
            return Err(CorrStereoError::Config {
                reason: "cross-correlation threshold must be finite",
            });
        }
        if !self.score_threshold.is_finite() {
            return Err(CorrStereoError::Config {
                reason: "score threshold must be finite",
            });
        }
        if !self.min_variance.is_finite() || self.min_variance < 0.0 {
            return Err(CorrStereoError::Config {
                reason: "variance floor must be finite and non-negative",
            });
        }
        if self.max_levels == 0 {
            return Err(CorrStereoError::Config {
                reason: "at least one pyramid level is required",
            });
        }
        if self.refine_radius < 0 {
            return Err(CorrStereoError::Config {
                reason: "refine radius must be non-negative",
            });
        }
        Ok(())
    }

    /// Half kernel padding expected on each side of input tiles.
    pub fn padding(&self) -> (usize, usize) {
        (self.kernel_size.0 / 2, self.kernel_size.1 / 2)
    }

    fn lm_config(&self) -> LmConfig {
        LmConfig {
            max_iterations: self.affine_max_iterations,
            ..LmConfig::default()
        }
    }
}

impl fmt::Display for CorrelatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "search {} kernel {}x{} cross-corr {} score {} subpixel h={} v={} affine={}",
            self.search_range,
            self.kernel_size.0,
            self.kernel_size.1,
            self.cross_corr_threshold,
            self.score_threshold,
            self.subpixel.horizontal,
            self.subpixel.vertical,
            self.subpixel.affine
        )
    }
}

/// Diagnostic output handed to `PyramidCorrelator::correlate_inspect`.
#[derive(Debug)]
pub enum Artifact<'a> {
    /// Preprocessed finest-level tiles.
    Preprocessed {
        left: &'a ImageF32,
        right: &'a ImageF32,
    },
    /// Integer forward disparities of one pyramid level, in level pixels.
    Level {
        level: usize,
        disparity: DisparityMap,
    },
}

/// Coarse-to-fine area correlator for one tile pair.
#[derive(Clone, Debug)]
pub struct PyramidCorrelator {
    config: CorrelatorConfig,
}

impl PyramidCorrelator {
    /// Fails with `Config` when the configuration is invalid.
    pub fn new(config: CorrelatorConfig) -> CorrStereoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Number of pyramid levels used for a `width x height` padded tile.
    pub fn level_count(&self, width: usize, height: usize) -> usize {
        let (kw, kh) = self.config.kernel_size;
        let range = self.config.search_range;
        let extent = range.width().max(range.height()) as usize;
        let mut levels = 1;
        while levels < self.config.max_levels
            && level_extent(extent, levels - 1) > self.config.coarse_search_extent
            && level_extent(width, levels) >= kw
            && level_extent(height, levels) >= kh
        {
            levels += 1;
        }
        levels
    }

    /// Disparity of the logical tile; see the module docs for tile geometry.
    pub fn correlate(
        &self,
        left: &ImageF32,
        right: &ImageF32,
        preprocess: &dyn Preprocess,
    ) -> CorrStereoResult<DisparityMap> {
        self.correlate_inspect(left, right, preprocess, &mut |_| {})
    }

    /// Like `correlate`, passing intermediate results to `inspect`.
    pub fn correlate_inspect(
        &self,
        left: &ImageF32,
        right: &ImageF32,
        preprocess: &dyn Preprocess,
        inspect: &mut dyn FnMut(Artifact<'_>),
    ) -> CorrStereoResult<DisparityMap> {
        let (width, height) = (left.width(), left.height());
        if (right.width(), right.height()) != (width, height) {
            return Err(CorrStereoError::format_mismatch(
                format!("right tile {width}x{height}"),
                format!("{}x{}", right.width(), right.height()),
            ));
        }
        let (px, py) = self.config.padding();
        if width <= 2 * px || height <= 2 * py {
            return Err(CorrStereoError::InvalidRegion {
                bbox: Rect::of_size(width, height),
                reason: "tile smaller than the kernel padding",
            });
        }
        let region = Rect::new(
            px as i32,
            py as i32,
            (width - 2 * px) as i32,
            (height - 2 * py) as i32,
        );

        let levels = self.level_count(width, height);
        let _span =
            trace_span!("pyramid_correlate", width = width, height = height, levels = levels)
                .entered();
        trace_event!("pyramid_levels", levels = levels);

        let left_levels = preprocessed_pyramid(left, levels, preprocess);
        let right_levels = preprocessed_pyramid(right, levels, preprocess);
        inspect(Artifact::Preprocessed {
            left: &left_levels[0],
            right: &right_levels[0],
        });

        let range = self.config.search_range;
        let forward = search::pyramid_search(
            &left_levels,
            &right_levels,
            range,
            region,
            &self.config,
            &mut |level, field, lregion| {
                inspect(Artifact::Level {
                    level,
                    disparity: field.to_disparity(lregion),
                })
            },
        );

        let mut matches = Vec::with_capacity(region.area());
        let mut low_score = 0usize;
        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                let found = forward.offset(x, y);
                if found.is_some()
                    && forward.score(x as usize, y as usize) < self.config.score_threshold
                {
                    low_score += 1;
                    matches.push(None);
                } else {
                    matches.push(found);
                }
            }
        }

        let mut inconsistent = 0usize;
        if self.config.cross_corr_threshold >= 0.0 {
            let reverse_range = Rect::from_corners(
                1 - range.max_x,
                1 - range.max_y,
                1 - range.min_x,
                1 - range.min_y,
            );
            let reverse = search::pyramid_search(
                &right_levels,
                &left_levels,
                reverse_range,
                region,
                &self.config,
                &mut |_, _, _| {},
            );
            inconsistent = consistency::reject_inconsistent(
                &mut matches,
                region,
                &reverse,
                self.config.cross_corr_threshold,
            );
        }
        trace_event!("rejections", score = low_score, consistency = inconsistent);

        Ok(self.refine(&left_levels[0], &right_levels[0], region, &matches))
    }

    fn refine(
        &self,
        left: &ImageF32,
        right: &ImageF32,
        region: Rect,
        matches: &[Option<(i32, i32)>],
    ) -> DisparityMap {
        let sub = self.config.subpixel;
        let plan = ScorePlan::new(left, right, self.config.kernel_size, self.config.min_variance);
        let lm = self.config.lm_config();
        let width = region.width() as usize;
        let mut fallbacks = 0usize;

        let data = matches
            .iter()
            .enumerate()
            .map(|(idx, m)| {
                let Some(d) = *m else {
                    return Disparity::MISSING;
                };
                let x = region.min_x + (idx % width) as i32;
                let y = region.min_y + (idx / width) as i32;
                let (mut dx, mut dy) =
                    subpixel::parabola_refine(&plan, x, y, d, sub.horizontal, sub.vertical);
                if sub.affine {
                    match subpixel::affine_refine(
                        left,
                        right,
                        (x as usize, y as usize),
                        d,
                        self.config.kernel_size,
                        &lm,
                    ) {
                        Ok((ax, ay))
                            if (ax - d.0 as f32).abs() <= 1.0 && (ay - d.1 as f32).abs() <= 1.0 =>
                        {
                            dx = ax;
                            dy = ay;
                        }
                        _ => fallbacks += 1,
                    }
                }
                Disparity::new(dx, dy)
            })
            .collect();
        if sub.affine {
            trace_event!("affine_fallbacks", count = fallbacks);
        }
        DisparityMap::from_parts(width, region.height() as usize, data)
    }
}

fn preprocessed_pyramid(tile: &ImageF32, levels: usize, preprocess: &dyn Preprocess) -> Vec<ImageF32> {
    ImagePyramid::build(tile, levels)
        .levels()
        .iter()
        .map(|level| preprocess.apply(level))
        .collect()
}
