//! Disparity as a lazy view over a rectified stereo pair.
//!
//! `CorrelatorView` binds two source views to a `PyramidCorrelator`. For each
//! requested box it materializes a left and a right tile that cover the box,
//! the search range and half a kernel of padding (zero edge extension outside
//! the sources), correlates them with a local search range starting at zero,
//! shifts valid disparities back by the range minimum, and crops to the box.
//!
//! The node is immutable once built: configuration changes go through
//! `with_*` builders returning a new, re-validated view. Concurrent
//! materialization of any boxes is safe.

use crate::correlate::{
    CorrelatorConfig, DisparityMap, PyramidCorrelator, SearchRange, SubpixelMode,
};
use crate::debug::DebugWriter;
use crate::image::{ImageF32, ImageFormat, Raster, Rect};
use crate::preprocess::Preprocess;
use crate::trace::{trace_event, trace_span};
use crate::util::{CorrStereoError, CorrStereoResult};
use crate::view::{
    edge_extend, require_non_empty, EdgeExtension, ImageSource, SharedSource,
};
use std::fmt;
use std::sync::Arc;

/// Disparity-producing view over a left/right image pair.
#[derive(Clone)]
pub struct CorrelatorView {
    left: SharedSource,
    right: SharedSource,
    preprocess: Arc<dyn Preprocess>,
    config: CorrelatorConfig,
    correlator: PyramidCorrelator,
    debug_prefix: Option<String>,
}

impl CorrelatorView {
    /// Builds a view with the default configuration.
    ///
    /// Both sources must share their extent and be single-channel and
    /// single-plane, otherwise `FormatMismatch` is returned.
    pub fn new(
        left: SharedSource,
        right: SharedSource,
        preprocess: Arc<dyn Preprocess>,
    ) -> CorrStereoResult<Self> {
        let lf = left.format();
        let rf = right.format();
        if lf.cols != rf.cols || lf.rows != rf.rows {
            return Err(CorrStereoError::format_mismatch(
                format!("right image {}x{}", lf.cols, lf.rows),
                format!("{}x{}", rf.cols, rf.rows),
            ));
        }
        for format in [lf, rf] {
            if format.channels() != 1 || format.planes != 1 {
                return Err(CorrStereoError::format_mismatch(
                    "single-channel single-plane image",
                    format,
                ));
            }
        }
        let config = CorrelatorConfig::default();
        let correlator = PyramidCorrelator::new(local_config(&config))?;
        Ok(Self {
            left: edge_extend(&left, EdgeExtension::Zero),
            right: edge_extend(&right, EdgeExtension::Zero),
            preprocess,
            config,
            correlator,
            debug_prefix: None,
        })
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: CorrelatorConfig) -> CorrStereoResult<Self> {
        self.correlator = PyramidCorrelator::new(local_config(&config))?;
        self.config = config;
        Ok(self)
    }

    pub fn with_search_range(self, range: SearchRange) -> CorrStereoResult<Self> {
        let config = CorrelatorConfig {
            search_range: range,
            ..self.config.clone()
        };
        self.with_config(config)
    }

    pub fn with_kernel_size(self, cols: usize, rows: usize) -> CorrStereoResult<Self> {
        let config = CorrelatorConfig {
            kernel_size: (cols, rows),
            ..self.config.clone()
        };
        self.with_config(config)
    }

    pub fn with_subpixel(self, subpixel: SubpixelMode) -> CorrStereoResult<Self> {
        let config = CorrelatorConfig {
            subpixel,
            ..self.config.clone()
        };
        self.with_config(config)
    }

    pub fn with_cross_corr_threshold(self, threshold: f32) -> CorrStereoResult<Self> {
        let config = CorrelatorConfig {
            cross_corr_threshold: threshold,
            ..self.config.clone()
        };
        self.with_config(config)
    }

    pub fn with_score_threshold(self, threshold: f32) -> CorrStereoResult<Self> {
        let config = CorrelatorConfig {
            score_threshold: threshold,
            ..self.config.clone()
        };
        self.with_config(config)
    }

    /// Writes per-tile diagnostics under `prefix`; see `crate::debug`.
    pub fn with_debug_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.debug_prefix = Some(prefix.into());
        self
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn search_range(&self) -> SearchRange {
        self.config.search_range
    }

    pub fn kernel_size(&self) -> (usize, usize) {
        self.config.kernel_size
    }

    pub fn subpixel(&self) -> SubpixelMode {
        self.config.subpixel
    }

    pub fn cross_corr_threshold(&self) -> f32 {
        self.config.cross_corr_threshold
    }

    pub fn score_threshold(&self) -> f32 {
        self.config.score_threshold
    }

    pub fn debug_prefix(&self) -> Option<&str> {
        self.debug_prefix.as_deref()
    }

    /// Padded `(left, right)` source boxes read for `bbox`.
    pub fn crop_regions(&self, bbox: Rect) -> (Rect, Rect) {
        let s = self.config.search_range;
        let right = Rect::from_corners(
            bbox.min_x + s.min_x,
            bbox.min_y + s.min_y,
            bbox.max_x + s.max_x,
            bbox.max_y + s.max_y,
        );
        let left = Rect::new(bbox.min_x, bbox.min_y, right.width(), right.height());
        let (px, py) = self.config.padding();
        let (px, py) = (px as i32, py as i32);
        (left.grow(px, py), right.grow(px, py))
    }

    /// Disparity of `bbox` in source pixel coordinates.
    pub fn disparity(&self, bbox: Rect) -> CorrStereoResult<DisparityMap> {
        require_non_empty(bbox)?;
        let _span = trace_span!(
            "correlator_view_materialize",
            x0 = bbox.min_x,
            y0 = bbox.min_y,
            x1 = bbox.max_x,
            y1 = bbox.max_y
        )
        .entered();

        let (left_box, right_box) = self.crop_regions(bbox);
        trace_event!(
            "crop_regions",
            left = left_box.to_string().as_str(),
            right = right_box.to_string().as_str()
        );
        let left = ImageF32::from_raster(&self.left.materialize(left_box)?)?;
        let right = ImageF32::from_raster(&self.right.materialize(right_box)?)?;

        let mut map = match &self.debug_prefix {
            Some(prefix) => {
                let mut writer = DebugWriter::new(prefix, bbox);
                let map = self.correlator.correlate_inspect(
                    &left,
                    &right,
                    self.preprocess.as_ref(),
                    &mut |artifact| writer.record(artifact),
                )?;
                writer.finish();
                map
            }
            None => self
                .correlator
                .correlate(&left, &right, self.preprocess.as_ref())?,
        };

        let s = self.config.search_range;
        map.offset_all(s.min_x as f32, s.min_y as f32);
        map.crop(Rect::new(0, 0, bbox.width(), bbox.height()))
    }
}

/// Correlator settings for tiles cut by `crop_regions`: the search starts at
/// zero offset and spans the configured range.
fn local_config(config: &CorrelatorConfig) -> CorrelatorConfig {
    let s = config.search_range;
    CorrelatorConfig {
        search_range: Rect::new(0, 0, s.width(), s.height()),
        ..config.clone()
    }
}

impl ImageSource for CorrelatorView {
    /// Three `f32` channels per pixel: `dx`, `dy` and a validity flag.
    fn format(&self) -> ImageFormat {
        let f = self.left.format();
        DisparityMap::raster_format(f.cols, f.rows)
    }

    fn materialize(&self, bbox: Rect) -> CorrStereoResult<Raster> {
        Ok(self.disparity(bbox)?.to_raster())
    }
}

impl fmt::Display for CorrelatorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CorrelatorView {}x{} [{}] preprocess {}",
            self.left.cols(),
            self.left.rows(),
            self.config,
            self.preprocess.name()
        )?;
        if let Some(prefix) = &self.debug_prefix {
            write!(f, " debug {prefix}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CorrelatorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelatorView")
            .field("format", &self.format())
            .field("config", &self.config)
            .field("preprocess", &self.preprocess.name())
            .field("debug_prefix", &self.debug_prefix)
            .finish()
    }
}
