//! Per-tile diagnostic artifacts.
//!
//! With a debug prefix set, each correlated tile writes its preprocessed
//! finest-level inputs and the integer disparity of every pyramid level as
//! PNGs named `<prefix>-<x0>-<x1>_<y0>-<y1>-<artifact>.png`. Writing needs the
//! `image-io` feature; without it the artifacts are only announced through a
//! trace event. Failures never affect the disparity result.

use crate::correlate::Artifact;
use crate::image::Rect;
use crate::trace::trace_event;

/// File prefix of a tile's artifacts.
pub fn tile_prefix(prefix: &str, bbox: Rect) -> String {
    format!(
        "{prefix}-{}-{}_{}-{}-",
        bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y
    )
}

/// Collects the artifacts of one tile.
pub(crate) struct DebugWriter {
    prefix: String,
    written: usize,
    failed: usize,
}

impl DebugWriter {
    pub(crate) fn new(prefix: &str, bbox: Rect) -> Self {
        Self {
            prefix: tile_prefix(prefix, bbox),
            written: 0,
            failed: 0,
        }
    }

    pub(crate) fn record(&mut self, artifact: Artifact<'_>) {
        match artifact {
            Artifact::Preprocessed { left, right } => {
                self.save("left", left);
                self.save("right", right);
            }
            Artifact::Level { level, disparity } => {
                let (dx, dy) = disparity.to_planes();
                self.save(&format!("level{level}-dx"), &dx);
                self.save(&format!("level{level}-dy"), &dy);
            }
        }
    }

    #[cfg(feature = "image-io")]
    fn save(&mut self, name: &str, tile: &crate::image::ImageF32) {
        let path = format!("{}{name}.png", self.prefix);
        match crate::image::io::save_normalized_png(tile, &path) {
            Ok(()) => self.written += 1,
            Err(err) => {
                self.failed += 1;
                trace_event!(
                    "debug_artifact_failed",
                    path = path.as_str(),
                    error = err.to_string().as_str()
                );
            }
        }
    }

    #[cfg(not(feature = "image-io"))]
    fn save(&mut self, name: &str, tile: &crate::image::ImageF32) {
        let _ = (name, tile);
        self.failed += 1;
    }

    pub(crate) fn finish(self) {
        trace_event!(
            "debug_artifacts",
            prefix = self.prefix.as_str(),
            written = self.written,
            skipped = self.failed
        );
    }
}
