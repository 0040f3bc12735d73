//! `CorrelatorView` as a node in a view graph.

use corrstereo::view::{convert, crop, shared};
use corrstereo::{
    tile_prefix, ChannelType, CorrStereoError, CorrelatorConfig, CorrelatorView, Disparity,
    DisparityMap, ImageSource, LogPreprocess, MemoryImage, NullPreprocess, PixelLayout, Raster,
    Rect, SharedSource, SubpixelMode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const SIZE: usize = 112;

fn texture(seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Vec<u32> = (0..SIZE * SIZE).map(|_| rng.random_range(0..256u32)).collect();
    let at = |x: i64, y: i64| {
        let x = x.clamp(0, SIZE as i64 - 1) as usize;
        let y = y.clamp(0, SIZE as i64 - 1) as usize;
        noise[y * SIZE + x]
    };
    let mut out = Vec::with_capacity(SIZE * SIZE);
    for y in 0..SIZE as i64 {
        for x in 0..SIZE as i64 {
            let sum: u32 = (-1..=1)
                .flat_map(|j| (-1..=1).map(move |i| (i, j)))
                .map(|(i, j)| at(x + i, y + j))
                .sum();
            out.push(((sum + 4) / 9) as u8);
        }
    }
    out
}

/// Crops of one texture with `right(x, y) = left(x - 3, y + 2)`.
fn pair_from(base: &SharedSource) -> (SharedSource, SharedSource) {
    (
        crop(base, Rect::new(16, 16, 80, 80)).unwrap(),
        crop(base, Rect::new(13, 18, 80, 80)).unwrap(),
    )
}

fn gray_pair() -> (SharedSource, SharedSource) {
    let base = shared(MemoryImage::new(
        Raster::from_vec(SIZE, SIZE, PixelLayout::Gray, texture(17)).unwrap(),
    ));
    pair_from(&base)
}

fn config() -> CorrelatorConfig {
    CorrelatorConfig {
        kernel_size: (9, 9),
        search_range: Rect::new(-5, -6, 13, 13),
        subpixel: SubpixelMode::NONE,
        ..CorrelatorConfig::default()
    }
}

fn build(left: SharedSource, right: SharedSource) -> CorrelatorView {
    CorrelatorView::new(left, right, Arc::new(NullPreprocess))
        .unwrap()
        .with_config(config())
        .unwrap()
}

#[test]
fn materialized_raster_carries_dx_dy_and_validity() {
    let (left, right) = gray_pair();
    let view = build(left, right);

    let format = view.format();
    assert_eq!(format, DisparityMap::raster_format(80, 80));
    assert_eq!(format.layout, PixelLayout::Generic(3));
    assert_eq!(format.channel, ChannelType::F32);

    let raster = view.materialize(Rect::new(24, 20, 12, 10)).unwrap();
    assert_eq!((raster.cols(), raster.rows(), raster.channels()), (12, 10, 3));
    for j in 0..10 {
        for i in 0..12 {
            assert_eq!(raster.get_f32(i, j, 0, 0), Some(3.0));
            assert_eq!(raster.get_f32(i, j, 0, 1), Some(-2.0));
            assert_eq!(raster.get_f32(i, j, 0, 2), Some(1.0));
        }
    }
}

#[test]
fn empty_request_is_rejected() {
    let (left, right) = gray_pair();
    let view = build(left, right);
    assert!(matches!(
        view.materialize(Rect::new(10, 10, 0, 4)),
        Err(CorrStereoError::InvalidRegion { .. })
    ));
}

#[test]
fn builders_keep_other_settings() {
    let (left, right) = gray_pair();
    let view = build(left, right)
        .with_kernel_size(11, 7)
        .unwrap()
        .with_score_threshold(0.7)
        .unwrap()
        .with_cross_corr_threshold(1.0)
        .unwrap();
    assert_eq!(view.kernel_size(), (11, 7));
    assert_eq!(view.search_range(), Rect::new(-5, -6, 13, 13));
    assert_eq!(view.subpixel(), SubpixelMode::NONE);
    assert_eq!(view.score_threshold(), 0.7);
    assert_eq!(view.cross_corr_threshold(), 1.0);
    assert!(view.debug_prefix().is_none());

    let text = view.to_string();
    assert!(text.contains("kernel 11x7"), "{text}");
    assert!(text.contains("preprocess null"), "{text}");
}

#[test]
fn concurrent_requests_match_sequential_ones() {
    let (left, right) = gray_pair();
    let view = build(left, right);
    let boxes = [
        Rect::new(16, 16, 16, 16),
        Rect::new(40, 16, 16, 16),
        Rect::new(16, 40, 16, 16),
        Rect::new(30, 30, 16, 16),
    ];
    let sequential: Vec<Raster> = boxes
        .iter()
        .map(|&b| view.materialize(b).unwrap())
        .collect();

    let concurrent: Vec<Raster> = std::thread::scope(|scope| {
        let handles: Vec<_> = boxes
            .iter()
            .map(|&b| {
                let view = &view;
                scope.spawn(move || view.materialize(b).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(sequential, concurrent);
}

#[test]
fn converted_color_sources_feed_the_correlator() {
    let gray = texture(17);
    let rgb: Vec<u8> = gray.iter().flat_map(|&v| [v, v, v]).collect();
    let base = shared(MemoryImage::new(
        Raster::from_vec(SIZE, SIZE, PixelLayout::Rgb, rgb).unwrap(),
    ));
    let (left, right) = pair_from(&base);

    assert!(matches!(
        CorrelatorView::new(Arc::clone(&left), Arc::clone(&right), Arc::new(NullPreprocess)),
        Err(CorrStereoError::FormatMismatch { .. })
    ));

    let left = convert(&left, PixelLayout::Gray, ChannelType::U8, false).unwrap();
    let right = convert(&right, PixelLayout::Gray, ChannelType::U8, false).unwrap();
    let map = build(left, right)
        .disparity(Rect::new(20, 20, 16, 16))
        .unwrap();
    assert!(map.data().iter().all(|&d| d == Disparity::new(3.0, -2.0)));
}

#[test]
fn preprocessing_keeps_the_match() {
    let (left, right) = gray_pair();
    let view = CorrelatorView::new(left, right, Arc::new(LogPreprocess::default()))
        .unwrap()
        .with_config(config())
        .unwrap();
    let map = view.disparity(Rect::new(24, 24, 16, 16)).unwrap();
    let valid: Vec<Disparity> = map.data().iter().copied().filter(Disparity::is_valid).collect();
    assert!(valid.len() * 4 >= map.data().len() * 3);
    assert!(valid.iter().all(|&d| d == Disparity::new(3.0, -2.0)));
}

#[test]
fn debug_prefix_leaves_results_unchanged() {
    let (left, right) = gray_pair();
    let plain = build(Arc::clone(&left), Arc::clone(&right));
    let dir = std::env::temp_dir().join(format!("corrstereo-debug-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let prefix = dir.join("tile").to_string_lossy().into_owned();
    let debug = plain.clone().with_debug_prefix(prefix.clone());
    assert_eq!(debug.debug_prefix(), Some(prefix.as_str()));

    let bbox = Rect::new(20, 20, 16, 16);
    assert_eq!(
        plain.disparity(bbox).unwrap(),
        debug.disparity(bbox).unwrap()
    );

    let stem = tile_prefix(&prefix, bbox);
    assert!(stem.starts_with(&prefix));
    #[cfg(feature = "image-io")]
    {
        for artifact in ["left", "right", "level0-dx", "level0-dy"] {
            let path = format!("{stem}{artifact}.png");
            assert!(std::path::Path::new(&path).exists(), "missing {path}");
        }
    }
    let _ = std::fs::remove_dir_all(&dir);
}
