//! Behavioral properties of the pyramid correlator on synthetic stereo pairs.

use corrstereo::view::{crop, shared};
use corrstereo::{
    CorrelatorConfig, CorrelatorView, Disparity, DisparityMap, ImageSource, MemoryImage,
    NullPreprocess, PixelLayout, PyramidCorrelator, Raster, Rect, SharedSource, SubpixelMode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Seeded noise smoothed with a 3x3 box filter, rounded back to `u8`.
fn textured(cols: usize, rows: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Vec<u32> = (0..cols * rows).map(|_| rng.random_range(0..256u32)).collect();
    let mut out = Vec::with_capacity(cols * rows);
    for y in 0..rows {
        for x in 0..cols {
            let mut acc = 0u32;
            for j in -1i64..=1 {
                for i in -1i64..=1 {
                    let xx = (x as i64 + i).clamp(0, cols as i64 - 1) as usize;
                    let yy = (y as i64 + j).clamp(0, rows as i64 - 1) as usize;
                    acc += noise[yy * cols + xx];
                }
            }
            out.push(((acc + 4) / 9) as u8);
        }
    }
    out
}

fn gray_u8(cols: usize, rows: usize, data: Vec<u8>) -> SharedSource {
    shared(MemoryImage::new(
        Raster::from_vec(cols, rows, PixelLayout::Gray, data).unwrap(),
    ))
}

fn gray_f32(cols: usize, rows: usize, f: impl Fn(usize, usize) -> f32) -> SharedSource {
    let data: Vec<f32> = (0..rows)
        .flat_map(|y| (0..cols).map(move |x| (x, y)))
        .map(|(x, y)| f(x, y))
        .collect();
    shared(MemoryImage::new(
        Raster::from_vec(cols, rows, PixelLayout::Gray, data).unwrap(),
    ))
}

fn correlator_view(
    left: SharedSource,
    right: SharedSource,
    config: CorrelatorConfig,
) -> CorrelatorView {
    CorrelatorView::new(left, right, Arc::new(NullPreprocess))
        .unwrap()
        .with_config(config)
        .unwrap()
}

/// Left/right crops of one texture so that `right(x, y) = left(x - 3, y + 2)`.
fn shifted_pair() -> (SharedSource, SharedSource) {
    let base = gray_u8(112, 112, textured(112, 112, 11));
    let left = crop(&base, Rect::new(16, 16, 80, 80)).unwrap();
    let right = crop(&base, Rect::new(13, 18, 80, 80)).unwrap();
    (left, right)
}

fn assert_all(map: &DisparityMap, expected: Disparity) {
    for y in 0..map.height() {
        for x in 0..map.width() {
            assert_eq!(map.get(x, y), Some(expected), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn identical_images_give_zero_disparity() {
    let image = gray_u8(64, 64, textured(64, 64, 3));
    let view = correlator_view(
        Arc::clone(&image),
        image,
        CorrelatorConfig {
            kernel_size: (7, 7),
            search_range: Rect::new(-4, -4, 9, 9),
            subpixel: SubpixelMode::NONE,
            ..CorrelatorConfig::default()
        },
    );
    let map = view.disparity(Rect::new(16, 16, 24, 24)).unwrap();
    assert_eq!((map.width(), map.height()), (24, 24));
    assert_all(&map, Disparity::new(0.0, 0.0));
}

#[test]
fn known_integer_shift_is_recovered_exactly() {
    let (left, right) = shifted_pair();
    let view = correlator_view(
        left,
        right,
        CorrelatorConfig {
            kernel_size: (9, 9),
            search_range: Rect::new(-5, -6, 13, 13),
            subpixel: SubpixelMode::NONE,
            ..CorrelatorConfig::default()
        },
    );
    let map = view.disparity(Rect::new(20, 20, 32, 32)).unwrap();
    assert_all(&map, Disparity::new(3.0, -2.0));
}

/// Smooth sinusoid pair with `right(x, y) = left(x - 2.4, y + 0.7)`.
const SUBPIXEL_SHIFT: (f32, f32) = (2.4, -0.7);

fn subpixel_view(subpixel: SubpixelMode, affine_max_iterations: usize) -> CorrelatorView {
    let f = |x: f32, y: f32| {
        128.0
            + 40.0 * (0.37 * x + 0.11 * y).sin()
            + 35.0 * (0.13 * x - 0.41 * y).cos()
            + 25.0 * (0.27 * x + 1.0).sin()
            + 20.0 * (0.33 * y - 0.5).cos()
    };
    let (tx, ty) = SUBPIXEL_SHIFT;
    let left = gray_f32(96, 96, |x, y| f(x as f32, y as f32));
    let right = gray_f32(96, 96, |x, y| f(x as f32 - tx, y as f32 - ty));
    correlator_view(
        left,
        right,
        CorrelatorConfig {
            kernel_size: (15, 15),
            search_range: Rect::new(-4, -4, 9, 9),
            subpixel,
            affine_max_iterations,
            ..CorrelatorConfig::default()
        },
    )
}

fn assert_near_shift(map: &DisparityMap) {
    let (tx, ty) = SUBPIXEL_SHIFT;
    assert_eq!(map.missing_count(), 0);
    for d in map.data() {
        assert!((d.dx - tx).abs() <= 0.1, "dx = {}", d.dx);
        assert!((d.dy - ty).abs() <= 0.1, "dy = {}", d.dy);
    }
}

const SUBPIXEL_BBOX: Rect = Rect::new(28, 28, 24, 24);

#[test]
fn subpixel_shift_is_recovered_within_a_tenth_of_a_pixel() {
    let view = subpixel_view(SubpixelMode::default(), 20);
    assert_near_shift(&view.disparity(SUBPIXEL_BBOX).unwrap());
}

#[test]
fn affine_refinement_recovers_subpixel_shift() {
    let affine = SubpixelMode {
        affine: true,
        ..SubpixelMode::default()
    };
    let view = subpixel_view(affine, 20);
    assert_near_shift(&view.disparity(SUBPIXEL_BBOX).unwrap());
}

#[test]
fn unconverged_affine_refinement_falls_back_to_parabola() {
    let affine = SubpixelMode {
        affine: true,
        ..SubpixelMode::default()
    };
    let starved = subpixel_view(affine, 1).disparity(SUBPIXEL_BBOX).unwrap();
    let parabola = subpixel_view(SubpixelMode::default(), 1)
        .disparity(SUBPIXEL_BBOX)
        .unwrap();
    assert_eq!(starved.missing_count(), parabola.missing_count());
    assert_eq!(starved, parabola);
}

#[test]
fn flat_tile_is_entirely_missing() {
    let flat = gray_u8(64, 64, vec![90; 64 * 64]);
    let view = correlator_view(
        Arc::clone(&flat),
        flat,
        CorrelatorConfig {
            kernel_size: (7, 7),
            search_range: Rect::new(-4, -4, 9, 9),
            ..CorrelatorConfig::default()
        },
    );
    let map = view.disparity(Rect::new(24, 24, 16, 16)).unwrap();
    assert_eq!(map.missing_count(), 16 * 16);
}

#[test]
fn left_right_disagreement_marks_pixel_missing() {
    let (cols, rows) = (64usize, 48usize);
    let mut rng = StdRng::seed_from_u64(5);
    let base: Vec<f32> = (0..cols * rows)
        .map(|_| rng.random::<f32>() * 255.0)
        .collect();

    // Copy the 5x5 window around p1 onto p2 in the left image only, with a
    // small perturbation. Forward matching at p2 then lands on p1 in the right
    // image, whose own best reverse match is p1 itself.
    let (p1, p2) = ((24usize, 23usize), (30usize, 23usize));
    let mut left = base.clone();
    for j in 0..5 {
        for i in 0..5 {
            let src = (p1.1 + j - 2) * cols + p1.0 + i - 2;
            let dst = (p2.1 + j - 2) * cols + p2.0 + i - 2;
            left[dst] = base[src];
        }
    }
    left[p2.1 * cols + p2.0] += 40.0;

    let make = |threshold: f32| {
        correlator_view(
            gray_f32(cols, rows, |x, y| left[y * cols + x]),
            gray_f32(cols, rows, |x, y| base[y * cols + x]),
            CorrelatorConfig {
                kernel_size: (5, 5),
                search_range: Rect::new(-7, -2, 15, 5),
                max_levels: 1,
                subpixel: SubpixelMode::NONE,
                cross_corr_threshold: threshold,
                ..CorrelatorConfig::default()
            },
        )
    };
    let bbox = Rect::new(20, 20, 20, 8);
    let at = |map: &DisparityMap, p: (usize, usize)| map.get(p.0 - 20, p.1 - 20).unwrap();

    let unchecked = make(-1.0).disparity(bbox).unwrap();
    assert_eq!(at(&unchecked, p2), Disparity::new(-6.0, 0.0));
    assert_eq!(at(&unchecked, p1), Disparity::new(0.0, 0.0));

    let checked = make(2.0).disparity(bbox).unwrap();
    assert!(at(&checked, p2).missing);
    assert_eq!(at(&checked, p1), Disparity::new(0.0, 0.0));
}

#[test]
fn pyramid_and_single_level_search_agree() {
    let base = gray_u8(128, 128, textured(128, 128, 23));
    let left = crop(&base, Rect::new(16, 16, 96, 96)).unwrap();
    let right = crop(&base, Rect::new(12, 18, 96, 96)).unwrap();
    let config = CorrelatorConfig {
        kernel_size: (9, 9),
        search_range: Rect::new(-12, -12, 25, 25),
        subpixel: SubpixelMode::NONE,
        max_levels: 2,
        ..CorrelatorConfig::default()
    };
    let pyramid = PyramidCorrelator::new(config.clone()).unwrap();
    assert_eq!(pyramid.level_count(48, 48), 2);

    let bbox = Rect::new(24, 24, 16, 16);
    let multi = correlator_view(Arc::clone(&left), Arc::clone(&right), config.clone())
        .disparity(bbox)
        .unwrap();
    let single = correlator_view(
        left,
        right,
        CorrelatorConfig {
            max_levels: 1,
            ..config
        },
    )
    .disparity(bbox)
    .unwrap();

    assert_eq!(multi, single);
    assert_all(&multi, Disparity::new(4.0, -2.0));
}

#[test]
fn repeated_and_overlapping_requests_agree() {
    let (left, right) = shifted_pair();
    let view = correlator_view(
        left,
        right,
        CorrelatorConfig {
            kernel_size: (9, 9),
            search_range: Rect::new(-5, -6, 13, 13),
            ..CorrelatorConfig::default()
        },
    );
    let b1 = Rect::new(20, 20, 24, 24);
    let b2 = Rect::new(30, 26, 24, 24);

    assert_eq!(view.materialize(b1).unwrap(), view.materialize(b1).unwrap());

    let m1 = view.disparity(b1).unwrap();
    let m2 = view.disparity(b2).unwrap();
    let common = b1.intersect(&b2);
    assert!(!common.is_empty());
    for y in common.min_y..common.max_y {
        for x in common.min_x..common.max_x {
            let a = m1.get((x - b1.min_x) as usize, (y - b1.min_y) as usize);
            let b = m2.get((x - b2.min_x) as usize, (y - b2.min_y) as usize);
            assert_eq!(a, b, "pixel ({x}, {y})");
        }
    }
}
