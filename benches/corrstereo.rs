use corrstereo::lowlevel::{materialize_tiled, IntegralImage};
use corrstereo::view::{crop, shared};
use corrstereo::{
    CorrelatorConfig, CorrelatorView, ImageF32, ImageSource, MemoryImage, NullPreprocess,
    PixelLayout, PyramidCorrelator, Raster, Rect, SubpixelMode,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.push(value as u8);
        }
    }
    data
}

fn bench_correlator(c: &mut Criterion) {
    let size = 384;
    let base = shared(MemoryImage::new(
        Raster::from_vec(size, size, PixelLayout::Gray, make_image(size, size)).unwrap(),
    ));
    let left = crop(&base, Rect::new(32, 32, 320, 320)).unwrap();
    let right = crop(&base, Rect::new(26, 35, 320, 320)).unwrap();

    let config = CorrelatorConfig {
        kernel_size: (11, 11),
        search_range: Rect::new(-16, -8, 33, 17),
        ..CorrelatorConfig::default()
    };
    let view = CorrelatorView::new(Arc::clone(&left), Arc::clone(&right), Arc::new(NullPreprocess))
        .unwrap()
        .with_config(config.clone())
        .unwrap();

    let bbox = Rect::new(64, 64, 64, 64);
    c.bench_function("view_64x64_parabola", |b| {
        b.iter(|| black_box(view.materialize(bbox).unwrap()));
    });

    let integer = view.clone().with_subpixel(SubpixelMode::NONE).unwrap();
    c.bench_function("view_64x64_integer", |b| {
        b.iter(|| black_box(integer.materialize(bbox).unwrap()));
    });

    let affine = view
        .clone()
        .with_subpixel(SubpixelMode {
            affine: true,
            ..SubpixelMode::default()
        })
        .unwrap();
    let small = Rect::new(64, 64, 24, 24);
    c.bench_function("view_24x24_affine", |b| {
        b.iter(|| black_box(affine.materialize(small).unwrap()));
    });

    c.bench_function("view_128x128_tiled", |b| {
        b.iter(|| black_box(materialize_tiled(&view, Rect::new(64, 64, 128, 128), 64, 64).unwrap()));
    });

    let tile = ImageF32::from_raster(&left.materialize(Rect::new(0, 0, 128, 128)).unwrap()).unwrap();
    let other = ImageF32::from_raster(&right.materialize(Rect::new(0, 0, 128, 128)).unwrap()).unwrap();
    let correlator = PyramidCorrelator::new(CorrelatorConfig {
        search_range: Rect::new(0, 0, 17, 9),
        ..config
    })
    .unwrap();
    c.bench_function("pyramid_correlate_128", |b| {
        b.iter(|| black_box(correlator.correlate(&tile, &other, &NullPreprocess).unwrap()));
    });

    c.bench_function("integral_image_128", |b| {
        b.iter(|| black_box(IntegralImage::new(&tile)));
    });
}

criterion_group!(benches, bench_correlator);
criterion_main!(benches);
