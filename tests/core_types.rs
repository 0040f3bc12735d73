use corrstereo::image::AnyBuffer;
use corrstereo::view::NodataAware;
use corrstereo::{
    preferred_block_size, ChannelType, CorrStereoError, ImageFormat, ImageSource, MemoryImage,
    PixelBuffer, PixelLayout, Raster, RasterData, Rect,
};

#[test]
fn format_completeness_and_compatibility() {
    let gray = ImageFormat::gray(4, 3, ChannelType::U8);
    assert!(gray.complete());
    assert_eq!(gray.element_count(), 12);

    let unknown = ImageFormat {
        channel: ChannelType::Unknown,
        ..gray
    };
    assert!(!unknown.complete());
    assert!(!ImageFormat::gray(0, 3, ChannelType::U8).complete());

    let rgb = ImageFormat::new(4, 3, 1, PixelLayout::Rgb, ChannelType::F32);
    assert!(gray.same_size(&rgb));
    assert!(gray.simple_convert(&rgb));
    assert!(!gray.simple_convert(&rgb.with_size(5, 3)));

    let generic = ImageFormat::new(4, 3, 1, PixelLayout::Generic(2), ChannelType::F32);
    assert!(!generic.simple_convert(&gray));
    assert!(generic.simple_convert(&ImageFormat {
        layout: PixelLayout::GrayAlpha,
        ..generic
    }));
}

#[test]
fn strided_buffer_skips_row_padding() {
    // 3x2 gray image stored with a row stride of 5 elements.
    let data: Vec<u16> = vec![1, 2, 3, 0, 0, 4, 5, 6, 0, 0];
    let format = ImageFormat::gray(3, 2, ChannelType::U16);
    let buf = PixelBuffer::with_strides(&data, format, 1, 5, 10).unwrap();
    assert_eq!(buf.get(2, 1, 0, 0), Some(6));
    assert_eq!(buf.to_packed_vec(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(buf.byte_size(), 20);

    let roi = buf.cropped(Rect::new(1, 0, 2, 2)).unwrap();
    assert_eq!(roi.strides(), (1, 5, 10));
    assert_eq!(roi.to_packed_vec(), vec![2, 3, 5, 6]);
    assert_eq!(roi.offset(0, 1, 0), 6);
}

#[test]
fn any_buffer_crops_every_sample_type() {
    let raster = Raster::from_vec(3, 3, PixelLayout::Gray, (0..9).map(|v| v as f32).collect())
        .unwrap();
    let roi = raster.buffer().cropped(Rect::new(1, 1, 2, 2)).unwrap();
    assert_eq!(roi.channel_type(), ChannelType::F32);
    match roi {
        AnyBuffer::F32(buf) => assert_eq!(buf.to_packed_vec(), vec![4.0, 5.0, 7.0, 8.0]),
        other => panic!("unexpected buffer {other:?}"),
    }
}

#[test]
fn memory_image_materializes_in_bounds_regions() {
    let raster = Raster::from_vec(4, 4, PixelLayout::Gray, (0u8..16).collect()).unwrap();
    let image = MemoryImage::new(raster.clone());
    assert_eq!(image.cols(), 4);
    assert_eq!(image.channels(), 1);
    assert_eq!(image.materialize(Rect::of_size(4, 4)).unwrap(), raster);

    let region = image.materialize(Rect::new(2, 1, 2, 2)).unwrap();
    assert_eq!(region.data(), &RasterData::U8(vec![6, 7, 10, 11]));

    assert!(matches!(
        image.materialize(Rect::new(3, 3, 2, 2)),
        Err(CorrStereoError::InvalidRegion { .. })
    ));
    assert!(matches!(
        image.materialize(Rect::new(1, 1, 0, 3)),
        Err(CorrStereoError::InvalidRegion { .. })
    ));
}

#[test]
fn optional_capabilities_are_queried_not_assumed() {
    let raster = Raster::from_vec(8, 8, PixelLayout::Gray, vec![0u8; 64]).unwrap();
    let plain = MemoryImage::new(raster.clone());
    assert!(plain.nodata().is_none());
    assert_eq!(
        preferred_block_size(&plain),
        Err(CorrStereoError::Unsupported {
            capability: "block size hint"
        })
    );

    let tiled = MemoryImage::new(raster)
        .with_block_size(4, 2)
        .with_nodata(-1.0);
    assert_eq!(preferred_block_size(&tiled), Ok((4, 2)));
    assert_eq!(tiled.nodata().map(|n| n.nodata_value()), Some(-1.0));
}
