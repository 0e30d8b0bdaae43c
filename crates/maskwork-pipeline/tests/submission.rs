//! End-to-end submission tests: source bytes and strokes in, aligned
//! image and mask out.

#![allow(clippy::unwrap_used)]

use maskwork_pipeline::{
    CanvasSize, Dimensions, MaskError, MaskSource, Point, PrepareConfig, ResizePolicy,
    StrokeCapture, StrokeSet, prepare,
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        image::Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 90, 255])
    });
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn decode(bytes: &[u8]) -> image::RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

#[test]
fn drawn_mask_lands_on_planned_image() {
    // 800x600 photo displayed in a 400x300 box.
    let mut surface = StrokeCapture::new(CanvasSize::new(400.0, 300.0));
    let width = surface.default_stroke_width();
    surface.begin_stroke(width, Point::new(200.0, 150.0));
    surface.extend_stroke(Point::new(220.0, 150.0));
    surface.end_stroke();

    let prepared = prepare(
        &png(800, 600),
        &MaskSource::Strokes(surface.export_stroke_set()),
        &PrepareConfig::default(),
    )
    .unwrap();

    assert_eq!(prepared.dimensions(), Dimensions::new(1024, 768));
    let mask = prepared.mask.as_ref().unwrap();
    assert_eq!(mask.dimensions, prepared.dimensions());

    let raster = decode(&mask.png);
    // Canvas centre maps to image centre.
    assert_eq!(raster.get_pixel(512, 384).0[0], 255);
    assert_eq!(raster.get_pixel(5, 5).0[0], 0);
    assert!(raster.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
}

#[test]
fn cleared_surface_submits_without_mask() {
    let mut surface = StrokeCapture::new(CanvasSize::new(500.0, 375.0));
    surface.record_stroke(10.0, vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);
    surface.clear();

    let prepared = prepare(
        &png(640, 480),
        &MaskSource::Strokes(surface.export_stroke_set()),
        &PrepareConfig::default(),
    )
    .unwrap();
    assert!(prepared.mask.is_none());
    assert_eq!(prepared.dimensions(), Dimensions::new(1024, 768));
}

#[test]
fn rescaled_surface_still_maps_to_same_pixels() {
    let strokes_at = |canvas: CanvasSize, resize_to: Option<CanvasSize>| {
        let mut surface = StrokeCapture::with_policy(canvas, ResizePolicy::Rescale);
        surface.record_stroke(
            20.0,
            vec![
                Point::new(canvas.width / 4.0, canvas.height / 2.0),
                Point::new(canvas.width / 2.0, canvas.height / 2.0),
            ],
        );
        if let Some(size) = resize_to {
            surface.resize(size).unwrap();
        }
        surface.export_stroke_set()
    };

    let before = strokes_at(CanvasSize::new(400.0, 400.0), None);
    let after = strokes_at(
        CanvasSize::new(400.0, 400.0),
        Some(CanvasSize::new(800.0, 800.0)),
    );

    let source = png(512, 512);
    let a = prepare(&source, &MaskSource::Strokes(before), &PrepareConfig::default()).unwrap();
    let b = prepare(&source, &MaskSource::Strokes(after), &PrepareConfig::default()).unwrap();
    assert_eq!(a.mask, b.mask);
}

#[test]
fn stroke_set_json_round_trips_through_prepare() {
    let json = r#"{
        "strokes": [{ "strokeWidth": 30, "paths": [{ "x": 0, "y": 0 }, { "x": 600, "y": 600 }] }],
        "canvasSize": { "width": 600, "height": 600 }
    }"#;
    let strokes: StrokeSet = serde_json::from_str(json).unwrap();
    let prepared = prepare(
        &png(300, 300),
        &MaskSource::Strokes(strokes),
        &PrepareConfig::default(),
    )
    .unwrap();
    let raster = decode(&prepared.mask.unwrap().png);
    assert_eq!(raster.get_pixel(512, 512).0[0], 255);
    assert_eq!(raster.get_pixel(1000, 20).0[0], 0);
}

#[test]
fn empty_source_is_rejected() {
    let result = prepare(&[], &MaskSource::None, &PrepareConfig::default());
    assert!(matches!(result, Err(MaskError::EmptyInput)));
}
