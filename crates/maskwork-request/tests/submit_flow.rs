//! Drive a full submit: select, prepare, apply, route, serialize.

#![allow(clippy::unwrap_used)]

use maskwork_pipeline::{CanvasSize, MaskSource, Point, PrepareConfig, StrokeCapture, prepare};
use maskwork_request::{EditSession, RequestError, Route, Task, data_uri, select_route};

fn photo_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([120, 140, 160, 255]));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn masked_submission_routes_to_inpaint() {
    let source = photo_png(640, 480);
    let mut session = EditSession::new();
    session.select_image(data_uri::encode_png(&source));

    let mut surface = StrokeCapture::new(CanvasSize::new(320.0, 240.0));
    surface.record_stroke(
        surface.default_stroke_width(),
        vec![Point::new(10.0, 10.0), Point::new(100.0, 80.0)],
    );

    // The upload arrives as a data URI; decode it as the preparer would.
    let original = session.selected().original.clone().unwrap();
    let bytes = data_uri::decode(&original).unwrap();
    assert!(bytes.is_image());

    let ticket = session.begin_prepare().unwrap();
    let prepared = prepare(
        &bytes.data,
        &MaskSource::Strokes(surface.export_stroke_set()),
        &PrepareConfig::default(),
    )
    .unwrap();
    session.apply_prepared(ticket, &prepared).unwrap();

    let payload = session.payload("replace with a bookshelf").unwrap();
    assert_eq!(select_route(Task::StageHome, &payload).unwrap(), Route::Inpaint);

    let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
    assert_eq!(json["width"], 1024);
    assert_eq!(json["height"], 768);

    // The mask in the payload decodes to the same size as the image.
    let mask = data_uri::decode(json["mask"].as_str().unwrap()).unwrap();
    let mask = image::load_from_memory(&mask.data).unwrap();
    assert_eq!((mask.width(), mask.height()), (1024, 768));
}

#[test]
fn late_result_for_replaced_image_never_reaches_payload() {
    let mut session = EditSession::new();
    session.select_image(data_uri::encode_png(&photo_png(64, 64)));
    let ticket = session.begin_prepare().unwrap();

    let prepared = prepare(
        &photo_png(64, 64),
        &MaskSource::None,
        &PrepareConfig::default(),
    )
    .unwrap();

    session.select_image(data_uri::encode_png(&photo_png(32, 64)));
    assert!(matches!(
        session.apply_prepared(ticket, &prepared),
        Err(RequestError::StaleResult { .. })
    ));

    // The replacement is selected but unprepared, so no payload is built
    // that would silently drop it.
    assert!(matches!(
        session.payload("x"),
        Err(RequestError::NotPrepared { .. })
    ));

    let ticket = session.begin_prepare().unwrap();
    let prepared = prepare(
        &photo_png(32, 64),
        &MaskSource::None,
        &PrepareConfig::default(),
    )
    .unwrap();
    session.apply_prepared(ticket, &prepared).unwrap();
    let payload = session.payload("x").unwrap();
    assert_eq!(payload.dimensions(), Some(prepared.dimensions()));
    assert_eq!(select_route(Task::Generate, &payload).unwrap(), Route::StageHome);
}
