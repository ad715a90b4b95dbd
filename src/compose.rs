//! Compositor: flattens a scene into one raster relative to its base image.
//!
//! The output covers exactly the base image's displayed area (its intrinsic
//! size times its scale) times a multiplier. Every visible object is drawn in
//! z-order at its position relative to the base image's top-left corner, so
//! where the base image sits on the editing canvas does not affect the result:
//!
//! ```text
//! canvas:  base at (80, 60), text at (130, 110)
//! output:  base at (0, 0),   text at (50, 50) × multiplier
//! ```
//!
//! The scene is only read. Rendering happens on a fresh [`Surface`] that is
//! dropped once encoded.

use crate::adjust::{FilterError, render_image};
use crate::ingest::SourceStore;
use crate::render::{
    Color, DrawImage, DrawText, FontBook, RasterSurface, Rect, Surface, SurfaceError, bounding_box,
    displayed_size, export_dimensions,
};
use crate::scene::{ObjectKind, Scene, SceneObject, TextStyle};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Output size for `scene` at `multiplier`, or `None` without a base image.
pub fn plan_size(scene: &Scene, multiplier: f64) -> Option<(u32, u32)> {
    let base = scene.base_image()?;
    let image = base.as_image()?;
    Some(export_dimensions(
        (image.width, image.height),
        &base.placement,
        multiplier,
    ))
}

/// Draw every visible object of `scene` onto `surface`.
///
/// Returns `false` (drawing nothing) when the scene has no base image.
pub fn flatten_onto<S: Surface>(
    scene: &Scene,
    sources: &SourceStore,
    surface: &mut S,
    multiplier: f64,
) -> Result<bool, ComposeError> {
    let Some(origin) = base_origin(scene) else {
        return Ok(false);
    };
    draw_objects(scene, sources, surface, origin, multiplier)?;
    Ok(true)
}

/// Top-left corner of the base image in scene coordinates.
fn base_origin(scene: &Scene) -> Option<(f64, f64)> {
    let base = scene.base_image()?;
    let image = base.as_image()?;
    let size = displayed_size((image.width as f64, image.height as f64), &base.placement);
    let bounds = bounding_box(&base.placement, size);
    Some((bounds.x, bounds.y))
}

/// Draw visible objects in z-order, positioned relative to `origin`.
fn draw_objects<S: Surface>(
    scene: &Scene,
    sources: &SourceStore,
    surface: &mut S,
    origin: (f64, f64),
    multiplier: f64,
) -> Result<(), ComposeError> {
    for object in scene.objects().iter().filter(|o| o.visible) {
        match &object.kind {
            ObjectKind::Image(image) => {
                let Some(source) = sources.get(&image.source) else {
                    log::warn!("no pixels loaded for {}, skipping {}", image.source, object.id);
                    continue;
                };
                let pixels = render_image(source, image.crop, &image.filters)?;
                let size = displayed_size((image.width as f64, image.height as f64), &object.placement);
                surface.draw_image(&DrawImage {
                    pixels: &pixels,
                    dest: relative_box(object, size, origin, multiplier),
                    angle: object.placement.angle,
                    pivot: relative_anchor(object, origin, multiplier),
                })?;
            }
            ObjectKind::Text(text) => {
                draw_text_block(surface, object, &text.content, &text.style, origin, multiplier)?;
            }
            ObjectKind::Sticker(sticker) => {
                draw_text_block(surface, object, &sticker.glyph, &sticker.style, origin, multiplier)?;
            }
        }
    }
    Ok(())
}

fn draw_text_block<S: Surface>(
    surface: &mut S,
    object: &SceneObject,
    content: &str,
    style: &TextStyle,
    origin: (f64, f64),
    multiplier: f64,
) -> Result<(), ComposeError> {
    let metrics = surface.measure_text(content, style);
    let size = displayed_size((metrics.width, metrics.height), &object.placement);
    surface.draw_text(&DrawText {
        text: content,
        style,
        bounds: relative_box(object, size, origin, multiplier),
        scale: (
            object.placement.scale_x * multiplier,
            object.placement.scale_y * multiplier,
        ),
        angle: object.placement.angle,
        anchor: relative_anchor(object, origin, multiplier),
    })?;
    Ok(())
}

fn relative_box(object: &SceneObject, displayed: (f64, f64), origin: (f64, f64), m: f64) -> Rect {
    bounding_box(&object.placement, displayed)
        .translated(-origin.0, -origin.1)
        .scaled(m)
}

fn relative_anchor(object: &SceneObject, origin: (f64, f64), m: f64) -> (f64, f64) {
    (
        (object.placement.left - origin.0) * m,
        (object.placement.top - origin.1) * m,
    )
}

/// Flatten `scene` into a new transparent raster.
///
/// Fails with [`SurfaceError::TooLarge`] instead of allocating when the
/// output or any scaled layer would exceed `max_pixels`.
pub fn flatten(
    scene: &Scene,
    sources: &SourceStore,
    fonts: &FontBook,
    multiplier: f64,
    max_pixels: u64,
) -> Result<Option<RgbaImage>, ComposeError> {
    let Some((width, height)) = plan_size(scene, multiplier) else {
        return Ok(None);
    };
    let mut surface =
        RasterSurface::with_limit(width, height, Color::TRANSPARENT, fonts, max_pixels)?;
    flatten_onto(scene, sources, &mut surface, multiplier)?;
    Ok(Some(surface.into_image()))
}

/// Render the whole editing canvas at scale 1, as shown while editing.
///
/// Unlike [`flatten`] this works without a base image and keeps objects at
/// their canvas positions.
pub fn render_canvas(
    scene: &Scene,
    sources: &SourceStore,
    fonts: &FontBook,
    size: (u32, u32),
    background: Color,
    max_pixels: u64,
) -> Result<RgbaImage, ComposeError> {
    let mut surface = RasterSurface::with_limit(size.0, size.1, background, fonts, max_pixels)?;
    draw_objects(scene, sources, &mut surface, (0.0, 0.0), 1.0)?;
    Ok(surface.into_image())
}

/// Encode an RGBA raster as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ComposeError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Decoded, SourceId};
    use crate::render::DEFAULT_MAX_PIXELS;
    use crate::render::backend::tests::{MockSurface, RecordedOp};
    use crate::scene::{ImageObject, Placement, StickerObject, TextObject};
    use image::Rgba;

    fn store_with(w: u32, h: u32, rgba: [u8; 4]) -> (SourceStore, SourceId) {
        let mut store = SourceStore::new();
        let id = store.insert(Decoded {
            id: SourceId::from_hex("abc123"),
            raster: RgbaImage::from_pixel(w, h, Rgba(rgba)),
        });
        (store, id)
    }

    fn image_kind(source: &SourceId, w: u32, h: u32) -> ObjectKind {
        ObjectKind::Image(ImageObject {
            source: source.clone(),
            width: w,
            height: h,
            crop: None,
            filters: Vec::new(),
        })
    }

    fn text_kind(content: &str) -> ObjectKind {
        ObjectKind::Text(TextObject {
            content: content.into(),
            style: TextStyle::new("Arial", 40.0, Color::BLACK),
        })
    }

    // =========================================================================
    // Sizing
    // =========================================================================

    #[test]
    fn empty_scene_has_no_plan() {
        assert_eq!(plan_size(&Scene::new(), 2.0), None);
    }

    #[test]
    fn text_only_scene_has_no_plan() {
        let mut scene = Scene::new();
        scene.insert(text_kind("hi"), Placement::default());
        assert_eq!(plan_size(&scene, 2.0), None);
        let (store, _) = store_with(1, 1, [0; 4]);
        let mut surface = MockSurface::new(10, 10);
        assert!(!flatten_onto(&scene, &store, &mut surface, 2.0).unwrap());
        assert!(surface.operations.is_empty());
    }

    #[test]
    fn plan_is_displayed_size_times_multiplier() {
        let (_, id) = store_with(1, 1, [0; 4]);
        let mut scene = Scene::new();
        let mut placement = Placement::at(80.0, 60.0);
        placement.scale_x = 0.5;
        placement.scale_y = 0.25;
        scene.insert(image_kind(&id, 400, 300), placement);
        assert_eq!(plan_size(&scene, 2.0), Some((400, 150)));
    }

    // =========================================================================
    // Placement relative to the base image
    // =========================================================================

    #[test]
    fn text_anchored_relative_to_base_times_multiplier() {
        let (store, id) = store_with(400, 300, [10, 20, 30, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 400, 300), Placement::at(0.0, 0.0));
        scene.insert(text_kind("Hi"), Placement::centered(50.0, 50.0));

        let mut surface = MockSurface::new(800, 600);
        assert!(flatten_onto(&scene, &store, &mut surface, 2.0).unwrap());

        assert_eq!(
            surface.operations[0],
            RecordedOp::Image {
                dest: Rect::new(0.0, 0.0, 800.0, 600.0),
                pixel_size: (400, 300),
                angle: 0.0,
            }
        );
        // "Hi" at 40px in the mock: 40x40, centered on (50, 50)
        assert_eq!(
            surface.operations[1],
            RecordedOp::Text {
                text: "Hi".into(),
                bounds: Rect::new(60.0, 60.0, 80.0, 80.0),
                scale: (2.0, 2.0),
                anchor: (100.0, 100.0),
            }
        );
    }

    #[test]
    fn base_offset_on_canvas_is_removed() {
        let (store, id) = store_with(400, 300, [0, 0, 0, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 400, 300), Placement::at(200.0, 150.0));
        scene.insert(text_kind("Hi"), Placement::centered(250.0, 200.0));

        let mut surface = MockSurface::new(400, 300);
        flatten_onto(&scene, &store, &mut surface, 1.0).unwrap();
        let RecordedOp::Text { anchor, .. } = &surface.operations[1] else {
            panic!("expected text op");
        };
        assert_eq!(*anchor, (50.0, 50.0));
    }

    #[test]
    fn hidden_objects_are_skipped() {
        let (store, id) = store_with(4, 4, [0, 0, 0, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 4, 4), Placement::default());
        let t = scene.insert(text_kind("gone"), Placement::default());
        scene.get_mut(t).unwrap().visible = false;

        let mut surface = MockSurface::new(4, 4);
        flatten_onto(&scene, &store, &mut surface, 1.0).unwrap();
        assert!(surface.texts().is_empty());
        assert_eq!(surface.operations.len(), 1);
    }

    #[test]
    fn stickers_draw_as_text_in_z_order() {
        let (store, id) = store_with(4, 4, [0, 0, 0, 255]);
        let mut scene = Scene::new();
        scene.insert(
            ObjectKind::Sticker(StickerObject {
                glyph: "🔥".into(),
                style: TextStyle::new("Arial", 60.0, Color::BLACK),
            }),
            Placement::centered(2.0, 2.0),
        );
        scene.insert(image_kind(&id, 4, 4), Placement::default());

        let mut surface = MockSurface::new(4, 4);
        flatten_onto(&scene, &store, &mut surface, 1.0).unwrap();
        assert!(matches!(surface.operations[0], RecordedOp::Image { .. }));
        assert!(matches!(&surface.operations[1], RecordedOp::Text { text, .. } if text == "🔥"));
    }

    #[test]
    fn missing_source_pixels_are_skipped() {
        let (store, _) = store_with(4, 4, [0; 4]);
        let mut scene = Scene::new();
        scene.insert(
            image_kind(&SourceId::from_hex("ffff"), 4, 4),
            Placement::default(),
        );
        let mut surface = MockSurface::new(4, 4);
        assert!(flatten_onto(&scene, &store, &mut surface, 1.0).unwrap());
        assert!(surface.operations.is_empty());
    }

    // =========================================================================
    // Raster output
    // =========================================================================

    #[test]
    fn flatten_renders_base_pixels_at_double_size() {
        let (store, id) = store_with(4, 3, [200, 100, 50, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 4, 3), Placement::at(30.0, 40.0));
        let fonts = FontBook::new();
        let out = flatten(&scene, &store, &fonts, 2.0, DEFAULT_MAX_PIXELS).unwrap().unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(0, 0).0, [200, 100, 50, 255]);
        assert_eq!(out.get_pixel(7, 5).0, [200, 100, 50, 255]);
    }

    #[test]
    fn flatten_does_not_mutate_scene() {
        let (store, id) = store_with(4, 4, [1, 2, 3, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 4, 4), Placement::at(5.0, 5.0));
        let before = scene.objects().to_vec();
        let fonts = FontBook::new();
        flatten(&scene, &store, &fonts, 2.0, DEFAULT_MAX_PIXELS).unwrap();
        assert_eq!(scene.objects(), before.as_slice());
    }

    #[test]
    fn oversized_export_is_an_error_not_an_allocation() {
        let (store, id) = store_with(10, 10, [1, 2, 3, 255]);
        let mut scene = Scene::new();
        let mut placement = Placement::at(0.0, 0.0);
        placement.scale_x = 1e9;
        placement.scale_y = 1e9;
        scene.insert(image_kind(&id, 10, 10), placement);
        let fonts = FontBook::new();
        let err = flatten(&scene, &store, &fonts, 2.0, DEFAULT_MAX_PIXELS).unwrap_err();
        assert!(matches!(err, ComposeError::Surface(SurfaceError::TooLarge { .. })));
    }

    #[test]
    fn oversized_text_layer_is_an_error() {
        let (store, id) = store_with(10, 10, [1, 2, 3, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 10, 10), Placement::at(0.0, 0.0));
        let mut placement = Placement::at(0.0, 0.0);
        placement.scale_x = 1e6;
        placement.scale_y = 1e6;
        scene.insert(text_kind("huge"), placement);
        let fonts = FontBook::new();
        let err = flatten(&scene, &store, &fonts, 1.0, 10_000).unwrap_err();
        assert!(matches!(err, ComposeError::Surface(SurfaceError::TooLarge { .. })));
    }

    #[test]
    fn text_background_lands_at_doubled_offset() {
        let (store, id) = store_with(400, 300, [0, 0, 255, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 400, 300), Placement::at(0.0, 0.0));
        let mut style = TextStyle::new("Arial", 20.0, Color::BLACK);
        style.background = Color::rgb(255, 0, 0);
        scene.insert(
            ObjectKind::Text(TextObject {
                content: "ab".into(),
                style,
            }),
            Placement::at(50.0, 50.0),
        );
        let fonts = FontBook::new();
        let out = flatten(&scene, &store, &fonts, 2.0, DEFAULT_MAX_PIXELS)
            .unwrap()
            .unwrap();
        assert_eq!(out.dimensions(), (800, 600));
        // Box starts at (100, 100) in output pixels
        let inside = out.get_pixel(110, 110).0;
        assert!(inside[0] > 240 && inside[2] < 15, "{inside:?}");
        let before = out.get_pixel(95, 95).0;
        assert!(before[2] > 240 && before[0] < 15, "{before:?}");
        let scene_point = out.get_pixel(50, 50).0;
        assert!(scene_point[2] > 240 && scene_point[0] < 15, "{scene_point:?}");
    }

    #[test]
    fn canvas_render_keeps_canvas_positions_and_background() {
        let (store, id) = store_with(2, 2, [0, 0, 255, 255]);
        let mut scene = Scene::new();
        scene.insert(image_kind(&id, 2, 2), Placement::at(3.0, 1.0));
        let fonts = FontBook::new();
        let out = render_canvas(&scene, &store, &fonts, (8, 6), Color::WHITE, DEFAULT_MAX_PIXELS).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(3, 1).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(4, 2).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(5, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn canvas_render_of_empty_scene_is_background() {
        let store = SourceStore::new();
        let fonts = FontBook::new();
        let out = render_canvas(
            &Scene::new(),
            &store,
            &fonts,
            (3, 3),
            Color::rgb(1, 2, 3),
            DEFAULT_MAX_PIXELS,
        )
        .unwrap();
        assert!(out.pixels().all(|p| p.0 == [1, 2, 3, 255]));
    }

    #[test]
    fn png_encoding_is_deterministic_and_decodable() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]));
        let a = encode_png(&img).unwrap();
        let b = encode_png(&img).unwrap();
        assert_eq!(a, b);
        let back = image::load_from_memory(&a).unwrap().to_rgba8();
        assert_eq!(back, img);
    }
}
