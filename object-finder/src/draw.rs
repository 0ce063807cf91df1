use cv_core::nalgebra::{Point2, Vector2};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing;

const QUAD_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// Stroke width of the quadrilateral edges, in pixels.
const QUAD_THICKNESS: usize = 4;

/// Draws the projected corners as a closed quadrilateral on the canvas,
/// shifting every x coordinate right by `x_offset`.
///
/// The offset exists because the canvas is expected to be an object|scene
/// composite (see [`side_by_side`]): scene-space coordinates start after the
/// reference image's width.
pub fn draw_quad(canvas: &mut RgbaImage, corners: &[Point2<f64>; 4], x_offset: u32) {
    let offset = Vector2::new(f64::from(x_offset), 0.0);
    for ix in 0..corners.len() {
        let a = corners[ix] + offset;
        let b = corners[(ix + 1) % corners.len()] + offset;
        draw_thick_segment(canvas, a, b);
    }
}

/// Draws a line segment [`QUAD_THICKNESS`] pixels wide by laying
/// single-pixel strokes side by side across the segment, centered on it.
fn draw_thick_segment(canvas: &mut RgbaImage, a: Point2<f64>, b: Point2<f64>) {
    let direction = b - a;
    let length = direction.norm();
    if length < 1e-9 {
        drawing::draw_line_segment_mut(
            canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            QUAD_COLOR,
        );
        return;
    }
    let normal = Vector2::new(-direction.y, direction.x) / length;
    for step in 0..QUAD_THICKNESS {
        let shift = normal * (step as f64 - (QUAD_THICKNESS as f64 - 1.0) / 2.0);
        drawing::draw_line_segment_mut(
            canvas,
            ((a.x + shift.x) as f32, (a.y + shift.y) as f32),
            ((b.x + shift.x) as f32, (b.y + shift.y) as f32),
            QUAD_COLOR,
        );
    }
}

/// Builds the side-by-side composite canvas that localization results are
/// drawn onto: the object image on the left, the scene image to its right.
pub fn side_by_side(object: &DynamicImage, scene: &DynamicImage) -> RgbaImage {
    let width = object.width() + scene.width();
    let height = object.height().max(scene.height());
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    imageops::replace(&mut canvas, &object.to_rgba8(), 0, 0);
    imageops::replace(&mut canvas, &scene.to_rgba8(), i64::from(object.width()), 0);
    canvas
}
