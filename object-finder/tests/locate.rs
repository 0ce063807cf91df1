use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::drawing;
use object_finder::{side_by_side, ObjectFinder};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

const OBJECT_WIDTH: u32 = 160;
const OBJECT_HEIGHT: u32 = 120;
const OFFSET_X: u32 = 140;
const OFFSET_Y: u32 = 90;

/// A reference object with enough blob texture for the detector to latch onto.
fn textured_object() -> GrayImage {
    let mut image = GrayImage::from_pixel(OBJECT_WIDTH, OBJECT_HEIGHT, Luma([200]));
    let mut rng = Pcg64::from_seed([9; 32]);
    for _ in 0..120 {
        let x = rng.gen_range(0..OBJECT_WIDTH as i32);
        let y = rng.gen_range(0..OBJECT_HEIGHT as i32);
        let radius = rng.gen_range(2..7);
        let shade = rng.gen_range(0..160u8);
        drawing::draw_filled_circle_mut(&mut image, (x, y), radius, Luma([shade]));
    }
    image
}

/// A larger scene with an exact, unscaled, unrotated copy of the object at a
/// known offset.
fn scene_with_object(object: &GrayImage) -> GrayImage {
    let mut scene = GrayImage::from_pixel(480, 360, Luma([230]));
    imageops::replace(&mut scene, object, i64::from(OFFSET_X), i64::from(OFFSET_Y));
    scene
}

#[test]
fn locates_translated_copy() {
    let _ = pretty_env_logger::try_init_timed();
    let object = textured_object();
    let scene = DynamicImage::ImageLuma8(scene_with_object(&object));
    let object = DynamicImage::ImageLuma8(object);

    let mut finder = ObjectFinder::default();
    finder.set_reference(&object).unwrap();
    let detection = finder.detect(&scene).unwrap();
    assert!(detection.inliers >= 4);

    let expected = [
        (f64::from(OFFSET_X), f64::from(OFFSET_Y)),
        (f64::from(OFFSET_X + OBJECT_WIDTH), f64::from(OFFSET_Y)),
        (
            f64::from(OFFSET_X + OBJECT_WIDTH),
            f64::from(OFFSET_Y + OBJECT_HEIGHT),
        ),
        (f64::from(OFFSET_X), f64::from(OFFSET_Y + OBJECT_HEIGHT)),
    ];
    for (corner, &(ex, ey)) in detection.corners.iter().zip(expected.iter()) {
        assert!(
            (corner.x - ex).abs() < 2.0 && (corner.y - ey).abs() < 2.0,
            "corner {:?} expected near ({}, {})",
            corner,
            ex,
            ey
        );
    }
}

#[test]
fn locate_is_idempotent() {
    let _ = pretty_env_logger::try_init_timed();
    let object = textured_object();
    let scene = DynamicImage::ImageLuma8(scene_with_object(&object));
    let object = DynamicImage::ImageLuma8(object);

    let mut finder = ObjectFinder::default();
    finder.set_reference(&object).unwrap();

    let blank = side_by_side(&object, &scene);
    let mut first = blank.clone();
    let mut second = blank.clone();
    finder.locate(&scene, &mut first).unwrap();
    finder.locate(&scene, &mut second).unwrap();

    // Something was drawn, and both calls drew exactly the same pixels.
    assert_ne!(first.as_raw(), blank.as_raw());
    assert_eq!(first.as_raw(), second.as_raw());
}
