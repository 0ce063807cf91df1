use image::ImageOutputFormat;
use object_finder::{side_by_side, ObjectFinder};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "objdraw",
    about = "A tool to find a reference object in a scene image and draw where it was found"
)]
struct Opt {
    /// The akaze threshold to use.
    ///
    /// 0.01 will be very sparse and 0.0001 will be very dense.
    #[structopt(short, long, default_value = "0.001")]
    threshold: f64,
    /// The output path to write to (autodetects image type from extension).
    ///
    /// If this is not provided, then the output goes to stdout as a PNG.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// The image of the object to look for.
    #[structopt(parse(from_os_str))]
    object: PathBuf,
    /// The scene image to look in.
    #[structopt(parse(from_os_str))]
    scene: PathBuf,
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();
    let object = image::open(opt.object).expect("failed to open object image file");
    let scene = image::open(opt.scene).expect("failed to open scene image file");

    let mut finder = ObjectFinder::new(opt.threshold);
    finder
        .set_reference(&object)
        .expect("failed to analyze the object image");
    let mut canvas = side_by_side(&object, &scene);
    let detection = finder
        .locate(&scene, &mut canvas)
        .expect("failed to locate the object in the scene");
    eprintln!(
        "object located with {} inliers at {:?}",
        detection.inliers, detection.corners
    );

    let out_image = image::DynamicImage::ImageRgba8(canvas);
    if let Some(path) = opt.output {
        out_image.save(path).expect("failed to write image");
    } else {
        let mut encoded = Cursor::new(Vec::new());
        out_image
            .write_to(&mut encoded, ImageOutputFormat::Png)
            .expect("failed to encode image");
        std::io::stdout()
            .write_all(encoded.get_ref())
            .expect("failed to write image to stdout");
    }
}
