//! Locates a reference object inside scene images.
//!
//! [`ObjectFinder`] holds the analyzed reference object and runs the
//! match-and-localize pipeline against scene images: AKAZE feature
//! extraction, nearest-neighbor descriptor matching, relative distance
//! filtering, ARRSAC homography estimation, and projection of the reference
//! corners into scene coordinates. The result can be drawn as a
//! quadrilateral onto an object|scene composite canvas.
//!
//! ```no_run
//! use object_finder::{side_by_side, ObjectFinder};
//!
//! let object = image::open("object.png").unwrap();
//! let scene = image::open("scene.png").unwrap();
//! let mut finder = ObjectFinder::default();
//! finder.set_reference(&object).unwrap();
//! let mut canvas = side_by_side(&object, &scene);
//! let detection = finder.locate(&scene, &mut canvas).unwrap();
//! println!("located with {} inliers", detection.inliers);
//! ```

mod draw;
mod matching;

pub use draw::{draw_quad, side_by_side};
pub use four_point::HomographyMatrix;
pub use matching::{filter_matches, match_descriptors, DescriptorMatch};

use akaze::Akaze;
use arrsac::Arrsac;
use bitarray::BitArray;
use cv_core::nalgebra::Point2;
use cv_core::sample_consensus::{Consensus, Estimator};
use cv_core::{FeatureMatch, KeyPoint};
use four_point::FourPoint;
use image::{DynamicImage, RgbaImage};
use log::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FindError {
    /// The supplied image has no pixel data.
    #[error("image contains no pixel data")]
    EmptyImage,
    /// No reference object has been analyzed yet.
    #[error("no reference object has been analyzed")]
    NoReference,
    /// Descriptor matching produced no correspondences at all.
    #[error("descriptor matching produced no matches")]
    NoMatches,
    /// Too few matches survived the distance filter to determine a homography.
    #[error("{found} matches passed the distance filter, at least 4 are required")]
    InsufficientMatches { found: usize },
    /// The consensus process did not converge on a homography.
    #[error("consensus failed to produce a homography")]
    EstimationFailed,
}

/// The analyzed reference object: its dimensions and cached features.
///
/// Features are extracted once when the reference is set and reused by every
/// subsequent localization.
#[derive(Debug, Clone)]
pub struct Reference {
    pub width: u32,
    pub height: u32,
    pub keypoints: Vec<akaze::KeyPoint>,
    pub descriptors: Vec<BitArray<64>>,
}

/// A successful localization of the reference object in a scene.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Transform from reference-image coordinates to scene coordinates.
    pub homography: HomographyMatrix,
    /// The reference corners (0,0), (W,0), (W,H), (0,H) projected into the
    /// scene, in that order.
    pub corners: [Point2<f64>; 4],
    /// Number of matches the consensus process accepted.
    pub inliers: usize,
    /// Width and height of the reference the detection was made against.
    pub reference_dimensions: (u32, u32),
}

impl Detection {
    /// Draws the localization quadrilateral onto an object|scene composite
    /// canvas, shifting x coordinates right by the reference width.
    pub fn draw(&self, canvas: &mut RgbaImage) {
        draw::draw_quad(canvas, &self.corners, self.reference_dimensions.0);
    }
}

/// Finds a reference object in scene images.
///
/// The detector sensitivity is the most important knob. [`ObjectFinder::new`]
/// sets the AKAZE threshold and leaves everything else default; the helpers
/// [`ObjectFinder::sparse`] and [`ObjectFinder::dense`] mirror the detector's
/// own presets.
///
/// `set_reference` takes `&mut self` while `detect` and `locate` take
/// `&self`, so replacing the reference while a localization reads it is not
/// expressible.
#[derive(Debug, Clone)]
pub struct ObjectFinder {
    /// The feature detector run over reference and scene images.
    pub detector: Akaze,
    /// Maximum reprojection error in pixels for a match to count as an inlier.
    pub inlier_threshold: f64,
    reference: Option<Reference>,
}

impl Default for ObjectFinder {
    fn default() -> Self {
        Self {
            detector: Akaze::default(),
            inlier_threshold: 3.0,
            reference: None,
        }
    }
}

impl ObjectFinder {
    /// This convenience constructor is provided for the very common case
    /// that the detector threshold needs to be modified.
    pub fn new(threshold: f64) -> Self {
        Self {
            detector: Akaze::new(threshold),
            ..Default::default()
        }
    }

    /// Creates a finder that sparsely detects features.
    pub fn sparse() -> Self {
        Self {
            detector: Akaze::sparse(),
            ..Default::default()
        }
    }

    /// Creates a finder that densely detects features.
    pub fn dense() -> Self {
        Self {
            detector: Akaze::dense(),
            ..Default::default()
        }
    }

    /// Analyzes a reference object image, replacing any previous reference.
    ///
    /// Extracts and caches the reference keypoints and descriptors so that
    /// repeated localizations do not recompute them.
    pub fn set_reference(&mut self, image: &DynamicImage) -> Result<(), FindError> {
        if image.width() == 0 || image.height() == 0 {
            warn!("refusing to analyze an empty reference image");
            return Err(FindError::EmptyImage);
        }
        let (keypoints, descriptors) = self.detector.extract(image);
        info!("analyzed reference object: {} features", keypoints.len());
        self.reference = Some(Reference {
            width: image.width(),
            height: image.height(),
            keypoints,
            descriptors,
        });
        Ok(())
    }

    /// The currently analyzed reference object, if any.
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    /// Searches the scene for the reference object.
    pub fn detect(&self, scene: &DynamicImage) -> Result<Detection, FindError> {
        let reference = self.reference.as_ref().ok_or(FindError::NoReference)?;
        if scene.width() == 0 || scene.height() == 0 {
            warn!("refusing to search an empty scene image");
            return Err(FindError::EmptyImage);
        }

        let (scene_keypoints, scene_descriptors) = self.detector.extract(scene);
        debug!("scene produced {} features", scene_keypoints.len());

        let matches = matching::match_descriptors(&reference.descriptors, &scene_descriptors);
        if matches.is_empty() {
            return Err(FindError::NoMatches);
        }
        let good = matching::filter_matches(&matches);
        debug!("{} of {} matches passed the distance filter", good.len(), matches.len());
        let min_samples = <FourPoint as Estimator<FeatureMatch<KeyPoint>>>::MIN_SAMPLES;
        if good.len() < min_samples {
            return Err(FindError::InsufficientMatches { found: good.len() });
        }

        let data: Vec<FeatureMatch<KeyPoint>> = good
            .iter()
            .map(|m| {
                let (rx, ry) = reference.keypoints[m.reference].point;
                let (sx, sy) = scene_keypoints[m.scene].point;
                FeatureMatch(
                    KeyPoint(Point2::new(f64::from(rx), f64::from(ry))),
                    KeyPoint(Point2::new(f64::from(sx), f64::from(sy))),
                )
            })
            .collect();

        let estimator = FourPoint::new();
        // Seeded per call so identical inputs always localize identically.
        let mut consensus = Arrsac::new(self.inlier_threshold, Xoshiro256PlusPlus::seed_from_u64(0));
        let (model, inliers) = consensus
            .model_inliers(&estimator, data.iter().copied())
            .ok_or(FindError::EstimationFailed)?;
        info!("consensus kept {} of {} matches", inliers.len(), data.len());

        // Refit on the full inlier set; keep the minimal-sample model if the
        // refit degenerates.
        let homography = estimator
            .from_matches(inliers.iter().map(|&ix| data[ix]))
            .unwrap_or(model);

        let (w, h) = (f64::from(reference.width), f64::from(reference.height));
        let object_corners = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        let mut corners = [Point2::origin(); 4];
        for (corner, &object_corner) in corners.iter_mut().zip(object_corners.iter()) {
            *corner = homography
                .transform(object_corner)
                .ok_or(FindError::EstimationFailed)?;
        }

        Ok(Detection {
            homography,
            corners,
            inliers: inliers.len(),
            reference_dimensions: (reference.width, reference.height),
        })
    }

    /// Searches the scene for the reference object and draws the result onto
    /// the canvas. On any error the canvas is left untouched.
    pub fn locate(&self, scene: &DynamicImage, canvas: &mut RgbaImage) -> Result<Detection, FindError> {
        let detection = self.detect(scene)?;
        detection.draw(canvas);
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    fn textured(width: u32, height: u32, seed: u32) -> DynamicImage {
        let image = GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 13 + seed) % 256) as u8])
        });
        DynamicImage::ImageLuma8(image)
    }

    #[test]
    fn second_reference_replaces_first() {
        let mut finder = ObjectFinder::default();
        finder.set_reference(&textured(64, 48, 0)).unwrap();
        assert_eq!(
            finder.reference().map(|r| (r.width, r.height)),
            Some((64, 48))
        );
        finder.set_reference(&textured(96, 80, 5)).unwrap();
        assert_eq!(
            finder.reference().map(|r| (r.width, r.height)),
            Some((96, 80))
        );
    }

    #[test]
    fn locate_before_reference_is_an_error_and_draws_nothing() {
        let finder = ObjectFinder::default();
        let scene = textured(64, 48, 1);
        let mut canvas = RgbaImage::from_pixel(128, 48, Rgba([0, 0, 0, 255]));
        let untouched = canvas.clone();
        let err = finder.locate(&scene, &mut canvas).unwrap_err();
        assert_eq!(err, FindError::NoReference);
        assert_eq!(canvas.as_raw(), untouched.as_raw());
    }

    #[test]
    fn empty_images_are_rejected() {
        let mut finder = ObjectFinder::default();
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        assert_eq!(finder.set_reference(&empty).unwrap_err(), FindError::EmptyImage);
        assert!(finder.reference().is_none());

        finder.set_reference(&textured(64, 48, 0)).unwrap();
        assert_eq!(finder.detect(&empty).unwrap_err(), FindError::EmptyImage);
    }
}
