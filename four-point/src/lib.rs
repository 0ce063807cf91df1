use cv_core::{
    nalgebra::{self, Matrix3, OMatrix, OVector, Point2, Vector2, Vector3, U9},
    sample_consensus::{Estimator, Model},
    FeatureMatch, KeyPoint,
};
use float_ord::FloatOrd;

/// A 3×3 projective transform mapping points in one image plane to another.
///
/// The matrix is only defined up to scale, so no particular normalization of
/// the coefficients is guaranteed. Use [`HomographyMatrix::transform`] to
/// apply it to a point.
#[derive(Copy, Clone, Debug)]
pub struct HomographyMatrix(pub Matrix3<f64>);

impl HomographyMatrix {
    /// Projects a point through the homography.
    ///
    /// Returns `None` when the point maps onto the plane at infinity.
    pub fn transform(&self, point: Point2<f64>) -> Option<Point2<f64>> {
        let projected = self.0 * Vector3::new(point.x, point.y, 1.0);
        (projected.z.abs() > 1e-12).then(|| Point2::new(projected.x / projected.z, projected.y / projected.z))
    }
}

impl Model<FeatureMatch<KeyPoint>> for HomographyMatrix {
    fn residual(&self, data: &FeatureMatch<KeyPoint>) -> f64 {
        let &FeatureMatch(a, b) = data;
        self.transform(a.0)
            .map(|projected| (projected - b.0).norm())
            .unwrap_or(f64::MAX)
    }
}

/// Produces the Hartley normalization for a point set: a similarity transform
/// that moves the centroid to the origin and the mean distance to √2.
///
/// Returns `None` for degenerate inputs (no points, or all points coincident).
fn normalizing_transform(points: impl Iterator<Item = Point2<f64>> + Clone) -> Option<Matrix3<f64>> {
    let (count, sum) = points
        .clone()
        .fold((0usize, Vector2::zeros()), |(count, sum), p| (count + 1, sum + p.coords));
    if count == 0 {
        return None;
    }
    let centroid = sum / count as f64;
    let mean_distance = points.map(|p| (p.coords - centroid).norm()).sum::<f64>() / count as f64;
    if mean_distance < 1e-12 {
        return None;
    }
    let scale = core::f64::consts::SQRT_2 / mean_distance;
    Some(Matrix3::new(
        scale, 0.0, -scale * centroid.x,
        0.0, scale, -scale * centroid.y,
        0.0, 0.0, 1.0,
    ))
}

fn apply_similarity(transform: &Matrix3<f64>, point: Point2<f64>) -> Point2<f64> {
    // The last row of a similarity transform is [0, 0, 1], so w stays 1.
    let p = transform * Vector3::new(point.x, point.y, 1.0);
    Point2::new(p.x, p.y)
}

/// Accumulates the normal equations of the DLT system. Each correspondence
/// contributes two rows constraining the nine homography coefficients.
fn encode_point_equations(
    matches: impl Iterator<Item = FeatureMatch<KeyPoint>>,
    normalize_a: &Matrix3<f64>,
    normalize_b: &Matrix3<f64>,
) -> OMatrix<f64, U9, U9> {
    let mut ata: OMatrix<f64, U9, U9> = nalgebra::zero();
    for FeatureMatch(a, b) in matches {
        let a = apply_similarity(normalize_a, a.0);
        let b = apply_similarity(normalize_b, b.0);
        let first = OVector::<f64, U9>::from_row_slice(&[
            -a.x, -a.y, -1.0, 0.0, 0.0, 0.0, b.x * a.x, b.x * a.y, b.x,
        ]);
        let second = OVector::<f64, U9>::from_row_slice(&[
            0.0, 0.0, 0.0, -a.x, -a.y, -1.0, b.y * a.x, b.y * a.y, b.y,
        ]);
        ata += first * first.transpose() + second * second.transpose();
    }
    ata
}

/// Performs the four-point direct linear transformation
/// by Richard Hartley and Andrew Zisserman to estimate a planar
/// [homography](https://en.wikipedia.org/wiki/Homography_(computer_vision))
/// from point correspondences in pixel coordinates.
///
/// Four correspondences determine the homography exactly; more make the
/// system over-determined and the solution a least-squares fit, which is
/// useful for refitting on a consensus inlier set.
#[derive(Copy, Clone, Debug)]
pub struct FourPoint {
    pub epsilon: f64,
    pub iterations: usize,
}

impl FourPoint {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_matches<I>(&self, data: I) -> Option<HomographyMatrix>
    where
        I: Iterator<Item = FeatureMatch<KeyPoint>> + Clone,
    {
        let normalize_a = normalizing_transform(data.clone().map(|FeatureMatch(a, _)| a.0))?;
        let normalize_b = normalizing_transform(data.clone().map(|FeatureMatch(_, b)| b.0))?;
        let ata = encode_point_equations(data, &normalize_a, &normalize_b);
        let eigens = ata.try_symmetric_eigen(self.epsilon, self.iterations)?;
        let coefficients = eigens
            .eigenvalues
            .iter()
            .enumerate()
            .min_by_key(|&(_, &eigenvalue)| FloatOrd(eigenvalue))
            .map(|(ix, _)| eigens.eigenvectors.column(ix).into_owned())?;
        let normalized = Matrix3::from_row_slice(coefficients.as_slice());
        let homography = normalize_b.try_inverse()? * normalized * normalize_a;
        Some(HomographyMatrix(homography))
    }
}

impl Default for FourPoint {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            iterations: 1000,
        }
    }
}

impl Estimator<FeatureMatch<KeyPoint>> for FourPoint {
    type Model = HomographyMatrix;
    type ModelIter = Option<HomographyMatrix>;
    const MIN_SAMPLES: usize = 4;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = FeatureMatch<KeyPoint>> + Clone,
    {
        self.from_matches(data)
    }
}
