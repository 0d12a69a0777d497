//! Similarity alignment of predicted landmarks to ground truth keypoints.
//!
//! The rotation comes from the 3d keypoints (Kabsch), the scale and the
//! in-plane translation from the 2d keypoints, so that aligned meshes live in
//! image coordinates. The depth is recentred on the landmarks' mean.

use crate::error::{Error, Result};
use log::warn;
use nalgebra::{Matrix3, Vector3};
use ndarray as nd;
use uvmap_utils::vector::{vec_from_array_d, Matrix3d, Vector3d};

const MIN_SPREAD: f64 = 1e-12;

/// x -> scale * rotation * x + translation
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityTransform {
    pub rotation: Matrix3d,
    pub scale: f64,
    pub translation: Vector3d,
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            scale: 1.0,
            translation: Vector3::zeros(),
        }
    }
}

impl SimilarityTransform {
    pub fn transform_point(&self, p: &Vector3d) -> Vector3d {
        self.scale * (self.rotation * p) + self.translation
    }

    /// Transforms every row of a [N, 3] array
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&self, points: &nd::Array2<f32>) -> nd::Array2<f32> {
        let mut out = nd::Array2::<f32>::zeros(points.raw_dim());
        for (i, mut row) in out.rows_mut().into_iter().enumerate() {
            let p = self.transform_point(&vec_from_array_d(points, i));
            for k in 0..3 {
                row[k] = p[k] as f32;
            }
        }
        out
    }
}

fn centroid(points: &[Vector3d]) -> Vector3d {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    points.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n
}

fn rows_as_vectors(points: &nd::Array2<f32>) -> Vec<Vector3d> {
    (0..points.nrows()).map(|i| vec_from_array_d(points, i)).collect()
}

/// Fits the transform mapping the predicted landmarks ``pred`` [K, 3] onto
/// the keypoints ``gt2d`` [K, 2] and ``gt3d`` [K, 3].
///
/// # Errors
/// Fails if the sets are empty, have different sizes or have no spread.
pub fn fit_similarity(pred: &nd::Array2<f32>, gt2d: &nd::Array2<f32>, gt3d: &nd::Array2<f32>) -> Result<SimilarityTransform> {
    let num_points = pred.nrows();
    if num_points == 0 {
        return Err(Error::Alignment("no keypoints to align".to_string()));
    }
    if pred.ncols() != 3 || gt3d.ncols() != 3 || gt2d.ncols() != 2 {
        return Err(Error::Alignment(format!(
            "expected [K, 3], [K, 2] and [K, 3] keypoints, got {:?}, {:?} and {:?}",
            pred.dim(),
            gt2d.dim(),
            gt3d.dim()
        )));
    }
    if gt2d.nrows() != num_points || gt3d.nrows() != num_points {
        return Err(Error::Alignment(format!(
            "keypoint counts differ: {num_points} predicted, {} 2d, {} 3d",
            gt2d.nrows(),
            gt3d.nrows()
        )));
    }

    //rotation
    let source = rows_as_vectors(pred);
    let target = rows_as_vectors(gt3d);
    let source_centroid = centroid(&source);
    let target_centroid = centroid(&target);
    let mut h = Matrix3d::zeros();
    let mut source_spread = 0.0;
    let mut target_spread = 0.0;
    for (s, t) in source.iter().zip(target.iter()) {
        let (s, t) = (s - source_centroid, t - target_centroid);
        h += s * t.transpose();
        source_spread += s.norm_squared();
        target_spread += t.norm_squared();
    }
    if source_spread < MIN_SPREAD || target_spread < MIN_SPREAD {
        return Err(Error::Alignment("keypoints are degenerate (zero spread)".to_string()));
    }
    let svd = h.svd(true, true);
    let u = svd.u.ok_or_else(|| Error::Alignment("svd did not converge".to_string()))?;
    let v_t = svd.v_t.ok_or_else(|| Error::Alignment("svd did not converge".to_string()))?;
    let mut rotation = v_t.transpose() * u.transpose();
    if rotation.determinant() < 0.0 {
        let mut v = v_t.transpose();
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        rotation = v * u.transpose();
    }

    //scale and translation in the image plane
    let rotated: Vec<Vector3d> = source.iter().map(|p| rotation * p).collect();
    let rotated_centroid = centroid(&rotated);
    #[allow(clippy::cast_precision_loss)]
    let n = num_points as f64;
    let (mut gx, mut gy) = (0.0, 0.0);
    for k in 0..num_points {
        gx += f64::from(gt2d[[k, 0]]);
        gy += f64::from(gt2d[[k, 1]]);
    }
    let (gx, gy) = (gx / n, gy / n);
    let mut num = 0.0;
    let mut den = 0.0;
    for (k, q) in rotated.iter().enumerate() {
        let (qx, qy) = (q.x - rotated_centroid.x, q.y - rotated_centroid.y);
        num += qx * (f64::from(gt2d[[k, 0]]) - gx) + qy * (f64::from(gt2d[[k, 1]]) - gy);
        den += qx * qx + qy * qy;
    }
    if den < MIN_SPREAD {
        return Err(Error::Alignment("landmarks project to a single image point".to_string()));
    }
    let scale = num / den;
    if scale <= 0.0 {
        warn!("fitted a non-positive scale {scale}, keypoints may be mirrored");
    }
    let translation = Vector3::new(
        gx - scale * rotated_centroid.x,
        gy - scale * rotated_centroid.y,
        -scale * rotated_centroid.z,
    );

    Ok(SimilarityTransform { rotation, scale, translation })
}

/// One fitted transform per sample of a batch
#[derive(Clone, Debug, Default)]
pub struct BatchAlignment {
    transforms: Vec<SimilarityTransform>,
}

impl BatchAlignment {
    pub fn fit(preds: &[nd::Array2<f32>], gt2ds: &[nd::Array2<f32>], gt3ds: &[nd::Array2<f32>]) -> Result<Self> {
        for got in [gt2ds.len(), gt3ds.len()] {
            if got != preds.len() {
                return Err(Error::BatchMismatch { expected: preds.len(), got });
            }
        }
        let transforms = preds
            .iter()
            .zip(gt2ds)
            .zip(gt3ds)
            .map(|((pred, gt2d), gt3d)| fit_similarity(pred, gt2d, gt3d))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { transforms })
    }

    pub fn transforms(&self) -> &[SimilarityTransform] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Applies transform i to mesh i. Meshes are expected to be posed around
    /// the origin, as the body model produces them at zero translation.
    pub fn apply(&self, meshes: &[nd::Array2<f32>]) -> Result<Vec<nd::Array2<f32>>> {
        if meshes.len() != self.transforms.len() {
            return Err(Error::BatchMismatch {
                expected: self.transforms.len(),
                got: meshes.len(),
            });
        }
        Ok(self.transforms.iter().zip(meshes).map(|(tf, mesh)| tf.apply(mesh)).collect())
    }
}
