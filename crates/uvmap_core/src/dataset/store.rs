//! Reads the keyed annotation store: parallel arrays with one row per sample,
//! validated against a fixed schema and brought into image / model axis
//! conventions.

use crate::{
    codec::npz::{array_names, open_npz, read_f32, read_u8, require},
    common::metadata::{NUM_LANDMARKS, POSE_DIM},
    error::{Error, Result},
};
use log::{debug, info};
use ndarray as nd;
use ndarray::prelude::*;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use uvmap_utils::io::FileType;

pub const FIELD_CENTER: &str = "center";
pub const FIELD_GT2D: &str = "gt2d";
pub const FIELD_GT3D: &str = "gt3d";
pub const FIELD_HEIGHT: &str = "height";
pub const FIELD_WIDTH: &str = "width";
pub const FIELD_POSE: &str = "pose";
pub const FIELD_SHAPE: &str = "shape";
pub const FIELD_SMPL_JOINT: &str = "smpl_joint";
pub const FIELD_IMAGENAME: &str = "imagename";
/// Fields starting with this hold 14 keypoints per sample
pub const JOINT_GROUP_PREFIX: &str = "gt";
pub const REQUIRED_FIELDS: [&str; 8] = [
    FIELD_CENTER,
    FIELD_GT2D,
    FIELD_GT3D,
    FIELD_HEIGHT,
    FIELD_WIDTH,
    FIELD_POSE,
    FIELD_SHAPE,
    FIELD_IMAGENAME,
];

/// All samples of an annotation store, held in memory
#[derive(Clone, Debug)]
pub struct AnnotationStore {
    pub root_dir: PathBuf,
    pub center: nd::Array2<f32>,
    /// [N, 14, 2] image coordinates, y pointing up
    pub gt2d: nd::Array3<f32>,
    /// [N, 14, 3] with y and z negated
    pub gt3d: nd::Array3<f32>,
    pub height: nd::Array1<f32>,
    pub width: nd::Array1<f32>,
    pub pose: nd::Array2<f32>,
    pub shape: nd::Array2<f32>,
    pub smpl_joint: Option<nd::ArrayD<f32>>,
    /// Joint groups other than ``gt2d``/``gt3d``, as [N, 14, 3] without any
    /// axis flips
    pub joint_groups: BTreeMap<String, nd::Array3<f32>>,
    /// relative to ``root_dir``
    pub imagenames: Vec<String>,
}

/// y -> height - y for every keypoint of every sample. Applying it twice with
/// the same heights gives back the input.
pub fn flip_vertical(gt2d: &mut nd::Array3<f32>, height: &nd::Array1<f32>) {
    for (mut sample, &h) in gt2d.outer_iter_mut().zip(height.iter()) {
        sample.column_mut(1).mapv_inplace(|y| h - y);
    }
}

/// Negates y and z of every keypoint. Its own inverse.
pub fn flip_yz(gt3d: &mut nd::Array3<f32>) {
    gt3d.slice_mut(s![.., .., 1..]).mapv_inplace(|v| -v);
}

/// Reshapes a joint group field from a flat per-sample layout to
/// [N, 14, 3]
pub fn reshape_joint_group(name: &str, data: nd::ArrayD<f32>) -> Result<nd::Array3<f32>> {
    let num_samples = data.shape().first().copied().unwrap_or(0);
    let per_sample: usize = data.shape().iter().skip(1).product();
    if data.ndim() < 2 || per_sample != NUM_LANDMARKS * 3 {
        return Err(Error::schema(format!(
            "field `{name}` has shape {:?}, expected {} values ({NUM_LANDMARKS} x 3) per sample",
            data.shape(),
            NUM_LANDMARKS * 3
        )));
    }
    data.as_standard_layout()
        .into_owned()
        .into_shape_with_order((num_samples, NUM_LANDMARKS, 3))
        .map_err(|e| Error::schema(format!("cannot reshape `{name}`: {e}")))
}

fn truncate<A: Clone, D: nd::Dimension>(data: nd::Array<A, D>, max_items: Option<usize>) -> nd::Array<A, D> {
    match max_items {
        Some(max_items) if data.ndim() > 0 && max_items < data.len_of(Axis(0)) => data.slice_axis(Axis(0), nd::Slice::from(0..max_items)).to_owned(),
        _ => data,
    }
}

/// Scalars per sample may be stored as (N,) or (N, 1)
fn per_sample_scalar(name: &str, data: nd::ArrayD<f32>) -> Result<nd::Array1<f32>> {
    let num_samples = data.shape().first().copied().unwrap_or(0);
    if data.ndim() == 0 || data.len() != num_samples {
        return Err(Error::schema(format!("field `{name}` must hold one value per sample, got shape {:?}", data.shape())));
    }
    Ok(data.iter().copied().collect())
}

fn per_sample_vector(name: &str, data: nd::Array2<f32>, expected: Option<usize>) -> Result<nd::Array2<f32>> {
    match expected {
        Some(expected) if data.ncols() != expected => Err(Error::schema(format!(
            "field `{name}` has {} values per sample, expected {expected}",
            data.ncols()
        ))),
        _ => Ok(data),
    }
}

/// Image names are NUL padded fixed length byte strings, one row per sample
fn decode_names(data: &nd::Array2<u8>) -> Vec<String> {
    data.rows()
        .into_iter()
        .map(|row| {
            let bytes: Vec<u8> = row.iter().copied().take_while(|&b| b != 0).collect();
            String::from_utf8_lossy(&bytes).into_owned()
        })
        .collect()
}

impl AnnotationStore {
    /// Reads every field of ``root_dir/annotation``, keeping at most
    /// ``max_items`` samples. The archive is closed before returning.
    pub fn open<P: AsRef<Path>>(root_dir: P, annotation: &str, max_items: Option<usize>) -> Result<Self> {
        let root_dir = std::path::absolute(root_dir.as_ref())?;
        let path = root_dir.join(annotation);
        if !path.exists() {
            return Err(Error::MissingFile { path });
        }
        if FileType::from_path(&path) != FileType::Npz {
            return Err(Error::schema(format!("unsupported annotation store format: {}", path.display())));
        }
        let mut npz = open_npz(&path)?;
        let names = array_names(&mut npz)?;
        for name in REQUIRED_FIELDS {
            require(&names, name)?;
        }
        let known = |n: &str| REQUIRED_FIELDS.contains(&n) || n == FIELD_SMPL_JOINT;
        for name in names.iter().filter(|n| !known(n.as_str()) && !n.starts_with(JOINT_GROUP_PREFIX)) {
            debug!("ignoring unknown annotation field `{name}`");
        }

        let center = per_sample_vector(FIELD_CENTER, truncate(read_f32(&mut npz, FIELD_CENTER)?, max_items), Some(2))?;
        let gt2d = reshape_joint_group(FIELD_GT2D, truncate(read_f32(&mut npz, FIELD_GT2D)?, max_items))?;
        // drop the confidence score
        let mut gt2d = gt2d.slice(s![.., .., 0..2]).to_owned();
        let mut gt3d = reshape_joint_group(FIELD_GT3D, truncate(read_f32(&mut npz, FIELD_GT3D)?, max_items))?;
        let height = per_sample_scalar(FIELD_HEIGHT, truncate(read_f32(&mut npz, FIELD_HEIGHT)?, max_items))?;
        let width = per_sample_scalar(FIELD_WIDTH, truncate(read_f32(&mut npz, FIELD_WIDTH)?, max_items))?;
        let pose = per_sample_vector(FIELD_POSE, truncate(read_f32(&mut npz, FIELD_POSE)?, max_items), Some(POSE_DIM))?;
        let shape = per_sample_vector(FIELD_SHAPE, truncate(read_f32(&mut npz, FIELD_SHAPE)?, max_items), None)?;
        let smpl_joint: Option<nd::ArrayD<f32>> = if names.iter().any(|n| n == FIELD_SMPL_JOINT) {
            Some(truncate(read_f32(&mut npz, FIELD_SMPL_JOINT)?, max_items))
        } else {
            None
        };
        let mut joint_groups = BTreeMap::new();
        for name in names.iter().filter(|n| !known(n.as_str()) && n.starts_with(JOINT_GROUP_PREFIX)) {
            let group = reshape_joint_group(name, truncate(read_f32(&mut npz, name)?, max_items))?;
            joint_groups.insert(name.clone(), group);
        }
        let imagenames = decode_names(&truncate(read_u8(&mut npz, FIELD_IMAGENAME)?, max_items));
        drop(npz);

        let num_samples = pose.nrows();
        let mut counts: Vec<(&str, usize)> = vec![
            (FIELD_CENTER, center.nrows()),
            (FIELD_GT2D, gt2d.len_of(Axis(0))),
            (FIELD_GT3D, gt3d.len_of(Axis(0))),
            (FIELD_HEIGHT, height.len()),
            (FIELD_WIDTH, width.len()),
            (FIELD_SHAPE, shape.nrows()),
            (FIELD_IMAGENAME, imagenames.len()),
        ];
        if let Some(smpl_joint) = &smpl_joint {
            counts.push((FIELD_SMPL_JOINT, smpl_joint.shape().first().copied().unwrap_or(0)));
        }
        counts.extend(joint_groups.iter().map(|(name, group)| (name.as_str(), group.len_of(Axis(0)))));
        if let Some((name, count)) = counts.into_iter().find(|(_, count)| *count != num_samples) {
            return Err(Error::schema(format!("field `{name}` has {count} samples but `pose` has {num_samples}")));
        }

        flip_vertical(&mut gt2d, &height);
        flip_yz(&mut gt3d);

        info!("Loaded {num_samples} annotated samples from {}", path.display());
        Ok(Self {
            root_dir,
            center,
            gt2d,
            gt3d,
            height,
            width,
            pose,
            shape,
            smpl_joint,
            joint_groups,
            imagenames,
        })
    }

    pub fn len(&self) -> usize {
        self.pose.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_npy::NpzWriter;
    use std::fs::File;

    fn encode_names(names: &[String], width: usize) -> nd::Array2<u8> {
        let mut out = nd::Array2::<u8>::zeros((names.len(), width));
        for (mut row, name) in out.rows_mut().into_iter().zip(names) {
            for (dst, &b) in row.iter_mut().zip(name.as_bytes()) {
                *dst = b;
            }
        }
        out
    }

    /// Raw keypoint value k of sample i, before any flipping
    fn raw(i: usize, k: usize) -> f32 {
        (i * 42 + k) as f32
    }

    /// Writes every field except those in ``skip``; the caller finishes the
    /// archive
    fn store_writer(path: &Path, num_samples: usize, gt3d_per_sample: usize, skip: &[&str]) -> NpzWriter<File> {
        let mut npz = NpzWriter::new(File::create(path).unwrap());
        let gt2d = nd::Array2::from_shape_fn((num_samples, 42), |(i, k)| raw(i, k));
        let gt3d = nd::Array2::from_shape_fn((num_samples, gt3d_per_sample), |(i, k)| raw(i, k));
        let names: Vec<String> = (0..num_samples).map(|i| format!("s_09/frame_{i:04}.jpg")).collect();
        let keep = |name: &str| !skip.contains(&name);
        if keep(FIELD_CENTER) {
            npz.add_array(FIELD_CENTER, &nd::Array2::<f64>::from_elem((num_samples, 2), 120.0)).unwrap();
        }
        if keep(FIELD_GT2D) {
            npz.add_array(FIELD_GT2D, &gt2d).unwrap();
        }
        if keep(FIELD_GT3D) {
            npz.add_array(FIELD_GT3D, &gt3d.mapv(f64::from)).unwrap();
        }
        if keep(FIELD_HEIGHT) {
            npz.add_array(FIELD_HEIGHT, &nd::Array1::from_shape_fn(num_samples, |i| 1000.0 + i as f32)).unwrap();
        }
        if keep(FIELD_WIDTH) {
            npz.add_array(FIELD_WIDTH, &nd::Array2::<f32>::from_elem((num_samples, 1), 640.0)).unwrap();
        }
        if keep(FIELD_POSE) {
            npz.add_array(FIELD_POSE, &nd::Array2::<f32>::zeros((num_samples, POSE_DIM))).unwrap();
        }
        if keep(FIELD_SHAPE) {
            npz.add_array(FIELD_SHAPE, &nd::Array2::<f32>::zeros((num_samples, 10))).unwrap();
        }
        if keep(FIELD_SMPL_JOINT) {
            npz.add_array(FIELD_SMPL_JOINT, &nd::Array3::<f32>::zeros((num_samples, 24, 3))).unwrap();
        }
        if keep(FIELD_IMAGENAME) {
            npz.add_array(FIELD_IMAGENAME, &encode_names(&names, 32)).unwrap();
        }
        npz
    }

    fn write_store(path: &Path, num_samples: usize, gt3d_per_sample: usize, with_extra: bool) {
        let mut npz = store_writer(path, num_samples, gt3d_per_sample, &[]);
        if with_extra {
            npz.add_array("camera", &nd::Array2::<f32>::zeros((num_samples, 4))).unwrap();
        }
        npz.finish().unwrap();
    }

    #[test]
    fn loads_and_flips() {
        let dir = tempfile::tempdir().unwrap();
        write_store(&dir.path().join("annotation.npz"), 5, 42, true);
        let store = AnnotationStore::open(dir.path(), "annotation.npz", None).unwrap();
        assert_eq!(store.len(), 5);
        assert_eq!(store.gt2d.dim(), (5, 14, 2));
        assert_eq!(store.gt3d.dim(), (5, 14, 3));
        // keypoint 3 of sample 2 starts at flat index 2 * 42 + 9
        assert_abs_diff_eq!(store.gt2d[[2, 3, 0]], raw(2, 9));
        assert_abs_diff_eq!(store.gt2d[[2, 3, 1]], 1002.0 - raw(2, 10));
        assert_abs_diff_eq!(store.gt3d[[2, 3, 0]], raw(2, 9));
        assert_abs_diff_eq!(store.gt3d[[2, 3, 1]], -raw(2, 10));
        assert_abs_diff_eq!(store.gt3d[[2, 3, 2]], -raw(2, 11));
        assert_abs_diff_eq!(store.width[4], 640.0);
        assert_eq!(store.imagenames[3], "s_09/frame_0003.jpg");
        assert!(store.smpl_joint.is_some());
    }

    #[test]
    fn max_items_truncates_every_field() {
        let dir = tempfile::tempdir().unwrap();
        write_store(&dir.path().join("annotation.npz"), 12, 42, false);
        let store = AnnotationStore::open(dir.path(), "annotation.npz", Some(4)).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.gt2d.len_of(Axis(0)), 4);
        assert_eq!(store.imagenames.len(), 4);
        assert_eq!(store.smpl_joint.as_ref().map(|j| j.shape()[0]), Some(4));
        let store = AnnotationStore::open(dir.path(), "annotation.npz", Some(100)).unwrap();
        assert_eq!(store.len(), 12);
    }

    #[test]
    fn joint_group_must_hold_14_triplets() {
        let dir = tempfile::tempdir().unwrap();
        write_store(&dir.path().join("annotation.npz"), 3, 40, false);
        let result = AnnotationStore::open(dir.path(), "annotation.npz", None);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn pose_with_joint_axis_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.npz");
        let mut npz = store_writer(&path, 3, 42, &[FIELD_POSE]);
        npz.add_array(FIELD_POSE, &nd::Array3::<f32>::zeros((3, 24, 3))).unwrap();
        npz.finish().unwrap();
        let result = AnnotationStore::open(dir.path(), "annotation.npz", None);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn fields_must_share_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.npz");
        let mut npz = store_writer(&path, 6, 42, &[FIELD_HEIGHT]);
        npz.add_array(FIELD_HEIGHT, &nd::Array1::<f32>::from_elem(5, 1000.0)).unwrap();
        npz.finish().unwrap();

        let result = AnnotationStore::open(dir.path(), "annotation.npz", None);
        assert!(matches!(result, Err(Error::Schema(_))));
        // a cap above the shorter field leaves the mismatch in place
        let result = AnnotationStore::open(dir.path(), "annotation.npz", Some(10));
        assert!(matches!(result, Err(Error::Schema(_))));
        // a cap at or below it hides it
        let store = AnnotationStore::open(dir.path(), "annotation.npz", Some(5)).unwrap();
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn extra_joint_groups_are_reshaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.npz");
        let mut npz = store_writer(&path, 4, 42, &[]);
        npz.add_array("gt3d_world", &nd::Array2::from_shape_fn((4, 42), |(i, k)| raw(i, k))).unwrap();
        npz.finish().unwrap();
        let store = AnnotationStore::open(dir.path(), "annotation.npz", Some(2)).unwrap();
        let group = &store.joint_groups["gt3d_world"];
        assert_eq!(group.dim(), (2, 14, 3));
        assert_abs_diff_eq!(group[[1, 3, 2]], raw(1, 11));

        let mut npz = store_writer(&path, 4, 42, &[]);
        npz.add_array("gt_hands", &nd::Array2::<f32>::zeros((4, 40))).unwrap();
        npz.finish().unwrap();
        let result = AnnotationStore::open(dir.path(), "annotation.npz", None);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let result = AnnotationStore::open(dir.path(), "annotation.npz", None);
        assert!(matches!(result, Err(Error::MissingFile { .. })));
    }

    #[test]
    fn missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array(FIELD_POSE, &nd::Array2::<f32>::zeros((2, POSE_DIM))).unwrap();
        npz.finish().unwrap();
        let result = AnnotationStore::open(dir.path(), "annotation.npz", None);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("annotation.h5"), b"\x89HDF").unwrap();
        let result = AnnotationStore::open(dir.path(), "annotation.h5", None);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn flips_are_involutions() {
        let raw2d = nd::Array3::from_shape_fn((3, 14, 2), |(i, k, c)| (i * 100 + k * 2 + c) as f32);
        let heights = array![480.0f32, 720.0, 1000.0];
        let mut gt2d = raw2d.clone();
        flip_vertical(&mut gt2d, &heights);
        assert_abs_diff_eq!(gt2d[[1, 5, 1]], 720.0 - raw2d[[1, 5, 1]]);
        assert_abs_diff_eq!(gt2d[[1, 5, 0]], raw2d[[1, 5, 0]]);
        flip_vertical(&mut gt2d, &heights);
        assert_abs_diff_eq!(gt2d, raw2d);

        let raw3d = nd::Array3::from_shape_fn((2, 14, 3), |(i, k, c)| (i * 50 + k * 3 + c) as f32 - 20.0);
        let mut gt3d = raw3d.clone();
        flip_yz(&mut gt3d);
        assert_abs_diff_eq!(gt3d[[1, 2, 2]], -raw3d[[1, 2, 2]]);
        assert_abs_diff_eq!(gt3d[[1, 2, 0]], raw3d[[1, 2, 0]]);
        flip_yz(&mut gt3d);
        assert_abs_diff_eq!(gt3d, raw3d);
    }

    #[test]
    fn reshape_accepts_prestructured_joints() {
        let data = nd::ArrayD::<f32>::zeros(nd::IxDyn(&[4, 14, 3]));
        assert_eq!(reshape_joint_group(FIELD_GT3D, data).unwrap().dim(), (4, 14, 3));
        let data = nd::ArrayD::<f32>::zeros(nd::IxDyn(&[4, 84]));
        assert!(matches!(reshape_joint_group(FIELD_GT3D, data), Err(Error::Schema(_))));
    }
}
