use super::store::AnnotationStore;
use crate::{
    config::PipelineConfig,
    error::{Error, Result},
};
use ndarray as nd;
use ndarray::prelude::*;
use std::{ops::Range, path::PathBuf};

/// One annotated sample
#[derive(Clone, Debug)]
pub struct AnnotationRecord {
    pub index: usize,
    pub center: nd::Array1<f32>,
    /// [14, 2] image coordinates, y pointing up
    pub gt2d: nd::Array2<f32>,
    /// [14, 3]
    pub gt3d: nd::Array2<f32>,
    pub height: f32,
    pub width: f32,
    pub pose: nd::Array1<f32>,
    pub shape: nd::Array1<f32>,
    pub smpl_joint: Option<nd::ArrayD<f32>>,
    pub imagename: PathBuf,
}

/// Indexed access to the samples of an annotation store. Retrieval only,
/// meshes are computed by [`super::mesh_stage::MeshStage`].
#[derive(Clone, Debug)]
pub struct AnnotationDataset {
    store: AnnotationStore,
}

impl AnnotationDataset {
    pub fn new(store: AnnotationStore) -> Self {
        Self { store }
    }

    pub fn open(config: &PipelineConfig) -> Result<Self> {
        let store = AnnotationStore::open(&config.root_dir, &config.annotation, config.max_items)?;
        Ok(Self::new(store))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<AnnotationRecord> {
        let len = self.len();
        if index >= len {
            return Err(Error::Index { index, len });
        }
        let store = &self.store;
        Ok(AnnotationRecord {
            index,
            center: store.center.row(index).to_owned(),
            gt2d: store.gt2d.index_axis(Axis(0), index).to_owned(),
            gt3d: store.gt3d.index_axis(Axis(0), index).to_owned(),
            height: store.height[index],
            width: store.width[index],
            pose: store.pose.row(index).to_owned(),
            shape: store.shape.row(index).to_owned(),
            smpl_joint: store.smpl_joint.as_ref().map(|j| j.index_axis(Axis(0), index).to_owned()),
            imagename: store.root_dir.join(&store.imagenames[index]),
        })
    }

    /// All records of ``range``, which has to lie inside the dataset
    pub fn get_batch(&self, range: Range<usize>) -> Result<Vec<AnnotationRecord>> {
        let len = self.len();
        if range.end > len {
            return Err(Error::Index { index: range.end, len });
        }
        if range.start > range.end {
            return Err(Error::Index { index: range.start, len });
        }
        range.map(|i| self.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn store(num_samples: usize) -> AnnotationStore {
        AnnotationStore {
            root_dir: PathBuf::from("/data/h36m"),
            center: nd::Array2::from_shape_fn((num_samples, 2), |(i, c)| (i * 2 + c) as f32),
            gt2d: nd::Array3::from_shape_fn((num_samples, 14, 2), |(i, k, c)| (i * 100 + k * 2 + c) as f32),
            gt3d: nd::Array3::from_shape_fn((num_samples, 14, 3), |(i, k, c)| (i * 100 + k * 3 + c) as f32),
            height: nd::Array1::from_elem(num_samples, 1000.0),
            width: nd::Array1::from_elem(num_samples, 1000.0),
            pose: nd::Array2::zeros((num_samples, 72)),
            shape: nd::Array2::from_shape_fn((num_samples, 10), |(i, _)| i as f32),
            smpl_joint: None,
            joint_groups: Default::default(),
            imagenames: (0..num_samples).map(|i| format!("images/{i:03}.jpg")).collect(),
        }
    }

    #[test]
    fn get_returns_record() {
        let dataset = AnnotationDataset::new(store(5));
        assert_eq!(dataset.len(), 5);
        let record = dataset.get(3).unwrap();
        assert_eq!(record.index, 3);
        assert_eq!(record.imagename, PathBuf::from("/data/h36m/images/003.jpg"));
        assert_abs_diff_eq!(record.gt2d[[1, 1]], 303.0);
        assert_abs_diff_eq!(record.shape[9], 3.0);
        assert_eq!(record.center.to_vec(), vec![6.0, 7.0]);
    }

    #[test]
    fn get_out_of_range() {
        let dataset = AnnotationDataset::new(store(100));
        assert!(matches!(dataset.get(100), Err(Error::Index { index: 100, len: 100 })));
        assert!(dataset.get(99).is_ok());
    }

    #[test]
    fn batch_is_strict() {
        let dataset = AnnotationDataset::new(store(10));
        let batch = dataset.get_batch(2..6).unwrap();
        assert_eq!(batch.iter().map(|r| r.index).collect::<Vec<_>>(), vec![2, 3, 4, 5]);
        assert!(dataset.get_batch(4..4).unwrap().is_empty());
        assert!(matches!(dataset.get_batch(5..11), Err(Error::Index { index: 11, len: 10 })));
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = dataset.get_batch(6..2);
        assert!(matches!(reversed, Err(Error::Index { .. })));
    }
}
