use super::{
    betas::Betas,
    metadata::{NUM_LANDMARKS, NUM_VERTS},
    outputs::SmplOutput,
    pose::Pose,
};
use crate::{
    codec::{
        npz::{array_names, open_npz, read_f32, read_u32, require},
        obj::write_obj,
    },
    error::{Error, Result},
    uv::layout::UvLayout,
};
use log::{debug, info};
use ndarray as nd;
use ndarray::prelude::*;
use std::path::Path;
use uvmap_utils::numerical::{batch_rigid_transform, batch_rodrigues};

/// A parametric body model that turns shape and pose parameters into a mesh
/// and a fixed set of landmark joints. The pipeline is written against this
/// trait so another model can be dropped in.
pub trait MeshModel {
    fn num_verts(&self) -> usize;
    /// Number of posable joints including the root
    fn num_joints(&self) -> usize;
    fn faces(&self) -> &nd::Array2<u32>;
    fn uv_layout(&self) -> &UvLayout;
    fn forward(&self, betas: &Betas, pose: &Pose) -> Result<SmplOutput>;
    fn write_obj(&self, verts: &nd::Array2<f32>, path: &Path) -> Result<()> {
        write_obj(verts, self.faces(), path)
    }
}

/// Smpl with an extra regressor from mesh vertices to the 14 LSP landmarks.
#[derive(Clone, Debug)]
pub struct SmplLsp {
    pub verts_template: nd::Array2<f32>,
    pub faces: nd::Array2<u32>,
    /// [``num_verts`` * 3, ``num_betas``]
    pub shape_dirs: nd::Array2<f32>,
    /// [``num_verts`` * 3, (``num_joints`` - 1) * 9]
    pub pose_dirs: Option<nd::Array2<f32>>,
    pub joint_regressor: nd::Array2<f32>,
    pub parent_idx_per_joint: Vec<u32>,
    pub lbs_weights: nd::Array2<f32>,
    pub landmark_regressor: nd::Array2<f32>,
    pub uv_layout: UvLayout,
}

fn flatten_dirs(name: &str, dirs: nd::Array3<f32>, num_verts: usize) -> Result<nd::Array2<f32>> {
    let (nv, three, num_components) = dirs.dim();
    if nv != num_verts || three != 3 {
        return Err(Error::schema(format!("`{name}` must be ({num_verts}, 3, K), got {:?}", dirs.dim())));
    }
    dirs.as_standard_layout()
        .into_owned()
        .into_shape_with_order((num_verts * 3, num_components))
        .map_err(|e| Error::schema(format!("cannot flatten `{name}`: {e}")))
}

impl SmplLsp {
    /// # Errors
    /// Fails with a schema error if the matrices don't have matching sizes
    #[allow(clippy::too_many_arguments)]
    pub fn new_from_matrices(
        verts_template: nd::Array2<f32>,
        faces: nd::Array2<u32>,
        shape_dirs: nd::Array3<f32>,
        pose_dirs: Option<nd::Array3<f32>>,
        joint_regressor: nd::Array2<f32>,
        parent_idx_per_joint: &[u32],
        lbs_weights: nd::Array2<f32>,
        landmark_regressor: nd::Array2<f32>,
        uv: nd::Array2<f32>,
        faces_uv: nd::Array2<u32>,
    ) -> Result<Self> {
        let num_verts = verts_template.nrows();
        if verts_template.ncols() != 3 {
            return Err(Error::schema(format!("`v_template` must be (V, 3), got {:?}", verts_template.dim())));
        }
        let num_joints = joint_regressor.nrows();
        if num_joints == 0 || joint_regressor.ncols() != num_verts {
            return Err(Error::schema(format!(
                "`J_regressor` must be (J, {num_verts}), got {:?}",
                joint_regressor.dim()
            )));
        }
        if lbs_weights.dim() != (num_verts, num_joints) {
            return Err(Error::schema(format!(
                "`weights` must be ({num_verts}, {num_joints}), got {:?}",
                lbs_weights.dim()
            )));
        }
        if landmark_regressor.ncols() != num_verts {
            return Err(Error::schema(format!(
                "`joint_regressor` must be (L, {num_verts}), got {:?}",
                landmark_regressor.dim()
            )));
        }
        if parent_idx_per_joint.len() != num_joints {
            return Err(Error::schema(format!(
                "kinematic tree has {} entries for {num_joints} joints",
                parent_idx_per_joint.len()
            )));
        }
        // the root's parent is stored as -1 or garbage, every other joint must
        // come after its parent for the transform chain to be built in order
        let mut parents = parent_idx_per_joint.to_vec();
        parents[0] = 0;
        for (idx, &parent) in parents.iter().enumerate().skip(1) {
            if parent as usize >= idx {
                return Err(Error::schema(format!("joint {idx} has parent {parent} which does not precede it")));
            }
        }
        let shape_dirs = flatten_dirs("shapedirs", shape_dirs, num_verts)?;
        let pose_dirs = pose_dirs.map(|dirs| flatten_dirs("posedirs", dirs, num_verts)).transpose()?;
        if let Some(pose_dirs) = &pose_dirs {
            if pose_dirs.ncols() != (num_joints - 1) * 9 {
                return Err(Error::schema(format!(
                    "`posedirs` has {} components, expected {}",
                    pose_dirs.ncols(),
                    (num_joints - 1) * 9
                )));
            }
        }
        let uv_layout = UvLayout::new(uv, faces_uv, faces.clone(), num_verts)?;
        if num_verts != NUM_VERTS || landmark_regressor.nrows() != NUM_LANDMARKS {
            debug!(
                "non standard smpl layout: {num_verts} verts, {} landmarks",
                landmark_regressor.nrows()
            );
        }
        Ok(Self {
            verts_template,
            faces,
            shape_dirs,
            pose_dirs,
            joint_regressor,
            parent_idx_per_joint: parents,
            lbs_weights,
            landmark_regressor,
            uv_layout,
        })
    }

    /// Loads the model from an `.npz` export of `model_lsp.pkl`
    pub fn new_from_npz<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut npz = open_npz(path)?;
        let names = array_names(&mut npz)?;
        for name in ["v_template", "f", "shapedirs", "J_regressor", "kintree_table", "weights", "joint_regressor", "vt", "ft"] {
            require(&names, name)?;
        }
        let verts_template: nd::Array2<f32> = read_f32(&mut npz, "v_template")?;
        let faces: nd::Array2<u32> = read_u32(&mut npz, "f")?;
        let shape_dirs: nd::Array3<f32> = read_f32(&mut npz, "shapedirs")?;
        let pose_dirs: Option<nd::Array3<f32>> = if names.iter().any(|n| n == "posedirs") {
            Some(read_f32(&mut npz, "posedirs")?)
        } else {
            None
        };
        let joint_regressor: nd::Array2<f32> = read_f32(&mut npz, "J_regressor")?;
        let kintree_table: nd::Array2<u32> = read_u32(&mut npz, "kintree_table")?;
        let lbs_weights: nd::Array2<f32> = read_f32(&mut npz, "weights")?;
        let landmark_regressor: nd::Array2<f32> = read_f32(&mut npz, "joint_regressor")?;
        let uv: nd::Array2<f32> = read_f32(&mut npz, "vt")?;
        let faces_uv: nd::Array2<u32> = read_u32(&mut npz, "ft")?;
        if kintree_table.nrows() != 2 {
            return Err(Error::schema(format!("`kintree_table` must be (2, J), got {:?}", kintree_table.dim())));
        }
        let parents = kintree_table.row(0).to_vec();

        let model = Self::new_from_matrices(
            verts_template,
            faces,
            shape_dirs,
            pose_dirs,
            joint_regressor,
            &parents,
            lbs_weights,
            landmark_regressor,
            uv,
            faces_uv,
        )?;
        info!(
            "Loaded body model from {}: {} verts, {} faces, {} joints, {} landmarks, {} betas",
            path.display(),
            model.num_verts(),
            model.faces.nrows(),
            model.num_joints(),
            model.landmark_regressor.nrows(),
            model.shape_dirs.ncols()
        );
        Ok(model)
    }

    fn reshape_verts(&self, flat: nd::Array1<f32>) -> Result<nd::Array2<f32>> {
        flat.into_shape_with_order((self.num_verts(), 3))
            .map_err(|e| Error::schema(format!("cannot reshape vertex offsets: {e}")))
    }

    /// Flattened (R - I) of every non root joint, the input of the pose
    /// corrective blend shapes
    fn compute_pose_feature(rot_mats: &nd::Array3<f32>) -> nd::Array1<f32> {
        let identity = nd::Array2::<f32>::eye(3);
        let num_joints = rot_mats.shape()[0];
        let mut pose_feature = nd::Array1::<f32>::zeros((num_joints - 1) * 9);
        for j in 1..num_joints {
            let rel = &rot_mats.slice(s![j, .., ..]) - &identity;
            pose_feature
                .slice_mut(s![(j - 1) * 9..j * 9])
                .assign(&nd::Array1::from_iter(rel.iter().copied()));
        }
        pose_feature
    }
}

impl MeshModel for SmplLsp {
    fn num_verts(&self) -> usize {
        self.verts_template.nrows()
    }
    fn num_joints(&self) -> usize {
        self.joint_regressor.nrows()
    }
    fn faces(&self) -> &nd::Array2<u32> {
        &self.faces
    }
    fn uv_layout(&self) -> &UvLayout {
        &self.uv_layout
    }

    fn forward(&self, betas: &Betas, pose: &Pose) -> Result<SmplOutput> {
        let num_joints = self.num_joints();
        if pose.joint_poses.dim() != (num_joints, 3) || pose.global_trans.len() != 3 {
            return Err(Error::schema(format!(
                "pose must be ({num_joints}, 3) with a 3d translation, got {:?} and {}",
                pose.joint_poses.dim(),
                pose.global_trans.len()
            )));
        }

        //shape
        let num_betas = betas.betas.len().min(self.shape_dirs.ncols());
        let shape_offsets = self.shape_dirs.slice(s![.., 0..num_betas]).dot(&betas.betas.slice(s![0..num_betas]));
        let verts_shaped = &self.verts_template + &self.reshape_verts(shape_offsets)?;
        let joints = self.joint_regressor.dot(&verts_shaped);

        //pose correctives
        let rot_mats = batch_rodrigues(&pose.joint_poses);
        let verts_posed_rest = match &self.pose_dirs {
            Some(pose_dirs) => {
                let pose_feature = Self::compute_pose_feature(&rot_mats);
                &verts_shaped + &self.reshape_verts(pose_dirs.dot(&pose_feature))?
            }
            None => verts_shaped,
        };

        //skinning
        let (posed_joints, rel_transforms) = batch_rigid_transform(&self.parent_idx_per_joint, &rot_mats, &joints);
        let rel_transforms = rel_transforms
            .into_shape_with_order((num_joints, 16))
            .map_err(|e| Error::schema(format!("cannot flatten joint transforms: {e}")))?;
        let per_vertex_transforms = self.lbs_weights.dot(&rel_transforms);

        let mut verts = nd::Array2::<f32>::zeros((self.num_verts(), 3));
        for ((mut out, v), tf) in verts
            .rows_mut()
            .into_iter()
            .zip(verts_posed_rest.rows())
            .zip(per_vertex_transforms.rows())
        {
            for k in 0..3 {
                out[k] = tf[4 * k] * v[0] + tf[4 * k + 1] * v[1] + tf[4 * k + 2] * v[2] + tf[4 * k + 3] + pose.global_trans[k];
            }
        }
        let joints = posed_joints + &pose.global_trans;
        let landmarks = self.landmark_regressor.dot(&verts);

        Ok(SmplOutput { verts, joints, landmarks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_npy::NpzWriter;
    use std::f32::consts::FRAC_PI_2;

    /// Two joint model: a triangle skinned fully to the root plus one vertex
    /// hanging off the child joint.
    fn toy_model(with_pose_dirs: bool) -> SmplLsp {
        let verts_template = array![[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 2.0, 0.0]];
        let faces = array![[0u32, 1, 2], [1, 3, 2]];
        let mut shape_dirs = nd::Array3::<f32>::zeros((4, 3, 2));
        shape_dirs[[1, 0, 0]] = 1.0;
        let pose_dirs = with_pose_dirs.then(|| {
            let mut dirs = nd::Array3::<f32>::zeros((4, 3, 9));
            dirs[[3, 2, 0]] = 1.0;
            dirs
        });
        let joint_regressor = array![[1.0f32, 0.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
        let lbs_weights = array![[1.0f32, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let landmark_regressor = array![[0.0f32, 0.5, 0.5, 0.0], [0.0, 0.0, 0.0, 1.0]];
        let uv = array![[0.0f32, 0.0], [1.0, 0.0], [0.0, 0.5], [0.0, 1.0]];
        SmplLsp::new_from_matrices(
            verts_template,
            faces.clone(),
            shape_dirs,
            pose_dirs,
            joint_regressor,
            &[u32::MAX, 0],
            lbs_weights,
            landmark_regressor,
            uv,
            faces,
        )
        .unwrap()
    }

    #[test]
    fn rest_pose_returns_template() {
        let model = toy_model(true);
        let out = model.forward(&Betas::new_empty(2), &Pose::new_empty(2)).unwrap();
        assert_abs_diff_eq!(out.verts, model.verts_template, epsilon = 1e-6);
        assert_abs_diff_eq!(out.landmarks, array![[0.5f32, 0.5, 0.0], [0.0, 2.0, 0.0]], epsilon = 1e-6);
    }

    #[test]
    fn betas_and_translation_move_vertices() {
        let model = toy_model(false);
        let mut pose = Pose::new_empty(2);
        pose.global_trans = array![0.0, 0.0, 3.0];
        // extra betas beyond the model's shape space are ignored
        let out = model.forward(&Betas::new(array![0.5, 0.0, 7.0]), &pose).unwrap();
        assert_abs_diff_eq!(out.verts.row(1), array![1.5f32, 0.0, 3.0], epsilon = 1e-6);
        assert_abs_diff_eq!(out.joints.row(0), array![0.0f32, 0.0, 3.0], epsilon = 1e-6);
    }

    #[test]
    fn child_rotation_swings_dependent_vertices() {
        let model = toy_model(false);
        let mut pose = Pose::new_empty(2);
        pose.joint_poses[[1, 2]] = FRAC_PI_2;
        let out = model.forward(&Betas::default(), &pose).unwrap();
        // vertex 3 sits one unit above the child joint at (0, 1, 0)
        assert_abs_diff_eq!(out.verts.row(3), array![-1.0f32, 1.0, 0.0], epsilon = 1e-4);
        assert_abs_diff_eq!(out.verts.row(1), array![1.0f32, 0.0, 0.0], epsilon = 1e-6);
    }

    #[test]
    fn pose_correctives_use_rotation_feature() {
        let model = toy_model(true);
        let mut pose = Pose::new_empty(2);
        pose.joint_poses[[1, 2]] = FRAC_PI_2;
        let out = model.forward(&Betas::default(), &pose).unwrap();
        // feature[0] = R[0][0] - 1 = -1, pushing vertex 3 by -1 along z before skinning
        assert_abs_diff_eq!(out.verts.row(3), array![-1.0f32, 1.0, -1.0], epsilon = 1e-4);
    }

    #[test]
    fn wrong_pose_size() {
        let model = toy_model(false);
        let result = model.forward(&Betas::default(), &Pose::new_empty(24));
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn parent_after_child_is_rejected() {
        let faces = array![[0u32, 1, 2]];
        let result = SmplLsp::new_from_matrices(
            nd::Array2::zeros((3, 3)),
            faces.clone(),
            nd::Array3::zeros((3, 3, 1)),
            None,
            nd::Array2::zeros((3, 3)),
            &[0, 2, 0],
            nd::Array2::zeros((3, 3)),
            nd::Array2::zeros((14, 3)),
            nd::Array2::zeros((3, 2)),
            faces,
        );
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn loads_from_npz() {
        let model = toy_model(true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_lsp.npz");
        let mut npz = NpzWriter::new(std::fs::File::create(&path).unwrap());
        npz.add_array("v_template", &model.verts_template).unwrap();
        npz.add_array("f", &model.faces.mapv(i64::from)).unwrap();
        npz.add_array("shapedirs", &model.shape_dirs.clone().into_shape_with_order((4, 3, 2)).unwrap()).unwrap();
        npz.add_array("posedirs", &model.pose_dirs.clone().unwrap().into_shape_with_order((4, 3, 9)).unwrap().mapv(f64::from))
            .unwrap();
        npz.add_array("J_regressor", &model.joint_regressor).unwrap();
        npz.add_array("kintree_table", &array![[-1i64, 0], [0, 1]]).unwrap();
        npz.add_array("weights", &model.lbs_weights).unwrap();
        npz.add_array("joint_regressor", &model.landmark_regressor).unwrap();
        npz.add_array("vt", &model.uv_layout.uv).unwrap();
        npz.add_array("ft", &model.faces.mapv(|x| x as i32)).unwrap();
        npz.finish().unwrap();

        let loaded = SmplLsp::new_from_npz(&path).unwrap();
        assert_eq!(loaded.parent_idx_per_joint, vec![0, 0]);
        assert_eq!(loaded.faces, model.faces);
        assert!(loaded.pose_dirs.is_some());
        let out = loaded.forward(&Betas::default(), &Pose::new_empty(2)).unwrap();
        assert_abs_diff_eq!(out.verts, model.verts_template, epsilon = 1e-6);
    }

    #[test]
    fn missing_model_file() {
        let result = SmplLsp::new_from_npz("nonexistent_model_12345.npz");
        assert!(matches!(result, Err(Error::MissingFile { .. })));
    }
}
