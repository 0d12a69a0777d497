use nalgebra::clamp;
use ndarray as nd;
use ndarray::prelude::*;
use std::ops::{Div, SubAssign};

//map a value from the range [inMin, inMax] to [outMin, outMax]
pub fn map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let value_clamped = clamp(value, in_min, in_max);
    out_min + (out_max - out_min) * (value_clamped - in_min) / (in_max - in_min)
}

/// Rotation matrices for a batch of axis-angle vectors of shape
/// [``nr_joints``, 3]
pub fn batch_rodrigues(full_pose: &nd::Array2<f32>) -> nd::Array3<f32> {
    let mut rotations_per_join = ndarray::Array3::<f32>::zeros((full_pose.shape()[0], 3, 3));

    for (idx, v) in full_pose.axis_iter(nd::Axis(0)).enumerate() {
        let angle = v.iter().map(|x| x * x).sum::<f32>().sqrt(); //l2 norm

        let rot_dir = v.to_owned().div(angle + 1e-6);
        let cos = angle.cos();
        let sin = angle.sin();

        let (rx, ry, rz) = (rot_dir[0], rot_dir[1], rot_dir[2]);

        let k = array![[0.0, -rz, ry], [rz, 0.0, -rx], [-ry, rx, 0.0]];
        let identity = ndarray::Array2::<f32>::eye(3);
        let rot_mat = identity + sin * k.clone() + (1.0 - cos) * k.dot(&k);
        rotations_per_join.slice_mut(s![idx, .., ..]).assign(&rot_mat);
    }

    rotations_per_join
}

/// Walks the kinematic tree and returns the posed joint locations together
/// with the per joint transforms relative to the rest pose, ready to be
/// blended by skinning weights. Joint 0 is the root, every other joint must
/// have a parent with a smaller index.
#[allow(clippy::similar_names)]
pub fn batch_rigid_transform(parent_idx_per_joint: &[u32], rot_mats: &nd::Array3<f32>, joints: &nd::Array2<f32>) -> (nd::Array2<f32>, nd::Array3<f32>) {
    let num_joints = joints.nrows();
    let mut rel_joints = joints.clone(); //contains the relative position to the parent joint

    // rel_joints[:, 1:] -= joints[:, parents[1:]]
    for (idx_cur, idx_parent) in parent_idx_per_joint.iter().enumerate().skip(1) {
        let parent_joint_position = joints.row(*idx_parent as usize);
        rel_joints.row_mut(idx_cur).sub_assign(&parent_joint_position);
    }

    let mut transforms_mat = ndarray::Array3::<f32>::zeros((num_joints, 4, 4));
    for idx in 0..num_joints {
        transforms_mat.slice_mut(s![idx, 0..3, 0..3]).assign(&rot_mats.slice(s![idx, .., ..]));
        transforms_mat.slice_mut(s![idx, 0..3, 3]).assign(&rel_joints.row(idx));
        transforms_mat[[idx, 3, 3]] = 1.0;
    }

    let mut transform_chain: Vec<nd::Array2<f32>> = Vec::with_capacity(num_joints);
    transform_chain.push(transforms_mat.slice(s![0, .., ..]).to_owned());

    for i in 1..num_joints {
        let mat_1 = &transform_chain[parent_idx_per_joint[i] as usize];
        let mat_2 = transforms_mat.slice(s![i, .., ..]);
        let curr_res = mat_1.dot(&mat_2);
        transform_chain.push(curr_res);
    }

    //posed joints are the translation part of the transform chain
    let mut posed_joints = joints.clone();
    for (i, tf) in transform_chain.iter().enumerate() {
        posed_joints.row_mut(i).assign(&tf.slice(s![0..3, 3]));
    }

    //remove the rest pose joint location so the transform can be applied to
    // rest pose vertices directly
    let mut rel_transforms = ndarray::Array3::<f32>::zeros((num_joints, 4, 4));
    for (i, transform) in transform_chain.iter().enumerate() {
        let (jx, jy, jz) = (joints.row(i)[0], joints.row(i)[1], joints.row(i)[2]);
        let joint_homogen = array![jx, jy, jz, 0.0];
        let transformed_joint = transform.dot(&joint_homogen);

        let mut transformed_joint_4 = nd::Array2::<f32>::zeros((4, 4));
        transformed_joint_4.slice_mut(s![0..4, 3]).assign(&transformed_joint);

        rel_transforms.slice_mut(s![i, .., ..]).assign(&(transform - &transformed_joint_4));
    }

    (posed_joints, rel_transforms)
}
