use na::{Matrix3, Vector3};
use ndarray as nd;
extern crate nalgebra as na;
pub type Color3f = [f32; 3];
pub type Vector3d = Vector3<f64>;
pub type Matrix3d = Matrix3<f64>;
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn color_to_u8(color: &Color3f) -> [u8; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
pub fn vec_from_array_d(vertices: &nd::Array2<f32>, row_index: usize) -> Vector3d {
    let row = vertices.row(row_index);
    Vector3d::new(f64::from(row[0]), f64::from(row[1]), f64::from(row[2]))
}
