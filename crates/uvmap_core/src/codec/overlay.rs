//! Debug overlays of aligned meshes and ground truth joints on top of the
//! source images. Points are in image coordinates with y pointing up, so
//! row = height - y.

use crate::{
    codec::png::save_png,
    error::{Error, Result},
};
use image::{Rgb, RgbImage};
use log::info;
use ndarray as nd;
use std::path::{Path, PathBuf};
use uvmap_utils::io::{indexed_file_name, FileType};

const MESH_COLOR: Rgb<u8> = Rgb([127, 127, 127]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const JOINT_RADIUS: i64 = 2;

#[allow(clippy::cast_possible_truncation)]
fn to_pixel(img: &RgbImage, x: f32, y: f32) -> (i64, i64) {
    let col = x as i64;
    let row = i64::from(img.height()) - y as i64;
    (col, row)
}

fn put(img: &mut RgbImage, col: i64, row: i64, color: Rgb<u8>) {
    if let (Ok(c), Ok(r)) = (u32::try_from(col), u32::try_from(row)) {
        if c < img.width() && r < img.height() {
            img.put_pixel(c, r, color);
        }
    }
}

/// Paints every mesh vertex as a single gray pixel and every joint as a red
/// disc. Points falling outside the image are skipped.
pub fn paint_overlay(img: &mut RgbImage, mesh_2d: &nd::Array2<f32>, joints_2d: &nd::Array2<f32>) {
    for p in mesh_2d.rows() {
        let (col, row) = to_pixel(img, p[0], p[1]);
        put(img, col, row, MESH_COLOR);
    }
    for j in joints_2d.rows() {
        let (col, row) = to_pixel(img, j[0], j[1]);
        for dr in -JOINT_RADIUS..=JOINT_RADIUS {
            for dc in -JOINT_RADIUS..=JOINT_RADIUS {
                if dr * dr + dc * dc < JOINT_RADIUS * JOINT_RADIUS {
                    put(img, col + dc, row + dr, JOINT_COLOR);
                }
            }
        }
    }
}

/// For each sample copies the source image to `im_gt_{i}.png` and writes the
/// overlay to `im_mask_{i}.png` inside ``out_dir``. Returns the overlay paths.
pub fn visualize(imagenames: &[PathBuf], mesh_2d: &[nd::Array2<f32>], joints_2d: &[nd::Array2<f32>], out_dir: &Path) -> Result<Vec<PathBuf>> {
    if imagenames.len() != mesh_2d.len() || imagenames.len() != joints_2d.len() {
        return Err(Error::BatchMismatch {
            expected: imagenames.len(),
            got: mesh_2d.len().min(joints_2d.len()),
        });
    }
    let mut written = Vec::with_capacity(imagenames.len());
    for (i, ((name, mesh), joints)) in imagenames.iter().zip(mesh_2d).zip(joints_2d).enumerate() {
        if !name.exists() {
            return Err(Error::MissingFile { path: name.clone() });
        }
        std::fs::copy(name, out_dir.join(indexed_file_name("im_gt", i, FileType::Png)))?;
        let mut img = image::open(name)?.to_rgb8();
        paint_overlay(&mut img, mesh, joints);
        let path = out_dir.join(indexed_file_name("im_mask", i, FileType::Png));
        save_png(&img, &path)?;
        written.push(path);
    }
    info!("wrote {} overlays to {}", written.len(), out_dir.display());
    Ok(written)
}
