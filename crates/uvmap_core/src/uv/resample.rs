//! Sampling a position map back onto the mesh it was rasterized from.

use super::position_map::{UvExporter, UvPositionMap};
use crate::error::{Error, Result};
use log::warn;
use ndarray as nd;
use uvmap_utils::array::ScatterAdd2D;

/// Bilinear interpolation over the covered texels around ``(x, y)``. Weights
/// of uncovered texels are dropped and the rest renormalized.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn bilinear(map: &UvPositionMap, x: f32, y: f32) -> Option<[f32; 3]> {
    let max = map.resolution as f32 - 1.0;
    let (x, y) = (x.clamp(0.0, max), y.clamp(0.0, max));
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let last = map.resolution as usize - 1;
    let (x1, y1) = ((x0 + 1).min(last), (y0 + 1).min(last));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let mut acc = [0.0f32; 3];
    let mut total = 0.0;
    for (row, col, w) in [
        (y0, x0, (1.0 - fx) * (1.0 - fy)),
        (y0, x1, fx * (1.0 - fy)),
        (y1, x0, (1.0 - fx) * fy),
        (y1, x1, fx * fy),
    ] {
        if w <= 0.0 || !map.mask[[row, col]] {
            continue;
        }
        for (k, a) in acc.iter_mut().enumerate() {
            *a += w * map.positions[[row, col, k]];
        }
        total += w;
    }
    (total > 1e-6).then(|| acc.map(|a| a / total))
}

/// Closest covered texel to ``(x, y)``, searching square rings of growing
/// radius
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn nearest_covered(map: &UvPositionMap, x: f32, y: f32) -> Option<(usize, usize)> {
    let res = map.resolution as i64;
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let mut best: Option<((usize, usize), f32)> = None;
    let mut last_radius = 2 * res;
    let mut radius = 0;
    while radius <= last_radius {
        for row in (cy - radius)..=(cy + radius) {
            for col in (cx - radius)..=(cx + radius) {
                let on_ring = (row - cy).abs() == radius || (col - cx).abs() == radius;
                if !on_ring || row < 0 || col < 0 || row >= res || col >= res {
                    continue;
                }
                let (r, c) = (row as usize, col as usize);
                if !map.mask[[r, c]] {
                    continue;
                }
                let d = (col as f32 - x).powi(2) + (row as f32 - y).powi(2);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some(((r, c), d));
                }
            }
        }
        if best.is_some() && last_radius == 2 * res {
            // a closer texel can still sit on a later ring, up to sqrt(2) further out
            last_radius = (radius as f32 * std::f32::consts::SQRT_2).ceil() as i64 + 1;
        }
        radius += 1;
    }
    best.map(|(texel, _)| texel)
}

impl UvExporter<'_> {
    /// Samples ``map`` at every uv vertex and averages the samples of uv
    /// vertices sharing a mesh vertex. Returns [``num_verts``, 3].
    ///
    /// # Errors
    /// `InvalidResolution` for an empty map, `Schema` if no texel is covered.
    pub fn resample(&self, map: &UvPositionMap) -> Result<nd::Array2<f32>> {
        Self::check_resolution(map.resolution)?;
        if map.num_covered() == 0 {
            return Err(Error::schema("position map covers no texel"));
        }
        let layout = self.layout;
        let referenced: Vec<usize> = (0..layout.num_uv_verts()).filter(|&i| layout.referenced[i]).collect();
        let mut samples = nd::Array2::<f32>::zeros((referenced.len(), 3));
        for (mut sample, &uv_idx) in samples.rows_mut().into_iter().zip(&referenced) {
            let (x, y) = layout.texel_coords(uv_idx, map.resolution);
            let p = match bilinear(map, x, y) {
                Some(p) => p,
                None => {
                    let (row, col) = nearest_covered(map, x, y).ok_or_else(|| Error::schema("position map covers no texel"))?;
                    let p = map.positions.slice(ndarray::s![row, col, ..]);
                    [p[0], p[1], p[2]]
                }
            };
            sample.assign(&nd::aview1(&p));
        }

        let targets: Vec<usize> = referenced.iter().map(|&i| layout.idx_vuv_2_vnouv[i]).collect();
        let mut verts = nd::Array2::<f32>::zeros((layout.num_verts, 3));
        let mut counts = vec![0; layout.num_verts];
        samples.scatter_add(&targets, &mut verts, &mut counts);
        let mut missing = 0;
        for (mut v, &count) in verts.rows_mut().into_iter().zip(&counts) {
            if count == 0 {
                missing += 1;
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let inv = 1.0 / count as f32;
            v.mapv_inplace(|x| x * inv);
        }
        if missing > 0 {
            warn!("{missing} vertices have no uv coordinates and were left at the origin");
        }
        Ok(verts)
    }
}
