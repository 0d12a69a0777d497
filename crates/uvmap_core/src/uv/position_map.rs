use super::layout::UvLayout;
use crate::{
    codec::png::concat_horizontal,
    error::{Error, Result},
};
use image::{Rgb, RgbImage};
use ndarray as nd;
use ndarray::prelude::*;
use uvmap_utils::{
    array::Gather2D,
    numerical::map,
    vector::{color_to_u8, Color3f},
};

/// Barycentric weights may dip this far below zero on shared triangle edges
const EDGE_TOLERANCE: f32 = 1e-5;

/// Mesh positions rasterized into the uv square
#[derive(Clone, Debug)]
pub struct UvPositionMap {
    pub resolution: u32,
    /// [R, R, 3] indexed by (row, col), row 0 at v = 1
    pub positions: nd::Array3<f32>,
    /// texels covered by at least one uv triangle
    pub mask: nd::Array2<bool>,
    /// every uv vertex drawn in the color of its mesh vertex
    pub scatter: RgbImage,
    /// [``num_verts``, 3] positions normalized to the mesh bounding box
    pub vertex_colors: nd::Array2<f32>,
    pub bbox_min: [f32; 3],
    pub extent: [f32; 3],
}

impl UvPositionMap {
    pub fn num_covered(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Normalized position of a 3d point inside the mesh bounding box
    pub fn normalize(&self, p: [f32; 3]) -> Color3f {
        std::array::from_fn(|k| {
            if self.extent[k] > 0.0 {
                map(p[k], self.bbox_min[k], self.bbox_min[k] + self.extent[k], 0.0, 1.0)
            } else {
                0.0
            }
        })
    }

    /// Positions as colors, background black
    pub fn to_image(&self) -> RgbImage {
        let mut img = RgbImage::new(self.resolution, self.resolution);
        for ((row, col), &covered) in self.mask.indexed_iter() {
            if !covered {
                continue;
            }
            let p = self.positions.slice(s![row, col, ..]);
            let color = self.normalize([p[0], p[1], p[2]]);
            #[allow(clippy::cast_possible_truncation)]
            img.put_pixel(col as u32, row as u32, Rgb(color_to_u8(&color)));
        }
        img
    }

    /// Position map on the left, vertex scatter on the right
    pub fn side_by_side(&self) -> RgbImage {
        concat_horizontal(&self.to_image(), &self.scatter)
    }
}

/// Rasterizes meshes sharing one uv layout into position maps, and samples
/// position maps back to meshes (see `resample`).
pub struct UvExporter<'a> {
    pub(super) layout: &'a UvLayout,
}

/// Per axis minimum and extent of a [N, 3] point set
fn bounding_box(verts: &nd::Array2<f32>) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for v in verts.rows() {
        for k in 0..3 {
            min[k] = min[k].min(v[k]);
            max[k] = max[k].max(v[k]);
        }
    }
    if verts.nrows() == 0 {
        return ([0.0; 3], [0.0; 3]);
    }
    (min, std::array::from_fn(|k| max[k] - min[k]))
}

/// Barycentric weights of ``p`` in the triangle ``(a, b, c)``, or None for a
/// degenerate triangle
fn barycentric(p: (f32, f32), a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> Option<[f32; 3]> {
    let denom = (b.1 - c.1) * (a.0 - c.0) + (c.0 - b.0) * (a.1 - c.1);
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let wa = ((b.1 - c.1) * (p.0 - c.0) + (c.0 - b.0) * (p.1 - c.1)) / denom;
    let wb = ((c.1 - a.1) * (p.0 - c.0) + (a.0 - c.0) * (p.1 - c.1)) / denom;
    Some([wa, wb, 1.0 - wa - wb])
}

/// Integer texel range covering ``[lo, hi]``, clipped to the map
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn texel_span(lo: f32, hi: f32, resolution: u32) -> std::ops::Range<usize> {
    let max = resolution as f32 - 1.0;
    if hi < 0.0 || lo > max {
        return 0..0;
    }
    let start = lo.max(0.0).ceil() as usize;
    let end = hi.min(max).floor() as usize + 1;
    start..end.max(start)
}

impl<'a> UvExporter<'a> {
    pub fn new(layout: &'a UvLayout) -> Self {
        Self { layout }
    }

    pub(super) fn check_resolution(resolution: u32) -> Result<()> {
        if resolution == 0 {
            return Err(Error::InvalidResolution { resolution });
        }
        Ok(())
    }

    /// Rasterizes ``verts`` [``num_verts``, 3] into a ``resolution`` x
    /// ``resolution`` position map.
    ///
    /// # Errors
    /// `InvalidResolution` for a zero resolution, `Schema` if the vertex count
    /// differs from the layout's.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn position_map(&self, verts: &nd::Array2<f32>, resolution: u32) -> Result<UvPositionMap> {
        Self::check_resolution(resolution)?;
        let layout = self.layout;
        if verts.nrows() != layout.num_verts || verts.ncols() != 3 {
            return Err(Error::schema(format!(
                "mesh has shape {:?} but the uv layout expects ({}, 3)",
                verts.dim(),
                layout.num_verts
            )));
        }
        let res = resolution as usize;

        let (bbox_min, extent) = bounding_box(verts);
        let mut map = UvPositionMap {
            resolution,
            positions: nd::Array3::zeros((res, res, 3)),
            mask: nd::Array2::from_elem((res, res), false),
            scatter: RgbImage::new(resolution, resolution),
            vertex_colors: nd::Array2::zeros((verts.nrows(), 3)),
            bbox_min,
            extent,
        };
        for (i, v) in verts.rows().into_iter().enumerate() {
            let color = map.normalize([v[0], v[1], v[2]]);
            map.vertex_colors.row_mut(i).assign(&nd::aview1(&color));
        }

        //positions of the uv vertices
        let uv_verts = verts.gather(&layout.idx_vuv_2_vnouv, &[0, 1, 2]);
        let texels: Vec<(f32, f32)> = (0..layout.num_uv_verts()).map(|i| layout.texel_coords(i, resolution)).collect();

        for face in layout.faces_uv.rows() {
            let idx = [face[0] as usize, face[1] as usize, face[2] as usize];
            let (a, b, c) = (texels[idx[0]], texels[idx[1]], texels[idx[2]]);
            let rows = texel_span(a.1.min(b.1).min(c.1), a.1.max(b.1).max(c.1), resolution);
            let cols = texel_span(a.0.min(b.0).min(c.0), a.0.max(b.0).max(c.0), resolution);
            for row in rows {
                for col in cols.clone() {
                    #[allow(clippy::cast_precision_loss)]
                    let p = (col as f32, row as f32);
                    let Some(w) = barycentric(p, a, b, c) else {
                        continue;
                    };
                    if w.iter().any(|&wi| wi < -EDGE_TOLERANCE) {
                        continue;
                    }
                    for k in 0..3 {
                        map.positions[[row, col, k]] = w[0] * uv_verts[[idx[0], k]] + w[1] * uv_verts[[idx[1], k]] + w[2] * uv_verts[[idx[2], k]];
                    }
                    map.mask[[row, col]] = true;
                }
            }
        }

        for (uv_idx, (&(x, y), &referenced)) in texels.iter().zip(&layout.referenced).enumerate() {
            if !referenced {
                continue;
            }
            let col = (x.round().max(0.0) as u32).min(resolution - 1);
            let row = (y.round().max(0.0) as u32).min(resolution - 1);
            let c = map.vertex_colors.row(layout.idx_vuv_2_vnouv[uv_idx]);
            map.scatter.put_pixel(col, row, Rgb(color_to_u8(&[c[0], c[1], c[2]])));
        }

        Ok(map)
    }
}
