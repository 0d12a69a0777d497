use crate::error::{Error, Result};
use ndarray as nd;

/// Texture parametrization of a mesh. Uv faces mirror the mesh faces one to
/// one; a mesh vertex sitting on a uv seam appears once per chart, so there
/// are usually more uv vertices than mesh vertices.
#[derive(Clone, Debug)]
pub struct UvLayout {
    /// [``num_uv_verts``, 2] texture coordinates in [0, 1], v pointing up
    pub uv: nd::Array2<f32>,
    pub faces_uv: nd::Array2<u32>,
    pub faces: nd::Array2<u32>,
    /// mesh vertex for every uv vertex
    pub idx_vuv_2_vnouv: Vec<usize>,
    /// uv vertices that no face references have no mesh vertex
    pub referenced: Vec<bool>,
    pub num_verts: usize,
}

impl UvLayout {
    pub fn new(uv: nd::Array2<f32>, faces_uv: nd::Array2<u32>, faces: nd::Array2<u32>, num_verts: usize) -> Result<Self> {
        if uv.ncols() != 2 {
            return Err(Error::schema(format!("uv coordinates must be (N, 2), got {:?}", uv.dim())));
        }
        if faces_uv.dim() != faces.dim() || faces.ncols() != 3 {
            return Err(Error::schema(format!(
                "uv faces {:?} must match mesh faces {:?} and be triangles",
                faces_uv.dim(),
                faces.dim()
            )));
        }
        let num_uv_verts = uv.nrows();
        let mut idx_vuv_2_vnouv = vec![0; num_uv_verts];
        let mut referenced = vec![false; num_uv_verts];
        for (fuv, fnouv) in faces_uv.rows().into_iter().zip(faces.rows()) {
            for k in 0..3 {
                let (uv_idx, v_idx) = (fuv[k] as usize, fnouv[k] as usize);
                if uv_idx >= num_uv_verts || v_idx >= num_verts {
                    return Err(Error::schema(format!(
                        "face references uv vertex {uv_idx} / vertex {v_idx} beyond {num_uv_verts} / {num_verts}"
                    )));
                }
                idx_vuv_2_vnouv[uv_idx] = v_idx;
                referenced[uv_idx] = true;
            }
        }
        Ok(Self {
            uv,
            faces_uv,
            faces,
            idx_vuv_2_vnouv,
            referenced,
            num_verts,
        })
    }

    pub fn num_uv_verts(&self) -> usize {
        self.uv.nrows()
    }

    /// Continuous texel coordinates (column, row) of a uv vertex for a square
    /// map of side ``resolution``. Texel centers sit at integer coordinates.
    #[allow(clippy::cast_precision_loss)]
    pub fn texel_coords(&self, uv_idx: usize, resolution: u32) -> (f32, f32) {
        let res = resolution as f32;
        let u = self.uv[[uv_idx, 0]];
        let v = self.uv[[uv_idx, 1]];
        (u * res - 0.5, (1.0 - v) * res - 0.5)
    }
}
