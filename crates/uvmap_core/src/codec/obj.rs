use crate::error::{Error, Result};
use log::debug;
use ndarray as nd;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Writes a triangle mesh as Wavefront OBJ: one `v x y z` line per vertex
/// followed by 1-based `f a b c` lines.
pub fn write_obj(verts: &nd::Array2<f32>, faces: &nd::Array2<u32>, path: &Path) -> Result<()> {
    if verts.ncols() != 3 || faces.ncols() != 3 {
        return Err(Error::schema(format!(
            "obj export expects (V, 3) vertices and (F, 3) faces, got {:?} and {:?}",
            verts.dim(),
            faces.dim()
        )));
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for v in verts.rows() {
        writeln!(writer, "v {:.6} {:.6} {:.6}", v[0], v[1], v[2])?;
    }
    for f in faces.rows() {
        writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    writer.flush()?;
    debug!("wrote {} verts and {} faces to {}", verts.nrows(), faces.nrows(), path.display());
    Ok(())
}
