//! Typed reads out of `.npz` archives. Python tooling writes the same
//! quantity with whatever dtype was at hand, so floats are accepted as
//! `f32`/`f64` and indices as any common integer width.

use crate::error::{Error, Result};
use ndarray as nd;
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpzError, ReadableElement};
use std::{
    fs::File,
    io::{Read, Seek},
    path::Path,
};

pub fn open_npz(path: &Path) -> Result<NpzReader<File>> {
    if !path.exists() {
        return Err(Error::MissingFile { path: path.to_path_buf() });
    }
    let file = File::open(path).map_err(|e| Error::from_open(e, path))?;
    Ok(NpzReader::new(file)?)
}

/// Array names without the `.npy` suffix
pub fn array_names<R: Read + Seek>(npz: &mut NpzReader<R>) -> Result<Vec<String>> {
    Ok(npz
        .names()?
        .into_iter()
        .map(|name| name.strip_suffix(".npy").map_or(name.clone(), str::to_string))
        .collect())
}

pub fn require(names: &[String], name: &str) -> Result<()> {
    if names.iter().any(|n| n == name) {
        Ok(())
    } else {
        Err(Error::schema(format!("missing field `{name}` (available: {names:?})")))
    }
}

/// Reads ``name`` with element type ``A``. A dtype mismatch gives `None` so
/// the caller can try the next width; any other failure is an error.
fn read_dyn<R: Read + Seek, A: ReadableElement>(npz: &mut NpzReader<R>, name: &str) -> Result<Option<nd::ArrayD<A>>> {
    match npz.by_name::<nd::OwnedRepr<A>, nd::IxDyn>(name) {
        Ok(arr) => Ok(Some(arr)),
        Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rank mismatches are layout errors, not io errors
fn with_rank<A, D: nd::Dimension>(name: &str, arr: nd::ArrayD<A>) -> Result<nd::Array<A, D>> {
    let shape = arr.shape().to_vec();
    arr.into_dimensionality::<D>().map_err(|_| {
        Error::schema(format!(
            "field `{name}` has shape {shape:?}, expected {} dimensions",
            D::NDIM.map_or_else(|| "any".to_string(), |n| n.to_string())
        ))
    })
}

#[allow(clippy::cast_possible_truncation)]
pub fn read_f32<R: Read + Seek, D: nd::Dimension>(npz: &mut NpzReader<R>, name: &str) -> Result<nd::Array<f32, D>> {
    if let Some(arr) = read_dyn::<_, f32>(npz, name)? {
        return with_rank(name, arr);
    }
    let arr: nd::ArrayD<f64> = npz.by_name(name)?;
    with_rank(name, arr.mapv(|x| x as f32))
}

/// Negative entries (e.g. the root of a kinematic tree stored as -1) become
/// `u32::MAX`
pub fn read_u32<R: Read + Seek, D: nd::Dimension>(npz: &mut NpzReader<R>, name: &str) -> Result<nd::Array<u32, D>> {
    if let Some(arr) = read_dyn::<_, u32>(npz, name)? {
        return with_rank(name, arr);
    }
    if let Some(arr) = read_dyn::<_, i32>(npz, name)? {
        return with_rank(name, arr.mapv(|x| u32::try_from(x).unwrap_or(u32::MAX)));
    }
    if let Some(arr) = read_dyn::<_, u64>(npz, name)? {
        return with_rank(name, arr.mapv(|x| u32::try_from(x).unwrap_or(u32::MAX)));
    }
    let arr: nd::ArrayD<i64> = npz.by_name(name)?;
    with_rank(name, arr.mapv(|x| u32::try_from(x).unwrap_or(u32::MAX)))
}

pub fn read_u8<R: Read + Seek, D: nd::Dimension>(npz: &mut NpzReader<R>, name: &str) -> Result<nd::Array<u8, D>> {
    let arr: nd::ArrayD<u8> = npz.by_name(name)?;
    with_rank(name, arr)
}
