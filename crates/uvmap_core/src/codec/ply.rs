use crate::error::{Error, Result};
use ndarray as nd;
use ply_rs::{
    ply::{Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType, ScalarType},
    writer::Writer,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

const POSITION_PROPS: [&str; 3] = ["x", "y", "z"];
const COLOR_PROPS: [&str; 3] = ["red", "green", "blue"];

/// Colors with every channel at or below this are treated as normalized
const NORMALIZED_COLOR_MAX: f32 = 1.000_001;

/// Converts colors to bytes. Normalized colors (max channel <= 1) are scaled
/// by 255 and rounded, anything else is taken as already being 0..255.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn colors_to_u8(rgbs: &nd::Array2<f32>) -> nd::Array2<u8> {
    let max = rgbs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max < NORMALIZED_COLOR_MAX {
        rgbs.mapv(|c| (c * 255.0).round() as u8)
    } else {
        rgbs.mapv(|c| c as u8)
    }
}

/// Writes a colored point cloud as ASCII PLY with `x y z r g b` per vertex.
pub fn write_ply(path: &Path, coords: &nd::Array2<f32>, rgbs: &nd::Array2<f32>) -> Result<()> {
    if coords.ncols() != 3 || rgbs.ncols() != 3 || coords.nrows() != rgbs.nrows() {
        return Err(Error::schema(format!(
            "ply export expects matching (N, 3) coords and colors, got {:?} and {:?}",
            coords.dim(),
            rgbs.dim()
        )));
    }
    let colors = colors_to_u8(rgbs);

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    let mut vertex_def = ElementDef::new("vertex".to_string());
    for name in POSITION_PROPS {
        vertex_def.properties.add(PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::Float)));
    }
    for name in COLOR_PROPS {
        vertex_def.properties.add(PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::UChar)));
    }
    vertex_def.count = coords.nrows();
    ply.header.elements.add(vertex_def);

    let vertices: Vec<DefaultElement> = coords
        .rows()
        .into_iter()
        .zip(colors.rows())
        .map(|(p, c)| {
            let mut element = DefaultElement::new();
            for (name, &v) in POSITION_PROPS.iter().zip(p.iter()) {
                element.insert((*name).to_string(), Property::Float(v));
            }
            for (name, &v) in COLOR_PROPS.iter().zip(c.iter()) {
                element.insert((*name).to_string(), Property::UChar(v));
            }
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let mut writer = BufWriter::new(File::create(path)?);
    Writer::new().write_ply(&mut writer, &mut ply)?;
    writer.flush()?;
    Ok(())
}
