use crate::error::Result;
use image::{imageops, ImageFormat, RgbImage};
use std::path::Path;

pub fn save_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Places ``right`` next to ``left``; the result is as tall as the taller one
pub fn concat_horizontal(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(left.width() + right.width(), left.height().max(right.height()));
    imageops::replace(&mut out, left, 0, 0);
    imageops::replace(&mut out, right, i64::from(left.width()), 0);
    out
}
