use std::path::Path;

use image::DynamicImage;
use ndarray::Array2;

use crate::error::{Result, ScanviewError};

/// Load a raster detector image (TIFF/PNG).
///
/// 8- and 16-bit grayscale images keep their raw counts. Anything else is
/// reduced to luminance in [0, 1].
pub fn load_image(path: &Path) -> Result<Array2<f64>> {
    let img = image::open(path)?;
    let shape = (img.height() as usize, img.width() as usize);
    let values: Vec<f64> = match img {
        DynamicImage::ImageLuma8(gray) => gray.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLuma16(gray) => gray.into_raw().into_iter().map(f64::from).collect(),
        other => other
            .to_luma32f()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect(),
    };
    Array2::from_shape_vec(shape, values)
        .map_err(|e| ScanviewError::UnsupportedFormat(format!("{}: {e}", path.display())))
}
