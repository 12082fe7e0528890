use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanviewError};

/// One detector scan at full resolution.
/// Pixel values are raw detector counts, shape = (height, width).
#[derive(Clone, Debug)]
pub struct ScanImage {
    /// Identifier of the scan within its source.
    pub name: String,
    pub data: Array2<f64>,
}

impl ScanImage {
    pub fn new(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// How non-zero mask values are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskPolarity {
    /// Non-zero selects the pixel (element-wise multiply semantics).
    #[default]
    NonzeroValid,
    /// Non-zero excludes the pixel (pyFAI convention).
    NonzeroMasked,
}

impl fmt::Display for MaskPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonzeroValid => write!(f, "non-zero valid"),
            Self::NonzeroMasked => write!(f, "non-zero masked"),
        }
    }
}

/// Detector mask shared read-only by every scan of a source.
///
/// Keeps the raw values for the response alongside the derived selection.
#[derive(Clone, Debug)]
pub struct Mask {
    values: Array2<f64>,
    selected: Array2<bool>,
    polarity: MaskPolarity,
}

impl Mask {
    pub fn from_values(values: Array2<f64>, polarity: MaskPolarity) -> Self {
        // NaN never selects a pixel, whatever the polarity.
        let selected = values.mapv(|v| match polarity {
            _ if v.is_nan() => false,
            MaskPolarity::NonzeroValid => v != 0.0,
            MaskPolarity::NonzeroMasked => v == 0.0,
        });
        Self {
            values,
            selected,
            polarity,
        }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn selected(&self) -> &Array2<bool> {
        &self.selected
    }

    pub fn polarity(&self) -> MaskPolarity {
        self.polarity
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    /// Fail unless the mask covers an image of the given shape pixel for pixel.
    pub fn check_shape(&self, image: (usize, usize)) -> Result<()> {
        if self.shape() != image {
            return Err(ScanviewError::ShapeMismatch {
                mask: self.shape(),
                image,
            });
        }
        Ok(())
    }
}
