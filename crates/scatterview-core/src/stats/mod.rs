pub mod accumulator;

use ndarray::{Array2, Zip};
use serde::Serialize;

use crate::consts::DEFAULT_STATS_BATCH_SIZE;
use crate::error::Result;
use crate::scan::Mask;
use crate::source::ScanList;

pub use accumulator::{accumulate, Accumulation};

/// Masked intensity summary of one scan.
///
/// `max` and `mean` are `None` when the mask selects no non-NaN pixel.
/// `mean` is also `None` when the selection holds both infinities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanStats {
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Number of pixels that contributed.
    pub count: usize,
}

/// Max and mean over the pixels selected by `mask`.
///
/// NaN pixels are skipped. The sum is Neumaier-compensated while it stays
/// finite; an infinite pixel makes the mean that infinity.
pub fn masked_stats(image: &Array2<f64>, mask: &Mask) -> Result<ScanStats> {
    mask.check_shape(image.dim())?;

    let mut count = 0usize;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut compensation = 0.0f64;

    Zip::from(image).and(mask.selected()).for_each(|&v, &keep| {
        if !keep || v.is_nan() {
            return;
        }
        count += 1;
        if v > max {
            max = v;
        }
        let t = sum + v;
        if !t.is_finite() {
            sum = t;
            return;
        }
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    });

    if count == 0 {
        return Ok(ScanStats {
            max: None,
            mean: None,
            count,
        });
    }
    let total = if sum.is_finite() { sum + compensation } else { sum };
    let mean = total / count as f64;
    Ok(ScanStats {
        max: Some(max),
        mean: (!mean.is_nan()).then_some(mean),
        count,
    })
}

/// Tuning for the statistics pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccumulateOptions {
    /// Scans loaded and reduced per parallel batch.
    pub batch_size: usize,
}

impl Default for AccumulateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_STATS_BATCH_SIZE,
        }
    }
}

/// Per-scan statistics aligned with scan order.
///
/// All sequences always have the same length and only grow.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AccumulatedStatistics {
    max_intensities: Vec<Option<f64>>,
    avg_intensities: Vec<Option<f64>>,
    image_names: Vec<String>,
    /// Error message for scans that could not be loaded.
    gaps: Vec<Option<String>>,
    num_processed: usize,
}

impl AccumulatedStatistics {
    pub fn push(&mut self, name: impl Into<String>, stats: ScanStats) {
        self.max_intensities.push(stats.max);
        self.avg_intensities.push(stats.mean);
        self.image_names.push(name.into());
        self.gaps.push(None);
        self.num_processed += 1;
    }

    /// Record a scan whose statistics could not be computed.
    pub fn push_gap(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.max_intensities.push(None);
        self.avg_intensities.push(None);
        self.image_names.push(name.into());
        self.gaps.push(Some(reason.into()));
        self.num_processed += 1;
    }

    pub fn len(&self) -> usize {
        self.num_processed
    }

    pub fn is_empty(&self) -> bool {
        self.num_processed == 0
    }

    pub fn max_intensities(&self) -> &[Option<f64>] {
        &self.max_intensities
    }

    pub fn avg_intensities(&self) -> &[Option<f64>] {
        &self.avg_intensities
    }

    pub fn image_names(&self) -> &[String] {
        &self.image_names
    }

    pub fn gaps(&self) -> &[Option<String>] {
        &self.gaps
    }

    pub fn gap_count(&self) -> usize {
        self.gaps.iter().filter(|g| g.is_some()).count()
    }

    /// Whether these statistics cover a prefix of `scans`, in order.
    pub fn is_prefix_of(&self, scans: &ScanList) -> bool {
        self.image_names.len() <= scans.len()
            && self
                .image_names
                .iter()
                .zip(scans.iter())
                .all(|(name, id)| name == id)
    }
}
