use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Result, ScanviewError};
use crate::scan::{Mask, ScanImage};
use crate::source::{ScanList, ScanSource};
use crate::stats::{accumulate, AccumulateOptions, AccumulatedStatistics};

/// Two scans selected for side-by-side display plus the statistics of the
/// whole set.
#[derive(Clone, Debug)]
pub struct ScanPair {
    pub left: ScanImage,
    pub right: ScanImage,
    pub statistics: AccumulatedStatistics,
}

/// Load the scans at `left` and `right` and run the statistics pass over
/// every scan of the listing.
///
/// Both indices are checked before any scan is loaded. Equal indices yield
/// two independent copies of the same image.
#[allow(clippy::too_many_arguments)]
pub fn fetch_pair(
    scans: &ScanList,
    left: usize,
    right: usize,
    mask: &Mask,
    source: &dyn ScanSource,
    partial: AccumulatedStatistics,
    options: &AccumulateOptions,
    cancel: &CancellationToken,
) -> Result<ScanPair> {
    let left_name = scans.get(left)?;
    let right_name = scans.get(right)?;
    info!(left, right, left_name, right_name, "Fetching scan pair");

    let accumulation = accumulate(
        scans,
        mask,
        source,
        partial,
        &[left, right],
        options,
        cancel,
        None,
    )?;

    let mut selected = accumulation.selected.into_iter();
    match (selected.next(), selected.next()) {
        (Some(left), Some(right)) => Ok(ScanPair {
            left,
            right,
            statistics: accumulation.statistics,
        }),
        _ => Err(ScanviewError::IndexOutOfRange {
            index: right,
            total: scans.len(),
        }),
    }
}
