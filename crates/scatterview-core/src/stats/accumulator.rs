use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::consts::PARALLEL_SCAN_THRESHOLD;
use crate::error::{Result, ScanviewError};
use crate::scan::{Mask, ScanImage};
use crate::source::{ScanList, ScanSource};

use super::{masked_stats, AccumulateOptions, AccumulatedStatistics, ScanStats};

/// Result of one statistics pass.
#[derive(Clone, Debug)]
pub struct Accumulation {
    pub statistics: AccumulatedStatistics,
    /// Full-resolution, unmasked images for the requested indices, in the
    /// order they were requested.
    pub selected: Vec<ScanImage>,
}

/// Loaded image with its (possibly failed) reduction.
type Reduced = (Result<ScanStats>, Option<ScanImage>);

/// Fold every scan not yet covered by `partial` into the statistics, and
/// retain the images at `selected`.
///
/// Scans are loaded and reduced in parallel batches of
/// `options.batch_size`; results are appended in scan order, so the output is
/// identical to a sequential pass. `partial` must cover a prefix of `scans`,
/// otherwise it is discarded and rebuilt.
///
/// A scan that fails to load is recorded as a gap unless it is one of the
/// `selected` scans, in which case the whole pass fails. Cancellation is
/// checked between batches.
#[allow(clippy::too_many_arguments)]
pub fn accumulate(
    scans: &ScanList,
    mask: &Mask,
    source: &dyn ScanSource,
    partial: AccumulatedStatistics,
    selected: &[usize],
    options: &AccumulateOptions,
    cancel: &CancellationToken,
    on_progress: Option<&dyn Fn(usize)>,
) -> Result<Accumulation> {
    let total = scans.len();
    for &index in selected {
        scans.get(index)?;
    }
    if cancel.is_cancelled() {
        return Err(ScanviewError::Cancelled);
    }

    let mut statistics = if partial.is_prefix_of(scans) {
        partial
    } else {
        warn!(
            cached = partial.len(),
            scans = total,
            "Discarding statistics that do not match the scan listing"
        );
        AccumulatedStatistics::default()
    };
    let start = statistics.len();

    let mut retained: Vec<Option<ScanImage>> = vec![None; selected.len()];
    for (slot, &index) in selected.iter().enumerate() {
        if index < start {
            retained[slot] = Some(source.load(scans.get(index)?)?);
        }
    }

    let ids = scans.as_slice();
    let reduce = |index: usize| -> (usize, Result<Reduced>) {
        let keep = selected.contains(&index);
        let outcome = source.load(&ids[index]).map(|image| {
            let stats = masked_stats(&image.data, mask);
            (stats, keep.then_some(image))
        });
        (index, outcome)
    };

    let batch_size = options.batch_size.max(1);
    for batch_start in (start..total).step_by(batch_size) {
        if cancel.is_cancelled() {
            info!(done = statistics.len(), total, "Statistics pass cancelled");
            return Err(ScanviewError::Cancelled);
        }
        let batch_end = (batch_start + batch_size).min(total);

        let outcomes: Vec<(usize, Result<Reduced>)> =
            if batch_end - batch_start >= PARALLEL_SCAN_THRESHOLD {
                (batch_start..batch_end).into_par_iter().map(&reduce).collect()
            } else {
                (batch_start..batch_end).map(&reduce).collect()
            };

        for (index, outcome) in outcomes {
            let name = ids[index].as_str();
            match outcome {
                Ok((stats, image)) => {
                    if let Some(image) = image {
                        retain(&mut retained, selected, index, image);
                    }
                    match stats {
                        Ok(stats) => {
                            if stats.count == 0 {
                                warn!(scan = name, "Mask selects no pixels; statistics undefined");
                            }
                            statistics.push(name, stats);
                        }
                        Err(e) => {
                            warn!(scan = name, error = %e, "Scan statistics failed; recording gap");
                            statistics.push_gap(name, e.to_string());
                        }
                    }
                }
                Err(e) => {
                    if matches!(e, ScanviewError::Cancelled) || selected.contains(&index) {
                        return Err(e);
                    }
                    warn!(scan = name, error = %e, "Scan failed to load; recording gap");
                    statistics.push_gap(name, e.to_string());
                }
            }
        }

        debug!(done = statistics.len(), total, "Statistics batch complete");
        if let Some(progress) = on_progress {
            progress(statistics.len());
        }
    }

    info!(
        scans = statistics.len(),
        reused = start,
        gaps = statistics.gap_count(),
        "Statistics pass complete"
    );

    let selected = retained
        .into_iter()
        .zip(selected)
        .map(|(image, &index)| image.ok_or(ScanviewError::IndexOutOfRange { index, total }))
        .collect::<Result<Vec<_>>>()?;

    Ok(Accumulation {
        statistics,
        selected,
    })
}

/// Store `image` in every slot that requested `index`; each slot gets its own copy.
fn retain(retained: &mut [Option<ScanImage>], selected: &[usize], index: usize, image: ScanImage) {
    let slots: Vec<usize> = selected
        .iter()
        .enumerate()
        .filter(|(_, &i)| i == index)
        .map(|(slot, _)| slot)
        .collect();
    if let Some((&last, rest)) = slots.split_last() {
        for &slot in rest {
            retained[slot] = Some(image.clone());
        }
        retained[last] = Some(image);
    }
}
