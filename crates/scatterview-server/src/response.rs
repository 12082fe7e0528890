use ndarray::Array2;
use serde::{Serialize, Serializer};

use scatterview_core::fetch::ScanPair;
use scatterview_core::scan::Mask;
use scatterview_core::source::ScanList;
use scatterview_core::stats::AccumulatedStatistics;

/// Images, names and statistics for the viewer.
#[derive(Debug, Serialize)]
pub struct ScanPairData {
    #[serde(serialize_with = "nested_rows")]
    pub scatter_image_array_1_full_res: Array2<f64>,
    #[serde(serialize_with = "nested_rows")]
    pub scatter_image_array_2_full_res: Array2<f64>,
    pub left_image_name: String,
    pub right_image_name: String,
    pub num_of_files: usize,
    pub all_files_uris: Vec<String>,
    pub accumulated_data: AccumulatedStatistics,
}

impl ScanPairData {
    pub fn new(pair: ScanPair, scans: &ScanList) -> Self {
        Self {
            left_image_name: pair.left.name,
            right_image_name: pair.right.name,
            scatter_image_array_1_full_res: pair.left.data,
            scatter_image_array_2_full_res: pair.right.data,
            num_of_files: scans.len(),
            all_files_uris: scans.as_slice().to_vec(),
            accumulated_data: pair.statistics,
        }
    }
}

/// Source and mode details echoed back alongside the data.
#[derive(Debug, Serialize)]
pub struct Diagnostics {
    #[serde(serialize_with = "nested_rows")]
    pub mask_detector: Array2<f64>,
    pub tiled_uri: String,
    pub data_local_path: String,
    #[serde(rename = "DEV_MODE")]
    pub dev_mode: bool,
}

impl Diagnostics {
    pub fn new(mask: &Mask, tiled_uri: &str, data_local_path: &str, dev_mode: bool) -> Self {
        Self {
            mask_detector: mask.values().clone(),
            tiled_uri: tiled_uri.to_string(),
            data_local_path: data_local_path.to_string(),
            dev_mode,
        }
    }
}

/// Body of `GET /initial-scans-fetching`: both contracts in one flat object.
#[derive(Debug, Serialize)]
pub struct ScanPairResponse {
    #[serde(flatten)]
    pub data: ScanPairData,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
}

/// Serialize a 2-D array as a list of rows. Non-finite values become `null`.
fn nested_rows<S: Serializer>(array: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(array.outer_iter().map(|row| row.to_vec()))
}
