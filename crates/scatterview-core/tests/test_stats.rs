#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;
use ndarray::{array, Array2};

use scatterview_core::error::ScanviewError;
use scatterview_core::scan::{Mask, MaskPolarity};
use scatterview_core::source::ScanList;
use scatterview_core::stats::{masked_stats, AccumulatedStatistics, ScanStats};

#[test]
fn test_masked_mean_is_sum_over_selected_count() {
    let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let mask = Mask::from_values(
        array![[1.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
        MaskPolarity::NonzeroValid,
    );
    let stats = masked_stats(&image, &mask).unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.max, Some(5.0));
    assert_relative_eq!(stats.mean.unwrap(), 3.0, epsilon = 1e-12);
}

#[test]
fn test_inverted_polarity_selects_zero_pixels() {
    let image = array![[1.0, 2.0], [3.0, 40.0]];
    let mask = Mask::from_values(array![[0.0, 0.0], [0.0, 1.0]], MaskPolarity::NonzeroMasked);
    let stats = masked_stats(&image, &mask).unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.max, Some(3.0));
    assert_relative_eq!(stats.mean.unwrap(), 2.0, epsilon = 1e-12);
}

#[test]
fn test_empty_selection_is_undefined_not_nan() {
    let image = common::ramp(2, 2, 1.0);
    let mask = Mask::from_values(Array2::zeros((2, 2)), MaskPolarity::NonzeroValid);
    let stats = masked_stats(&image, &mask).unwrap();
    assert_eq!(
        stats,
        ScanStats {
            max: None,
            mean: None,
            count: 0
        }
    );
}

#[test]
fn test_nan_pixels_are_skipped() {
    let image = array![[f64::NAN, 2.0], [4.0, f64::NAN]];
    let stats = masked_stats(&image, &common::full_mask(2, 2)).unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.max, Some(4.0));
    assert_relative_eq!(stats.mean.unwrap(), 3.0, epsilon = 1e-12);
}

#[test]
fn test_nan_mask_value_is_never_selected() {
    let mask = Mask::from_values(array![[f64::NAN, 1.0]], MaskPolarity::NonzeroValid);
    assert_eq!(mask.selected_count(), 1);
    assert!(!mask.selected()[[0, 0]]);

    let mask = Mask::from_values(array![[f64::NAN, 0.0, 1.0]], MaskPolarity::NonzeroMasked);
    assert_eq!(mask.selected_count(), 1);
    assert!(!mask.selected()[[0, 0]]);
    assert!(mask.selected()[[0, 1]]);
}

#[test]
fn test_nan_mask_pixel_excluded_under_inverted_polarity() {
    let image = array![[100.0, 2.0], [4.0, 9.0]];
    let mask = Mask::from_values(
        array![[f64::NAN, 0.0], [0.0, 1.0]],
        MaskPolarity::NonzeroMasked,
    );
    let stats = masked_stats(&image, &mask).unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.max, Some(4.0));
}

#[test]
fn test_infinite_pixel_gives_infinite_mean() {
    let image = array![[1.0, f64::INFINITY], [2.0, 3.0]];
    let stats = masked_stats(&image, &common::full_mask(2, 2)).unwrap();
    assert_eq!(stats.count, 4);
    assert_eq!(stats.max, Some(f64::INFINITY));
    assert_eq!(stats.mean, Some(f64::INFINITY));

    let image = array![[f64::NEG_INFINITY, 5.0]];
    let stats = masked_stats(&image, &common::full_mask(1, 2)).unwrap();
    assert_eq!(stats.max, Some(5.0));
    assert_eq!(stats.mean, Some(f64::NEG_INFINITY));
}

#[test]
fn test_opposite_infinities_have_no_mean() {
    let image = array![[f64::INFINITY, f64::NEG_INFINITY, 1.0]];
    let stats = masked_stats(&image, &common::full_mask(1, 3)).unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.max, Some(f64::INFINITY));
    assert_eq!(stats.mean, None);
}

#[test]
fn test_negative_counts_keep_true_maximum() {
    let image = array![[-5.0, -2.0], [-9.0, -3.0]];
    let stats = masked_stats(&image, &common::full_mask(2, 2)).unwrap();
    assert_eq!(stats.max, Some(-2.0));
    assert_relative_eq!(stats.mean.unwrap(), -4.75, epsilon = 1e-12);
}

#[test]
fn test_compensated_mean_of_mixed_magnitudes() {
    // Naive left-to-right summation loses the small terms entirely.
    let mut image = Array2::from_elem((1, 1002), 1.0);
    image[[0, 0]] = 1e16;
    image[[0, 1001]] = -1e16;
    let stats = masked_stats(&image, &common::full_mask(1, 1002)).unwrap();
    assert_relative_eq!(stats.mean.unwrap(), 1000.0 / 1002.0, epsilon = 1e-12);
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let image = common::ramp(2, 3, 0.0);
    let err = masked_stats(&image, &common::full_mask(3, 2)).unwrap_err();
    assert!(matches!(
        err,
        ScanviewError::ShapeMismatch {
            mask: (3, 2),
            image: (2, 3)
        }
    ));
}

#[test]
fn test_accumulated_sequences_stay_parallel() {
    let mut stats = AccumulatedStatistics::default();
    stats.push(
        "a.edf",
        ScanStats {
            max: Some(3.0),
            mean: Some(1.5),
            count: 2,
        },
    );
    stats.push_gap("b.edf", "missing");
    assert_eq!(stats.len(), 2);
    assert_eq!(stats.max_intensities(), &[Some(3.0), None]);
    assert_eq!(stats.avg_intensities(), &[Some(1.5), None]);
    assert_eq!(stats.image_names(), &["a.edf".to_string(), "b.edf".to_string()]);
    assert_eq!(stats.gaps(), &[None, Some("missing".to_string())]);
    assert_eq!(stats.gap_count(), 1);
}

#[test]
fn test_prefix_check_follows_names() {
    let mut stats = AccumulatedStatistics::default();
    stats.push_gap("a", "x");
    let scans = ScanList::new(vec!["a".to_string(), "b".to_string()]);
    assert!(stats.is_prefix_of(&scans));
    assert!(AccumulatedStatistics::default().is_prefix_of(&scans));

    let reordered = ScanList::new(vec!["b".to_string(), "a".to_string()]);
    assert!(!stats.is_prefix_of(&reordered));
    assert!(!stats.is_prefix_of(&ScanList::default()));
}

#[test]
fn test_serialized_field_names() {
    let mut stats = AccumulatedStatistics::default();
    stats.push(
        "a",
        ScanStats {
            max: None,
            mean: None,
            count: 0,
        },
    );
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["max_intensities"], serde_json::json!([null]));
    assert_eq!(json["avg_intensities"], serde_json::json!([null]));
    assert_eq!(json["image_names"], serde_json::json!(["a"]));
    assert_eq!(json["num_processed"], 1);
}
