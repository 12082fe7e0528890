use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use ndarray::Array2;
use serde_json::Value;

use scatterview_core::config::{SourceSettings, StoreEnv};
use scatterview_core::error::{Result, ScanviewError};
use scatterview_core::scan::MaskPolarity;
use scatterview_core::source::{ArrayStore, RemoteStoreSource, ScanSource};
use scatterview_server::state::{SourceFactory, StaticEnv};

pub const IMAGES_URI: &str = "http://tiled:8000/api/v1/metadata/raw";
pub const MASK_URI: &str = "http://tiled:8000/api/v1/metadata/masks/mask.h5";

/// Environment with every store setting present.
pub fn full_env() -> StaticEnv {
    StaticEnv(StoreEnv {
        images_uri: Some(IMAGES_URI.into()),
        mask_uri: Some(MASK_URI.into()),
        images_api_key: Some("images-key".into()),
        mask_api_key: Some("mask-key".into()),
    })
}

pub fn ramp(rows: usize, cols: usize, offset: f64) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| offset + (r * cols + c) as f64)
}

/// Remote store double shared by every source the factory opens.
pub struct StoreData {
    pub listing: Mutex<Vec<String>>,
    pub arrays: HashMap<String, Array2<f64>>,
    pub mask: Array2<f64>,
}

/// Factory that builds remote sources over [`StoreData`] and counts opens.
#[derive(Clone)]
pub struct FakeFactory {
    pub data: Arc<StoreData>,
    pub opens: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn new(listing: &[&str], arrays: Vec<(&str, Array2<f64>)>, mask: Array2<f64>) -> Self {
        Self {
            data: Arc::new(StoreData {
                listing: Mutex::new(listing.iter().map(|s| s.to_string()).collect()),
                arrays: arrays
                    .into_iter()
                    .map(|(k, a)| (k.to_string(), a))
                    .collect(),
                mask,
            }),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_listing(&self, listing: &[&str]) {
        *self.data.listing.lock().unwrap() = listing.iter().map(|s| s.to_string()).collect();
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SourceFactory for FakeFactory {
    fn open(&self, settings: &SourceSettings) -> Result<Box<dyn ScanSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let remote = match settings {
            SourceSettings::Remote(remote) => remote,
            SourceSettings::Local(_) => panic!("fake factory only serves remote sources"),
        };
        let images = FakeNode {
            uri: remote.images_uri.clone(),
            data: self.data.clone(),
            is_mask: false,
        };
        let mask = FakeNode {
            uri: remote.mask_uri.clone(),
            data: self.data.clone(),
            is_mask: true,
        };
        Ok(Box::new(RemoteStoreSource::new(
            Box::new(images),
            Box::new(mask),
            remote.mask_file_name(),
            MaskPolarity::NonzeroValid,
        )))
    }
}

struct FakeNode {
    uri: String,
    data: Arc<StoreData>,
    is_mask: bool,
}

impl ArrayStore for FakeNode {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_scan_options(&self) -> Result<Vec<String>> {
        Ok(self.data.listing.lock().unwrap().clone())
    }

    fn read(&self) -> Result<Array2<f64>> {
        if self.is_mask {
            return Ok(self.data.mask.clone());
        }
        Err(ScanviewError::Remote {
            url: self.uri.clone(),
            message: "container has no array".into(),
        })
    }

    fn read_child(&self, key: &str) -> Result<Array2<f64>> {
        let url = format!("{}/{}", self.uri, key);
        if key.starts_with("slow") {
            return Err(ScanviewError::Timeout { url });
        }
        self.data
            .arrays
            .get(key)
            .cloned()
            .ok_or(ScanviewError::Remote {
                url,
                message: "HTTP 404 Not Found".into(),
            })
    }
}

/// Single-image EDF file of unsigned 16-bit samples.
pub fn write_edf(dir: &Path, name: &str, data: &Array2<f64>) {
    let (rows, cols) = data.dim();
    let mut header = format!(
        "{{\nByteOrder = LowByteFirst ;\nDataType = UnsignedShort ;\nDim_1 = {cols} ;\n\
         Dim_2 = {rows} ;\nSize = {} ;\n",
        rows * cols * 2
    );
    while header.len() < 510 {
        header.push(' ');
    }
    header.push_str("}\n");
    let mut buf = header.into_bytes();
    for v in data.iter() {
        buf.extend_from_slice(&(*v as u16).to_le_bytes());
    }
    std::fs::write(dir.join(name), buf).unwrap();
}

/// Row-major little-endian f64 `.npy` file.
pub fn write_npy(dir: &Path, name: &str, data: &Array2<f64>) {
    let (rows, cols) = data.dim();
    let mut dict =
        format!("{{'descr': '<f8', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    while (10 + dict.len() + 1) % 64 != 0 {
        dict.push(' ');
    }
    dict.push('\n');
    let mut buf = b"\x93NUMPY\x01\x00".to_vec();
    buf.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    buf.extend_from_slice(dict.as_bytes());
    for v in data.iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(dir.join(name), buf).unwrap();
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Nested JSON rows of a 2-D array.
pub fn rows(array: &Array2<f64>) -> Value {
    Value::from(
        array
            .outer_iter()
            .map(|row| row.to_vec())
            .collect::<Vec<_>>(),
    )
}
