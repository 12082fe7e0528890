use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;

use scatterview_core::consts::EDF_BLOCK_SIZE;
use scatterview_core::error::{Result, ScanviewError};
use scatterview_core::scan::{Mask, MaskPolarity, ScanImage};
use scatterview_core::source::{ArrayStore, ScanList, ScanSource, SourceKind};

/// Build a single-image EDF file of unsigned 16-bit samples.
///
/// The header is padded to exactly one 512-byte block, `}` and newline last.
pub fn build_edf_u16(rows: usize, cols: usize, data: &[u16]) -> Vec<u8> {
    build_edf(rows, cols, "UnsignedShort", "LowByteFirst", |buf| {
        for v in data {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    })
}

/// Build a single-image EDF file with an arbitrary header and payload writer.
pub fn build_edf(
    rows: usize,
    cols: usize,
    data_type: &str,
    byte_order: &str,
    payload: impl FnOnce(&mut Vec<u8>),
) -> Vec<u8> {
    let mut body = Vec::new();
    payload(&mut body);

    let mut header = format!(
        "{{\nHeaderID = EH:000001:000000:000000 ;\nImage = 1 ;\nByteOrder = {byte_order} ;\n\
         DataType = {data_type} ;\nDim_1 = {cols} ;\nDim_2 = {rows} ;\nSize = {} ;\n",
        body.len()
    );
    while header.len() < EDF_BLOCK_SIZE - 2 {
        header.push(' ');
    }
    header.push_str("}\n");
    assert_eq!(header.len(), EDF_BLOCK_SIZE);

    let mut buf = header.into_bytes();
    buf.extend_from_slice(&body);
    buf
}

/// Blank out the `Size` entry of an EDF header, keeping its block length.
pub fn strip_edf_size(mut buf: Vec<u8>) -> Vec<u8> {
    let at = buf
        .windows(4)
        .position(|w| w == b"Size")
        .expect("header has a Size entry");
    let end = at + buf[at..].iter().position(|&b| b == b';').unwrap() + 1;
    buf[at..end].fill(b' ');
    buf
}

/// Build a version 1.0 `.npy` file. `shape` is the Python tuple body, e.g. "2, 3".
pub fn build_npy(descr: &str, shape: &str, fortran_order: bool, payload: &[u8]) -> Vec<u8> {
    let order = if fortran_order { "True" } else { "False" };
    let mut dict = format!("{{'descr': '{descr}', 'fortran_order': {order}, 'shape': ({shape}), }}");
    // Magic (6) + version (2) + length (2) + dict, padded to 64 bytes.
    while (10 + dict.len() + 1) % 64 != 0 {
        dict.push(' ');
    }
    dict.push('\n');

    let mut buf = Vec::new();
    buf.extend_from_slice(b"\x93NUMPY");
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    buf.extend_from_slice(dict.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Row-major little-endian f64 `.npy` of `array`.
pub fn build_npy_f64(array: &Array2<f64>) -> Vec<u8> {
    let (rows, cols) = array.dim();
    let mut payload = Vec::with_capacity(rows * cols * 8);
    for v in array.iter() {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    build_npy("<f8", &format!("{rows}, {cols}"), false, &payload)
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(name), bytes).unwrap();
}

/// Deterministic test image: `offset + row * cols + col`.
pub fn ramp(rows: usize, cols: usize, offset: f64) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| offset + (r * cols + c) as f64)
}

/// Mask selecting every pixel of a `rows x cols` detector.
pub fn full_mask(rows: usize, cols: usize) -> Mask {
    Mask::from_values(Array2::ones((rows, cols)), MaskPolarity::NonzeroValid)
}

/// In-memory scan source with failure injection and a load counter.
pub struct MemorySource {
    ids: Vec<String>,
    arrays: HashMap<String, Array2<f64>>,
    mask: Array2<f64>,
    failing: HashSet<String>,
    loads: AtomicUsize,
}

impl MemorySource {
    pub fn new(scans: Vec<(&str, Array2<f64>)>, mask: Array2<f64>) -> Self {
        Self {
            ids: scans.iter().map(|(id, _)| id.to_string()).collect(),
            arrays: scans
                .into_iter()
                .map(|(id, a)| (id.to_string(), a))
                .collect(),
            mask,
            failing: HashSet::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Make every load of `id` fail with an I/O error.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ScanSource for MemorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn list(&self) -> Result<ScanList> {
        Ok(ScanList::new(self.ids.clone()))
    }

    fn load(&self, id: &str) -> Result<ScanImage> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(id) {
            return Err(ScanviewError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{id} vanished"),
            )));
        }
        self.arrays
            .get(id)
            .cloned()
            .map(|data| ScanImage::new(id, data))
            .ok_or_else(|| ScanviewError::UnsupportedFormat(id.to_string()))
    }

    fn load_mask(&self) -> Result<Mask> {
        Ok(Mask::from_values(self.mask.clone(), MaskPolarity::NonzeroValid))
    }
}

/// In-memory array store node.
pub struct FakeStore {
    pub uri: String,
    pub children: Vec<String>,
    pub arrays: HashMap<String, Array2<f64>>,
    pub node: Option<Array2<f64>>,
}

impl FakeStore {
    pub fn container(uri: &str, children: Vec<(&str, Array2<f64>)>) -> Self {
        Self {
            uri: uri.to_string(),
            children: children.iter().map(|(k, _)| k.to_string()).collect(),
            arrays: children
                .into_iter()
                .map(|(k, a)| (k.trim_start_matches('/').to_string(), a))
                .collect(),
            node: None,
        }
    }

    pub fn array(uri: &str, node: Array2<f64>) -> Self {
        Self {
            uri: uri.to_string(),
            children: Vec::new(),
            arrays: HashMap::new(),
            node: Some(node),
        }
    }
}

impl ArrayStore for FakeStore {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_scan_options(&self) -> Result<Vec<String>> {
        Ok(self.children.clone())
    }

    fn read(&self) -> Result<Array2<f64>> {
        self.node.clone().ok_or_else(|| ScanviewError::Remote {
            url: self.uri.clone(),
            message: "node is a container".into(),
        })
    }

    fn read_child(&self, key: &str) -> Result<Array2<f64>> {
        self.arrays
            .get(key)
            .cloned()
            .ok_or_else(|| ScanviewError::Remote {
                url: format!("{}/{}", self.uri, key),
                message: "404 Not Found".into(),
            })
    }
}
