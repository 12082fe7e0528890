pub mod edf;
pub mod image_io;
pub mod npy;

use std::fs::File;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use memmap2::Mmap;
use ndarray::{Array2, ShapeError};
use num_traits::AsPrimitive;

use crate::error::{Result, ScanviewError};

/// Element type of a raw detector sample on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl SampleType {
    pub fn byte_size(self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

/// Byte length of a `shape` image of `sample`, or `None` on overflow.
pub fn payload_len(shape: (usize, usize), sample: SampleType) -> Option<usize> {
    shape.0.checked_mul(shape.1)?.checked_mul(sample.byte_size())
}

/// Decode `height * width` samples, row-major, into an f64 array.
///
/// `raw` must hold at least `height * width * sample.byte_size()` bytes;
/// trailing bytes are ignored.
pub fn decode_samples(
    raw: &[u8],
    sample: SampleType,
    little_endian: bool,
    shape: (usize, usize),
) -> std::result::Result<Array2<f64>, ShapeError> {
    let used = &raw[..payload_len(shape, sample).map_or(raw.len(), |n| n.min(raw.len()))];
    let values = if little_endian {
        decode_with::<LittleEndian>(used, sample)
    } else {
        decode_with::<BigEndian>(used, sample)
    };
    Array2::from_shape_vec(shape, values)
}

fn decode_with<B: ByteOrder>(raw: &[u8], sample: SampleType) -> Vec<f64> {
    match sample {
        SampleType::Bool => raw.iter().map(|&b| if b != 0 { 1.0 } else { 0.0 }).collect(),
        SampleType::U8 => widen(raw, 1, |c| c[0]),
        SampleType::I8 => widen(raw, 1, |c| c[0] as i8),
        SampleType::U16 => widen(raw, 2, B::read_u16),
        SampleType::I16 => widen(raw, 2, B::read_i16),
        SampleType::U32 => widen(raw, 4, B::read_u32),
        SampleType::I32 => widen(raw, 4, B::read_i32),
        SampleType::U64 => widen(raw, 8, B::read_u64),
        SampleType::I64 => widen(raw, 8, B::read_i64),
        SampleType::F32 => widen(raw, 4, B::read_f32),
        SampleType::F64 => widen(raw, 8, B::read_f64),
    }
}

fn widen<T: AsPrimitive<f64>>(raw: &[u8], size: usize, read: impl Fn(&[u8]) -> T) -> Vec<f64> {
    raw.chunks_exact(size).map(|c| read(c).as_()).collect()
}

/// Memory-map a scan file for zero-copy decoding.
pub(crate) fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and dropped before the function that
    // decodes it returns.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Load a 2-D array from a local scan file, choosing the decoder from the
/// file extension.
pub fn load_array(path: &Path) -> Result<Array2<f64>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("edf") => edf::read_edf(path),
        Some("npy") => npy::read_npy(path),
        Some("tif" | "tiff" | "png") => image_io::load_image(path),
        _ => Err(ScanviewError::UnsupportedFormat(path.display().to_string())),
    }
}
