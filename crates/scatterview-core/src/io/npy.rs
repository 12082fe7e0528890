use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use ndarray::Array2;

use crate::consts::NPY_MAGIC;
use crate::error::{Result, ScanviewError};

use super::{decode_samples, map_file, payload_len, SampleType};

/// Parsed `.npy` header.
#[derive(Clone, Debug, PartialEq)]
pub struct NpyHeader {
    pub sample_type: SampleType,
    pub little_endian: bool,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
    /// Byte offset of the first sample.
    pub data_offset: usize,
}

/// Read a 2-D `.npy` array. A leading axis of length 1 is squeezed away.
pub fn read_npy(path: &Path) -> Result<Array2<f64>> {
    let mmap = map_file(path)?;
    decode_npy(&mmap)
}

pub fn decode_npy(buf: &[u8]) -> Result<Array2<f64>> {
    let header = parse_header(buf)?;
    let (rows, cols) = match header.shape.as_slice() {
        [r, c] => (*r, *c),
        [1, r, c] => (*r, *c),
        other => {
            return Err(ScanviewError::InvalidNpy(format!(
                "Expected a 2-D array, got shape {:?}",
                other
            )))
        }
    };

    let end = payload_len((rows, cols), header.sample_type)
        .and_then(|n| header.data_offset.checked_add(n))
        .ok_or_else(|| {
            ScanviewError::InvalidNpy(format!("Shape {:?} overflows", header.shape))
        })?;
    if buf.len() < end {
        return Err(ScanviewError::InvalidNpy(format!(
            "File truncated: expected at least {} bytes, got {}",
            end,
            buf.len()
        )));
    }
    let raw = &buf[header.data_offset..end];

    if header.fortran_order {
        // Column-major on disk: decode transposed, then restore row-major layout.
        let transposed =
            decode_samples(raw, header.sample_type, header.little_endian, (cols, rows))
                .map_err(|e| ScanviewError::InvalidNpy(e.to_string()))?;
        Ok(transposed.reversed_axes().as_standard_layout().into_owned())
    } else {
        decode_samples(raw, header.sample_type, header.little_endian, (rows, cols))
            .map_err(|e| ScanviewError::InvalidNpy(e.to_string()))
    }
}

pub fn parse_header(buf: &[u8]) -> Result<NpyHeader> {
    if buf.len() < 10 || &buf[..6] != NPY_MAGIC {
        return Err(ScanviewError::InvalidNpy("Missing \\x93NUMPY magic".into()));
    }
    let major = buf[6];
    let mut cursor = std::io::Cursor::new(&buf[8..]);
    let (header_len, prefix) = match major {
        1 => (cursor.read_u16::<LittleEndian>()? as usize, 10),
        2 | 3 => (cursor.read_u32::<LittleEndian>()? as usize, 12),
        v => {
            return Err(ScanviewError::InvalidNpy(format!(
                "Unsupported format version {v}"
            )))
        }
    };
    let data_offset = prefix + header_len;
    if buf.len() < data_offset {
        return Err(ScanviewError::InvalidNpy("Header truncated".into()));
    }
    let dict = String::from_utf8_lossy(&buf[prefix..data_offset]);

    let descr = dict_value(&dict, "descr")
        .and_then(|v| v.trim().strip_prefix('\'')?.split('\'').next())
        .ok_or_else(|| ScanviewError::InvalidNpy("Missing 'descr'".into()))?;
    let (sample_type, little_endian) = parse_descr(descr)?;

    let fortran_order = dict_value(&dict, "fortran_order")
        .map(|v| v.trim_start().starts_with("True"))
        .unwrap_or(false);

    let shape_src = dict_value(&dict, "shape")
        .and_then(|v| {
            let v = v.trim_start().strip_prefix('(')?;
            v.split(')').next()
        })
        .ok_or_else(|| ScanviewError::InvalidNpy("Missing 'shape'".into()))?;
    let shape = shape_src
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| ScanviewError::InvalidNpy(format!("Bad shape entry '{s}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NpyHeader {
        sample_type,
        little_endian,
        fortran_order,
        shape,
        data_offset,
    })
}

/// Text following `'key':` in the header dict literal.
fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}'");
    let at = dict.find(&needle)? + needle.len();
    let rest = dict[at..].trim_start().strip_prefix(':')?;
    Some(rest)
}

fn parse_descr(descr: &str) -> Result<(SampleType, bool)> {
    let mut chars = descr.chars();
    let (order, kind) = match chars.next() {
        Some(c @ ('<' | '>' | '|' | '=')) => (c, chars.next()),
        other => ('|', other),
    };
    let size: usize = chars
        .as_str()
        .parse()
        .map_err(|_| ScanviewError::InvalidNpy(format!("Bad descr '{descr}'")))?;

    let sample_type = match (kind, size) {
        (Some('b'), 1) => SampleType::Bool,
        (Some('u'), 1) => SampleType::U8,
        (Some('i'), 1) => SampleType::I8,
        (Some('u'), 2) => SampleType::U16,
        (Some('i'), 2) => SampleType::I16,
        (Some('u'), 4) => SampleType::U32,
        (Some('i'), 4) => SampleType::I32,
        (Some('u'), 8) => SampleType::U64,
        (Some('i'), 8) => SampleType::I64,
        (Some('f'), 4) => SampleType::F32,
        (Some('f'), 8) => SampleType::F64,
        _ => {
            return Err(ScanviewError::InvalidNpy(format!(
                "Unsupported dtype '{descr}'"
            )))
        }
    };
    Ok((sample_type, order != '>'))
}
