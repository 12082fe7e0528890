use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;

use crate::consts::EDF_BLOCK_SIZE;
use crate::error::{Result, ScanviewError};

use super::{decode_samples, map_file, payload_len, SampleType};

/// Parsed ESRF Data Format header.
#[derive(Clone, Debug)]
pub struct EdfHeader {
    /// Fastest-varying dimension (columns).
    pub dim_1: usize,
    /// Rows.
    pub dim_2: usize,
    pub sample_type: SampleType,
    pub little_endian: bool,
    /// Declared payload size in bytes, if present.
    pub size: Option<usize>,
    /// Byte offset of the first sample.
    pub data_offset: usize,
    /// Every `key = value ;` pair, keys as written.
    pub entries: HashMap<String, String>,
}

impl EdfHeader {
    /// `None` when the declared dimensions overflow the address space.
    pub fn payload_size(&self) -> Option<usize> {
        payload_len((self.dim_2, self.dim_1), self.sample_type)
    }
}

/// Read a single-image EDF file into an array of shape (Dim_2, Dim_1).
pub fn read_edf(path: &Path) -> Result<Array2<f64>> {
    let mmap = map_file(path)?;
    decode_edf(&mmap)
}

/// Decode an in-memory EDF image.
pub fn decode_edf(buf: &[u8]) -> Result<Array2<f64>> {
    let header = parse_header(buf)?;
    let end = header
        .payload_size()
        .and_then(|n| header.data_offset.checked_add(n))
        .ok_or_else(|| {
            ScanviewError::InvalidEdf(format!(
                "Image {}x{} does not fit in memory",
                header.dim_1, header.dim_2
            ))
        })?;
    if buf.len() < end {
        return Err(ScanviewError::InvalidEdf(format!(
            "File truncated: expected at least {} bytes, got {}",
            end,
            buf.len()
        )));
    }
    decode_samples(
        &buf[header.data_offset..end],
        header.sample_type,
        header.little_endian,
        (header.dim_2, header.dim_1),
    )
    .map_err(|e| ScanviewError::InvalidEdf(e.to_string()))
}

pub fn parse_header(buf: &[u8]) -> Result<EdfHeader> {
    let start = buf
        .iter()
        .take(EDF_BLOCK_SIZE)
        .position(|&b| b == b'{')
        .ok_or_else(|| ScanviewError::InvalidEdf("Missing opening '{'".into()))?;
    let close = buf[start..]
        .iter()
        .position(|&b| b == b'}')
        .map(|p| start + p)
        .ok_or_else(|| ScanviewError::InvalidEdf("Unterminated header".into()))?;

    let mut data_offset = close + 1;
    if buf.get(data_offset) == Some(&b'\n') {
        data_offset += 1;
    }

    let text = String::from_utf8_lossy(&buf[start + 1..close]);
    let entries: HashMap<String, String> = text
        .split(';')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect();

    let dim_1 = required_dim(&entries, "Dim_1")?;
    let dim_2 = required_dim(&entries, "Dim_2")?;

    let data_type = lookup(&entries, "DataType")
        .ok_or_else(|| ScanviewError::InvalidEdf("Missing DataType".into()))?;
    let sample_type = sample_type_for(data_type)?;

    let little_endian = match lookup(&entries, "ByteOrder") {
        Some("HighByteFirst") => false,
        Some("LowByteFirst") | None => true,
        Some(other) => {
            return Err(ScanviewError::InvalidEdf(format!(
                "Unknown ByteOrder '{other}'"
            )))
        }
    };

    let size = lookup(&entries, "Size").and_then(|s| s.parse::<usize>().ok());

    let header = EdfHeader {
        dim_1,
        dim_2,
        sample_type,
        little_endian,
        size,
        data_offset,
        entries,
    };

    let payload = header.payload_size().ok_or_else(|| {
        ScanviewError::InvalidEdf(format!("Dimensions {dim_1}x{dim_2} overflow"))
    })?;
    if let Some(size) = header.size {
        if size < payload {
            return Err(ScanviewError::InvalidEdf(format!(
                "Declared Size {} smaller than {}x{} {:?} payload",
                size, dim_1, dim_2, sample_type
            )));
        }
    }

    Ok(header)
}

/// Case-insensitive key lookup; EDF writers disagree on capitalisation.
fn lookup<'a>(entries: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn required_dim(entries: &HashMap<String, String>, key: &str) -> Result<usize> {
    let raw = lookup(entries, key)
        .ok_or_else(|| ScanviewError::InvalidEdf(format!("Missing {key}")))?;
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(ScanviewError::InvalidEdf(format!(
            "Invalid {key} '{raw}'"
        ))),
        Ok(v) => Ok(v),
    }
}

fn sample_type_for(data_type: &str) -> Result<SampleType> {
    let t = match data_type {
        "UnsignedByte" | "UnsignedChar" | "UnsignedInteger8" => SampleType::U8,
        "SignedByte" | "SignedChar" | "SignedInteger8" => SampleType::I8,
        "UnsignedShort" | "UnsignedShortInteger" | "UnsignedInteger16" => SampleType::U16,
        "SignedShort" | "SignedShortInteger" | "SignedInteger16" => SampleType::I16,
        "UnsignedInteger" | "UnsignedInt" | "UnsignedLong" | "UnsignedInteger32" => {
            SampleType::U32
        }
        "SignedInteger" | "SignedInt" | "SignedLong" | "SignedInteger32" => SampleType::I32,
        "Unsigned64" | "UnsignedInteger64" => SampleType::U64,
        "Signed64" | "SignedInteger64" => SampleType::I64,
        "FloatValue" | "Float" | "Real" | "FloatIEEE32" => SampleType::F32,
        "DoubleValue" | "Double" | "DoubleIEEE64" => SampleType::F64,
        other => {
            return Err(ScanviewError::InvalidEdf(format!(
                "Unsupported DataType '{other}'"
            )))
        }
    };
    Ok(t)
}
