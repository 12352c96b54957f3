//! GGUF metadata reading
//!
//! Reads the key/value block at the start of a GGUF model file without
//! touching tensor data. Layout (little-endian):
//!
//! ```text
//! magic "GGUF" | version u32 | tensor_count | kv_count | kv_count x (key, type u32, value)
//! ```
//!
//! Counts and string/array lengths are u64 from version 2 on and u32 in
//! version 1.

use crate::error::GgufError;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Default context length when the model does not declare one
pub const DEFAULT_CONTEXT_LENGTH: u64 = 8192;

const GGUF_MAGIC: [u8; 4] = *b"GGUF";
const MAX_STRING_LEN: u64 = 64 * 1024 * 1024;

/// Deepest array-of-array nesting accepted in a metadata value
pub const MAX_NESTING_DEPTH: usize = 16;

/// A decoded metadata value
///
/// Arrays keep only their length and first element; the remaining elements
/// are skipped while reading.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array {
        len: u64,
        first: Option<Box<MetadataValue>>,
    },
}

impl MetadataValue {
    /// Coerce to a non-negative integer
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetadataValue::UInt(v) => Some(*v),
            MetadataValue::Int(v) => u64::try_from(*v).ok(),
            MetadataValue::Float(v) if v.is_finite() && *v >= 0.0 => Some(v.trunc() as u64),
            MetadataValue::Float(_) => None,
            MetadataValue::Bool(v) => Some(u64::from(*v)),
            MetadataValue::String(s) => s.trim().parse().ok(),
            MetadataValue::Array { first, .. } => first.as_ref().and_then(|v| v.as_u64()),
        }
    }
}

/// Header fields and metadata entries of a model file
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub version: u32,
    pub tensor_count: u64,
    pub entries: Vec<(String, MetadataValue)>,
}

impl ModelMetadata {
    /// Read the full metadata block of a model file
    pub fn read(path: &Path) -> Result<Self, GgufError> {
        let mut reader = GgufReader::open(path)?;
        let mut entries = Vec::with_capacity(reader.remaining.min(1024) as usize);
        while let Some(entry) = reader.next_entry()? {
            entries.push(entry);
        }
        Ok(Self {
            version: reader.version,
            tensor_count: reader.tensor_count,
            entries,
        })
    }

    /// Look up a value by exact key
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First entry whose key contains `context_length`, coerced to an integer
    pub fn context_length(&self) -> Option<u64> {
        self.entries
            .iter()
            .find(|(k, _)| is_context_length_key(k))
            .and_then(|(_, v)| v.as_u64())
    }
}

fn is_context_length_key(key: &str) -> bool {
    key.to_lowercase().contains("context_length")
}

/// Scan a model file for its context length
///
/// Stops at the first matching key. Returns `Ok(None)` when no key matches
/// or the matching value is not an integer.
pub fn find_context_length(path: &Path) -> Result<Option<u64>, GgufError> {
    let mut reader = GgufReader::open(path)?;
    while let Some((key, value)) = reader.next_entry()? {
        if is_context_length_key(&key) {
            return Ok(value.as_u64());
        }
    }
    Ok(None)
}

/// Context length of a model file, or `default` when unavailable
pub fn context_length_or(path: &Path, default: u64) -> u64 {
    match find_context_length(path) {
        Ok(Some(len)) => len,
        Ok(None) => {
            tracing::warn!(path = ?path, default, "No context length in model metadata");
            default
        }
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, default, "Could not read GGUF metadata");
            default
        }
    }
}

/// Streaming reader over the metadata entries of a GGUF file
pub struct GgufReader<R> {
    inner: R,
    version: u32,
    tensor_count: u64,
    remaining: u64,
}

impl GgufReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, GgufError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> GgufReader<R> {
    /// Parse the fixed header and position the reader at the first entry
    pub fn new(mut inner: R) -> Result<Self, GgufError> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;
        if magic != GGUF_MAGIC {
            return Err(GgufError::BadMagic(magic));
        }

        let version = read_u32(&mut inner)?;
        if !(1..=3).contains(&version) {
            return Err(GgufError::UnsupportedVersion(version));
        }

        let mut reader = Self {
            inner,
            version,
            tensor_count: 0,
            remaining: 0,
        };
        reader.tensor_count = reader.read_count()?;
        reader.remaining = reader.read_count()?;
        Ok(reader)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn tensor_count(&self) -> u64 {
        self.tensor_count
    }

    /// Next key/value pair, or `None` once all entries are consumed
    pub fn next_entry(&mut self) -> Result<Option<(String, MetadataValue)>, GgufError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let key = self.read_string()?;
        let value_type = read_u32(&mut self.inner)?;
        let value = self.read_value(value_type, 0)?;
        Ok(Some((key, value)))
    }

    fn read_count(&mut self) -> Result<u64, GgufError> {
        if self.version == 1 {
            Ok(u64::from(read_u32(&mut self.inner)?))
        } else {
            Ok(read_u64(&mut self.inner)?)
        }
    }

    fn read_string(&mut self) -> Result<String, GgufError> {
        let len = self.read_count()?;
        if len > MAX_STRING_LEN {
            return Err(GgufError::TooLarge(len));
        }
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| GgufError::InvalidString)
    }

    fn skip_string(&mut self) -> Result<(), GgufError> {
        let len = self.read_count()?;
        self.skip_bytes(len)
    }

    fn skip_bytes(&mut self, len: u64) -> Result<(), GgufError> {
        let copied = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        if copied != len {
            return Err(GgufError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
        }
        Ok(())
    }

    fn read_value(&mut self, value_type: u32, depth: usize) -> Result<MetadataValue, GgufError> {
        let r = &mut self.inner;
        let value = match value_type {
            0 => MetadataValue::UInt(u64::from(read_array::<1, _>(r)?[0])),
            1 => MetadataValue::Int(i64::from(i8::from_le_bytes(read_array(r)?))),
            2 => MetadataValue::UInt(u64::from(u16::from_le_bytes(read_array(r)?))),
            3 => MetadataValue::Int(i64::from(i16::from_le_bytes(read_array(r)?))),
            4 => MetadataValue::UInt(u64::from(read_u32(r)?)),
            5 => MetadataValue::Int(i64::from(i32::from_le_bytes(read_array(r)?))),
            6 => MetadataValue::Float(f64::from(f32::from_le_bytes(read_array(r)?))),
            7 => MetadataValue::Bool(read_array::<1, _>(r)?[0] != 0),
            8 => MetadataValue::String(self.read_string()?),
            9 => self.read_array_value(depth + 1)?,
            10 => MetadataValue::UInt(read_u64(r)?),
            11 => MetadataValue::Int(i64::from_le_bytes(read_array(r)?)),
            12 => MetadataValue::Float(f64::from_le_bytes(read_array(r)?)),
            other => return Err(GgufError::UnknownValueType(other)),
        };
        Ok(value)
    }

    fn read_array_value(&mut self, depth: usize) -> Result<MetadataValue, GgufError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(GgufError::TooDeep(MAX_NESTING_DEPTH));
        }

        let elem_type = read_u32(&mut self.inner)?;
        let len = self.read_count()?;
        if len == 0 {
            return Ok(MetadataValue::Array { len, first: None });
        }

        let first = self.read_value(elem_type, depth)?;
        for _ in 1..len {
            self.skip_value(elem_type, depth)?;
        }

        Ok(MetadataValue::Array {
            len,
            first: Some(Box::new(first)),
        })
    }

    fn skip_value(&mut self, value_type: u32, depth: usize) -> Result<(), GgufError> {
        match fixed_width(value_type) {
            Some(width) => self.skip_bytes(width),
            None if value_type == 8 => self.skip_string(),
            None if value_type == 9 => self.read_array_value(depth + 1).map(|_| ()),
            None => Err(GgufError::UnknownValueType(value_type)),
        }
    }
}

fn fixed_width(value_type: u32) -> Option<u64> {
    match value_type {
        0 | 1 | 7 => Some(1),
        2 | 3 => Some(2),
        4..=6 => Some(4),
        10..=12 => Some(8),
        _ => None,
    }
}

fn read_array<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    read_array(r).map(u32::from_le_bytes)
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    read_array(r).map(u64::from_le_bytes)
}
