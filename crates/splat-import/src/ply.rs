//! Binary PLY header and body reading.
//!
//! Only the subset of PLY that splat exporters produce is understood: a
//! `binary_little_endian 1.0` file with a single `vertex` element whose
//! properties are scalar typed. Everything else in the header is skipped, so
//! files carrying extra directives still parse.

use std::io::{self, BufRead, Read};

use crate::ImportError;

/// Hard cap on header lines, to bound pathological input.
pub const MAX_HEADER_LINES: usize = 9000;

/// Files of 2 GiB and above would overflow the 32-bit offset arithmetic used
/// by the record transcoder.
pub const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Scalar property types splat exporters use. Header declarations with any
/// other type token are dropped from the field list entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Float,
    Double,
    UChar,
    Int,
}

impl PropertyType {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "uchar" => Some(Self::UChar),
            "int" => Some(Self::Int),
            _ => None,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Float | Self::Int => 4,
            Self::Double => 8,
            Self::UChar => 1,
        }
    }
}

/// Parsed header of a binary splat PLY.
///
/// `fields` keeps declaration order, which defines each field's byte offset
/// within a record.
#[derive(Debug, Clone)]
pub struct PlyHeader {
    pub count: usize,
    pub stride: usize,
    pub fields: Vec<(String, PropertyType)>,
    pub comments: Vec<String>,
}

impl PlyHeader {
    /// Byte offset of the named field within a source record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for (field, ty) in &self.fields {
            if field == name {
                return Some(offset);
            }
            offset += ty.size();
        }
        None
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    pub fn body_bytes(&self) -> usize {
        self.count * self.stride
    }
}

fn parse_count(token: &str) -> Result<usize, ImportError> {
    token
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid vertex count").into())
}

/// Read one header line, stripping the newline and an optional trailing CR.
/// EOF reads as an empty line, which terminates the header.
fn read_line<R: BufRead>(reader: &mut R) -> Result<String, ImportError> {
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Scan the textual header prefix of a splat PLY.
///
/// The reader is left positioned at the first body byte.
pub fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, ImportError> {
    let mut count = 0;
    let mut stride = 0;
    let mut fields = Vec::new();
    let mut comments = Vec::new();
    let mut got_binary_le = false;

    for _ in 0..MAX_HEADER_LINES {
        let line = read_line(reader)?;
        if line == "end_header" || line.is_empty() {
            if !got_binary_le {
                return Err(ImportError::UnsupportedFormat);
            }
            return Ok(PlyHeader {
                count,
                stride,
                fields,
                comments,
            });
        }

        if let Some(text) = line.strip_prefix("comment ") {
            comments.push(text.to_owned());
            continue;
        }

        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() != 3 {
            continue;
        }
        match (tokens[0], tokens[1], tokens[2]) {
            ("format", "binary_little_endian", "1.0") => got_binary_le = true,
            ("element", "vertex", n) => count = parse_count(n)?,
            ("property", ty, name) => {
                if let Some(ty) = PropertyType::from_token(ty) {
                    stride += ty.size();
                    fields.push((name.to_owned(), ty));
                }
            }
            _ => {}
        }
    }

    Err(ImportError::HeaderTooLong)
}

/// Read exactly `count * stride` body bytes following the header.
pub fn read_body<R: Read>(reader: &mut R, header: &PlyHeader) -> Result<Vec<u8>, ImportError> {
    let expected = header.body_bytes();
    let mut data = vec![0u8; expected];
    let mut got = 0;
    while got < expected {
        let read = reader.read(&mut data[got..])?;
        if read == 0 {
            break;
        }
        got += read;
    }
    if got != expected {
        return Err(ImportError::TruncatedBody { expected, got });
    }
    Ok(data)
}
