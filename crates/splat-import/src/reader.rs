//! File-level entry points: container dispatch and the ingestion pipeline.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::ImportError;
use crate::layout::{LayoutVariant, OffsetTable, SplatCloud};
use crate::linearize::linearize_records;
use crate::ply::{self, MAX_FILE_BYTES, PlyHeader};
use crate::sh::reorder_sh_coeffs;
use crate::transcode::transcode_records;

/// Knobs for one ingestion call.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Canonical layout variant to produce.
    pub variant: LayoutVariant,
    /// Per-channel higher-order SH coefficient sets the file stores
    /// (8 for the common degree-2 exports). Deliberately not sniffed from
    /// the header; a mismatched count scrambles harmonics data silently.
    pub sh_coeffs_per_channel: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            variant: LayoutVariant::Standard,
            sh_coeffs_per_channel: 8,
        }
    }
}

/// Decoder for the compressed `.spz` container. Opaque to this crate beyond
/// its contract: it must yield records in the same canonical layout the PLY
/// path produces.
pub trait SpzDecoder: Send + Sync {
    /// Record count from the container header alone.
    fn peek_record_count(&self, path: &Path) -> Result<usize, ImportError>;

    fn decode(&self, path: &Path, options: &ReadOptions) -> Result<SplatCloud, ImportError>;
}

/// Dispatches splat files to the right decoder by extension
/// (case-insensitive). `.ply` is handled in-crate; `.spz` goes to a
/// registered [`SpzDecoder`]; anything else is
/// [`ImportError::UnknownContainerFormat`].
#[derive(Default)]
pub struct SplatFileReader {
    spz: Option<Box<dyn SpzDecoder>>,
}

impl SplatFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spz_decoder(decoder: Box<dyn SpzDecoder>) -> Self {
        Self { spz: Some(decoder) }
    }

    /// Record count from the header alone, without reading the body.
    pub fn peek_record_count(&self, path: &Path) -> Result<usize, ImportError> {
        if has_extension(path, "ply") {
            Ok(read_ply_header(path)?.count)
        } else if has_extension(path, "spz") {
            match &self.spz {
                Some(decoder) => decoder.peek_record_count(path),
                None => Err(ImportError::UnknownContainerFormat),
            }
        } else {
            Err(ImportError::UnknownContainerFormat)
        }
    }

    /// Read and normalize a whole splat file.
    pub fn read_file(&self, path: &Path, options: &ReadOptions) -> Result<SplatCloud, ImportError> {
        if has_extension(path, "ply") {
            read_ply_file(path, options)
        } else if has_extension(path, "spz") {
            match &self.spz {
                Some(decoder) => decoder.decode(path, options),
                None => Err(ImportError::UnknownContainerFormat),
            }
        } else {
            Err(ImportError::UnknownContainerFormat)
        }
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}

fn open_checked(path: &Path) -> Result<File, ImportError> {
    let file = File::open(path)?;
    if file.metadata()?.len() >= MAX_FILE_BYTES {
        return Err(ImportError::FileTooLarge);
    }
    Ok(file)
}

/// Parse just the header of a splat PLY on disk.
pub fn read_ply_header(path: &Path) -> Result<PlyHeader, ImportError> {
    let file = open_checked(path)?;
    ply::parse_header(&mut BufReader::new(file))
}

/// Read a splat PLY from disk and run the full normalization pipeline.
pub fn read_ply_file(path: &Path, options: &ReadOptions) -> Result<SplatCloud, ImportError> {
    let file = open_checked(path)?;
    let mut reader = BufReader::new(file);
    let header = ply::parse_header(&mut reader)?;
    log::info!(
        "Ingesting {} splats ({} fields, stride {})",
        header.count,
        header.fields.len(),
        header.stride
    );
    let body = ply::read_body(&mut reader, &header)?;
    ingest(&header, &body, options)
}

/// The core pipeline over already-resident bytes: schema mapping →
/// transcode → harmonics reorder → linearization.
///
/// Header parsing and mapping run sequentially up front; the per-record
/// passes then work chunk-parallel over the canonical array and join before
/// it is returned.
pub fn ingest(
    header: &PlyHeader,
    body: &[u8],
    options: &ReadOptions,
) -> Result<SplatCloud, ImportError> {
    let expected = header.body_bytes();
    if body.len() < expected {
        return Err(ImportError::TruncatedBody {
            expected,
            got: body.len(),
        });
    }

    let offsets = OffsetTable::map(header, options.variant)?;
    let mut cloud = transcode_records(
        &body[..expected],
        header.count,
        header.stride,
        &offsets,
        options.variant,
    );
    reorder_sh_coeffs(&mut cloud, options.sh_coeffs_per_channel);
    linearize_records(&mut cloud);
    Ok(cloud)
}

/// [`SplatFileReader::peek_record_count`] with no alternate decoders.
pub fn peek_record_count(path: &Path) -> Result<usize, ImportError> {
    SplatFileReader::new().peek_record_count(path)
}

/// [`SplatFileReader::read_file`] with no alternate decoders.
pub fn read_file(path: &Path, options: &ReadOptions) -> Result<SplatCloud, ImportError> {
    SplatFileReader::new().read_file(path, options)
}
