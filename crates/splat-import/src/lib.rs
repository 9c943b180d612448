//! Ingestion of Gaussian splat point clouds into a fixed, renderer-ready
//! record layout.
//!
//! The pipeline reads a binary little-endian PLY, maps its attributes onto
//! the canonical slot layout, reorders spherical-harmonics coefficients from
//! planar to interleaved order and linearizes per-record values (rotation
//! packing, scale/opacity/color decoding). The finished [`SplatCloud`] is a
//! contiguous buffer the caller owns outright.

pub mod export;
pub mod layout;
pub mod linearize;
pub mod ply;
pub mod reader;
pub mod sh;
pub mod transcode;

pub use export::{export_ply, write_ply};
pub use layout::{LayoutVariant, OffsetTable, SplatCloud};
pub use reader::{
    ReadOptions, SplatFileReader, SpzDecoder, ingest, peek_record_count, read_file, read_ply_file,
    read_ply_header,
};

use thiserror::Error;

/// Records per parallel work item for the transcode/reorder/linearize passes.
pub(crate) const PARALLEL_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error while importing splat file")]
    Io(#[from] std::io::Error),

    #[error("ply header did not terminate within {} lines", ply::MAX_HEADER_LINES)]
    HeaderTooLong,

    #[error("not a binary little-endian 1.0 ply file")]
    UnsupportedFormat,

    #[error("files larger than 2 GiB are not supported")]
    FileTooLarge,

    #[error("missing splat properties: {0}")]
    MissingAttributes(String),

    #[error("body truncated, expected {expected} bytes but got {got}")]
    TruncatedBody { expected: usize, got: usize },

    #[error("not a supported container format")]
    UnknownContainerFormat,
}
