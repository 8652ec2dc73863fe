//! Error kinds for the VMUFAT formatter, one variant per class in the design:
//! usage, environment, geometry, I/O, malformed data and invariant violations.
//!
//! Every step of the format pipeline aborts immediately on the first error;
//! nothing rolls back what was already written (see `vmufat::format`).

use std::io;

use thiserror::Error;

/// Anything that can go wrong while planning or writing a VMUFAT volume.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("{0} is not a block device")]
    NotBlockDevice(String),

    #[error("{0} is already mounted - will not format as VMUFAT")]
    AlreadyMounted(String),

    #[error("could not determine the size of {path}: {source}")]
    Stat { path: String, source: io::Error },

    #[error("could not open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("device just {size} octets in size, too small for a VMUFAT volume")]
    TooSmall { size: u64 },

    #[error("device smaller than the {requested} sectors requested")]
    RequestedTooLarge { requested: u64 },

    #[error(
        "this device is too small to carry even one FAT sector ({sectors} total sectors); \
         VMUFAT needs at least 256 sectors"
    )]
    FatRegionEmpty { sectors: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("could not parse bad-block list {path} at line {line}")]
    BadBlockList { path: String, line: usize },

    #[error("format fails as system block {block} is bad (reserved region is [{lo}, {hi}])")]
    SystemBlockBad { block: i64, lo: u64, hi: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
