//! VMUFAT filesystem formatter.
//!
//! VMUFAT is a small FAT-style layout originally designed for a handheld
//! memory-card device: a root/superblock, a File Allocation Table, and a
//! zeroed directory region. This crate computes that layout from a device
//! size and writes a byte-exact, little-endian on-disk image a VMUFAT
//! driver will accept.
//!
//! General layout, low sector to high:
//!
//! ```text
//! [ 0 .............................. dirstart-dirsize ]   user data
//! [ dirstart-dirsize+1 ............. dirstart         ]   directory (zeroed)
//! [ dirstart+1 ...................... fatstart        ]   FAT
//! [ rootblock                                         ]   root/superblock
//! ```
//!
//! Control flow is strictly linear and mirrors `main` in
//! `mkfs.vmufat.c`: plan geometry, optionally collect bad
//! blocks, write the root block, write the FAT, zero the user area, apply
//! bad-block marks. Any step failing aborts the remainder — there is no
//! rollback, and the device is considered dirty until a subsequent
//! successful format.

#[macro_use]
extern crate index_fixed;

pub mod badblock;
pub mod device;
pub mod error;
pub mod fat;
pub mod geometry;
pub mod rootblock;

use io_at::{ReadAt, WriteAt};

pub use error::{Error, Result};
pub use geometry::VmuParams;

/// Run the full format pipeline against an already-open device handle.
///
/// `raw_size` is the device's total size in octets. `requested_sectors` is
/// `0` to format the whole device, or a caller-requested sector count.
/// `bad_blocks` is whatever a collaborator already collected (a sequential
/// scan or a parsed list file) — this function only applies the marks, it
/// does not perform discovery itself.
///
/// Returns the geometry that was written, or the first error encountered.
/// No partial recovery is attempted: a failure midway leaves the device in
/// whatever state the last successful write left it in.
pub fn format<D: ReadAt + WriteAt + ?Sized>(
    dev: &D,
    raw_size: u64,
    requested_sectors: u64,
    bad_blocks: &[i64],
) -> Result<VmuParams> {
    let params = VmuParams::plan(raw_size, requested_sectors)?;
    if params.fatsize == 0 {
        return Err(Error::FatRegionEmpty {
            sectors: params.total_sectors(),
        });
    }
    log::info!(
        "VMUFAT file system: root block at {}, FAT of length {} begins at {}, directory of length {} begins at {}",
        params.rootblock,
        params.fatsize,
        params.fatstart,
        params.dirsize,
        params.dirstart,
    );

    rootblock::write(dev, &params, chrono::Utc::now())?;
    fat::write_fat(dev, &params)?;
    device::zero_user_area(dev, params.dirstart)?;
    badblock::mark_bad_blocks(dev, &params, bad_blocks)?;

    Ok(params)
}
