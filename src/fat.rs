//! The FAT writer.
//!
//! Builds and writes the File Allocation Table: a default "free" fill for
//! the sectors that only describe user-data blocks, and a set of "self
//! chain" sectors at the tail of the FAT region that describe the FAT
//! region and the directory region as if each were a pre-allocated file —
//! which is how the mounted filesystem learns to treat those regions as
//! reserved, per `mkfs.vmufat.c`'s `mark_fat`.

use io_at::WriteAt;

use crate::device::{put_word, write_sector, Sector, SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::geometry::VmuParams;

/// FAT cell sentinel: the block is free.
pub const FREE: u16 = 0xFFFC;
/// FAT cell sentinel: end-of-chain, bad block, or reserved terminator.
pub const TERMINATOR: u16 = 0xFFFA;

fn filled(value: u16) -> Sector {
    let mut buf = [0u8; SECTOR_SIZE];
    for idx in 0..SECTOR_SIZE / 2 {
        put_word(&mut buf, idx, value);
    }
    buf
}

/// Write the FAT for `params` to `dev`.
///
/// Fails with [`Error::FatRegionEmpty`] before issuing any write if
/// `params.fatsize == 0` — a geometry the planner can still produce (see
/// `geometry::VmuParams::plan`) for devices under 256 sectors, but which has
/// no physical FAT sector to hold even the root block's own terminator.
pub fn write_fat<D: WriteAt + ?Sized>(dev: &D, params: &VmuParams) -> Result<()> {
    if params.fatsize == 0 {
        return Err(Error::FatRegionEmpty {
            sectors: params.total_sectors(),
        });
    }

    write_prelude(dev, params)?;
    write_self_chains(dev, params)?;

    log::info!(
        "FAT written: {} sector(s) starting at {}, ending at {}",
        params.fatsize,
        params.dirstart + 1,
        params.fatstart,
    );
    Ok(())
}

/// Step (a): sectors of the FAT region that describe only user-data blocks
/// start out entirely free. Written in descending order, mirroring the
/// source: `fatstart-1, fatstart-2, …, dirstart+1`.
fn write_prelude<D: WriteAt + ?Sized>(dev: &D, params: &VmuParams) -> Result<()> {
    if params.fatsize <= 1 {
        return Ok(());
    }
    let free = filled(FREE);
    let mut sector = params.fatstart - 1;
    while sector > params.fatstart - params.fatsize {
        write_sector(dev, sector, &free)?;
        sector -= 1;
    }
    Ok(())
}

/// Steps (b) and (c): the tail of the FAT region encodes the FAT region and
/// the directory region as back-chains, terminated at each region's lowest
/// block, with the very last slot patched to the root block's own
/// terminator.
fn write_self_chains<D: WriteAt + ?Sized>(dev: &D, params: &VmuParams) -> Result<()> {
    let start = 2 * (params.fatsize + params.dirsize) / SECTOR_SIZE as u64 + 1;
    let fat_lowest = 1 + params.fatstart - params.fatsize;
    let dir_lowest = 1 + params.dirstart - params.dirsize;

    let mut last: Option<(u64, Sector)> = None;
    let mut j = params.rootblock - start;
    while j < params.rootblock {
        let k = (j - params.dirstart - 1) * SECTOR_SIZE as u64;
        let mut buf = filled(FREE);
        for idx in 0..SECTOR_SIZE / 2 {
            let bi = k / 2 + idx as u64;
            let value = if bi > fat_lowest {
                Some(bi - 1)
            } else if bi == fat_lowest {
                Some(TERMINATOR as u64)
            } else if bi > dir_lowest {
                Some(bi - 1)
            } else if bi == dir_lowest {
                Some(TERMINATOR as u64)
            } else {
                None
            };
            if let Some(v) = value {
                put_word(&mut buf, idx, v as u16);
            }
        }
        if start > 1 {
            write_sector(dev, j, &buf)?;
        }
        last = Some((j, buf));
        j += 1;
    }

    let (sector, mut buf) = last.expect("FAT region always has at least one trailing sector");
    put_word(&mut buf, SECTOR_SIZE / 2 - 1, TERMINATOR);
    write_sector(dev, sector, &buf)?;
    Ok(())
}

/// Read a single FAT cell for `block`, for tests and diagnostics: locates
/// the FAT sector containing `block`'s entry and returns its 16-bit value.
#[cfg(test)]
pub(crate) fn read_cell<D: io_at::ReadAt + ?Sized>(
    dev: &D,
    params: &VmuParams,
    block: u64,
) -> std::io::Result<u16> {
    use crate::device::{get_word, read_sector};
    let fatblock = (2 * block) / SECTOR_SIZE as u64 + params.dirstart + 1;
    let sector = read_sector(dev, fatblock)?;
    Ok(get_word(&sector, (block % (SECTOR_SIZE as u64 / 2)) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VmuParams;
    use std::cell::RefCell;

    /// A tiny in-memory block device for unit tests, implementing the same
    /// `ReadAt`/`WriteAt` contract a real device handle would.
    struct MemDevice(RefCell<Vec<u8>>);

    impl MemDevice {
        fn new(sectors: u64) -> Self {
            MemDevice(RefCell::new(vec![0u8; (sectors * SECTOR_SIZE as u64) as usize]))
        }
    }

    impl io_at::ReadAt for MemDevice {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
            let data = self.0.borrow();
            let start = offset as usize;
            let end = start + buf.len();
            if end > data.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "short read",
                ));
            }
            buf.copy_from_slice(&data[start..end]);
            Ok(())
        }
    }

    impl io_at::WriteAt for MemDevice {
        fn write_at(&self, buf: &[u8], offset: u64) -> std::io::Result<()> {
            let mut data = self.0.borrow_mut();
            let start = offset as usize;
            let end = start + buf.len();
            if end > data.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "short write",
                ));
            }
            data[start..end].copy_from_slice(buf);
            Ok(())
        }
    }

    /// The FAT cell at the root block's own index is the terminator.
    #[test]
    fn root_block_terminator() {
        let params = VmuParams::plan(128 * 1024, 0).unwrap();
        let dev = MemDevice::new(params.total_sectors());
        write_fat(&dev, &params).unwrap();
        assert_eq!(read_cell(&dev, &params, params.rootblock).unwrap(), TERMINATOR);
    }

    /// FAT and directory regions form back-chains terminated at their
    /// lowest block.
    #[test]
    fn self_chains() {
        let params = VmuParams::plan(512 * 1024, 0).unwrap();
        let dev = MemDevice::new(params.total_sectors());
        write_fat(&dev, &params).unwrap();

        let fat_lowest = params.fatstart - params.fatsize + 1;
        for bi in (fat_lowest + 1)..=params.fatstart {
            assert_eq!(
                read_cell(&dev, &params, bi).unwrap() as u64,
                bi - 1,
                "fat region block {bi} should chain to {}",
                bi - 1
            );
        }
        assert_eq!(read_cell(&dev, &params, fat_lowest).unwrap(), TERMINATOR);

        let dir_lowest = params.dirstart - params.dirsize + 1;
        for bi in (dir_lowest + 1)..=params.dirstart {
            assert_eq!(read_cell(&dev, &params, bi).unwrap() as u64, bi - 1);
        }
        assert_eq!(read_cell(&dev, &params, dir_lowest).unwrap(), TERMINATOR);
    }

    /// Every user-area block is free.
    #[test]
    fn user_area_free() {
        let params = VmuParams::plan(512 * 1024, 0).unwrap();
        let dev = MemDevice::new(params.total_sectors());
        write_fat(&dev, &params).unwrap();

        let user_top = params.dirstart - params.dirsize;
        for bi in 0..=user_top {
            assert_eq!(read_cell(&dev, &params, bi).unwrap(), FREE);
        }
    }

    #[test]
    fn empty_fat_region_is_rejected() {
        let params = VmuParams::plan(4 * SECTOR_SIZE as u64, 0).unwrap();
        let dev = MemDevice::new(params.total_sectors());
        let err = write_fat(&dev, &params).unwrap_err();
        assert!(matches!(err, Error::FatRegionEmpty { sectors: 4 }));
    }

    /// Exercises the multi-sector prelude path (fatsize > 1, so the
    /// descending-write loop in `write_prelude` actually runs).
    #[test]
    fn multi_sector_fat_prelude() {
        let params = VmuParams::plan(512 * 1024, 0).unwrap();
        assert!(params.fatsize > 1);
        let dev = MemDevice::new(params.total_sectors());
        write_fat(&dev, &params).unwrap();
        // A block safely inside the user area, covered by the prelude fill.
        assert_eq!(read_cell(&dev, &params, 100).unwrap(), FREE);
    }
}
