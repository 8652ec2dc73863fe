//! Bad-block discovery and marking.
//!
//! Discovery (`scan`, `parse_list_file`) is a peripheral collaborator — a
//! finite ordered sequence of suspect sector indices, produced either by
//! reading every sector once or by parsing a plain-text list. Marking
//! (`mark_bad_blocks`) is core: it patches the FAT so the mounted
//! filesystem never allocates a block known to be bad, and refuses outright
//! if a supplied block falls inside the reserved system region.

use std::io::{BufRead, BufReader};
use std::path::Path;

use io_at::{ReadAt, WriteAt};

use crate::device::{put_word, read_sector, write_sector, SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::fat::TERMINATOR;
use crate::geometry::VmuParams;

/// Scan every sector `[0, total_sectors)` once; any short or failed read
/// contributes that sector's index to the returned list. Never fails itself
/// — an unreadable sector is data, not an error.
pub fn scan<D: ReadAt + ?Sized>(dev: &D, total_sectors: u64) -> Vec<i64> {
    let mut bad = Vec::new();
    for i in 0..total_sectors {
        log::debug!("testing block {i}");
        if read_sector(dev, i).is_err() {
            log::info!("block {i} gives bad read");
            bad.push(i as i64);
        }
    }
    bad
}

/// Parse a text file of whitespace-separated decimal non-negative integers,
/// one per line, in file order. Malformed input is fatal.
pub fn parse_list_file(path: &Path) -> Result<Vec<i64>> {
    let file = std::fs::File::open(path).map_err(|source| Error::Open {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut blocks = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::Io)?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: i64 = trimmed.parse().map_err(|_| Error::BadBlockList {
            path: path.display().to_string(),
            line: lineno + 1,
        })?;
        log::info!("bad block at {value} noted");
        blocks.push(value);
    }
    Ok(blocks)
}

/// Patch the FAT entry for `block` to the terminator value.
fn mark_one<D: ReadAt + WriteAt + ?Sized>(dev: &D, params: &VmuParams, block: i64) -> Result<()> {
    let block = block as u64;
    let fatblock = (2 * block) / SECTOR_SIZE as u64 + params.dirstart + 1;
    let mut sector = read_sector(dev, fatblock)?;
    put_word(&mut sector, (block % (SECTOR_SIZE as u64 / 2)) as usize, TERMINATOR);
    write_sector(dev, fatblock, &sector)?;
    Ok(())
}

/// Mark each block in `blocks` as bad in the FAT:
///
/// - `b < 0` or `b > rootblock`: ignored.
/// - `dirstart <= b <= rootblock`: fatal — the block lies in the reserved
///   system region (root block, FAT, directory).
/// - otherwise: the FAT cell for `b` is set to the terminator value.
///
/// Duplicates are tolerated (marking an already-bad block is a no-op).
pub fn mark_bad_blocks<D: ReadAt + WriteAt + ?Sized>(
    dev: &D,
    params: &VmuParams,
    blocks: &[i64],
) -> Result<()> {
    for &b in blocks {
        if b < 0 || b as u64 > params.rootblock {
            continue;
        }
        if b as u64 >= params.dirstart {
            return Err(Error::SystemBlockBad {
                block: b,
                lo: params.dirstart,
                hi: params.rootblock,
            });
        }
        mark_one(dev, params, b)?;
    }
    log::info!("bad blocks now marked off in FAT");
    Ok(())
}
