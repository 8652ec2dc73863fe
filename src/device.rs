//! Sector-addressed positional I/O.
//!
//! All on-disk access in this crate goes through `ReadAt`/`WriteAt`
//! (from `io_at`) rather than `Read`/`Write` + `Seek`: every request carries
//! its own absolute offset, so there is no shared cursor to get out of sync
//! between the writers that make up the format pipeline. `ReadAt::read_at`
//! and `WriteAt::write_at` either transfer the whole buffer or fail — there
//! is no short-read/short-write case for callers to handle.

use io_at::{ReadAt, WriteAt};

/// Bytes in one sector; the only unit of on-disk addressing VMUFAT knows.
pub const SECTOR_SIZE: usize = 512;

/// `log2(SECTOR_SIZE)`.
pub const SECTOR_SHIFT: u32 = 9;

/// A single zeroed or populated sector buffer.
pub type Sector = [u8; SECTOR_SIZE];

/// Read the sector at absolute sector index `index`.
pub fn read_sector<D: ReadAt + ?Sized>(dev: &D, index: u64) -> std::io::Result<Sector> {
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_at(&mut buf, index * SECTOR_SIZE as u64)?;
    Ok(buf)
}

/// Read the little-endian 16-bit word at word index `word_index` (byte
/// offset `word_index * 2`) of a sector buffer.
pub fn get_word(buf: &Sector, word_index: usize) -> u16 {
    let off = word_index * 2;
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

/// Write a little-endian 16-bit word at word index `word_index` of a sector
/// buffer. All on-disk multi-byte fields in VMUFAT are little-endian
/// regardless of host byte order.
pub fn put_word(buf: &mut Sector, word_index: usize, value: u16) {
    let off = word_index * 2;
    buf[off..off + 2].copy_from_slice(&value.to_le_bytes());
}

/// Write `buf` as the sector at absolute sector index `index`.
pub fn write_sector<D: WriteAt + ?Sized>(
    dev: &D,
    index: u64,
    buf: &Sector,
) -> std::io::Result<()> {
    dev.write_at(buf, index * SECTOR_SIZE as u64)
}

/// Write all-zero sectors over `[0, dirstart]` inclusive, ascending.
///
/// This leaves the directory region in the zeroed state VMUFAT expects of an
/// empty volume (no directory population happens here or anywhere in this
/// crate — see the Non-goals in the design).
pub fn zero_user_area<D: WriteAt + ?Sized>(dev: &D, dirstart: u64) -> std::io::Result<()> {
    let zeros = [0u8; SECTOR_SIZE];
    for i in 0..=dirstart {
        write_sector(dev, i, &zeros)?;
    }
    log::debug!("zeroed sectors 0..={}", dirstart);
    Ok(())
}
