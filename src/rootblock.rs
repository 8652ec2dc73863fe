//! The root block (superblock): a single 512-octet sector carrying the
//! `0x55` signature fill, a BCD timestamp, and the geometry pointers a
//! VMUFAT driver needs to find everything else.

use io_at::WriteAt;

use crate::device::{get_word, put_word, write_sector, Sector, SECTOR_SIZE};
use crate::geometry::VmuParams;

/// BCD-encode a decimal value in `0..=99`: high nibble `v/10`, low nibble
/// `v%10`.
fn to_bcd(v: u32) -> u8 {
    (((v / 10) << 4) | (v % 10)) as u8
}

/// Build the 512-byte root block image for `params`, stamped with the given
/// UTC timestamp.
///
/// Layout: bytes `0x00..0x10` are the `0x55` signature fill;
/// bytes `0x30..0x38` are the BCD clock (century, year, month, day, hour,
/// minute, second, weekday); words `0x20, 0x22..0x27` carry the geometry.
/// Word `0x21` is deliberately left zero — the source never writes it.
pub fn build(params: &VmuParams, now: chrono::DateTime<chrono::Utc>) -> Sector {
    use chrono::Datelike;
    use chrono::Timelike;

    let mut buf = [0u8; SECTOR_SIZE];

    for b in &mut buf[0x00..0x10] {
        *b = 0x55;
    }

    let year = now.year() - 1900;
    buf[0x30] = to_bcd((19 + year / 100) as u32);
    buf[0x31] = to_bcd((year % 100) as u32);
    buf[0x32] = to_bcd(now.month());
    buf[0x33] = to_bcd(now.day());
    buf[0x34] = to_bcd(now.hour());
    buf[0x35] = to_bcd(now.minute());
    buf[0x36] = to_bcd(now.second());
    // chrono's Monday=0 weekday differs from the Sunday=0 the format wants.
    buf[0x37] = to_bcd(now.weekday().num_days_from_sunday());

    put_word(&mut buf, 0x20, params.rootblock as u16);
    put_word(&mut buf, 0x22, params.rootblock as u16);
    put_word(&mut buf, 0x23, params.fatstart as u16);
    put_word(&mut buf, 0x24, params.fatsize as u16);
    put_word(&mut buf, 0x25, params.dirstart as u16);
    put_word(&mut buf, 0x26, params.dirsize as u16);
    put_word(&mut buf, 0x27, params.dir_entries() as u16);

    buf
}

/// Write the root block for `params` to `dev`, stamped with `now`.
pub fn write<D: WriteAt + ?Sized>(
    dev: &D,
    params: &VmuParams,
    now: chrono::DateTime<chrono::Utc>,
) -> std::io::Result<()> {
    let buf = build(params, now);
    let view = RootBlock::from_sector(&buf);
    write_sector(dev, params.rootblock, &buf)?;
    let ts = view.timestamp_bcd();
    log::info!(
        "root block written to block {} (BCD {:02x} {:02x} {:02x} {:02x} {:02x} {:02x} {:02x} {:02x})",
        params.rootblock,
        ts[0], ts[1], ts[2], ts[3], ts[4], ts[5], ts[6], ts[7],
    );
    Ok(())
}

/// A read-only view over a root-block sector: named, offset-documented
/// getters over a raw `[u8; 512]`, rather than ad hoc indexing at each call
/// site. Used by forensic/verification callers (and this module's own
/// tests) to read fields back out of a sector already on disk.
pub struct RootBlock<'a> {
    raw: &'a Sector,
}

impl<'a> RootBlock<'a> {
    pub fn from_sector(raw: &'a Sector) -> Self {
        RootBlock { raw }
    }

    /// The `0x55` signature fill, offset `0x00`, size 16.
    pub fn signature(&self) -> &[u8; 16] {
        index_fixed!(&self.raw; 0, .. 16)
    }

    /// BCD clock: century, year, month, day, hour, minute, second, weekday.
    /// Offset `0x30`, size 8.
    pub fn timestamp_bcd(&self) -> &[u8; 8] {
        index_fixed!(&self.raw; 0x30, .. 0x38)
    }

    pub fn rootblock(&self) -> u16 {
        get_word(self.raw, 0x20)
    }

    pub fn fatstart(&self) -> u16 {
        get_word(self.raw, 0x23)
    }

    pub fn fatsize(&self) -> u16 {
        get_word(self.raw, 0x24)
    }

    pub fn dirstart(&self) -> u16 {
        get_word(self.raw, 0x25)
    }

    pub fn dirsize(&self) -> u16 {
        get_word(self.raw, 0x26)
    }

    pub fn dir_entries(&self) -> u16 {
        get_word(self.raw, 0x27)
    }
}
