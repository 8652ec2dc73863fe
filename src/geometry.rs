//! The geometry planner: derives the fixed-point layout of a VMUFAT volume
//! (root block, FAT region, directory region) from a raw device size and an
//! optional requested block count.
//!
//! This is pure arithmetic over sector counts — no I/O happens here. The
//! formulas are taken verbatim from `calculate_vmuparams` in
//! `mkfs.vmufat.c`, including the surprising division in
//! `fatsize` (see the module-level note below) and the 17:1 split between
//! user data and the directory region (the later of the two source
//! revisions; the older revision used 9:1).

use crate::device::SECTOR_SIZE;
use crate::error::{Error, Result};

/// Sectors below this count cannot be requested or formatted.
const MIN_SECTORS: u64 = 4;

/// The fully computed layout of one VMUFAT volume.
///
/// Immutable once built: every field here is derived once, in
/// [`VmuParams::plan`], from the two inputs that matter — the device's raw
/// byte size and an optional requested sector count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmuParams {
    /// Volume size in octets. Always a multiple of 512 and a power of two
    /// in sectors.
    pub size: u64,
    /// Sector index of the root/superblock: `(size >> 9) - 1`.
    pub rootblock: u64,
    /// Sector index of the *last* sector of the FAT region.
    pub fatstart: u64,
    /// Sectors occupied by the FAT. Can be zero for volumes under 256
    /// sectors — see [`VmuParams::fatsize`] for why the planner still
    /// returns such a geometry instead of failing outright.
    pub fatsize: u64,
    /// Sector index of the *last* sector of the directory region.
    pub dirstart: u64,
    /// Sectors allotted to the directory region.
    pub dirsize: u64,
}

impl VmuParams {
    /// Plan a volume's geometry.
    ///
    /// `raw_size` is the device's total size in octets (from a `stat`/
    /// `seek`-to-end of the device handle). `requested_sectors` is `0` to
    /// mean "use the whole device", or a caller-requested sector count
    /// (`-N`/`-B`/positional count on the CLI), which must be `>= 4` and
    /// must fit within `raw_size`.
    pub fn plan(raw_size: u64, requested_sectors: u64) -> Result<Self> {
        // A requested count under the minimum is "too small" the same way a
        // too-small raw device is: a single compound condition, not a
        // separate error category.
        if (requested_sectors > 0 && requested_sectors < MIN_SECTORS)
            || raw_size < MIN_SECTORS * SECTOR_SIZE as u64
        {
            return Err(Error::TooSmall { size: raw_size });
        }

        if requested_sectors > 0 && requested_sectors * SECTOR_SIZE as u64 > raw_size {
            return Err(Error::RequestedTooLarge {
                requested: requested_sectors,
            });
        }

        let effective_size = if requested_sectors > 0 {
            requested_sectors * SECTOR_SIZE as u64
        } else {
            raw_size
        };

        let sectors = effective_size / SECTOR_SIZE as u64;
        let sectors = round_down_pow2(sectors);
        let size = sectors * SECTOR_SIZE as u64;

        let rootblock = sectors - 1;
        let fatstart = rootblock - 1;
        // `(2 * sectors) >> 9`: two octets of FAT metadata per sector of
        // volume, expressed as a page count. For `sectors < 256` this is
        // zero by construction — preserved as-is; see `Error::FatRegionEmpty`
        // at format time (not here) for how that's surfaced.
        let fatsize = (2 * sectors) >> SECTOR_SHIFT_AS_SECTORS;
        let dirstart = fatstart - fatsize;
        // Remainder split 16:1 between user data and directory.
        let dirsize = (sectors - (1 + fatsize)) / 17;

        Ok(VmuParams {
            size,
            rootblock,
            fatstart,
            fatsize,
            dirstart,
            dirsize,
        })
    }

    /// `size/512`: total sector count of the volume.
    pub fn total_sectors(&self) -> u64 {
        self.size / SECTOR_SIZE as u64
    }

    /// Directory capacity in entries: `dirsize * 8` (32 octets per entry,
    /// 16 entries per sector).
    pub fn dir_entries(&self) -> u64 {
        self.dirsize * 8
    }
}

// `SECTOR_SHIFT` from `device` is `u32`; the shift amount here is the same
// value, named locally so the formula above reads the way
// `calculate_vmuparams` does (`>> BLOCKSHIFT`).
const SECTOR_SHIFT_AS_SECTORS: u32 = crate::device::SECTOR_SHIFT;

/// Round `x` down to the nearest power of two, by repeated halving of
/// `0x8000_0000` — mirrors `_round_down` in
/// `mkfs.vmufat.c` exactly, including its 31-bit ceiling:
/// sector counts at or above `0x8000_0000` all round down to
/// `0x8000_0000` rather than to a larger power of two.
fn round_down_pow2(x: u64) -> u64 {
    let mut y: u64 = 0x8000_0000;
    while y > x {
        y >>= 1;
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_rounding() {
        assert_eq!(round_down_pow2(4), 4);
        assert_eq!(round_down_pow2(5), 4);
        assert_eq!(round_down_pow2(255), 128);
        assert_eq!(round_down_pow2(256), 256);
        assert_eq!(round_down_pow2(257), 256);
        assert_eq!(round_down_pow2(1024), 1024);
    }

    /// Geometry totality across every power-of-two sector count.
    #[test]
    fn geometry_totality() {
        for &v in &[4u64, 8, 16, 32, 64, 128, 256, 512, 1024] {
            let p = VmuParams::plan(v * SECTOR_SIZE as u64, 0).unwrap();
            assert_eq!(p.rootblock, v - 1);
            assert_eq!(p.fatstart, v - 2);
            assert_eq!(p.fatsize, (2 * v) / 512);
            assert_eq!(p.dirstart, p.fatstart - p.fatsize);
            assert_eq!(p.dirsize, (v - 1 - p.fatsize) / 17);
            assert!(p.dirstart >= p.dirsize, "dirstart - dirsize must be >= 0");
        }
    }

    /// Power-of-two rounding for arbitrary raw sizes.
    #[test]
    fn rounding_picks_largest_power_of_two_leq_raw() {
        for &raw_sectors in &[4u64, 5, 100, 255, 256, 1000, 1024, 1025, 2000] {
            let raw = raw_sectors * SECTOR_SIZE as u64;
            let p = VmuParams::plan(raw, 0).unwrap();
            let got = p.total_sectors();
            assert!(got.is_power_of_two());
            assert!(got <= raw_sectors);
            assert!(got * 2 > raw_sectors || got == 0x8000_0000);
        }
    }

    /// A 256-sector (128 KiB) image.
    #[test]
    fn scenario_256_sectors() {
        let p = VmuParams::plan(128 * 1024, 0).unwrap();
        assert_eq!(p.size, 131072);
        assert_eq!(p.rootblock, 255);
        assert_eq!(p.fatstart, 254);
        assert_eq!(p.fatsize, 1);
        assert_eq!(p.dirstart, 253);
        assert_eq!(p.dirsize, 14);
        assert_eq!(p.dir_entries(), 112);
    }

    /// A 1024-sector (512 KiB) image.
    #[test]
    fn scenario_1024_sectors() {
        let p = VmuParams::plan(512 * 1024, 0).unwrap();
        assert_eq!(p.fatsize, 4);
        assert_eq!(p.dirstart, 1019);
        assert_eq!(p.dirsize, 60);
        assert_eq!(p.dir_entries(), 480);
    }

    /// A device too small to format at all.
    #[test]
    fn scenario_undersized_device() {
        let err = VmuParams::plan(1500, 0).unwrap_err();
        assert!(matches!(err, Error::TooSmall { size: 1500 }));
    }

    /// An explicit count larger than the device.
    #[test]
    fn scenario_requested_exceeds_device() {
        let err = VmuParams::plan(128 * 1024, 512).unwrap_err();
        assert!(matches!(err, Error::RequestedTooLarge { requested: 512 }));
    }

    #[test]
    fn requested_count_below_minimum_is_rejected() {
        let err = VmuParams::plan(128 * 1024, 1).unwrap_err();
        assert!(matches!(err, Error::TooSmall { .. }));
    }

    #[test]
    fn tiny_volumes_still_plan_but_carry_an_empty_fat() {
        // Below 256 sectors `fatsize` is zero; the planner still returns a
        // geometry (P1 requires it), but `fatsize == 0` flags that this
        // geometry cannot actually be formatted (see fat::write_fat).
        let p = VmuParams::plan(4 * SECTOR_SIZE as u64, 0).unwrap();
        assert_eq!(p.fatsize, 0);
    }
}
