//! `mkfs-vmufat` — the CLI driver.
//!
//! Parses options, vets that the target is a block device and not mounted,
//! and drives the format pipeline in `vmufat::format`. Peripheral to the
//! core layout computation (see the crate's module docs) but the part that
//! makes this an actual tool rather than a library.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, Seek, SeekFrom};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches, Parser};

use vmufat::{badblock, Error};

/// Create a VMUFAT filesystem.
#[derive(Parser, Debug)]
#[command(name = "mkfs-vmufat", version, about)]
struct Cli {
    /// Scan the device for bad blocks by sequential read.
    #[arg(short = 'c')]
    scan_bad_blocks: bool,

    /// Read a decimal, one-per-line bad-block list from FILE.
    #[arg(short = 'l', value_name = "FILE")]
    bad_block_list: Option<PathBuf>,

    /// Format as if the device held this many sectors.
    #[arg(short = 'N', value_name = "COUNT")]
    sector_count: Option<u64>,

    /// Equivalent to `-N (1 << LOG2COUNT)`.
    #[arg(short = 'B', value_name = "LOG2COUNT")]
    log2_sector_count: Option<u32>,

    /// Verbose progress on standard output.
    #[arg(short = 'v')]
    verbose: bool,

    /// Target block device.
    device: String,

    /// Same effect as `-N`, if present; only one positional count is
    /// accepted. Takes precedence over `-N`/`-B` when both are given,
    /// mirroring `mkfs.vmufat.c`'s `main`, which re-assigns
    /// `blocknum` from the trailing positional argument after option
    /// parsing regardless of what `-N`/`-B` set it to.
    positional_count: Option<u64>,
}

fn main() -> ExitCode {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    match run(&cli, &matches) {
        Ok(()) => {
            println!("VMUFAT volume created on {}", cli.device);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, matches: &clap::ArgMatches) -> Result<(), Error> {
    let discovery = resolve_discovery(cli, matches);

    let requested_sectors = resolve_requested_sectors(cli);

    check_not_mounted(&cli.device)?;

    let meta = std::fs::metadata(&cli.device).map_err(|source| Error::Stat {
        path: cli.device.clone(),
        source,
    })?;
    if !meta.file_type().is_block_device() {
        return Err(Error::NotBlockDevice(cli.device.clone()));
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_EXCL)
        .open(&cli.device)
        .map_err(|source| Error::Open {
            path: cli.device.clone(),
            source,
        })?;

    let raw_size = device_size(&mut file, &cli.device)?;
    let bad_blocks = match discovery {
        Discovery::Scan => badblock::scan(&file, raw_size / vmufat::device::SECTOR_SIZE as u64),
        Discovery::List(path) => badblock::parse_list_file(&path)?,
        Discovery::None => Vec::new(),
    };

    let params = vmufat::format(&file, raw_size, requested_sectors, &bad_blocks)?;
    log::info!(
        "directory of length {} begins at {}",
        params.dirsize, params.dirstart
    );
    Ok(())
}

enum Discovery {
    Scan,
    List(PathBuf),
    None,
}

/// `-c`/`-l` are mutually exclusive; per spec.md §6, whichever was given
/// *later* on the command line wins rather than either being a hard error.
/// `clap`'s derived `Cli` struct only keeps the final parsed values, not
/// where each flag appeared, so this consults the raw `ArgMatches` (built
/// separately in `main`) for each flag's occurrence index and compares them
/// directly.
fn resolve_discovery(cli: &Cli, matches: &clap::ArgMatches) -> Discovery {
    match (cli.scan_bad_blocks, &cli.bad_block_list) {
        (false, None) => Discovery::None,
        (true, None) => Discovery::Scan,
        (false, Some(path)) => Discovery::List(path.clone()),
        (true, Some(path)) => {
            let c_idx = matches.index_of("scan_bad_blocks");
            let l_idx = matches.index_of("bad_block_list");
            if l_idx > c_idx {
                Discovery::List(path.clone())
            } else {
                Discovery::Scan
            }
        }
    }
}

/// `-N`/`-B`, overridden by a trailing positional count if present — see
/// the doc comment on `Cli::positional_count`.
fn resolve_requested_sectors(cli: &Cli) -> u64 {
    let mut requested = cli
        .log2_sector_count
        .map(|k| 1u64 << k)
        .or(cli.sector_count)
        .unwrap_or(0);
    if let Some(n) = cli.positional_count {
        requested = n;
    }
    requested
}

/// Total size of the already-open target, in octets.
///
/// `stat(2)`'s `st_size` (what `std::fs::metadata` reports) is meaningless
/// for a block-special file on Linux — the kernel reports `0`, not the
/// device's capacity, since capacity lives in the block layer rather than
/// the inode. `mkfs.vmufat.c`'s `calculate_vmuparams` sidesteps this by
/// `lseek`ing the already-open descriptor to `SEEK_END` instead of
/// `stat`ing the path; this does the same via `Seek::seek`, which works
/// identically whether `file` is a real block device or (as in this crate's
/// tests) a plain regular file, so there is exactly one code path for both.
fn device_size(file: &mut File, path: &str) -> Result<u64, Error> {
    file.seek(SeekFrom::End(0)).map_err(|source| Error::Stat {
        path: path.to_string(),
        source,
    })
}

/// Refuse to format a device that's in `/proc/mounts`. Plain text parsing,
/// same spirit as the source's `setmntent`/`getmntent` use — nothing this
/// simple needs a crate.
fn check_not_mounted(device: &str) -> Result<(), Error> {
    let f = match std::fs::File::open("/proc/mounts") {
        Ok(f) => f,
        // No mount table to consult; nothing to refuse on.
        Err(_) => return Ok(()),
    };
    for line in std::io::BufReader::new(f).lines() {
        let line = line.map_err(Error::Io)?;
        if let Some(field) = line.split_whitespace().next() {
            if field == device {
                return Err(Error::AlreadyMounted(device.to_string()));
            }
        }
    }
    Ok(())
}
