//! On-disk dumps of epoch caches and datasets
//!
//! A dump is two magic words followed by the generated buffer, all written
//! as 32-bit words in host byte order. Files are named after the algorithm
//! revision, the first eight seed bytes and the byte order, so dumps from
//! incompatible builds never collide.

use crate::algorithm::next_seed;
use crate::error::{Result, UbqhashError};
use memmap2::{Mmap, MmapMut};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bumped whenever the generated content changes
pub const ALGORITHM_REVISION: u32 = 23;

/// Header words at the start of every dump
pub const DUMP_MAGIC: [u32; 2] = [0xbadd_cafe, 0xfee1_dead];

/// Bytes taken by the header
pub const HEADER_BYTES: usize = DUMP_MAGIC.len() * 4;

/// Byte order of 32-bit words in a buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    /// Little-endian words
    Little,
    /// Big-endian words
    Big,
}

impl Default for Endian {
    fn default() -> Self {
        Self::native()
    }
}

impl Endian {
    /// Byte order of this machine
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// File-name suffix marking big-endian dumps
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Little => "",
            Self::Big => ".be",
        }
    }

    /// Read the word starting at `bytes[0]`
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[..4]);
        match self {
            Self::Little => u32::from_le_bytes(word),
            Self::Big => u32::from_be_bytes(word),
        }
    }

    /// Write `value` into `bytes[..4]`
    pub fn write_u32(self, bytes: &mut [u8], value: u32) {
        let word = match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        };
        bytes[..4].copy_from_slice(&word);
    }

    /// Convert a buffer of little-endian words into this byte order in place
    pub fn convert_le_words(self, buf: &mut [u8]) {
        if self == Self::Big {
            for word in buf.chunks_exact_mut(4) {
                word.reverse();
            }
        }
    }
}

/// Which kind of epoch item a dump holds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpKind {
    /// Verification cache
    Cache,
    /// Full mining dataset
    Dataset,
}

impl DumpKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Dataset => "full",
        }
    }
}

/// Deterministic dump location for an epoch seed
pub fn dump_path(dir: &Path, kind: DumpKind, seed: &[u8; 32], endian: Endian) -> PathBuf {
    dir.join(format!(
        "{}-R{}-{}{}",
        kind.prefix(),
        ALGORITHM_REVISION,
        hex::encode(&seed[..8]),
        endian.file_suffix()
    ))
}

/// Read-only mapping of a validated dump
#[derive(Debug)]
pub struct MappedDump {
    map: Mmap,
    _file: File,
}

impl MappedDump {
    /// Generated content, without the header
    pub fn payload(&self) -> &[u8] {
        &self.map[HEADER_BYTES..]
    }
}

/// Map an existing dump read-only and validate its header and payload size.
pub fn memory_map(path: &Path, size: u64, lock: bool, endian: Endian) -> Result<MappedDump> {
    let file = File::open(path)?;
    // SAFETY: dumps are only ever written to a temporary name and renamed into
    // place once complete, so nothing resizes a file while it is mapped here.
    let map = unsafe { Mmap::map(&file)? };

    if map.len() < HEADER_BYTES {
        return Err(UbqhashError::DumpTooShort {
            len: map.len() as u64,
        });
    }
    for (i, magic) in DUMP_MAGIC.iter().enumerate() {
        if endian.read_u32(&map[i * 4..]) != *magic {
            return Err(UbqhashError::InvalidDumpMagic);
        }
    }
    let actual = (map.len() - HEADER_BYTES) as u64;
    if actual != size {
        return Err(UbqhashError::InvalidDumpSize {
            expected: size,
            actual,
        });
    }
    if lock {
        lock_mapping(&map)?;
    }
    Ok(MappedDump { map, _file: file })
}

#[cfg(unix)]
fn lock_mapping(map: &Mmap) -> Result<()> {
    map.lock()?;
    Ok(())
}

#[cfg(not(unix))]
fn lock_mapping(_map: &Mmap) -> Result<()> {
    warn!("Memory locking of dumps is not supported on this platform");
    Ok(())
}

/// Create a dump of `size` payload bytes at `path`, fill it with `generator`
/// and map the result read-only.
///
/// The content is written to a randomly named sibling file first and renamed
/// into place only once flushed, so readers never observe a partial dump.
pub fn memory_map_and_generate<F>(
    path: &Path,
    size: u64,
    lock: bool,
    endian: Endian,
    generator: F,
) -> Result<MappedDump>
where
    F: FnOnce(&mut [u8]),
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let temp = temp_path(path);

    if let Err(err) = write_dump(&temp, size, endian, generator) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            debug!(path = %temp.display(), %cleanup, "Failed to remove partial dump");
        }
        return Err(err);
    }
    fs::rename(&temp, path)?;

    memory_map(path, size, lock, endian)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", rand::random::<u32>()));
    PathBuf::from(name)
}

fn write_dump<F>(temp: &Path, size: u64, endian: Endian, generator: F) -> Result<()>
where
    F: FnOnce(&mut [u8]),
{
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp)?;
    file.set_len(HEADER_BYTES as u64 + size)?;

    // SAFETY: the temporary file was just created by this process under a
    // random name and is sized before mapping.
    let mut map = unsafe { MmapMut::map_mut(&file)? };
    for (i, magic) in DUMP_MAGIC.iter().enumerate() {
        endian.write_u32(&mut map[i * 4..], *magic);
    }
    generator(&mut map[HEADER_BYTES..]);
    map.flush()?;
    drop(map);
    file.sync_all()?;
    Ok(())
}

/// Delete dumps of epochs `epoch - keep` down to 0.
///
/// Leaves the newest `keep` epochs (including `epoch`) in place.
pub fn prune(dir: &Path, kind: DumpKind, epoch: u64, keep: u64, endian: Endian) {
    let Some(newest_stale) = epoch.checked_sub(keep) else {
        return;
    };
    let mut seed = [0u8; 32];
    for stale in 0..=newest_stale {
        let path = dump_path(dir, kind, &seed, endian);
        match fs::remove_file(&path) {
            Ok(()) => debug!(epoch = stale, path = %path.display(), "Pruned stale ubqhash dump"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(epoch = stale, path = %path.display(), %err, "Failed to prune ubqhash dump"),
        }
        seed = next_seed(&seed);
    }
}
