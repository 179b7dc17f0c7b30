use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{IoResultExt, Result};

/// Memory-map a file for read-only access.
///
/// # Safety
/// The mapping is read-only. Callers must not concurrently truncate or replace
/// the underlying file while the `Mmap` is live.
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).at(path)?;
    // SAFETY: We only read from this mapping; the pipeline is single-threaded.
    unsafe { Mmap::map(&file).at(path) }
}

/// Compute the MD5 digest of a byte slice as lowercase hex.
///
/// MD5 is kept for compatibility with existing manifests and launcher clients.
/// It only identifies file states; it is not a security check.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// MD5 of a whole file, lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    // Empty files can't always be mapped, and their digest is fixed anyway.
    if std::fs::metadata(path).at(path)?.len() == 0 {
        return Ok(hash_bytes(&[]));
    }
    let mmap = mmap_file(path)?;
    Ok(hash_bytes(&mmap))
}

/// Read up to `len` bytes at `offset`. Returns fewer bytes if the file ends first.
pub fn read_range<R: Read + Seek>(reader: &mut R, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// `0x0000001a`
pub fn hex_offset(offset: u64) -> String {
    format!("0x{offset:08x}")
}

/// `["0xde", "0xad"]`
pub fn hex_bytes(bytes: &[u8]) -> Vec<String> {
    bytes.iter().map(|b| format!("0x{b:02x}")).collect()
}

/// Direct children of `dir` (files and folders), sorted by file name.
/// A missing directory yields an empty list.
pub fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from).at(dir)?;
        entries.push(entry.into_path());
    }
    Ok(entries)
}

/// Every regular file below `dir`, depth-first, sorted by file name.
pub fn sorted_files_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from).at(dir)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
