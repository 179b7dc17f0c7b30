use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, IoResultExt, Result};
use crate::patch_format::PatchPackage;
use crate::util;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    Match,
    Mismatch { actual: String },
    Missing,
}

#[derive(Debug)]
pub struct AuditEntry {
    pub target_path: String,
    pub file: PathBuf,
    pub expected: String,
    pub status: AuditStatus,
}

pub fn read_manifest(path: &Path) -> Result<PatchPackage> {
    let bytes = fs::read(path).at(path)?;
    let bytes = if path.extension().is_some_and(|ext| ext == "zst") {
        zstd::decode_all(&bytes[..]).at(path)?
    } else {
        bytes
    };
    serde_json::from_slice(&bytes).map_err(|e| BuildError::format(path, e))
}

/// Compare every file recorded in `targetHashes` against an install.
pub fn audit_install(package: &PatchPackage, install_dir: &Path) -> Result<Vec<AuditEntry>> {
    let mut entries = Vec::with_capacity(package.target_hashes.len());

    for (target_path, expected) in &package.target_hashes {
        let relative = target_path.strip_prefix("./").unwrap_or(target_path);
        let file = install_dir.join(relative);

        let status = if !file.is_file() {
            AuditStatus::Missing
        } else {
            let actual = util::hash_file(&file)?;
            if actual == *expected {
                AuditStatus::Match
            } else {
                AuditStatus::Mismatch { actual }
            }
        };

        match &status {
            AuditStatus::Match => log::info!("[OK]: {target_path}"),
            AuditStatus::Mismatch { actual } => {
                log::warn!("[MISMATCH]: {target_path} expected {expected}, found {actual}")
            }
            AuditStatus::Missing => log::warn!("[MISSING]: {}", file.display()),
        }

        entries.push(AuditEntry {
            target_path: target_path.clone(),
            file,
            expected: expected.clone(),
            status,
        });
    }

    Ok(entries)
}
