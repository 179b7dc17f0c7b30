//! Single-generation `.backup` copies of packed files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BaselineError, IoResultExt, Result};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineAction {
    AlreadyBaseline,
    Restored,
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Copy `path` to its `.backup` sibling, replacing any earlier backup.
pub fn backup(path: &Path) -> Result<()> {
    let target = backup_path(path);
    fs::copy(path, &target).at(&target)?;
    Ok(())
}

/// Copy the `.backup` sibling back over `path`.
pub fn restore(path: &Path) -> Result<()> {
    let source = backup_path(path);
    fs::copy(&source, path).at(path)?;
    Ok(())
}

/// Make sure the live file is the untouched original, restoring it from the
/// backup when it is not.
pub fn ensure_baseline(
    path: &Path,
    expected_size: u64,
    expected_hash: &str,
) -> Result<BaselineAction> {
    if !path.exists() {
        return Err(BaselineError::GameFileNotFound(path.to_path_buf()).into());
    }

    let (size, hash) = file_state(path)?;
    if size == expected_size && hash.eq_ignore_ascii_case(expected_hash) {
        return Ok(BaselineAction::AlreadyBaseline);
    }

    if !backup_path(path).exists() {
        return Err(BaselineError::MissingBackup {
            path: path.to_path_buf(),
            expected_size,
            actual_size: size,
        }
        .into());
    }

    log::info!("{} [RESTORE FROM BACKUP]", path.display());
    restore(path)?;

    let (size, hash) = file_state(path)?;
    if size != expected_size || !hash.eq_ignore_ascii_case(expected_hash) {
        return Err(BaselineError::BackupMismatch {
            path: path.to_path_buf(),
            expected_size,
            actual_size: size,
            expected_hash: expected_hash.to_string(),
            actual_hash: hash,
        }
        .into());
    }

    Ok(BaselineAction::Restored)
}

fn file_state(path: &Path) -> Result<(u64, String)> {
    let size = fs::metadata(path).at(path)?.len();
    Ok((size, util::hash_file(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;

    fn original() -> Vec<u8> {
        (0..100u8).collect()
    }

    #[test]
    fn test_already_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Robots.u");
        fs::write(&path, original()).unwrap();

        let action = ensure_baseline(&path, 100, &util::hash_bytes(&original())).unwrap();
        assert_eq!(action, BaselineAction::AlreadyBaseline);
    }

    #[test]
    fn test_restores_from_backup_when_size_differs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Robots.u");
        fs::write(&path, original()).unwrap();
        backup(&path).unwrap();
        fs::write(&path, b"decompressed and patched").unwrap();

        let action = ensure_baseline(&path, 100, &util::hash_bytes(&original())).unwrap();
        assert_eq!(action, BaselineAction::Restored);
        assert_eq!(fs::metadata(&path).unwrap().len(), 100);
        assert_eq!(fs::read(&path).unwrap(), original());
    }

    #[test]
    fn test_restores_when_only_content_differs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Robots.u");
        fs::write(&path, original()).unwrap();
        backup(&path).unwrap();
        fs::write(&path, vec![0u8; 100]).unwrap();

        let action = ensure_baseline(&path, 100, &util::hash_bytes(&original())).unwrap();
        assert_eq!(action, BaselineAction::Restored);
    }

    #[test]
    fn test_missing_backup_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Robots.u");
        fs::write(&path, b"short").unwrap();

        let err = ensure_baseline(&path, 100, "whatever").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Baseline(BaselineError::MissingBackup { actual_size: 5, .. })
        ));
    }

    #[test]
    fn test_bad_backup_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Robots.u");
        fs::write(&path, b"short").unwrap();
        backup(&path).unwrap();

        let err = ensure_baseline(&path, 100, &util::hash_bytes(&original())).unwrap_err();
        assert!(matches!(err, BuildError::Baseline(BaselineError::BackupMismatch { .. })));
    }

    #[test]
    fn test_missing_game_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_baseline(&dir.path().join("Robots.u"), 1, "x").unwrap_err();
        assert!(matches!(err, BuildError::Baseline(BaselineError::GameFileNotFound(_))));
    }

    #[test]
    fn test_backup_overwrites_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.u");
        fs::write(&path, b"one").unwrap();
        backup(&path).unwrap();
        fs::write(&path, b"two").unwrap();
        backup(&path).unwrap();
        assert_eq!(fs::read(backup_path(&path)).unwrap(), b"two");
        assert!(backup_path(&path).ends_with("a.u.backup"));
    }
}
