//! Loading patch definitions from the `patches/` tree.
//!
//! ```text
//! patches/
//!   bin/<packed file>/.fileinfo.json     expected original size and hash
//!   bin/<packed file>/<category>.json    byte replacements
//!   upk/<name>                           archive patcher instructions
//!   ini/**/*.json                        { file: { section: { key: value } } }
//!   mechsetup/*.json                     { mech: { initial: {..}, persist: {..} } }
//! ```

use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, IoResultExt, Result};
use crate::patch_format::{
    ArchiveTextPatch, BinaryFragment, BinaryPatchSet, ConfigPatch, PatchDefinitions, RecordPatchSet,
    TargetFileInfo, TargetFileSpec,
};

const FILE_INFO: &str = ".fileinfo.json";

/// Yields every patch definition for a build.
pub trait PatchSource {
    fn load(&self) -> Result<PatchDefinitions>;
}

/// Reads definitions from a directory tree, in file-name order.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PatchSource for DirectorySource {
    fn load(&self) -> Result<PatchDefinitions> {
        let definitions = PatchDefinitions {
            documents: ingest_documents(&self.root.join("ini"))?,
            records: ingest_records(&self.root.join("mechsetup"))?,
            binary: ingest_binary(&self.root.join("bin"))?,
            archive: ingest_archive(&self.root.join("upk"))?,
        };
        log::info!("{} ini patch files.", definitions.documents.len());
        log::info!("{} mech setups.", definitions.records.len());
        log::info!("{} binary patches.", definitions.binary.len());
        log::info!("{} upk patches.", definitions.archive.len());
        Ok(definitions)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).at(path)?;
    serde_json::from_str(&text).map_err(|e| BuildError::format(path, e))
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn ingest_binary(dir: &Path) -> Result<Vec<BinaryPatchSet>> {
    let mut sets = Vec::new();

    for folder in crate::util::sorted_entries(dir)? {
        if !folder.is_dir() {
            continue;
        }
        let info_path = folder.join(FILE_INFO);
        if !info_path.is_file() {
            return Err(BuildError::format(&folder, format!("missing {FILE_INFO}")));
        }
        let info: TargetFileInfo = read_json(&info_path)?;

        let mut set = BinaryPatchSet::new(TargetFileSpec {
            path: file_name(&folder),
            original_size: info.original_packed_size,
            original_hash: info.hash_original,
        });

        for fragment_path in crate::util::sorted_entries(&folder)? {
            if fragment_path == info_path || !fragment_path.is_file() || !is_json(&fragment_path) {
                continue;
            }
            let fragment: BinaryFragment = read_json(&fragment_path)?;
            let category = match fragment.category {
                Some(category) => category,
                None => fragment_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            set.add_fragment(&category, fragment.replacements);
        }

        sets.push(set);
    }

    Ok(sets)
}

fn ingest_archive(dir: &Path) -> Result<Vec<ArchiveTextPatch>> {
    let mut patches = Vec::new();
    for path in crate::util::sorted_entries(dir)? {
        if !path.is_file() {
            continue;
        }
        let bytes = fs::read(&path).at(&path)?;
        let body = String::from_utf8(bytes).map_err(|e| BuildError::format(&path, e))?;
        patches.push(ArchiveTextPatch {
            name: file_name(&path),
            body,
        });
    }
    Ok(patches)
}

fn ingest_documents(dir: &Path) -> Result<ConfigPatch> {
    let mut merged = ConfigPatch::new();
    for path in crate::util::sorted_files_recursive(dir)? {
        if !is_json(&path) {
            continue;
        }
        let fragment: ConfigPatch = read_json(&path)?;
        for (file, sections) in fragment {
            let target = merged.get_or_insert_with(&file, Default::default);
            for (section, keys) in sections {
                target.get_or_insert_with(&section, Default::default).overlay(&keys);
            }
        }
    }
    Ok(merged)
}

fn ingest_records(dir: &Path) -> Result<RecordPatchSet> {
    let mut merged = RecordPatchSet::new();
    for path in crate::util::sorted_entries(dir)? {
        if !path.is_file() || !is_json(&path) {
            continue;
        }
        let fragment: RecordPatchSet = read_json(&path)?;
        for (name, patch) in fragment {
            let target = merged.get_or_insert_with(&name, Default::default);
            target.initial.overlay(&patch.initial);
            target.persist.overlay(&patch.persist);
        }
    }
    Ok(merged)
}
