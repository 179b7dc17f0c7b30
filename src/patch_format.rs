use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ordered::{OrderedMap, Scalar};

/// Name of the manifest written to the output directory.
pub const MANIFEST_FILE_NAME: &str = "gamePatch.json";

/// Game-relative location of packed archives, as recorded in the manifest.
pub const PACKED_PREFIX: &str = "./HawkenGame/CookedPC";

pub fn packed_target_path(file_name: &str) -> String {
    format!("{PACKED_PREFIX}/{file_name}")
}

// ---------------------------------------------------------------------------
// Patch definitions (inputs)
// ---------------------------------------------------------------------------

/// Identity and expected original state of a patchable packed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFileSpec {
    /// File name relative to the packed archive directory.
    pub path: String,
    pub original_size: u64,
    pub original_hash: String,
}

/// `.fileinfo.json` inside a binary patch folder.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetFileInfo {
    #[serde(rename = "originalPackedSize")]
    pub original_packed_size: u64,
    pub hash_original: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ByteEdit {
    pub offset: u64,
    pub from: Vec<u8>,
    pub to: Vec<u8>,
}

/// One binary patch fragment file.
#[derive(Debug, Clone, Deserialize)]
pub struct BinaryFragment {
    #[serde(default)]
    pub category: Option<String>,
    pub replacements: Vec<ByteEdit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPatchSet {
    pub target: TargetFileSpec,
    /// category -> edits, both in ingestion order
    pub categories: OrderedMap<Vec<ByteEdit>>,
}

impl BinaryPatchSet {
    pub fn new(target: TargetFileSpec) -> Self {
        Self {
            target,
            categories: OrderedMap::new(),
        }
    }

    /// Fragments of the same category concatenate.
    pub fn add_fragment(&mut self, category: &str, edits: Vec<ByteEdit>) {
        self.categories
            .get_or_insert_with(category, Vec::new)
            .extend(edits);
    }

    pub fn edit_count(&self) -> usize {
        self.categories.iter().map(|(_, edits)| edits.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTextPatch {
    pub name: String,
    pub body: String,
}

/// section -> key -> value
pub type DocumentPatch = OrderedMap<OrderedMap<Scalar>>;

/// target document name -> section -> key -> value
pub type ConfigPatch = OrderedMap<DocumentPatch>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub initial: OrderedMap<Scalar>,
    #[serde(default)]
    pub persist: OrderedMap<Scalar>,
}

/// record name -> patch
pub type RecordPatchSet = OrderedMap<RecordPatch>;

/// Everything ingested for one build, fully loaded before anything is applied.
#[derive(Debug, Clone, Default)]
pub struct PatchDefinitions {
    pub binary: Vec<BinaryPatchSet>,
    pub archive: Vec<ArchiveTextPatch>,
    pub records: RecordPatchSet,
    pub documents: ConfigPatch,
}

// ---------------------------------------------------------------------------
// Manifest (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMeta {
    pub version: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPackage {
    pub meta: PackageMeta,
    /// game-relative path -> MD5 of the file's final state
    pub target_hashes: BTreeMap<String, String>,
    pub operations: Vec<PatchOperation>,
}

impl PatchPackage {
    pub fn new(meta: PackageMeta) -> Self {
        Self {
            meta,
            target_hashes: BTreeMap::new(),
            operations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operationType", rename_all = "camelCase")]
pub enum PatchOperation {
    #[serde(rename_all = "camelCase")]
    BinaryFilePatcher {
        target_path: String,
        original_size: u64,
        required_hash: String,
        applied_hash: String,
        actions: Vec<AppliedByteEdit>,
    },
    #[serde(rename_all = "camelCase")]
    ArchivePatcher {
        target_path: String,
        data: String,
        required_hash: String,
        resulting_hash: String,
    },
    ConfigPatcher {
        data: String,
    },
    DocumentPatcher {
        file: String,
        actions: Vec<DocumentAction>,
    },
}

/// A byte edit that passed verification and was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedByteEdit {
    pub offset: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub category: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAction {
    pub section: String,
    pub key: String,
    pub value: Scalar,
}
