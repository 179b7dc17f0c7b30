use std::fs;
use std::path::PathBuf;

use crate::archive_patch;
use crate::binary_patch;
use crate::config::BuildContext;
use crate::config_merge;
use crate::error::{BuildError, IoResultExt, Result};
use crate::ingest::PatchSource;
use crate::patch_format::{PatchPackage, MANIFEST_FILE_NAME};

#[derive(Debug)]
pub struct BuildSummary {
    pub binary_edits: usize,
    pub binary_errors: usize,
    pub archive_fragments: usize,
    pub records_written: usize,
    pub keys_set: usize,
    pub keys_created: usize,
    pub manifest_path: PathBuf,
    pub compressed_path: Option<PathBuf>,
}

/// Ingest everything, then run the passes in their fixed order:
/// binary, archive text, multi-record config, sectioned config.
///
/// The manifest only gets written once every pass has succeeded.
pub fn build_package(
    ctx: &BuildContext,
    source: &dyn PatchSource,
    compress: bool,
) -> Result<(PatchPackage, BuildSummary)> {
    let definitions = source.load()?;
    let mut package = PatchPackage::new(ctx.meta.clone());

    // 1. Binary patches (decompression has to happen before archive patching)
    log::info!("BINARY PATCHING");
    let binary = binary_patch::apply_binary_patches(ctx, &definitions.binary)?;
    package.target_hashes.extend(binary.target_hashes);
    package.operations.extend(binary.operations);

    // 2. Archive text patches
    let mut archive_fragments = 0;
    if definitions.archive.is_empty() {
        log::info!("No upk patches, skipping UPK PATCHING");
    } else {
        log::info!("UPK PATCHING");
        let archive = archive_patch::apply_archive_patches(ctx, &definitions.archive)?;
        archive_fragments = archive.fragments;
        package.target_hashes.insert(archive.target_hash.0, archive.target_hash.1);
        package.operations.push(archive.operation);
    }

    // 3. Multi-record config. An empty patch set would delete every record.
    let mut records_written = 0;
    if definitions.records.is_empty() {
        log::info!("No mech setups, skipping MECHSETUP PATCH");
    } else {
        log::info!("MECHSETUP PATCH");
        let records = config_merge::apply_record_patches(ctx, &definitions.records)?;
        records_written = records.records;
        log::info!("{} record changes", records.changes.len());
        package.operations.push(records.operation);
    }

    // 4. Sectioned config
    log::info!("INI PATCHING");
    let documents = config_merge::apply_document_patches(ctx, &definitions.documents)?;
    package.operations.extend(documents.operations);

    let (manifest_path, compressed_path) = write_manifest(ctx, &package, compress)?;

    let summary = BuildSummary {
        binary_edits: binary.total,
        binary_errors: binary.errors,
        archive_fragments,
        records_written,
        keys_set: documents.keys_set,
        keys_created: documents.keys_created,
        manifest_path,
        compressed_path,
    };
    Ok((package, summary))
}

fn write_manifest(
    ctx: &BuildContext,
    package: &PatchPackage,
    compress: bool,
) -> Result<(PathBuf, Option<PathBuf>)> {
    let json = serde_json::to_vec(package).map_err(|e| BuildError::format(MANIFEST_FILE_NAME, e))?;

    fs::create_dir_all(&ctx.output_dir).at(&ctx.output_dir)?;
    let manifest_path = ctx.output_dir.join(MANIFEST_FILE_NAME);
    fs::write(&manifest_path, &json).at(&manifest_path)?;

    if !compress {
        return Ok((manifest_path, None));
    }
    let compressed_path = ctx.output_dir.join(format!("{MANIFEST_FILE_NAME}.zst"));
    let compressed = zstd::bulk::compress(&json, 3).at(&compressed_path)?;
    fs::write(&compressed_path, compressed).at(&compressed_path)?;
    Ok((manifest_path, Some(compressed_path)))
}
