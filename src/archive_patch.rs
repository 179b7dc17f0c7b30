use std::fs;
use std::path::PathBuf;

use crate::config::BuildContext;
use crate::error::{IoResultExt, Result};
use crate::patch_format::{packed_target_path, ArchiveTextPatch, PatchOperation};
use crate::util;

/// Instruction file handed to the archive patcher.
pub const INSTRUCTION_FILE_NAME: &str = "temp_upkutils_patch.txt";

const FRAGMENT_SEPARATOR: &str = "\r\n\r\n";
const OPENING_PACKAGE_MARKER: &str = "Opening package";

#[derive(Debug)]
pub struct ArchivePassReport {
    pub operation: PatchOperation,
    /// (game-relative path, hash after patching)
    pub target_hash: (String, String),
    pub fragments: usize,
}

/// Fragments in ingestion order, separated by blank lines. No deduplication.
pub fn combine(patches: &[ArchiveTextPatch]) -> String {
    patches
        .iter()
        .map(|p| p.body.as_str())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

/// Merge every archive text patch into one instruction file and run the
/// archive patcher over it. Any tool failure aborts the build; the patches
/// depend on each other and can't be partially applied.
pub fn apply_archive_patches(
    ctx: &BuildContext,
    patches: &[ArchiveTextPatch],
) -> Result<ArchivePassReport> {
    log::info!("Building patchfile from:");
    for patch in patches {
        log::info!("  {}", patch.name);
    }
    let combined = combine(patches);

    let target = ctx.packed_dir.join(&ctx.archive_target);
    let required_hash = util::hash_file(&target)?;

    fs::create_dir_all(&ctx.output_dir).at(&ctx.output_dir)?;
    let instructions: PathBuf = ctx.output_dir.join(INSTRUCTION_FILE_NAME);
    fs::write(&instructions, &combined).at(&instructions)?;
    log::info!("Merged to: {}", instructions.display());

    let stdout = ctx.tools.apply_archive_patch(&ctx.packed_dir, &instructions)?;
    log_tool_output(&stdout);

    let resulting_hash = util::hash_file(&target)?;
    let target_path = packed_target_path(&ctx.archive_target);

    Ok(ArchivePassReport {
        target_hash: (target_path.clone(), resulting_hash.clone()),
        operation: PatchOperation::ArchivePatcher {
            target_path,
            data: combined,
            required_hash,
            resulting_hash,
        },
        fragments: patches.len(),
    })
}

fn log_tool_output(stdout: &str) {
    for line in stdout.lines() {
        if line.contains(OPENING_PACKAGE_MARKER) {
            log::info!("");
        }
        log::info!("  {line}");
    }
}
