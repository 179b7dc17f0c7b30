use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::backup;
use crate::config::BuildContext;
use crate::error::{IoResultExt, Result};
use crate::ordered::OrderedMap;
use crate::patch_format::{
    packed_target_path, AppliedByteEdit, BinaryPatchSet, ByteEdit, PatchOperation,
};
use crate::util;

/// An edit whose expected bytes were not found. Counted and reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub category: String,
    pub offset: u64,
    pub expected: Vec<u8>,
    pub actual: Vec<u8>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {} > [ FAIL ] ( Mismatch )\n Expected: {:?}\n Got:      {:?}",
            self.category,
            util::hex_offset(self.offset),
            util::hex_bytes(&self.expected),
            util::hex_bytes(&self.actual)
        )
    }
}

#[derive(Debug, Default)]
pub struct EditOutcome {
    pub applied: Vec<AppliedByteEdit>,
    pub mismatches: Vec<Mismatch>,
}

/// Applied and skipped edit counts for one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTotals {
    pub target: String,
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct BinaryPassReport {
    pub total: usize,
    pub errors: usize,
    pub files: Vec<FileTotals>,
    pub operations: Vec<PatchOperation>,
    /// (game-relative path, hash after patching)
    pub target_hashes: Vec<(String, String)>,
}

/// Verify and write every edit, category by category, in order.
///
/// Reads `from.len()` bytes at the offset; only an exact match lets `to` be
/// written. A mismatch leaves the file untouched at that offset and
/// processing moves on to the next edit.
pub fn apply_edits<F: Read + Write + Seek>(
    file: &mut F,
    target_name: &str,
    categories: &OrderedMap<Vec<ByteEdit>>,
) -> io::Result<EditOutcome> {
    let mut outcome = EditOutcome::default();

    for (category, edits) in categories.iter() {
        for edit in edits {
            let offset = util::hex_offset(edit.offset);
            let label = format!("({category}) ");
            let actual = util::read_range(file, edit.offset, edit.from.len())?;

            if actual != edit.from {
                let mismatch = Mismatch {
                    category: category.to_string(),
                    offset: edit.offset,
                    expected: edit.from.clone(),
                    actual,
                };
                log::warn!("{target_name}: {mismatch}");
                outcome.mismatches.push(mismatch);
                continue;
            }

            file.seek(SeekFrom::Start(edit.offset))?;
            file.write_all(&edit.to)?;
            log::info!("{label:<12}{target_name}:{offset} > [ PASS ]");

            outcome.applied.push(AppliedByteEdit {
                comment: format!("({category}) {offset}"),
                offset,
                from: util::hex_bytes(&edit.from),
                to: util::hex_bytes(&edit.to),
                category: category.to_string(),
            });
        }
    }

    Ok(outcome)
}

/// Baseline, back up, decompress, edit and hash one packed file.
pub fn patch_target(
    ctx: &BuildContext,
    set: &BinaryPatchSet,
) -> Result<(PatchOperation, EditOutcome)> {
    let target = &set.target;
    let path = ctx.packed_dir.join(&target.path);
    log::info!(
        "{} ({} edits in {} categories)",
        target.path,
        set.edit_count(),
        set.categories.len()
    );

    backup::ensure_baseline(&path, target.original_size, &target.original_hash)?;

    log::info!("{} [CREATE BACKUP FILE]", target.path);
    backup::backup(&path)?;

    log::info!("{} [DECOMPRESS UPK]", target.path);
    ctx.tools.decompress(&path, &ctx.unpacked_dir, true)?;

    let outcome = {
        let mut file = OpenOptions::new().read(true).write(true).open(&path).at(&path)?;
        let outcome = apply_edits(&mut file, &target.path, &set.categories).at(&path)?;
        file.flush().at(&path)?;
        outcome
    };

    let applied_hash = util::hash_file(&path)?;
    log::info!("Patched Hash: {applied_hash}");

    let operation = PatchOperation::BinaryFilePatcher {
        target_path: packed_target_path(&target.path),
        original_size: target.original_size,
        required_hash: target.original_hash.clone(),
        applied_hash,
        actions: outcome.applied.clone(),
    };
    Ok((operation, outcome))
}

/// Binary pass over every target file, one at a time.
pub fn apply_binary_patches(
    ctx: &BuildContext,
    sets: &[BinaryPatchSet],
) -> Result<BinaryPassReport> {
    let mut report = BinaryPassReport::default();

    for set in sets {
        let (operation, outcome) = patch_target(ctx, set)?;

        let totals = FileTotals {
            target: set.target.path.clone(),
            applied: outcome.applied.len(),
            skipped: outcome.mismatches.len(),
        };
        log::info!(
            "{}: {} applied, {} errors / skipped",
            totals.target,
            totals.applied,
            totals.skipped
        );
        report.total += totals.applied + totals.skipped;
        report.errors += totals.skipped;
        report.files.push(totals);
        if let PatchOperation::BinaryFilePatcher {
            target_path,
            applied_hash,
            ..
        } = &operation
        {
            report.target_hashes.push((target_path.clone(), applied_hash.clone()));
        }
        report.operations.push(operation);
    }

    log::info!("Total patches: {}", report.total);
    log::info!("Errors / Skipped: {}", report.errors);
    Ok(report)
}
