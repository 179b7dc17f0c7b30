//! Declarative merges over the two text config formats.
//!
//! Both merges are pure functions of (baseline document, patch) and return the
//! new document plus what was done; the `apply_*` wrappers handle file I/O.

use std::fs;

use crate::config::BuildContext;
use crate::error::{IoResultExt, Result};
use crate::ini::IniDocument;
use crate::mechsetup::{MechSetupDocument, Record};
use crate::ordered::OrderedMap;
use crate::patch_format::{
    ConfigPatch, DocumentAction, DocumentPatch, PatchOperation, RecordPatchSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChange {
    /// The key existed and was overwritten
    Set,
    /// The key was added
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Deleted(String),
    Created(String),
    /// Rebuilt from the template because of clean-slate mode
    Wiped(String),
    Updated(String),
}

/// Last writer wins, per key. A repeated key collapses to the single new value.
pub fn merge_document(
    mut doc: IniDocument,
    patch: &DocumentPatch,
) -> (IniDocument, Vec<(DocumentAction, KeyChange)>) {
    let mut actions = Vec::new();
    for (section, keys) in patch.iter() {
        for (key, value) in keys.iter() {
            if let Some(previous) = doc.get(section, key) {
                log::debug!("  [{section}] {key}: {} -> {value}", previous.values().join(", "));
            }
            let existed = doc.set(section, key, value.to_string());
            let change = if existed { KeyChange::Set } else { KeyChange::Create };
            actions.push((
                DocumentAction {
                    section: section.to_string(),
                    key: key.to_string(),
                    value: value.clone(),
                },
                change,
            ));
        }
    }
    (doc, actions)
}

/// 1. Drop records the patch set doesn't mention.
/// 2. Records that are new (or every patched record, with `clean_slate`) start
///    from `template` with `initial` on top.
/// 3. `persist` always goes on last.
pub fn merge_records(
    mut doc: MechSetupDocument,
    patches: &RecordPatchSet,
    template: &Record,
    clean_slate: bool,
) -> (MechSetupDocument, Vec<RecordChange>) {
    let mut changes = Vec::new();

    doc.records.retain(|name, _| {
        let keep = patches.contains_key(name);
        if !keep {
            changes.push(RecordChange::Deleted(name.to_string()));
        }
        keep
    });

    for (name, patch) in patches.iter() {
        let exists = doc.records.contains_key(name);
        if !exists || clean_slate {
            let mut record = template.clone();
            record.overlay(&stringify(&patch.initial));
            doc.records.insert(name, record);
            changes.push(if exists {
                RecordChange::Wiped(name.to_string())
            } else {
                RecordChange::Created(name.to_string())
            });
        } else {
            changes.push(RecordChange::Updated(name.to_string()));
        }

        let record = doc.records.get_or_insert_with(name, Record::new);
        record.overlay(&stringify(&patch.persist));
    }

    (doc, changes)
}

fn stringify(values: &OrderedMap<crate::ordered::Scalar>) -> Record {
    values.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[derive(Debug)]
pub struct DocumentPassReport {
    pub operations: Vec<PatchOperation>,
    pub keys_set: usize,
    pub keys_created: usize,
}

/// Sectioned-document pass: one `documentPatcher` operation per target file.
pub fn apply_document_patches(
    ctx: &BuildContext,
    patches: &ConfigPatch,
) -> Result<DocumentPassReport> {
    let mut report = DocumentPassReport {
        operations: Vec::new(),
        keys_set: 0,
        keys_created: 0,
    };

    for (file_name, patch) in patches.iter() {
        log::info!("{file_name}");
        let path = ctx.resolve_document(file_name);
        let text = fs::read_to_string(&path).at(&path)?;

        let (doc, actions) = merge_document(IniDocument::parse(&text), patch);

        let mut recorded = Vec::with_capacity(actions.len());
        for (action, change) in actions {
            match change {
                KeyChange::Set => {
                    report.keys_set += 1;
                    log::info!("  [SETVAL]: {} = {}", action.key, action.value);
                }
                KeyChange::Create => {
                    report.keys_created += 1;
                    log::info!("  [CREATE]: {} = {}", action.key, action.value);
                }
            }
            recorded.push(action);
        }

        fs::write(&path, doc.serialize()).at(&path)?;
        log::info!("File saved.");
        log::debug!("  {} sections in {}", doc.sections().count(), path.display());

        report.operations.push(PatchOperation::DocumentPatcher {
            file: file_name.to_string(),
            actions: recorded,
        });
    }

    Ok(report)
}

#[derive(Debug)]
pub struct RecordPassReport {
    pub operation: PatchOperation,
    pub records: usize,
    pub changes: Vec<RecordChange>,
}

/// Multi-record pass. The manifest stores the full patch set, not a diff;
/// clients re-run the merge themselves.
pub fn apply_record_patches(
    ctx: &BuildContext,
    patches: &RecordPatchSet,
) -> Result<RecordPassReport> {
    let data = serde_json::to_string(patches)
        .map_err(|e| crate::error::BuildError::format(&ctx.patches_dir, e))?;
    let template = ctx.load_record_template()?;

    let path = &ctx.mechsetup_file;
    let text = fs::read_to_string(path).at(path)?;
    let baseline = MechSetupDocument::parse(&text);
    let (doc, changes) = merge_records(baseline, patches, &template, ctx.clean_slate);

    for change in &changes {
        match change {
            RecordChange::Deleted(name) => log::info!("[DELETE]: {name}"),
            RecordChange::Created(name) => log::info!("[CREATE]: {name}"),
            RecordChange::Wiped(name) => log::info!("[WIPE]: {name}"),
            RecordChange::Updated(name) => log::debug!("[PERSIST]: {name}"),
        }
    }

    fs::write(path, doc.serialize()).at(path)?;
    log::info!("Setups written to {}", path.display());

    Ok(RecordPassReport {
        operation: PatchOperation::ConfigPatcher { data },
        records: doc.records.len(),
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary_patch::tests::{test_context, FakeTools};
    use crate::ini::IniValue;
    use crate::ordered::Scalar;
    use crate::patch_format::RecordPatch;

    fn scalars(pairs: &[(&str, &str)]) -> OrderedMap<Scalar> {
        pairs.iter().map(|(k, v)| (k.to_string(), Scalar::from(*v))).collect()
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn doc_with(records: &[(&str, Record)]) -> MechSetupDocument {
        let mut doc = MechSetupDocument::default();
        for (name, r) in records {
            doc.records.insert(*name, r.clone());
        }
        doc
    }

    #[test]
    fn test_merge_document_reports_set_and_create() {
        let doc = IniDocument::parse("[Engine]\r\nA=1\r\nList=x\r\nList=y\r\n");
        let mut patch = DocumentPatch::new();
        patch.insert("Engine", scalars(&[("A", "2"), ("List", "z"), ("B", "3")]));
        patch.insert("New", scalars(&[("C", "4")]));

        let (doc, actions) = merge_document(doc, &patch);
        let changes: Vec<_> = actions.iter().map(|(a, c)| (a.key.as_str(), *c)).collect();
        assert_eq!(
            changes,
            vec![
                ("A", KeyChange::Set),
                ("List", KeyChange::Set),
                ("B", KeyChange::Create),
                ("C", KeyChange::Create)
            ]
        );
        assert_eq!(doc.get("Engine", "List"), Some(&IniValue::Scalar("z".into())));
        assert_eq!(doc.get("New", "C"), Some(&IniValue::Scalar("4".into())));
    }

    #[test]
    fn test_merge_records_deletes_unpatched_and_persist_wins() {
        let baseline = doc_with(&[
            ("A", record(&[("x", "0"), ("y", "keep")])),
            ("B", record(&[("z", "1")])),
        ]);
        let mut patches = RecordPatchSet::new();
        patches.insert(
            "A",
            RecordPatch {
                initial: scalars(&[("x", "1")]),
                persist: scalars(&[("x", "2")]),
            },
        );

        let (doc, changes) = merge_records(baseline, &patches, &Record::new(), false);
        assert_eq!(doc.records.keys().collect::<Vec<_>>(), vec!["A"]);
        // Existing record: initial is ignored, persist lands on top of the baseline.
        assert_eq!(doc.records.get("A").unwrap(), &record(&[("x", "2"), ("y", "keep")]));
        assert_eq!(
            changes,
            vec![RecordChange::Deleted("B".into()), RecordChange::Updated("A".into())]
        );
    }

    #[test]
    fn test_merge_records_clean_slate_rebuilds_from_template() {
        let baseline = doc_with(&[("A", record(&[("x", "0"), ("y", "stale")]))]);
        let mut patches = RecordPatchSet::new();
        patches.insert(
            "A",
            RecordPatch {
                initial: scalars(&[("x", "1")]),
                persist: scalars(&[("x", "2")]),
            },
        );

        let (doc, changes) = merge_records(baseline, &patches, &Record::new(), true);
        assert_eq!(doc.records.get("A").unwrap(), &record(&[("x", "2")]));
        assert_eq!(changes, vec![RecordChange::Wiped("A".into())]);
    }

    #[test]
    fn test_merge_records_new_record_layers() {
        let template = record(&[("Weapon", "default"), ("Paint", "0"), ("Level", "1")]);
        let mut patches = RecordPatchSet::new();
        patches.insert(
            "C",
            RecordPatch {
                initial: scalars(&[("Weapon", "SMC"), ("Level", "5")]),
                persist: scalars(&[("Level", "9"), ("Extra", "e")]),
            },
        );

        let (doc, changes) =
            merge_records(MechSetupDocument::default(), &patches, &template, false);
        assert_eq!(
            doc.records.get("C").unwrap(),
            &record(&[("Weapon", "SMC"), ("Paint", "0"), ("Level", "9"), ("Extra", "e")])
        );
        assert_eq!(changes, vec![RecordChange::Created("C".into())]);
    }

    #[test]
    fn test_apply_document_patches_writes_resolved_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), FakeTools::default());
        fs::create_dir_all(&ctx.default_config_dir).unwrap();
        fs::create_dir_all(&ctx.config_dir).unwrap();
        let default_game = ctx.default_config_dir.join("DefaultGame.ini");
        let user_game = ctx.config_dir.join("HawkenGame.ini");
        fs::write(&default_game, "[Game]\r\nSpeed=1\r\n").unwrap();
        fs::write(&user_game, "[Game]\r\n").unwrap();

        let mut patches = ConfigPatch::new();
        let mut default_patch = DocumentPatch::new();
        default_patch.insert("Game", scalars(&[("Speed", "2")]));
        patches.insert("DefaultGame.ini", default_patch);
        let mut user_patch = DocumentPatch::new();
        user_patch.insert("Game", scalars(&[("Fov", "90")]));
        patches.insert("HawkenGame.ini", user_patch);

        let report = apply_document_patches(&ctx, &patches).unwrap();
        assert_eq!((report.keys_set, report.keys_created), (1, 1));
        assert_eq!(fs::read_to_string(&default_game).unwrap(), "[Game]\r\nSpeed=2\r\n");
        assert_eq!(fs::read_to_string(&user_game).unwrap(), "[Game]\r\nFov=90\r\n");

        let PatchOperation::DocumentPatcher { file, actions } = &report.operations[0] else {
            panic!("unexpected operation");
        };
        assert_eq!(file, "DefaultGame.ini");
        assert_eq!(actions[0].value, Scalar::from("2"));
    }

    #[test]
    fn test_apply_record_patches_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), FakeTools::default());
        fs::write(
            &ctx.mechsetup_file,
            "Version=11\r\nNumMechs=2\r\nMechName=A\r\nx=0\r\nMechName=B\r\nz=1",
        )
        .unwrap();
        fs::write(&ctx.record_template, r#"{"Paint": 3}"#).unwrap();

        let mut patches = RecordPatchSet::new();
        patches.insert(
            "A",
            RecordPatch {
                initial: scalars(&[("x", "1")]),
                persist: scalars(&[("x", "2")]),
            },
        );
        patches.insert("N", RecordPatch::default());

        let report = apply_record_patches(&ctx, &patches).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(
            fs::read_to_string(&ctx.mechsetup_file).unwrap(),
            "Version=11\r\nNumMechs=2\r\nMechName=A\r\nx=2\r\nMechName=N\r\nPaint=3"
        );
        let PatchOperation::ConfigPatcher { data } = &report.operation else {
            panic!("unexpected operation");
        };
        assert_eq!(
            data,
            r#"{"A":{"initial":{"x":"1"},"persist":{"x":"2"}},"N":{"initial":{},"persist":{}}}"#
        );
    }
}
