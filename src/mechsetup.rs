//! `MechSetup_default.txt`: one block of settings per mech.
//!
//! ```text
//! Version=11
//! NumMechs=2
//! MechName=Berserker
//! Weapon=SMC
//! ...
//! ```
//!
//! Keys repeating inside one record are stored as `key._duplicate`,
//! `key._duplicate._duplicate`, ... and collapsed back on write.

use crate::ini::BYTE_ORDER_MARK;
use crate::ordered::OrderedMap;

pub const FORMAT_VERSION: &str = "11";

const RECORD_KEY: &str = "MechName";
const VERSION_KEY: &str = "Version";
const COUNT_KEY: &str = "NumMechs";
const DUPLICATE_SUFFIX: &str = "._duplicate";

pub type Record = OrderedMap<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct MechSetupDocument {
    pub version: String,
    pub records: OrderedMap<Record>,
}

impl Default for MechSetupDocument {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            records: OrderedMap::new(),
        }
    }
}

impl MechSetupDocument {
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
        let mut doc = MechSetupDocument::default();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            if key == RECORD_KEY {
                // A nameless record swallows its lines.
                if value.is_empty() {
                    current = None;
                    continue;
                }
                doc.records.get_or_insert_with(value, Record::new);
                current = Some(value.to_string());
                continue;
            }

            let Some(record) = current.as_deref().and_then(|name| doc.records.get_mut(name)) else {
                // Header lines come before the first record.
                if key == VERSION_KEY {
                    doc.version = value.to_string();
                }
                continue;
            };

            let mut key = key.to_string();
            while record.contains_key(&key) {
                key.push_str(DUPLICATE_SUFFIX);
            }
            record.insert(key, value.to_string());
        }

        doc
    }

    /// CRLF-delimited text with `Version` and `NumMechs` headers.
    pub fn serialize(&self) -> String {
        let mut lines = vec![
            format!("{VERSION_KEY}={}", self.version),
            format!("{COUNT_KEY}={}", self.records.len()),
        ];
        for (name, record) in self.records.iter() {
            lines.push(format!("{RECORD_KEY}={name}"));
            for (key, value) in record.iter() {
                lines.push(format!("{}={value}", original_key(key)));
            }
        }
        lines.join("\r\n")
    }
}

/// `Slot._duplicate._duplicate` -> `Slot`
fn original_key(key: &str) -> &str {
    match key.find(DUPLICATE_SUFFIX) {
        Some(i) => &key[..i],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Version=11\r\n\
        NumMechs=2\r\n\
        Stray=before any record\r\n\
        MechName=Berserker\r\n\
        Weapon=SMC\r\n\
        Item=Repair\r\n\
        Item=Boost\r\n\
        Item=Shield\r\n\
        MechName=Sharpshooter\r\n\
        Weapon=Sabot\r\n\
        Formula=a=b";

    #[test]
    fn test_parse_records() {
        let doc = MechSetupDocument::parse(SAMPLE);
        assert_eq!(doc.version, "11");
        assert_eq!(doc.records.keys().collect::<Vec<_>>(), vec!["Berserker", "Sharpshooter"]);

        let sharpshooter = doc.records.get("Sharpshooter").unwrap();
        assert_eq!(sharpshooter.get("Weapon").map(String::as_str), Some("Sabot"));
        assert_eq!(sharpshooter.get("Formula").map(String::as_str), Some("a=b"));
        assert!(doc.records.iter().all(|(_, r)| !r.contains_key("Stray")));
    }

    #[test]
    fn test_duplicate_keys_are_renamed() {
        let doc = MechSetupDocument::parse(SAMPLE);
        let berserker = doc.records.get("Berserker").unwrap();
        assert_eq!(
            berserker.keys().collect::<Vec<_>>(),
            vec!["Weapon", "Item", "Item._duplicate", "Item._duplicate._duplicate"]
        );
        assert_eq!(
            berserker.get("Item._duplicate._duplicate").map(String::as_str),
            Some("Shield")
        );
    }

    #[test]
    fn test_serialize_collapses_renamed_keys() {
        let doc = MechSetupDocument::parse(SAMPLE);
        let text = doc.serialize();
        assert_eq!(
            text,
            "Version=11\r\nNumMechs=2\r\nMechName=Berserker\r\nWeapon=SMC\r\nItem=Repair\r\n\
             Item=Boost\r\nItem=Shield\r\nMechName=Sharpshooter\r\nWeapon=Sabot\r\nFormula=a=b"
        );
        assert!(!text.contains(DUPLICATE_SUFFIX));
    }

    #[test]
    fn test_round_trip() {
        let doc = MechSetupDocument::parse(SAMPLE);
        assert_eq!(MechSetupDocument::parse(&doc.serialize()), doc);
    }

    #[test]
    fn test_record_count_header_follows_content() {
        let mut doc = MechSetupDocument::parse(SAMPLE);
        doc.records.retain(|name, _| name != "Berserker");
        assert!(doc.serialize().starts_with("Version=11\r\nNumMechs=1\r\nMechName=Sharpshooter"));
    }

    #[test]
    fn test_leading_bom_keeps_version() {
        let doc = MechSetupDocument::parse("\u{feff}Version=12\r\nNumMechs=1\r\nMechName=A\r\nx=1");
        assert_eq!(doc.version, "12");
        assert!(doc.serialize().starts_with("Version=12\r\n"));
    }

    #[test]
    fn test_empty_record_name_discards_lines() {
        let doc = MechSetupDocument::parse("Version=11\r\nMechName=\r\nx=1\r\nMechName=A\r\ny=2");
        assert_eq!(doc.records.keys().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(doc.records.get("A").unwrap().keys().collect::<Vec<_>>(), vec!["y"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        /// Keys come from a tiny alphabet so records repeat them often.
        fn record() -> impl Strategy<Value = (String, Vec<(String, String)>)> {
            (
                "[A-Z][A-Za-z0-9_]{0,8}",
                prop::collection::vec(("[a-c]", "[A-Za-z0-9 =.]{0,10}"), 0..8),
            )
        }

        proptest! {
            #[test]
            fn parse_inverts_serialize(
                records in prop::collection::vec(record(), 0..5),
                bom in any::<bool>()
            ) {
                let mut lines =
                    vec!["Version=11".to_string(), format!("NumMechs={}", records.len())];
                for (name, entries) in &records {
                    lines.push(format!("{RECORD_KEY}={name}"));
                    lines.extend(entries.iter().map(|(k, v)| format!("{k}={v}")));
                }
                let prefix = if bom { BYTE_ORDER_MARK.to_string() } else { String::new() };
                let doc = MechSetupDocument::parse(&format!("{prefix}{}", lines.join("\r\n")));

                let names: HashSet<_> = records.iter().map(|(name, _)| name).collect();
                prop_assert_eq!(doc.records.len(), names.len());
                prop_assert_eq!(&doc.version, "11");
                prop_assert_eq!(MechSetupDocument::parse(&doc.serialize()), doc);
            }
        }
    }
}
