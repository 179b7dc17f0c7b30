//! Sectioned key/value config format used by the game's `.ini` and `.int` files.
//!
//! Keys may repeat inside a section; repeats are kept as an ordered list and
//! written back as repeated lines.

use crate::ordered::OrderedMap;

/// UTF-8 byte order mark. Dropped from the start of a file before parsing.
pub const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniValue {
    Scalar(String),
    Repeated(Vec<String>),
}

impl IniValue {
    fn push(&mut self, value: String) {
        match self {
            IniValue::Scalar(first) => {
                let first = std::mem::take(first);
                *self = IniValue::Repeated(vec![first, value]);
            }
            IniValue::Repeated(values) => values.push(value),
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            IniValue::Scalar(v) => std::slice::from_ref(v),
            IniValue::Repeated(vs) => vs,
        }
    }
}

pub type Section = OrderedMap<IniValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    sections: OrderedMap<Section>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
        let mut sections: OrderedMap<Section> = OrderedMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            if let Some(name) = section_header(line) {
                // A repeated header reopens the section instead of clearing it.
                sections.get_or_insert_with(name, Section::new);
                current = Some(name.to_string());
                continue;
            }

            let Some(section) = current.as_deref().and_then(|name| sections.get_mut(name)) else {
                continue;
            };
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim().to_string();

            match section.get_mut(key) {
                Some(existing) => existing.push(value),
                None => {
                    section.insert(key, IniValue::Scalar(value));
                }
            }
        }

        IniDocument { sections }
    }

    /// CRLF-delimited text, one blank line after each section.
    pub fn serialize(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (name, section) in self.sections.iter() {
            lines.push(format!("[{name}]"));
            for (key, value) in section.iter() {
                for v in value.values() {
                    lines.push(format!("{key}={v}"));
                }
            }
            lines.push(String::new());
        }
        lines.join("\r\n")
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&IniValue> {
        self.sections.get(section).and_then(|s| s.get(key))
    }

    /// Sets `key` to a single value, replacing any repeated values.
    /// Returns whether the key existed before. Missing sections are appended.
    pub fn set(&mut self, section: &str, key: &str, value: String) -> bool {
        let section = self.sections.get_or_insert_with(section, Section::new);
        section.insert(key, IniValue::Scalar(value)).is_some()
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter()
    }
}

/// `[Engine.GameInfo]` -> `Engine.GameInfo`. The closing bracket must end the line.
fn section_header(line: &str) -> Option<&str> {
    let line = line.trim_end();
    let open = line.find('[')?;
    let inner = line[open + 1..].strip_suffix(']')?;
    // Only whitespace may precede the header.
    if !line[..open].trim().is_empty() {
        return None;
    }
    Some(inner)
}
