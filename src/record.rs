use std::collections::HashMap;

use crate::block::RawBlock;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("block {0} contains no parseable attribute lines")]
    EmptyBlock(usize),
}

/// A single raw attribute as it appeared in the dump. `opaque` marks values
/// that were binary-encoded in the source (base64 text kept as-is).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub value: String,
    pub opaque: bool,
}

/// Ordered, multi-valued attribute mapping for one directory object.
///
/// Lookup keys are case-insensitive; the original casing is retained for raw
/// display. Repeated keys append, preserving input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRecord {
    attrs: Vec<RawAttribute>,
    by_key: HashMap<String, Vec<String>>,
}

impl AttributeRecord {
    pub fn push(&mut self, name: &str, value: &str, opaque: bool) {
        self.by_key
            .entry(name.to_lowercase())
            .or_default()
            .push(value.to_string());
        self.attrs.push(RawAttribute {
            name: name.to_string(),
            value: value.to_string(),
            opaque,
        });
    }

    /// All values for a key, in input order. Empty slice when absent.
    pub fn values(&self, key: &str) -> &[String] {
        self.by_key
            .get(&key.to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.by_key.contains_key(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Reconstruct the attribute lines for display, original casing intact.
    /// Opaque values get their doubled-delimiter marker back.
    pub fn raw_lines(&self, delimiter: &str) -> Vec<String> {
        let marker = delimiter.chars().next().unwrap_or(':');
        self.attrs
            .iter()
            .map(|a| {
                if a.opaque {
                    format!("{}{}{}{}", a.name, marker, delimiter, a.value)
                } else {
                    format!("{}{}{}", a.name, delimiter, a.value)
                }
            })
            .collect()
    }

    /// Union another record's attribute lines into this one, skipping values
    /// already present under the same key.
    pub fn merge_from(&mut self, other: &AttributeRecord) {
        for a in &other.attrs {
            if !self.values(&a.name).iter().any(|v| v == &a.value) {
                self.push(&a.name, &a.value, a.opaque);
            }
        }
    }
}

/// Parse one block into an attribute record, splitting each line on the first
/// occurrence of the delimiter. A key segment ending in the delimiter's lead
/// character marks a binary-encoded value; the value is stored opaque.
pub fn build_record(block: &RawBlock, delimiter: &str) -> Result<AttributeRecord, RecordError> {
    let marker = delimiter.chars().next().unwrap_or(':');
    let mut record = AttributeRecord::default();
    for line in &block.lines {
        let Some((name, value)) = line.split_once(delimiter) else {
            continue;
        };
        let mut name = name.trim();
        let mut opaque = false;
        if let Some(stripped) = name.strip_suffix(marker) {
            name = stripped.trim_end();
            opaque = true;
        }
        if name.is_empty() {
            continue;
        }
        record.push(name, value.trim(), opaque);
    }
    if record.is_empty() {
        return Err(RecordError::EmptyBlock(block.index));
    }
    Ok(record)
}
