//! Vault storage collaborator: owns per-object document files under
//! variant-scoped directories and knows nothing about merge semantics.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::link::fold;
use crate::object::ObjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Leave existing documents untouched, only create missing ones.
    Skip,
    /// Replace existing documents with the fresh render.
    Overwrite,
    /// Smart-append: reconcile fresh data into existing documents.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Overwritten,
    Appended,
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Vault {
    base: PathBuf,
}

impl Vault {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn document_path(&self, kind: ObjectKind, name: &str) -> PathBuf {
        self.base.join(kind.dir_name()).join(format!("{name}.md"))
    }

    /// Existing document text for an identity, `None` when never rendered.
    pub fn read_document(&self, kind: ObjectKind, name: &str) -> Result<Option<String>> {
        let path = self.document_path(kind, name);
        if !path.exists() {
            return Ok(None);
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(text))
    }

    pub fn write_document(&self, kind: ObjectKind, name: &str, text: &str) -> Result<()> {
        let path = self.document_path(kind, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Folded name -> display name for every document rendered by prior
    /// runs, across all variant directories. Missing directories are fine.
    pub fn known_index(&self) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for kind in [ObjectKind::User, ObjectKind::Group, ObjectKind::Computer] {
            let dir = self.base.join(kind.dir_name());
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_none_or(|e| e != "md") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    index.insert(fold(stem), stem.to_string());
                }
            }
        }
        index
    }
}
