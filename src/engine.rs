//! Engine: orchestrates the batch pipeline from raw dump text to merged
//! vault documents. Ingestion classifies and enriches per object (optionally
//! in parallel, both phases are pure), linking runs as a single barrier pass
//! once every identity in the batch is known, and writes walk the sorted
//! collections one path at a time.
//!
//! Typical usage:
//!
//! ```no_run
//! use shihtzu::engine::{Config, Engine};
//! use shihtzu::vault::{Vault, WriteMode};
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = Engine::new(Config::default());
//! engine.ingest_path("/path/to/export.txt", None, u64::MAX)?;
//! engine.link();
//! let vault = Vault::new("/path/to/vault");
//! engine.write_all(&vault, WriteMode::Append);
//! # Ok(())
//! # }
//! ```
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::block::{BlockSplitter, RawBlock};
use crate::document::Document;
use crate::enrich::enrich;
use crate::io::dump_lines;
use crate::link::{DEFAULT_ADMIN_GROUPS, fold, link_batch};
use crate::merge::{reconcile, recovery_append};
use crate::object::{DirectoryObject, ObjectKind, classify};
use crate::record::build_record;
use crate::stats::WriteStats;
use crate::vault::{Vault, WriteMode, WriteOutcome};

pub const DEFAULT_DELIMITER: &str = ": ";
pub const DEFAULT_SEPARATOR: &str = "--------------------";
pub const DEFAULT_FILENAME_SEED: &str = "cn";
pub const DEFAULT_LOGON_COUNT_THRESHOLD: u32 = 100;
pub const DEFAULT_LOGON_DATE_THRESHOLD: i64 = 30;

/// All knobs the pipeline accepts, threaded explicitly so per-object work
/// stays free of ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    pub delimiter: String,
    pub separator: String,
    pub filename_seed: String,
    pub logon_count_threshold: u32,
    pub logon_date_threshold: i64,
    pub admin_groups: Vec<String>,
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            filename_seed: DEFAULT_FILENAME_SEED.to_string(),
            logon_count_threshold: DEFAULT_LOGON_COUNT_THRESHOLD,
            logon_date_threshold: DEFAULT_LOGON_DATE_THRESHOLD,
            admin_groups: DEFAULT_ADMIN_GROUPS.iter().map(|s| s.to_string()).collect(),
            parallel: false,
        }
    }
}

/// Non-fatal diagnostics accumulated across ingest and link passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseStats {
    pub blocks: usize,
    pub orphan_lines: usize,
    pub skipped_objects: usize,
    pub resolved_refs: usize,
    pub dangling_refs: usize,
}

#[derive(Debug, Default)]
pub struct Engine {
    pub config: Config,
    users: BTreeMap<String, DirectoryObject>,
    groups: BTreeMap<String, DirectoryObject>,
    computers: BTreeMap<String, DirectoryObject>,
    pub parse_stats: ParseStats,
}

fn build_object(
    block: &RawBlock,
    config: &Config,
    forced: Option<ObjectKind>,
    now: DateTime<Utc>,
) -> Option<DirectoryObject> {
    let record = match build_record(block, &config.delimiter) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("skipping object: {e}");
            return None;
        }
    };
    let kind = match classify(&record, forced) {
        Ok(k) => k,
        Err(e) => {
            log::warn!("skipping block {}: {e}", block.index);
            return None;
        }
    };
    let mut obj = match DirectoryObject::new(kind, record, &config.filename_seed) {
        Ok(o) => o,
        Err(e) => {
            log::warn!("skipping block {}: {e}", block.index);
            return None;
        }
    };
    enrich(
        &mut obj,
        config.logon_count_threshold,
        config.logon_date_threshold,
        now,
    );
    Some(obj)
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Ingest dump text already in memory. `forced` asserts the variant for
    /// pre-partitioned input; `None` classifies from object-class values.
    pub fn ingest_str(&mut self, contents: &str, forced: Option<ObjectKind>) {
        self.ingest_lines(contents.lines().map(str::to_string), forced);
    }

    /// Streamingly ingest a dump file, memory-mapping past the threshold.
    pub fn ingest_path<P: AsRef<Path>>(
        &mut self,
        path: P,
        forced: Option<ObjectKind>,
        mmap_threshold: u64,
    ) -> Result<()> {
        let lines = dump_lines(&path, mmap_threshold)?;
        self.ingest_lines(lines.flatten(), forced);
        Ok(())
    }

    fn ingest_lines<I: Iterator<Item = String>>(&mut self, lines: I, forced: Option<ObjectKind>) {
        let mut splitter =
            BlockSplitter::new(lines, &self.config.delimiter, &self.config.separator);
        let blocks: Vec<RawBlock> = splitter.by_ref().collect();
        self.parse_stats.orphan_lines += splitter.orphan_lines;
        self.parse_stats.blocks += blocks.len();

        let now = Utc::now();
        let config = &self.config;
        let built: Vec<Option<DirectoryObject>> = if config.parallel {
            blocks
                .par_iter()
                .map(|b| build_object(b, config, forced, now))
                .collect()
        } else {
            blocks
                .iter()
                .map(|b| build_object(b, config, forced, now))
                .collect()
        };
        for maybe in built {
            match maybe {
                Some(obj) => self.add_object(obj),
                None => self.parse_stats.skipped_objects += 1,
            }
        }
    }

    /// A second sighting of the same display name within the batch is the
    /// same logical entity; fold it in instead of clobbering.
    fn add_object(&mut self, obj: DirectoryObject) {
        let key = fold(&obj.display_name);
        let map = match obj.kind {
            ObjectKind::User => &mut self.users,
            ObjectKind::Group => &mut self.groups,
            ObjectKind::Computer => &mut self.computers,
        };
        match map.entry(key) {
            Entry::Occupied(mut e) => e.get_mut().absorb(obj),
            Entry::Vacant(e) => {
                e.insert(obj);
            }
        }
    }

    /// Barrier pass: every object must be classified before membership
    /// references can be checked against the batch. `known` carries folded
    /// names of documents rendered in prior runs.
    pub fn link_with_known(&mut self, known: &HashMap<String, String>) {
        let mut index: HashSet<String> = known.keys().cloned().collect();
        for obj in self.objects() {
            index.insert(fold(&obj.display_name));
        }
        let admin_groups = self.config.admin_groups.clone();
        let stats = link_batch(
            self.users
                .values_mut()
                .chain(self.groups.values_mut())
                .chain(self.computers.values_mut()),
            &index,
            &admin_groups,
        );
        self.parse_stats.resolved_refs += stats.resolved;
        self.parse_stats.dangling_refs += stats.dangling;
        log::debug!(
            "linked references: {} resolved, {} dangling",
            stats.resolved,
            stats.dangling
        );
    }

    pub fn link(&mut self) {
        self.link_with_known(&HashMap::new());
    }

    pub fn objects(&self) -> impl Iterator<Item = &DirectoryObject> {
        self.users
            .values()
            .chain(self.groups.values())
            .chain(self.computers.values())
    }

    /// (users, groups, computers)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.users.len(), self.groups.len(), self.computers.len())
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.computers.is_empty()
    }

    /// Write every object through the vault in deterministic sorted order,
    /// one path at a time. A failed write is logged and counted, never fatal
    /// to the rest of the batch.
    pub fn write_all(&self, vault: &Vault, mode: WriteMode) -> WriteStats {
        let mut stats = WriteStats::default();
        for obj in self.objects() {
            match self.write_one(vault, mode, obj) {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    log::error!("failed to write {}: {e:#}", obj.display_name);
                    stats.errors += 1;
                }
            }
        }
        stats
    }

    fn write_one(
        &self,
        vault: &Vault,
        mode: WriteMode,
        obj: &DirectoryObject,
    ) -> Result<WriteOutcome> {
        let fresh = Document::from_object(obj, &self.config.delimiter);
        let existing = vault.read_document(obj.kind, &obj.display_name)?;
        match (mode, existing) {
            (_, None) => {
                vault.write_document(obj.kind, &obj.display_name, &fresh.render())?;
                Ok(WriteOutcome::Created)
            }
            (WriteMode::Skip, Some(_)) => {
                log::debug!("document for {} exists, skipping", obj.display_name);
                Ok(WriteOutcome::Skipped)
            }
            (WriteMode::Overwrite, Some(_)) => {
                vault.write_document(obj.kind, &obj.display_name, &fresh.render())?;
                Ok(WriteOutcome::Overwritten)
            }
            (WriteMode::Append, Some(text)) => match Document::parse(&text) {
                Ok(parsed) => {
                    let merged = reconcile(&parsed, &fresh).render();
                    if merged == text {
                        Ok(WriteOutcome::Unchanged)
                    } else {
                        vault.write_document(obj.kind, &obj.display_name, &merged)?;
                        Ok(WriteOutcome::Appended)
                    }
                }
                Err(e) => {
                    log::warn!(
                        "existing document for {} is unparseable ({e}); preserving it verbatim",
                        obj.display_name
                    );
                    let out = recovery_append(&text, &fresh);
                    vault.write_document(obj.kind, &obj.display_name, &out)?;
                    Ok(WriteOutcome::Appended)
                }
            },
        }
    }
}
