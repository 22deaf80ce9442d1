//! Directory object model: the closed variant set, classification from
//! object-class attributes, and document-name sanitization.
//!
//! Objects are built once per ingestion batch and are not mutated after
//! enrichment and linking finish; the merge layer works on rendered document
//! sections, never on these values.
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::record::AttributeRecord;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("missing or empty filename seed attribute `{0}`")]
    MissingSeed(String),
    #[error("object class values do not determine a variant")]
    Unclassifiable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    User,
    Group,
    Computer,
}

impl ObjectKind {
    /// Variant-scoped output directory name.
    pub fn dir_name(self) -> &'static str {
        match self {
            ObjectKind::User => "USERS",
            ObjectKind::Group => "GROUPS",
            ObjectKind::Computer => "COMPUTERS",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::User => "user",
            ObjectKind::Group => "group",
            ObjectKind::Computer => "computer",
        }
    }

    /// Tag token used when this object turns out to hold admin privileges.
    pub fn admin_token(self) -> &'static str {
        match self {
            ObjectKind::User => "#IsAdmin",
            ObjectKind::Group => "#GroupIsAdmin",
            ObjectKind::Computer => "#ComputerIsAdmin",
        }
    }
}

/// Decide the variant for a record. First match wins: a populated operating
/// system attribute outranks any object-class value, then group beats user
/// beats computer. A forced kind (pre-partitioned input) skips the checks so
/// minimal attribute sets still classify.
pub fn classify(record: &AttributeRecord, forced: Option<ObjectKind>) -> Result<ObjectKind, ClassifyError> {
    if let Some(kind) = forced {
        return Ok(kind);
    }
    if record
        .first("operatingsystem")
        .is_some_and(|v| !v.trim().is_empty())
    {
        return Ok(ObjectKind::Computer);
    }
    let classes = record.values("objectclass");
    let has = |needle: &str| classes.iter().any(|c| c.to_lowercase().contains(needle));
    if has("group") {
        Ok(ObjectKind::Group)
    } else if (has("person") || has("user")) && !has("computer") {
        Ok(ObjectKind::User)
    } else if has("computer") {
        Ok(ObjectKind::Computer)
    } else {
        Err(ClassifyError::Unclassifiable)
    }
}

// Characters that break filesystem paths or Obsidian's link/tag syntax.
const DOC_NAME_UNSAFE: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b':')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|')
    .add(b'#')
    .add(b'[')
    .add(b']');

pub fn sanitize_document_name(name: &str) -> String {
    utf8_percent_encode(name.trim(), DOC_NAME_UNSAFE).to_string()
}

/// One classified, enriched directory object.
#[derive(Debug, Clone)]
pub struct DirectoryObject {
    pub kind: ObjectKind,
    /// Distinguished-name-equivalent string, the graph key.
    pub identity: String,
    /// Sanitized document name derived from the filename seed attribute.
    pub display_name: String,
    pub record: AttributeRecord,
    /// Derived risk/state tags, insertion-ordered, no duplicates.
    pub tags: Vec<String>,
    /// "member of" identities; may dangle.
    pub parent_refs: Vec<String>,
    /// "has member" identities; may dangle.
    pub child_refs: Vec<String>,
    /// Known time attribute name -> decoded human-readable value.
    pub timestamps: Vec<(String, String)>,
    /// Named properties decoded from the UserAccountControl bit-field.
    pub uac_flags: Vec<String>,
}

impl DirectoryObject {
    /// Build an object of `kind` around a record. Fails when the filename
    /// seed attribute is missing or empty; no partial object is produced.
    pub fn new(kind: ObjectKind, record: AttributeRecord, filename_seed: &str) -> Result<Self, ClassifyError> {
        let seed = record
            .first(filename_seed)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClassifyError::MissingSeed(filename_seed.to_string()))?;
        let display_name = sanitize_document_name(seed);
        let identity = record
            .first("distinguishedname")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(seed)
            .to_string();
        Ok(Self {
            kind,
            identity,
            display_name,
            record,
            tags: Vec::new(),
            parent_refs: Vec::new(),
            child_refs: Vec::new(),
            timestamps: Vec::new(),
            uac_flags: Vec::new(),
        })
    }

    pub fn push_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn push_parent(&mut self, identity: impl Into<String>) {
        let identity = identity.into();
        if !self.parent_refs.contains(&identity) {
            self.parent_refs.push(identity);
        }
    }

    pub fn push_child(&mut self, identity: impl Into<String>) {
        let identity = identity.into();
        if !self.child_refs.contains(&identity) {
            self.child_refs.push(identity);
        }
    }

    /// Fold a second sighting of the same logical object into this one:
    /// attribute lines and tags union, derived values are replaced when the
    /// newer sighting recomputed them.
    pub fn absorb(&mut self, other: DirectoryObject) {
        self.record.merge_from(&other.record);
        for tag in other.tags {
            self.push_tag(tag);
        }
        for p in other.parent_refs {
            self.push_parent(p);
        }
        for c in other.child_refs {
            self.push_child(c);
        }
        if !other.uac_flags.is_empty() {
            self.uac_flags = other.uac_flags;
        }
        if !other.timestamps.is_empty() {
            self.timestamps = other.timestamps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RawBlock;
    use crate::record::build_record;

    fn record(lines: &[&str]) -> AttributeRecord {
        build_record(
            &RawBlock {
                index: 0,
                lines: lines.iter().map(|l| l.to_string()).collect(),
            },
            ": ",
        )
        .unwrap()
    }

    #[test]
    fn operating_system_always_wins() {
        let r = record(&[
            "cn: box",
            "operatingSystem: Windows 11",
            "objectClass: group",
        ]);
        assert_eq!(classify(&r, None).unwrap(), ObjectKind::Computer);
    }

    #[test]
    fn group_class_beats_user_class() {
        let r = record(&["cn: g", "objectClass: group", "objectClass: top"]);
        assert_eq!(classify(&r, None).unwrap(), ObjectKind::Group);
    }

    #[test]
    fn person_without_computer_class_is_user() {
        let r = record(&["cn: u", "objectClass: person", "objectClass: user"]);
        assert_eq!(classify(&r, None).unwrap(), ObjectKind::User);
    }

    #[test]
    fn computer_subclass_of_user_is_computer() {
        let r = record(&["cn: c", "objectClass: user", "objectClass: computer"]);
        assert_eq!(classify(&r, None).unwrap(), ObjectKind::Computer);
    }

    #[test]
    fn forced_kind_skips_class_checks() {
        let r = record(&["cn: bare"]);
        assert_eq!(classify(&r, Some(ObjectKind::Group)).unwrap(), ObjectKind::Group);
        assert!(matches!(classify(&r, None), Err(ClassifyError::Unclassifiable)));
    }

    #[test]
    fn missing_seed_fails_object_construction() {
        let r = record(&["objectClass: user", "objectClass: person"]);
        let err = DirectoryObject::new(ObjectKind::User, r, "cn").unwrap_err();
        assert!(matches!(err, ClassifyError::MissingSeed(_)));
    }

    #[test]
    fn identity_prefers_distinguished_name() {
        let r = record(&[
            "cn: Alice",
            "distinguishedName: CN=Alice,OU=Staff,DC=corp,DC=local",
        ]);
        let o = DirectoryObject::new(ObjectKind::User, r, "cn").unwrap();
        assert_eq!(o.identity, "CN=Alice,OU=Staff,DC=corp,DC=local");
        assert_eq!(o.display_name, "Alice");
    }

    #[test]
    fn display_name_is_document_safe() {
        assert_eq!(sanitize_document_name("a/b:c"), "a%2Fb%3Ac");
        assert_eq!(sanitize_document_name("  plain  "), "plain");
        assert_eq!(sanitize_document_name("tag#[x]"), "tag%23%5Bx%5D");
    }

    #[test]
    fn push_tag_deduplicates_preserving_order() {
        let r = record(&["cn: u", "objectClass: user"]);
        let mut o = DirectoryObject::new(ObjectKind::User, r, "cn").unwrap();
        o.push_tag("#A");
        o.push_tag("#B");
        o.push_tag("#A");
        assert_eq!(o.tags, vec!["#A", "#B"]);
    }
}
