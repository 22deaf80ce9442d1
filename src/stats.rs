//! Batch and write statistics for the terminal summary.
use std::collections::HashMap;

use crate::object::DirectoryObject;
use crate::vault::WriteOutcome;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub created: usize,
    pub overwritten: usize,
    pub appended: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl WriteStats {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Overwritten => self.overwritten += 1,
            WriteOutcome::Appended => self.appended += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
            WriteOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.overwritten + self.appended + self.unchanged + self.skipped
    }
}

/// Return the top-N tag tokens across all objects. Tags are counted by their
/// leading `#Token`; sorted descending by count, then ascending by token to
/// stabilize ordering for tests.
pub fn top_tags<'a, I>(objects: I, top_n: usize) -> Vec<(String, usize)>
where
    I: Iterator<Item = &'a DirectoryObject>,
{
    use std::cmp::Reverse;
    let mut freq: HashMap<String, usize> = HashMap::new();
    for obj in objects {
        for tag in &obj.tags {
            if let Some(token) = tag.split_whitespace().next() {
                *freq.entry(token.to_string()).or_insert(0) += 1;
            }
        }
    }
    let mut items: Vec<(String, usize)> = freq.into_iter().collect();
    items.sort_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));
    if items.len() > top_n {
        items.truncate(top_n);
    }
    items
}

/// Display names of every object carrying an admin tag, with variant labels,
/// sorted for stable output.
pub fn admin_objects<'a, I>(objects: I) -> Vec<(&'static str, String)>
where
    I: Iterator<Item = &'a DirectoryObject>,
{
    let mut out: Vec<(&'static str, String)> = objects
        .filter(|o| o.tags.iter().any(|t| t.contains("IsAdmin")))
        .map(|o| (o.kind.label(), o.display_name.clone()))
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RawBlock;
    use crate::object::{DirectoryObject, ObjectKind};
    use crate::record::build_record;

    fn object(kind: ObjectKind, name: &str, tags: &[&str]) -> DirectoryObject {
        let record = build_record(
            &RawBlock {
                index: 0,
                lines: vec![format!("cn: {name}")],
            },
            ": ",
        )
        .unwrap();
        let mut o = DirectoryObject::new(kind, record, "cn").unwrap();
        for t in tags {
            o.push_tag(*t);
        }
        o
    }

    #[test]
    fn write_stats_accumulate_outcomes() {
        let mut s = WriteStats::default();
        s.record(WriteOutcome::Created);
        s.record(WriteOutcome::Created);
        s.record(WriteOutcome::Unchanged);
        assert_eq!(s.created, 2);
        assert_eq!(s.unchanged, 1);
        assert_eq!(s.total(), 3);
    }

    #[test]
    fn top_tags_count_leading_tokens_with_limit() {
        let objs = vec![
            object(ObjectKind::User, "a", &["#BadAccount due to #LowLogonCount"]),
            object(ObjectKind::User, "b", &["#BadAccount due to #StaleLogons"]),
            object(ObjectKind::User, "c", &["#SmartcardRequired"]),
        ];
        let top = top_tags(objs.iter(), 1);
        assert_eq!(top, vec![("#BadAccount".to_string(), 2)]);
    }

    #[test]
    fn admin_objects_filters_on_admin_tags() {
        let objs = vec![
            object(ObjectKind::User, "alice", &["#IsAdmin based on native admincount=1"]),
            object(ObjectKind::Group, "ops", &["#GroupIsAdmin based on native admincount=1"]),
            object(ObjectKind::User, "bob", &["#NormalAccount"]),
        ];
        let admins = admin_objects(objs.iter());
        assert_eq!(
            admins,
            vec![
                ("group", "ops".to_string()),
                ("user", "alice".to_string()),
            ]
        );
    }
}
