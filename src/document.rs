//! Markdown document sections for one directory object.
//!
//! A document is the unit the vault stores and the merge engine reconciles.
//! Section fields hold bare tokens; link decoration (`[[...]]`) is applied at
//! render time and stripped at parse time so union comparisons in the merge
//! layer work on stable strings.
use std::sync::LazyLock;

use regex::Regex;

use crate::object::DirectoryObject;

pub const HEADER_RAW: &str = "# Raw Data:";
pub const HEADER_TAGS: &str = "# Tags:";
pub const HEADER_MEMBERS: &str = "# Members:";
pub const HEADER_PARENTS: &str = "# Parents:";
pub const HEADER_UAC: &str = "# UserAccountControl Values:";
pub const HEADER_TIME: &str = "# Clean Timestamps:";
pub const HEADER_USER_DEFINED: &str = "# User Defined:";

/// Heading written above a fresh render when an existing document could not
/// be parsed and had to be preserved byte-for-byte.
pub const RECOVERY_HEADER: &str = "## Appended Data (original document preserved above):";

const UAC_LINK_PREFIX: &str = "[[UserAccountControlValues#";

static RAW_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```plaintext raw\n(.*?)```").expect("valid fence regex"));

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no recognizable section headers")]
    Unrecognized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub raw_data: Vec<String>,
    pub tags: Vec<String>,
    /// Bare member names; rendered as `[[name]]`.
    pub members: Vec<String>,
    /// Bare parent names; rendered as `[[name]]`.
    pub parents: Vec<String>,
    /// Bare flag names; rendered as UAC anchor links.
    pub uac_values: Vec<String>,
    pub time_values: Vec<String>,
    /// Analyst-authored lines, interior blanks preserved.
    pub user_defined: Vec<String>,
}

impl Document {
    /// Project a freshly enriched and linked object into its sections.
    pub fn from_object(obj: &DirectoryObject, delimiter: &str) -> Self {
        Self {
            raw_data: obj.record.raw_lines(delimiter),
            tags: obj.tags.clone(),
            members: obj.child_refs.clone(),
            parents: obj.parent_refs.clone(),
            uac_values: obj.uac_flags.clone(),
            time_values: obj
                .timestamps
                .iter()
                .map(|(attr, value)| format!("{attr}{delimiter}{value}"))
                .collect(),
            user_defined: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER_RAW);
        out.push('\n');
        out.push_str("```plaintext raw\n");
        for line in &self.raw_data {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("```\n");

        let decorated_members: Vec<String> =
            self.members.iter().map(|m| format!("[[{m}]]")).collect();
        let decorated_parents: Vec<String> =
            self.parents.iter().map(|p| format!("[[{p}]]")).collect();
        let decorated_uac: Vec<String> = self
            .uac_values
            .iter()
            .map(|f| format!("{UAC_LINK_PREFIX}{f}]]"))
            .collect();
        for (header, lines) in [
            (HEADER_TAGS, &self.tags),
            (HEADER_MEMBERS, &decorated_members),
            (HEADER_PARENTS, &decorated_parents),
            (HEADER_UAC, &decorated_uac),
            (HEADER_TIME, &self.time_values),
        ] {
            if lines.is_empty() {
                continue;
            }
            out.push('\n');
            out.push_str(header);
            out.push('\n');
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        out.push('\n');
        out.push_str(HEADER_USER_DEFINED);
        out.push('\n');
        for line in &self.user_defined {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Parse a previously rendered document back into sections. Fails only
    /// when no known header is present at all, which the merge layer treats
    /// as source corruption.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let known = [
            HEADER_RAW,
            HEADER_TAGS,
            HEADER_MEMBERS,
            HEADER_PARENTS,
            HEADER_UAC,
            HEADER_TIME,
            HEADER_USER_DEFINED,
        ];
        if !known.iter().any(|h| content.contains(h)) {
            return Err(DocumentError::Unrecognized);
        }
        let raw_data = RAW_FENCE
            .captures(content)
            .map(|c| {
                c[1].lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            raw_data,
            tags: section_lines(content, HEADER_TAGS),
            members: strip_links(section_lines(content, HEADER_MEMBERS)),
            parents: strip_links(section_lines(content, HEADER_PARENTS)),
            uac_values: section_lines(content, HEADER_UAC)
                .into_iter()
                .map(|l| strip_uac_link(&l))
                .collect(),
            time_values: section_lines(content, HEADER_TIME),
            user_defined: section_body_verbatim(content, HEADER_USER_DEFINED),
        })
    }
}

fn section_body<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)? + header.len();
    let rest = &content[start..];
    let end = rest.find("\n# ").unwrap_or(rest.len());
    Some(&rest[..end])
}

fn section_lines(content: &str, header: &str) -> Vec<String> {
    section_body(content, header)
        .map(|body| {
            body.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Like `section_lines` but keeps interior blank lines, trimming only the
/// leading/trailing empty runs. Analyst content is not ours to normalize.
fn section_body_verbatim(content: &str, header: &str) -> Vec<String> {
    let Some(body) = section_body(content, header) else {
        return Vec::new();
    };
    let lines: Vec<String> = body.lines().map(|l| l.trim_end().to_string()).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(a), Some(b)) => lines[a..=b].to_vec(),
        _ => Vec::new(),
    }
}

fn strip_links(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.replace("[[", "").replace("]]", ""))
        .collect()
}

fn strip_uac_link(line: &str) -> String {
    line.strip_prefix(UAC_LINK_PREFIX)
        .and_then(|r| r.strip_suffix("]]"))
        .unwrap_or(line)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            raw_data: vec!["cn: Alice".to_string(), "objectClass: user".to_string()],
            tags: vec!["#NormalAccount".to_string()],
            members: vec![],
            parents: vec!["Domain Admins".to_string()],
            uac_values: vec!["ADS_UF_NORMAL_ACCOUNT".to_string()],
            time_values: vec!["lastlogon: not recorded".to_string()],
            user_defined: vec!["analyst note".to_string()],
        }
    }

    #[test]
    fn render_parse_round_trip_is_identity() {
        let doc = sample();
        let parsed = Document::parse(&doc.render()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn render_shape_is_stable() {
        let doc = sample();
        insta::assert_snapshot!(doc.render(), @r###"
        # Raw Data:
        ```plaintext raw
        cn: Alice
        objectClass: user
        ```

        # Tags:
        #NormalAccount

        # Parents:
        [[Domain Admins]]

        # UserAccountControl Values:
        [[UserAccountControlValues#ADS_UF_NORMAL_ACCOUNT]]

        # Clean Timestamps:
        lastlogon: not recorded

        # User Defined:
        analyst note
        "###);
    }

    #[test]
    fn empty_sections_are_omitted_except_raw_and_user_defined() {
        let doc = Document {
            raw_data: vec!["cn: x".to_string()],
            ..Document::default()
        };
        let text = doc.render();
        assert!(text.contains(HEADER_RAW));
        assert!(text.contains(HEADER_USER_DEFINED));
        assert!(!text.contains(HEADER_TAGS));
        assert!(!text.contains(HEADER_MEMBERS));
    }

    #[test]
    fn parse_rejects_unstructured_content() {
        assert!(matches!(
            Document::parse("free-form analyst scratchpad\nwith no sections"),
            Err(DocumentError::Unrecognized)
        ));
    }

    #[test]
    fn user_defined_interior_blanks_survive() {
        let mut doc = sample();
        doc.user_defined = vec![
            "first observation".to_string(),
            String::new(),
            "second observation".to_string(),
        ];
        let parsed = Document::parse(&doc.render()).unwrap();
        assert_eq!(parsed.user_defined, doc.user_defined);
    }

    #[test]
    fn link_tokens_are_stripped_on_parse() {
        let text = "# Members:\n[[Alice]]\n[[Bob]]\n";
        let doc = Document::parse(text).unwrap();
        assert_eq!(doc.members, vec!["Alice", "Bob"]);
    }
}
