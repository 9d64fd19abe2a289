//! Record and Sample data model with the closed tag vocabularies

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One unit of content collected from a source, before sample expansion.
///
/// `text` is the canonical field used for scoring; fetchers set it from
/// whichever of abstract/body the source provides. `id` and `title` are
/// non-empty for every record past the dedup boundary — empty-titled
/// records are discarded before they are ever dedup-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(rename = "full_text", default)]
    pub body: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub provenance: BTreeMap<String, String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub text: String,
}

impl Record {
    /// Cross-source dedup key: the normalized title.
    ///
    /// Trimmed, lowercased, inner whitespace collapsed, so trivial
    /// formatting differences between sources do not defeat dedup. Two
    /// genuinely distinct records sharing a title will still collide;
    /// first-seen-wins applies.
    pub fn dedup_key(&self) -> String {
        self.title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Granularity of a derived sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleSection {
    #[serde(rename = "abstract")]
    Abstract,
    #[serde(rename = "paragraph")]
    Paragraph,
}

/// Domain tag, assigned from category keywords by an ordered rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainTag {
    #[serde(rename = "[BIO]")]
    Bio,
    #[serde(rename = "[GEN]")]
    Gen,
    #[serde(rename = "[PHY]")]
    Phy,
    #[serde(rename = "[MATH]")]
    Math,
    #[serde(rename = "[MAT]")]
    Mat,
    #[serde(rename = "[ASTRO]")]
    Astro,
    #[serde(rename = "[CS]")]
    Cs,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Section tag, assigned by keyword search over the record text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionTag {
    #[serde(rename = "[ABSTRACT]")]
    Abstract,
    #[serde(rename = "[INTRO]")]
    Intro,
    #[serde(rename = "[METHODS]")]
    Methods,
    #[serde(rename = "[RESULTS]")]
    Results,
    #[serde(rename = "[DISCUSSION]")]
    Discussion,
    #[serde(rename = "[CONCLUSION]")]
    Conclusion,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingTag {
    #[serde(rename = "[GEN]")]
    General,
    #[serde(rename = "[SPEC]")]
    Specific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskTag {
    #[serde(rename = "[HYP]")]
    Hypothesis,
    #[serde(rename = "[MTH]")]
    Method,
    #[serde(rename = "[EXP]")]
    Experiment,
}

/// One tagged, scorable unit of text derived from a [`Record`] — either the
/// abstract or a single paragraph of body text. Tags are inherited from the
/// parent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub title: String,
    pub section: SampleSection,
    pub domain_tag: DomainTag,
    pub section_tag: SectionTag,
    pub routing_tag: RoutingTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_tag: Option<TaskTag>,
    pub text: String,
}
