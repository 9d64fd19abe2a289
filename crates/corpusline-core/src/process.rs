//! Record-to-sample expansion, tagging, and parallel quality filtering

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::entropy::EntropyRanker;
use crate::record::{DomainTag, Record, RoutingTag, Sample, SampleSection, SectionTag, TaskTag};

/// Over-long paragraph chunks are split at this character budget.
pub const PARAGRAPH_CHAR_BUDGET: usize = 1000;

/// Body characters included in the quality-filter preview text, capped to
/// bound scoring cost.
const PREVIEW_BODY_CHARS: usize = 1000;

/// Ordered (keyword, tag) rules over the joined category list; first match
/// wins, no match falls through to Unknown.
const DOMAIN_RULES: &[(&str, DomainTag)] = &[
    ("bio", DomainTag::Bio),
    ("gen", DomainTag::Gen),
    ("phys", DomainTag::Phy),
    ("math", DomainTag::Math),
    ("mat", DomainTag::Mat),
    ("astro", DomainTag::Astro),
    ("cs", DomainTag::Cs),
];

/// Ordered (keyword, tag) rules over the record text.
const SECTION_RULES: &[(&str, SectionTag)] = &[
    ("abstract", SectionTag::Abstract),
    ("introduction", SectionTag::Intro),
    ("methods", SectionTag::Methods),
    ("results", SectionTag::Results),
    ("discussion", SectionTag::Discussion),
    ("conclusion", SectionTag::Conclusion),
];

/// Tags resolved once per record and inherited by all of its samples.
#[derive(Debug, Clone, Copy)]
pub struct RecordTags {
    pub domain: DomainTag,
    pub section: SectionTag,
    pub routing: RoutingTag,
    pub task: Option<TaskTag>,
}

/// Result of processing one admitted record batch.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub samples: Vec<Sample>,
    pub expanded: usize,
    pub unknown_domains: usize,
    pub unknown_sections: usize,
}

/// Expands records into tagged samples and filters them for content
/// quality against an entropy threshold.
pub struct SampleProcessor {
    content_ranker: EntropyRanker,
}

impl SampleProcessor {
    pub fn new(content_threshold: f64) -> Self {
        Self {
            content_ranker: EntropyRanker::new(content_threshold),
        }
    }

    /// Collapse control characters and runs of whitespace to single spaces.
    pub fn clean_text(text: &str) -> String {
        let replaced: String = text
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        replaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Split body text at blank-line boundaries; chunks over the character
    /// budget are split further at the budget. Empty chunks are dropped.
    pub fn segment_paragraphs(text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                flush_paragraph(&mut current, &mut paragraphs);
            } else {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
            }
        }
        flush_paragraph(&mut current, &mut paragraphs);
        paragraphs
    }

    /// Resolve the record's tags from its data-driven rule lists.
    pub fn tag(record: &Record) -> RecordTags {
        RecordTags {
            domain: domain_tag(record),
            section: section_tag(record),
            routing: routing_tag(record),
            task: task_tag(record),
        }
    }

    /// Expand a record into an abstract sample (when title or abstract is
    /// present) plus one sample per body paragraph.
    pub fn expand(record: &Record) -> Vec<Sample> {
        Self::expand_tagged(record, &Self::tag(record))
    }

    fn expand_tagged(record: &Record, tags: &RecordTags) -> Vec<Sample> {
        let title = Self::clean_text(&record.title);
        let abstract_text = Self::clean_text(&record.abstract_text);
        let mut samples = Vec::new();

        if !title.is_empty() || !abstract_text.is_empty() {
            samples.push(make_sample(
                title.clone(),
                SampleSection::Abstract,
                abstract_text,
                tags,
            ));
        }
        for paragraph in Self::segment_paragraphs(&record.body) {
            samples.push(make_sample(
                title.clone(),
                SampleSection::Paragraph,
                Self::clean_text(&paragraph),
                tags,
            ));
        }
        samples
    }

    /// Expand a batch of records and keep only samples whose own preview
    /// text passes the content-quality entropy check. A low-information
    /// paragraph is dropped even when its sibling abstract passes.
    ///
    /// Quality scoring fans out over `pool` in chunks of `chunk_size`
    /// records; fan-in is synchronous per chunk. No new chunk is scheduled
    /// once the cancellation token is set.
    pub fn process(
        &self,
        records: &[Record],
        pool: &rayon::ThreadPool,
        token: &CancelToken,
        chunk_size: usize,
    ) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::default();

        for chunk in records.chunks(chunk_size.max(1)) {
            if token.is_cancelled() {
                log::info!("processing cancelled, skipping remaining chunks");
                break;
            }

            let mut candidates: Vec<Sample> = Vec::new();
            for record in chunk {
                let tags = Self::tag(record);
                if tags.domain == DomainTag::Unknown {
                    outcome.unknown_domains += 1;
                }
                if tags.section == SectionTag::Unknown {
                    outcome.unknown_sections += 1;
                }
                candidates.extend(Self::expand_tagged(record, &tags));
            }
            outcome.expanded += candidates.len();

            // Workers get read-only sample refs and fill write-once slots
            let keep: Vec<bool> = pool.install(|| {
                candidates
                    .par_iter()
                    .map(|sample| self.content_ranker.is_explanatory(&preview(sample)))
                    .collect()
            });
            outcome.samples.extend(
                candidates
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(sample, keep)| keep.then_some(sample)),
            );
        }

        outcome
    }
}

fn flush_paragraph(current: &mut String, paragraphs: &mut Vec<String>) {
    let paragraph = std::mem::take(current);
    let trimmed = paragraph.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.chars().count() <= PARAGRAPH_CHAR_BUDGET {
        paragraphs.push(trimmed.to_string());
        return;
    }
    let chars: Vec<char> = trimmed.chars().collect();
    for chunk in chars.chunks(PARAGRAPH_CHAR_BUDGET) {
        let piece: String = chunk.iter().collect();
        if !piece.trim().is_empty() {
            paragraphs.push(piece.trim().to_string());
        }
    }
}

fn make_sample(
    title: String,
    section: SampleSection,
    text: String,
    tags: &RecordTags,
) -> Sample {
    Sample {
        title,
        section,
        domain_tag: tags.domain,
        section_tag: tags.section,
        routing_tag: tags.routing,
        task_tag: tags.task,
        text,
    }
}

/// Preview used for the quality check: the sample's title plus its own
/// text, capped at the preview budget.
fn preview(sample: &Sample) -> String {
    let mut text = sample.title.clone();
    if !sample.text.is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.extend(sample.text.chars().take(PREVIEW_BODY_CHARS));
    }
    text
}

fn domain_tag(record: &Record) -> DomainTag {
    if record.categories.is_empty() {
        return DomainTag::Unknown;
    }
    let categories = record.categories.join(" ").to_lowercase();
    DOMAIN_RULES
        .iter()
        .find(|(keyword, _)| categories.contains(keyword))
        .map(|(_, tag)| *tag)
        .unwrap_or(DomainTag::Unknown)
}

fn section_tag(record: &Record) -> SectionTag {
    let text = if record.text.is_empty() {
        &record.abstract_text
    } else {
        &record.text
    };
    if text.is_empty() {
        return SectionTag::Unknown;
    }
    let lower = text.to_lowercase();
    SECTION_RULES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, tag)| *tag)
        .unwrap_or(SectionTag::Unknown)
}

fn routing_tag(record: &Record) -> RoutingTag {
    match record.provenance.get("routing").map(String::as_str) {
        Some("specific") => RoutingTag::Specific,
        _ => RoutingTag::General,
    }
}

fn task_tag(record: &Record) -> Option<TaskTag> {
    match record.provenance.get("task").map(String::as_str) {
        Some("hypothesis") => Some(TaskTag::Hypothesis),
        Some("method") => Some(TaskTag::Method),
        Some("experiment") => Some(TaskTag::Experiment),
        _ => None,
    }
}
