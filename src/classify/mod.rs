pub mod taxonomy;
pub mod text;

use std::collections::BTreeSet;

use crate::hh::{PostingDetail, Salary};
use taxonomy::{Taxonomy, Tier};

/// Ordinal amount of programming a posting asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CodingLevel {
    None = 0,
    Light = 1,
    Medium = 2,
    Heavy = 3,
}

impl CodingLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkFormat {
    Office,
    Remote,
    HybridOrRemote,
}

impl WorkFormat {
    pub fn label(self) -> &'static str {
        match self {
            WorkFormat::Office => "Офис",
            WorkFormat::Remote => "Удалёнка",
            WorkFormat::HybridOrRemote => "Гибрид/Удалёнка",
        }
    }

    pub fn is_office(self) -> bool {
        self == WorkFormat::Office
    }
}

/// Every rule that matches contributes its label; repeated hits collapse.
pub fn requirement_set(taxonomy: &Taxonomy, text: &str) -> BTreeSet<String> {
    if text.is_empty() {
        return BTreeSet::new();
    }
    taxonomy
        .rules()
        .iter()
        .filter_map(|rule| rule.label_for(text))
        .collect()
}

/// Veto first, then bucket by the number of distinct heavy and light hits.
pub fn coding_level(taxonomy: &Taxonomy, text: &str) -> CodingLevel {
    if text.is_empty() || taxonomy.tier(Tier::Veto).any(|r| r.is_match(text)) {
        return CodingLevel::None;
    }

    let heavy = taxonomy
        .tier(Tier::Heavy)
        .filter(|r| r.is_match(text))
        .count();
    let light = taxonomy
        .tier(Tier::Light)
        .filter(|r| r.is_match(text))
        .count();

    match (heavy, light) {
        (h, _) if h >= 2 => CodingLevel::Heavy,
        (1, _) => CodingLevel::Medium,
        (0, l) if l >= 1 => CodingLevel::Light,
        _ => CodingLevel::None,
    }
}

/// Schedule metadata wins; otherwise look for hybrid/remote wording in the text.
pub fn work_format(detail: &PostingDetail, text: &str) -> WorkFormat {
    if let Some(schedule) = &detail.schedule {
        if schedule.id.contains("remote") || schedule.name.to_lowercase().contains("удален") {
            return WorkFormat::Remote;
        }
    }

    let lower = text.to_lowercase();
    if ["гибрид", "hybrid", "удаленн"]
        .iter()
        .any(|w| lower.contains(w))
    {
        WorkFormat::HybridOrRemote
    } else {
        WorkFormat::Office
    }
}

/// Everything one posting contributes to a role's aggregate.
#[derive(Debug, Clone)]
pub struct PostingFacts {
    pub title: String,
    pub skills: BTreeSet<String>,
    pub requirements: BTreeSet<String>,
    pub salary: Option<Salary>,
    pub experience: Option<String>,
    pub work_format: WorkFormat,
    pub junior_friendly: bool,
    pub coding_level: CodingLevel,
}

/// Taxonomies plus metadata rules, shared read-only for a whole run.
pub struct Classifier {
    requirements: Taxonomy,
    coding: Taxonomy,
    junior_experience_ids: Vec<String>,
}

impl Classifier {
    pub fn new(
        requirements: Taxonomy,
        coding: Taxonomy,
        junior_experience_ids: Vec<String>,
    ) -> Self {
        Classifier {
            requirements,
            coding,
            junior_experience_ids,
        }
    }

    /// Normalize the description once, then run every classifier over it.
    pub fn process(&self, title: &str, detail: &PostingDetail) -> PostingFacts {
        let text = text::normalize(&detail.description);

        let salary = detail
            .salary
            .clone()
            .filter(|s| s.from.is_some_and(|from| from != 0));

        let experience = detail
            .experience
            .as_ref()
            .map(|e| e.name.clone())
            .filter(|name| !name.is_empty());

        let junior_friendly = detail
            .experience
            .as_ref()
            .is_some_and(|e| self.junior_experience_ids.iter().any(|id| *id == e.id));

        PostingFacts {
            title: title.to_string(),
            skills: detail.skills.clone(),
            requirements: requirement_set(&self.requirements, &text),
            salary,
            experience,
            work_format: work_format(detail, &text),
            junior_friendly,
            coding_level: coding_level(&self.coding, &text),
        }
    }
}
