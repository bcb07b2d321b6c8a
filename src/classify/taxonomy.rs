use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

const BUILTIN: &[(&str, &str)] = &[
    (
        "system-analyst",
        include_str!("../../taxonomies/system_analyst.json"),
    ),
    ("risk", include_str!("../../taxonomies/risk.json")),
    (
        "coding-level",
        include_str!("../../taxonomies/coding_level.json"),
    ),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Veto,
    Heavy,
    Light,
    #[default]
    Plain,
}

#[derive(Deserialize)]
struct TaxonomyFile {
    name: String,
    rules: Vec<RuleEntry>,
}

#[derive(Deserialize)]
struct RuleEntry {
    pattern: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    tier: Tier,
}

#[derive(Debug)]
pub struct Rule {
    pattern: Regex,
    label: Option<String>,
    pub tier: Tier,
}

impl Rule {
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Label for this rule if it matches `text`. Rules without an explicit
    /// label are named after the first matched fragment.
    pub fn label_for(&self, text: &str) -> Option<String> {
        let m = self.pattern.find(text)?;
        Some(match &self.label {
            Some(label) => label.clone(),
            None => derive_label(m.as_str()),
        })
    }
}

/// Ordered pattern table. Immutable once loaded.
#[derive(Debug)]
pub struct Taxonomy {
    name: String,
    rules: Vec<Rule>,
}

impl Taxonomy {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: TaxonomyFile = serde_json::from_str(json).context("invalid taxonomy JSON")?;
        if file.rules.is_empty() {
            bail!("taxonomy '{}' has no rules", file.name);
        }

        let mut rules = Vec::with_capacity(file.rules.len());
        for entry in file.rules {
            let pattern = RegexBuilder::new(&entry.pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| {
                    format!("taxonomy '{}': bad pattern {:?}", file.name, entry.pattern)
                })?;
            rules.push(Rule {
                pattern,
                label: entry.label.filter(|l| !l.trim().is_empty()),
                tier: entry.tier,
            });
        }

        Ok(Taxonomy {
            name: file.name,
            rules,
        })
    }

    /// Resolve a built-in taxonomy name, or read a JSON file from disk.
    pub fn load(name_or_path: &str) -> Result<Self> {
        if let Some((_, json)) = BUILTIN.iter().find(|(name, _)| *name == name_or_path) {
            return Self::from_json(json)
                .with_context(|| format!("built-in taxonomy '{}'", name_or_path));
        }
        let path = Path::new(name_or_path);
        if !path.exists() {
            bail!(
                "unknown taxonomy '{}' (built-ins: {})",
                name_or_path,
                builtin_names().join(", ")
            );
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading taxonomy {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("loading taxonomy {}", path.display()))
    }

    /// Like `load`, but the table must carry graded (heavy/light) rules.
    pub fn load_graded(name_or_path: &str) -> Result<Self> {
        let taxonomy = Self::load(name_or_path)?;
        let graded = taxonomy
            .rules
            .iter()
            .any(|r| matches!(r.tier, Tier::Heavy | Tier::Light));
        if !graded {
            bail!("taxonomy '{}' has no heavy or light rules", taxonomy.name);
        }
        Ok(taxonomy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.tier == tier)
    }
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}

/// Short matches are acronyms ("SQL", "BPMN"), longer ones get title case.
fn derive_label(matched: &str) -> String {
    let found = matched.trim().to_lowercase();
    if found.chars().count() <= 4 {
        found.to_uppercase()
    } else {
        title_case(&found)
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_load() {
        for name in builtin_names() {
            let t = Taxonomy::load(name).unwrap();
            assert_eq!(t.name(), name);
            assert!(!t.rules().is_empty());
        }
        assert!(Taxonomy::load_graded("coding-level").is_ok());
    }

    #[test]
    fn flat_table_is_not_graded() {
        let err = Taxonomy::load_graded("risk").unwrap_err();
        assert!(err.to_string().contains("no heavy or light"));
    }

    #[test]
    fn rejects_bad_pattern() {
        let json = r#"{"name": "broken", "rules": [{"pattern": "(unclosed", "label": "X"}]}"#;
        let err = Taxonomy::from_json(json).unwrap_err();
        assert!(format!("{err:#}").contains("bad pattern"));
    }

    #[test]
    fn rejects_empty_table() {
        let json = r#"{"name": "empty", "rules": []}"#;
        assert!(Taxonomy::from_json(json).is_err());
    }

    #[test]
    fn unknown_name() {
        let err = Taxonomy::load("no-such-table").unwrap_err();
        assert!(err.to_string().contains("built-ins"));
    }

    #[test]
    fn tier_defaults_to_plain() {
        let json = r#"{"name": "t", "rules": [
            {"pattern": "a", "label": "A"},
            {"pattern": "b", "label": "B", "tier": "veto"}
        ]}"#;
        let t = Taxonomy::from_json(json).unwrap();
        assert_eq!(t.tier(Tier::Plain).count(), 1);
        assert_eq!(t.tier(Tier::Veto).count(), 1);
    }

    #[test]
    fn derived_labels() {
        assert_eq!(derive_label("bpmn"), "BPMN");
        assert_eq!(derive_label("1с"), "1С");
        assert_eq!(derive_label("user story"), "User Story");
        assert_eq!(derive_label("use-case"), "Use-Case");
        assert_eq!(derive_label("техническое задание"), "Техническое Задание");
    }

    #[test]
    fn unlabeled_rule_uses_match() {
        let json = r#"{"name": "t", "rules": [{"pattern": "rest\\s?api"}]}"#;
        let t = Taxonomy::from_json(json).unwrap();
        assert_eq!(
            t.rules()[0].label_for("Интеграции через REST API и SOAP").as_deref(),
            Some("Rest Api")
        );
    }
}
