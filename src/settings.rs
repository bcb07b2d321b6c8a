use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const BUILTIN: &[(&str, &str)] = &[
    (
        "system-analyst",
        include_str!("../profiles/system_analyst.json"),
    ),
    ("risk", include_str!("../profiles/risk.json")),
    ("career", include_str!("../profiles/career.json")),
];

/// Process-wide settings from `HH_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub user_agent: String,
    pub output_dir: String,
    /// Overrides the profile's region when set.
    pub area: Option<u32>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("api_url", "https://api.hh.ru")?
            .set_default(
                "user_agent",
                concat!("hh_analyzer/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("output_dir", "output")?
            .add_source(Environment::with_prefix("HH").try_parsing(true))
            .build()?
            .try_deserialize()
            .context("invalid HH_* settings")
    }
}

/// One search query analysed as a role.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub slug: String,
    pub query: String,
    #[serde(default)]
    pub max_details: Option<usize>,
    /// Keep only postings whose title contains one of these (case-insensitive).
    #[serde(default)]
    pub title_filter: Vec<String>,
}

/// A run preset: which queries, how deep, which taxonomies.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default = "default_area")]
    pub area: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub max_pages: u32,
    pub max_details: usize,
    #[serde(default = "default_list_interval")]
    pub list_interval_ms: u64,
    #[serde(default = "default_detail_interval")]
    pub detail_interval_ms: u64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    pub requirements_taxonomy: String,
    #[serde(default = "default_coding_taxonomy")]
    pub coding_taxonomy: String,
    #[serde(default = "default_currency")]
    pub salary_currency: String,
    #[serde(default = "default_junior_ids")]
    pub junior_experience_ids: Vec<String>,
    pub roles: Vec<RoleSpec>,
}

fn default_area() -> u32 {
    1
}

fn default_per_page() -> u32 {
    100
}

fn default_list_interval() -> u64 {
    250
}

fn default_detail_interval() -> u64 {
    100
}

fn default_top_n() -> usize {
    50
}

fn default_coding_taxonomy() -> String {
    "coding-level".into()
}

fn default_currency() -> String {
    "RUR".into()
}

fn default_junior_ids() -> Vec<String> {
    vec!["noExperience".into(), "between1And3".into()]
}

impl Profile {
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: Profile = serde_json::from_str(json).context("invalid profile JSON")?;
        profile.validate()?;
        Ok(profile)
    }

    /// Resolve a built-in profile name, or read a JSON file from disk.
    pub fn load(name_or_path: &str) -> Result<Self> {
        if let Some((_, json)) = BUILTIN.iter().find(|(name, _)| *name == name_or_path) {
            return Self::from_json(json)
                .with_context(|| format!("built-in profile '{}'", name_or_path));
        }
        let path = Path::new(name_or_path);
        if !path.exists() {
            bail!(
                "unknown profile '{}' (built-ins: {})",
                name_or_path,
                builtin_names().join(", ")
            );
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading profile {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("loading profile {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            bail!("profile '{}' has no roles", self.name);
        }
        if self.per_page == 0 || self.per_page > 100 {
            bail!("per_page must be in 1..=100, got {}", self.per_page);
        }
        if self.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        let mut slugs = HashSet::new();
        for role in &self.roles {
            if role.slug.trim().is_empty() || role.query.trim().is_empty() {
                bail!("role '{}' needs a slug and a query", role.name);
            }
            if !slugs.insert(role.slug.as_str()) {
                bail!("duplicate role slug '{}'", role.slug);
            }
        }
        Ok(())
    }

    pub fn role_max_details(&self, role: &RoleSpec) -> usize {
        role.max_details.unwrap_or(self.max_details)
    }

    pub fn list_interval(&self) -> Duration {
        Duration::from_millis(self.list_interval_ms)
    }

    pub fn detail_interval(&self) -> Duration {
        Duration::from_millis(self.detail_interval_ms)
    }
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}
