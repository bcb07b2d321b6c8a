use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::analysis::{merge_all, percent, Counter, RoleAnalysis, SalaryStats};
use crate::score;

const TOP_TITLES: usize = 15;

/// Counter entries serialized as a JSON object in rank order.
pub struct Ranked(Vec<(String, u64)>);

impl Ranked {
    pub fn top(counter: &Counter, n: usize) -> Self {
        Ranked(
            counter
                .most_common(Some(n))
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    pub fn all(counter: &Counter) -> Self {
        Self::top(counter, usize::MAX)
    }
}

impl Serialize for Ranked {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Serialize)]
pub struct RoleDocument {
    pub role: String,
    pub query: String,
    pub generated_at: DateTime<Utc>,
    pub total_found: usize,
    pub total_analyzed: usize,
    pub score: Option<u8>,
    pub coding_level: f64,
    pub junior_friendly_pct: f64,
    pub hybrid_remote_pct: f64,
    pub skills: Ranked,
    pub requirements: Ranked,
    pub experience: Ranked,
    pub work_format: Ranked,
    pub titles: Ranked,
    pub salary: Option<SalaryStats>,
}

impl RoleDocument {
    pub fn new(
        a: &RoleAnalysis,
        top_n: usize,
        currency: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        RoleDocument {
            role: a.role.clone(),
            query: a.query.clone(),
            generated_at,
            total_found: a.total_found,
            total_analyzed: a.analyzed_count,
            score: a.score,
            coding_level: a.avg_coding_level(),
            junior_friendly_pct: percent(a.junior_friendly, a.analyzed_count),
            hybrid_remote_pct: percent(a.hybrid_remote, a.analyzed_count),
            skills: Ranked::top(&a.skills, top_n),
            requirements: Ranked::top(&a.requirements, top_n),
            experience: Ranked::all(&a.experience),
            work_format: Ranked::all(&a.work_format),
            titles: Ranked::top(&a.titles, TOP_TITLES),
            salary: SalaryStats::for_currency(&a.salaries, currency),
        }
    }
}

#[derive(Serialize)]
pub struct RankingEntry {
    pub role: String,
    pub slug: String,
    pub score: u8,
    pub total_found: usize,
    pub total_analyzed: usize,
    pub junior_friendly_pct: f64,
    pub hybrid_remote_pct: f64,
    pub coding_level: f64,
}

/// Totals for a whole run, recomputed from merged raw data.
#[derive(Serialize)]
pub struct CombinedDocument {
    pub profile: String,
    pub generated_at: DateTime<Utc>,
    pub total_found: usize,
    pub total_analyzed: usize,
    pub score: u8,
    pub coding_level: f64,
    pub junior_friendly_pct: f64,
    pub hybrid_remote_pct: f64,
    pub skills: Ranked,
    pub requirements: Ranked,
    pub experience: Ranked,
    pub salary: Option<SalaryStats>,
    pub ranking: Vec<RankingEntry>,
}

impl CombinedDocument {
    pub fn new(
        profile: &str,
        results: &[(String, RoleAnalysis)],
        top_n: usize,
        currency: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let merged = merge_all(profile, results.iter().map(|(_, a)| a));

        let mut ranking: Vec<RankingEntry> = results
            .iter()
            .map(|(slug, a)| RankingEntry {
                role: a.role.clone(),
                slug: slug.clone(),
                score: a.score.unwrap_or_else(|| score::score(a, currency)),
                total_found: a.total_found,
                total_analyzed: a.analyzed_count,
                junior_friendly_pct: percent(a.junior_friendly, a.analyzed_count),
                hybrid_remote_pct: percent(a.hybrid_remote, a.analyzed_count),
                coding_level: a.avg_coding_level(),
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.slug.cmp(&b.slug))
        });

        CombinedDocument {
            profile: profile.to_string(),
            generated_at,
            total_found: merged.total_found,
            total_analyzed: merged.analyzed_count,
            score: score::score(&merged, currency),
            coding_level: merged.avg_coding_level(),
            junior_friendly_pct: percent(merged.junior_friendly, merged.analyzed_count),
            hybrid_remote_pct: percent(merged.hybrid_remote, merged.analyzed_count),
            skills: Ranked::top(&merged.skills, top_n),
            requirements: Ranked::top(&merged.requirements, top_n),
            experience: Ranked::all(&merged.experience),
            salary: SalaryStats::for_currency(&merged.salaries, currency),
            ranking,
        }
    }
}

/// Pretty-print `doc` to `dir/file_name`, creating `dir` if needed.
pub fn write_json<T: Serialize>(dir: &Path, file_name: &str, doc: &T) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(&path, json)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
