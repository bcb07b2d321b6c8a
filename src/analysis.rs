use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::classify::{Classifier, PostingFacts};
use crate::hh::{PostingDetail, PostingSummary, Salary};

/// Label → number of postings. Merge is a pointwise sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counter(BTreeMap<String, u64>);

impl Counter {
    pub fn add(&mut self, key: &str) {
        *self.0.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Count each distinct key of one posting once.
    pub fn add_set(&mut self, keys: &BTreeSet<String>) {
        for key in keys {
            self.add(key);
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn merge(&mut self, other: &Counter) {
        for (key, count) in &other.0 {
            *self.0.entry(key.clone()).or_insert(0) += count;
        }
    }

    /// Highest counts first, ties by key. `None` returns everything.
    pub fn most_common(&self, n: Option<usize>) -> Vec<(&str, u64)> {
        self.0
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
            .take(n.unwrap_or(usize::MAX))
            .map(|(k, v)| (k.as_str(), *v))
            .collect()
    }
}

impl<const N: usize> From<[(&str, u64); N]> for Counter {
    fn from(entries: [(&str, u64); N]) -> Self {
        Counter(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

/// Raw statistics for one query batch. Only raw, summable data is stored;
/// averages and ratios are derived on demand so merged views stay correct.
#[derive(Debug, Clone, Default)]
pub struct RoleAnalysis {
    pub role: String,
    pub query: String,
    pub total_found: usize,
    pub analyzed_count: usize,
    pub skills: Counter,
    pub requirements: Counter,
    pub experience: Counter,
    pub work_format: Counter,
    pub titles: Counter,
    pub salaries: Vec<Salary>,
    pub coding_level_sum: u64,
    pub junior_friendly: usize,
    pub hybrid_remote: usize,
    pub score: Option<u8>,
}

impl RoleAnalysis {
    pub fn new(role: &str, query: &str, total_found: usize) -> Self {
        RoleAnalysis {
            role: role.to_string(),
            query: query.to_string(),
            total_found,
            ..Default::default()
        }
    }

    pub fn record(&mut self, facts: &PostingFacts) {
        self.analyzed_count += 1;
        self.skills.add_set(&facts.skills);
        self.requirements.add_set(&facts.requirements);
        if let Some(salary) = &facts.salary {
            self.salaries.push(salary.clone());
        }
        if let Some(exp) = &facts.experience {
            self.experience.add(exp);
        }
        self.work_format.add(facts.work_format.label());
        if !facts.work_format.is_office() {
            self.hybrid_remote += 1;
        }
        if facts.junior_friendly {
            self.junior_friendly += 1;
        }
        if !facts.title.is_empty() {
            self.titles.add(&facts.title);
        }
        self.coding_level_sum += u64::from(facts.coding_level.as_u8());
    }

    pub fn avg_coding_level(&self) -> f64 {
        ratio(self.coding_level_sum as usize, self.analyzed_count)
    }

    pub fn hybrid_remote_ratio(&self) -> f64 {
        ratio(self.hybrid_remote, self.analyzed_count)
    }

    pub fn junior_friendly_ratio(&self) -> f64 {
        ratio(self.junior_friendly, self.analyzed_count)
    }

    /// Pointwise sum of raw data. The score is dropped: it must be
    /// recomputed from the merged totals.
    pub fn merge(mut self, other: &RoleAnalysis) -> RoleAnalysis {
        self.total_found += other.total_found;
        self.analyzed_count += other.analyzed_count;
        self.skills.merge(&other.skills);
        self.requirements.merge(&other.requirements);
        self.experience.merge(&other.experience);
        self.work_format.merge(&other.work_format);
        self.titles.merge(&other.titles);
        self.salaries.extend(other.salaries.iter().cloned());
        self.coding_level_sum += other.coding_level_sum;
        self.junior_friendly += other.junior_friendly;
        self.hybrid_remote += other.hybrid_remote;
        self.score = None;
        self
    }
}

/// Combined totals across any number of batches.
pub fn merge_all<'a, I>(role: &str, analyses: I) -> RoleAnalysis
where
    I: IntoIterator<Item = &'a RoleAnalysis>,
{
    analyses
        .into_iter()
        .fold(RoleAnalysis::new(role, "", 0), |acc, a| acc.merge(a))
}

/// Build one role's statistics. Postings without a detail are skipped, but
/// every summary counts toward `total_found` via the caller.
pub fn aggregate(
    role: &str,
    query: &str,
    total_found: usize,
    pairs: &[(PostingSummary, Option<PostingDetail>)],
    classifier: &Classifier,
) -> RoleAnalysis {
    let mut analysis = RoleAnalysis::new(role, query, total_found);
    for (summary, detail) in pairs {
        if let Some(detail) = detail {
            let title = if summary.title.is_empty() {
                &detail.title
            } else {
                &summary.title
            };
            let facts = classifier.process(title, detail);
            debug!(
                "Vacancy {}: {} requirements, coding level {}",
                detail.id,
                facts.requirements.len(),
                facts.coding_level.as_u8()
            );
            analysis.record(&facts);
        }
    }
    analysis
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryStats {
    pub currency: String,
    pub count: usize,
    pub min_from: Option<i64>,
    pub max_from: Option<i64>,
    pub avg_from: Option<i64>,
    pub avg_to: Option<i64>,
}

impl SalaryStats {
    pub fn for_currency(observations: &[Salary], currency: &str) -> Option<SalaryStats> {
        let matching: Vec<&Salary> = observations
            .iter()
            .filter(|s| s.currency == currency)
            .collect();
        if matching.is_empty() {
            return None;
        }

        let from: Vec<i64> = matching
            .iter()
            .filter_map(|s| s.from)
            .filter(|v| *v != 0)
            .collect();
        let to: Vec<i64> = matching
            .iter()
            .filter_map(|s| s.to)
            .filter(|v| *v != 0)
            .collect();

        Some(SalaryStats {
            currency: currency.to_string(),
            count: matching.len(),
            min_from: from.iter().min().copied(),
            max_from: from.iter().max().copied(),
            avg_from: mean_floor(&from),
            avg_to: mean_floor(&to),
        })
    }
}

/// Mean `from` over observations in `currency`, if any.
pub fn mean_from(observations: &[Salary], currency: &str) -> Option<f64> {
    let from: Vec<i64> = observations
        .iter()
        .filter(|s| s.currency == currency)
        .filter_map(|s| s.from)
        .collect();
    if from.is_empty() {
        None
    } else {
        Some(from.iter().sum::<i64>() as f64 / from.len() as f64)
    }
}

fn mean_floor(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<i64>().div_euclid(values.len() as i64))
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

pub fn percent(part: usize, total: usize) -> f64 {
    ratio(part, total) * 100.0
}
