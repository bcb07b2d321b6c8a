use crate::analysis::{mean_from, RoleAnalysis};

const BASELINE: i32 = 50;
const HIGH_SALARY_FROM: f64 = 150_000.0;

/// Skill-tag fragments that mark analytical work.
const ANALYTICAL_SKILLS: &[&str] = &[
    "аналитическое мышление",
    "анализ данных",
    "аналитика",
    "системное мышление",
    "исследовани",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub factor: &'static str,
    pub points: i32,
}

/// Adjustments applied on top of the baseline, in order.
pub fn breakdown(analysis: &RoleAnalysis, currency: &str) -> Vec<Adjustment> {
    let coding = analysis.avg_coding_level();
    let coding_points = if coding < 1.0 {
        20
    } else if coding < 2.0 {
        10
    } else if coding >= 2.5 {
        -10
    } else {
        0
    };

    let skill_names: Vec<String> = analysis.skills.keys().map(str::to_lowercase).collect();
    let analytical = ANALYTICAL_SKILLS
        .iter()
        .filter(|a| skill_names.iter().any(|s| s.contains(*a)))
        .count();

    let salary_points = match mean_from(&analysis.salaries, currency) {
        Some(avg) if avg >= HIGH_SALARY_FROM => 5,
        _ => 0,
    };

    vec![
        Adjustment {
            factor: "coding",
            points: coding_points,
        },
        Adjustment {
            factor: "hybrid_remote",
            points: share_points(analysis.hybrid_remote_ratio()),
        },
        Adjustment {
            factor: "junior_friendly",
            points: share_points(analysis.junior_friendly_ratio()),
        },
        Adjustment {
            factor: "analytical_skills",
            points: if analytical >= 2 { 10 } else { 0 },
        },
        Adjustment {
            factor: "salary",
            points: salary_points,
        },
    ]
}

fn share_points(ratio: f64) -> i32 {
    if ratio >= 0.30 {
        15
    } else if ratio >= 0.15 {
        8
    } else {
        0
    }
}

/// Unclamped baseline plus adjustments.
pub fn raw_score(analysis: &RoleAnalysis, currency: &str) -> i32 {
    BASELINE
        + breakdown(analysis, currency)
            .iter()
            .map(|a| a.points)
            .sum::<i32>()
}

/// Compatibility score in `0..=100`.
pub fn score(analysis: &RoleAnalysis, currency: &str) -> u8 {
    raw_score(analysis, currency).clamp(0, 100) as u8
}
