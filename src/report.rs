use crate::analysis::{percent, Counter, RoleAnalysis, SalaryStats};
use crate::output::CombinedDocument;
use crate::score;

pub fn print_role(a: &RoleAnalysis, top_n: usize, currency: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{}", a.role);
    println!("{}", "=".repeat(70));
    println!(
        "Found: {} | Analyzed: {}",
        a.total_found, a.analyzed_count
    );

    let coding = a.avg_coding_level();
    println!(
        "  Junior-friendly: {}/{} ({:.0}%)",
        a.junior_friendly,
        a.analyzed_count,
        percent(a.junior_friendly, a.analyzed_count)
    );
    println!(
        "  Hybrid/remote:   {}/{} ({:.0}%)",
        a.hybrid_remote,
        a.analyzed_count,
        percent(a.hybrid_remote, a.analyzed_count)
    );
    println!(
        "  Coding level:    {} ({:.1}/3)",
        coding_label(coding),
        coding
    );

    if let Some(s) = a.score {
        let parts: Vec<String> = score::breakdown(a, currency)
            .iter()
            .filter(|adj| adj.points != 0)
            .map(|adj| format!("{} {:+}", adj.factor, adj.points))
            .collect();
        println!("  Score:           {} ({})", s, parts.join(", "));
    }

    print_salary(
        SalaryStats::for_currency(&a.salaries, currency).as_ref(),
        a.analyzed_count,
    );

    if !a.titles.is_empty() {
        println!("\n--- Titles ---");
        for (title, count) in a.titles.most_common(Some(10)) {
            println!("  {:2} | {}", count, truncate(title, 60));
        }
    }

    print_counter("Key skills", &a.skills, top_n);
    print_counter("Requirements", &a.requirements, top_n);

    if !a.experience.is_empty() {
        println!("\n--- Experience ---");
        for (exp, count) in a.experience.most_common(None) {
            println!(
                "  {:40} | {:3} ({:.0}%)",
                truncate(exp, 40),
                count,
                percent(count as usize, a.analyzed_count)
            );
        }
    }
}

fn print_salary(stats: Option<&SalaryStats>, analyzed: usize) {
    let Some(s) = stats else {
        return;
    };
    println!("\n--- Salary ({}) ---", s.currency);
    if let (Some(min), Some(max), Some(avg)) = (s.min_from, s.max_from, s.avg_from) {
        println!("  'from' avg: {} | min: {} | max: {}", avg, min, max);
    }
    if let Some(avg_to) = s.avg_to {
        println!("  'to' avg:   {}", avg_to);
    }
    println!("  With salary: {} of {}", s.count, analyzed);
}

fn print_counter(heading: &str, counter: &Counter, top_n: usize) {
    if counter.is_empty() {
        return;
    }
    println!("\n--- {} (top {}) ---", heading, top_n.min(counter.len()));
    for (key, count) in counter.most_common(Some(top_n)) {
        println!(
            "  {:40} | {:3} | {}",
            truncate(key, 40),
            count,
            "█".repeat(count.min(25) as usize)
        );
    }
}

pub fn print_ranking(doc: &CombinedDocument) {
    println!("\n{}", "=".repeat(78));
    println!("Ranking: {}", doc.profile);
    println!("{}", "=".repeat(78));
    println!(
        "{:<30} | {:>5} | {:>6} | {:>6} | {:>6} | Coding",
        "Role", "Score", "Found", "Junior", "Hybrid"
    );
    println!("{}", "-".repeat(78));
    for r in &doc.ranking {
        println!(
            "{:<30} | {:>5} | {:>6} | {:>5.0}% | {:>5.0}% | {:.1}",
            truncate(&r.role, 30),
            r.score,
            r.total_found,
            r.junior_friendly_pct,
            r.hybrid_remote_pct,
            r.coding_level
        );
    }

    println!(
        "\nTotal analyzed: {} of {} found",
        doc.total_analyzed, doc.total_found
    );
}

fn coding_label(level: f64) -> &'static str {
    if level < 1.0 {
        "minimal"
    } else if level < 2.0 {
        "light (SQL/scripts)"
    } else if level < 2.5 {
        "medium"
    } else {
        "heavy"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Аналитик", 20), "Аналитик");
        assert_eq!(truncate("Системный аналитик", 9), "Системный...");
    }

    #[test]
    fn coding_labels() {
        assert_eq!(coding_label(0.4), "minimal");
        assert_eq!(coding_label(1.0), "light (SQL/scripts)");
        assert_eq!(coding_label(2.2), "medium");
        assert_eq!(coding_label(2.5), "heavy");
    }
}
