mod analysis;
mod classify;
mod fetch;
mod hh;
mod output;
mod report;
mod score;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::classify::taxonomy::{self, Taxonomy};
use crate::classify::Classifier;
use crate::fetch::{IntervalGate, StopReason};
use crate::hh::{HhClient, SearchQuery};
use crate::output::{CombinedDocument, RoleDocument};
use crate::settings::{Profile, Settings};

#[derive(Parser)]
#[command(name = "hh_analyzer", about = "Vacancy requirement and compatibility analyzer for hh.ru")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, classify and aggregate every role of a profile
    Run {
        /// Built-in profile name or path to a profile JSON file
        #[arg(short, long, default_value = "system-analyst")]
        profile: String,
        /// Directory for JSON results (default: $HH_OUTPUT_DIR or ./output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only run roles with these slugs
        #[arg(short, long)]
        role: Vec<String>,
        /// Override the profile's page limit
        #[arg(long)]
        max_pages: Option<u32>,
        /// Override every role's detail limit
        #[arg(short = 'n', long)]
        max_details: Option<usize>,
    },
    /// List built-in profiles and taxonomies
    Profiles,
    /// Classify a text offline against a taxonomy
    Classify {
        /// Built-in taxonomy name or path to a taxonomy JSON file
        #[arg(short, long, default_value = "system-analyst")]
        taxonomy: String,
        /// Graded taxonomy used for the coding level
        #[arg(long, default_value = "coding-level")]
        coding: String,
        /// Read the text (HTML allowed) from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Text to classify when no file is given
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            profile,
            output,
            role,
            max_pages,
            max_details,
        } => {
            let mut profile = Profile::load(&profile)?;
            if let Some(n) = max_pages {
                profile.max_pages = n.max(1);
            }
            if let Some(n) = max_details {
                profile.max_details = n;
                for r in &mut profile.roles {
                    r.max_details = None;
                }
            }
            if !role.is_empty() {
                profile.roles.retain(|r| role.contains(&r.slug));
                if profile.roles.is_empty() {
                    anyhow::bail!("no role in profile '{}' matches {:?}", profile.name, role);
                }
            }
            run_profile(&profile, output).await
        }
        Commands::Profiles => {
            for name in settings::builtin_names() {
                let p = Profile::load(name)?;
                println!(
                    "{:<16} {:>2} roles | {} pages x {} | taxonomy: {}",
                    p.name,
                    p.roles.len(),
                    p.max_pages,
                    p.per_page,
                    p.requirements_taxonomy
                );
                for r in &p.roles {
                    println!("    {:<22} {}", r.slug, r.name);
                }
            }
            println!("\nTaxonomies: {}", taxonomy::builtin_names().join(", "));
            Ok(())
        }
        Commands::Classify {
            taxonomy,
            coding,
            file,
            text,
        } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => text.join(" "),
            };
            let requirements = Taxonomy::load(&taxonomy)?;
            let coding = Taxonomy::load_graded(&coding)?;
            let plain = classify::text::normalize(&raw);

            let labels = classify::requirement_set(&requirements, &plain);
            println!(
                "Taxonomy:     {} ({} rules)",
                requirements.name(),
                requirements.rules().len()
            );
            println!(
                "Labels:       {}",
                labels.into_iter().collect::<Vec<_>>().join(", ")
            );
            println!(
                "Coding level: {} ({})",
                classify::coding_level(&coding, &plain).as_u8(),
                coding.name()
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run every role of `profile`. Fetch failures shrink the sample but never
/// fail the run; only configuration and output errors do.
async fn run_profile(profile: &Profile, output: Option<PathBuf>) -> Result<()> {
    let settings = Settings::load()?;
    let classifier = Classifier::new(
        Taxonomy::load(&profile.requirements_taxonomy)?,
        Taxonomy::load_graded(&profile.coding_taxonomy)?,
        profile.junior_experience_ids.clone(),
    );
    let client = HhClient::new(&settings.api_url, &settings.user_agent)?;
    let list_gate = IntervalGate::new(profile.list_interval());
    let detail_gate = IntervalGate::new(profile.detail_interval());
    let area = settings.area.unwrap_or(profile.area);
    let out_dir = output.unwrap_or_else(|| PathBuf::from(&settings.output_dir));
    let currency = profile.salary_currency.as_str();
    let generated_at = Utc::now();

    info!(
        "Profile '{}': {} roles, area {}, up to {} pages",
        profile.name,
        profile.roles.len(),
        area,
        profile.max_pages
    );

    let mut results = Vec::new();
    for role in &profile.roles {
        println!("\nLoading: {}...", role.name);
        let query = SearchQuery {
            text: role.query.clone(),
            area: Some(area),
        };

        let listing = fetch::fetch_listing(
            &client,
            &list_gate,
            &query,
            profile.per_page,
            profile.max_pages,
        )
        .await;
        match &listing.stop {
            StopReason::Aborted(reason) => warn!(
                "Listing for '{}' aborted after {} requests: {}",
                role.slug, listing.requests, reason
            ),
            stop => info!(
                "Listing for '{}': {} vacancies in {} requests ({:?})",
                role.slug,
                listing.summaries.len(),
                listing.requests,
                stop
            ),
        }
        if listing.summaries.is_empty() {
            println!("  No vacancies found");
            continue;
        }

        let max_details = profile.role_max_details(role);
        println!(
            "  Found {} vacancies, analyzing up to {}...",
            listing.summaries.len(),
            max_details
        );
        let batch = fetch::fetch_details(
            &client,
            &detail_gate,
            &listing.summaries,
            max_details,
            &role.title_filter,
        )
        .await;
        if batch.filtered_out > 0 {
            info!("{} vacancies dropped by title filter", batch.filtered_out);
        }

        let mut analysis = analysis::aggregate(
            &role.name,
            &role.query,
            listing.summaries.len(),
            &batch.pairs,
            &classifier,
        );
        analysis.score = Some(score::score(&analysis, currency));

        report::print_role(&analysis, profile.top_n, currency);
        let doc = RoleDocument::new(&analysis, profile.top_n, currency, generated_at);
        let path = output::write_json(&out_dir, &format!("{}.json", role.slug), &doc)?;
        info!("Saved {}", path.display());

        results.push((role.slug.clone(), analysis));
    }

    if results.is_empty() {
        println!("\nNo vacancies found for any role.");
        return Ok(());
    }

    let combined = CombinedDocument::new(
        &profile.name,
        &results,
        profile.top_n,
        currency,
        generated_at,
    );
    report::print_ranking(&combined);
    let path = output::write_json(
        &out_dir,
        &format!("{}_combined.json", profile.name),
        &combined,
    )?;
    println!("\nSaved: {}", path.display());
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
