use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::hh::{
    ListingPage, PostingDetail, PostingSummary, SearchQuery, SourceError, VacancySource,
};

/// Gate awaited before every outbound request.
#[allow(async_fn_in_trait)]
pub trait Pacer {
    async fn ready(&self);
}

/// Minimum-interval gate: one permit per period, no burst.
pub struct IntervalGate {
    limiter: DefaultDirectRateLimiter,
}

impl IntervalGate {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        IntervalGate {
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl Pacer for IntervalGate {
    async fn ready(&self) {
        self.limiter.until_ready().await;
    }
}

/// No pacing at all.
#[cfg(test)]
pub struct Unpaced;

#[cfg(test)]
impl Pacer for Unpaced {
    async fn ready(&self) {}
}

/// Result of one fetch step: keep going, drop this item, or stop the stage.
#[derive(Debug)]
pub enum Fetched<T> {
    Ok(T),
    Skip(String),
    Abort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back empty.
    Exhausted,
    /// The source's declared page count was reached.
    DeclaredBound,
    /// `max_pages` requests were made.
    MaxPages,
    /// Transport or protocol failure; earlier pages are kept.
    Aborted(String),
}

#[derive(Debug)]
pub struct Listing {
    pub summaries: Vec<PostingSummary>,
    pub requests: u32,
    pub stop: StopReason,
}

async fn fetch_page<S: VacancySource>(
    source: &S,
    query: &SearchQuery,
    page: u32,
    per_page: u32,
) -> Fetched<ListingPage> {
    match source.search(query, page, per_page).await {
        Ok(p) => Fetched::Ok(p),
        Err(e) => Fetched::Abort(e.to_string()),
    }
}

/// Walk listing pages until one is empty, the declared page count is hit,
/// `max_pages` is reached, or a request fails.
pub async fn fetch_listing<S: VacancySource, P: Pacer>(
    source: &S,
    pacer: &P,
    query: &SearchQuery,
    per_page: u32,
    max_pages: u32,
) -> Listing {
    let mut summaries = Vec::new();
    let mut requests = 0;

    for page in 0..max_pages {
        pacer.ready().await;
        requests += 1;

        let listing = match fetch_page(source, query, page, per_page).await {
            Fetched::Ok(listing) => listing,
            Fetched::Skip(reason) | Fetched::Abort(reason) => {
                warn!(
                    "Listing page {} failed, keeping {} results: {}",
                    page,
                    summaries.len(),
                    reason
                );
                return Listing {
                    summaries,
                    requests,
                    stop: StopReason::Aborted(reason),
                };
            }
        };

        if listing.items.is_empty() {
            return Listing {
                summaries,
                requests,
                stop: StopReason::Exhausted,
            };
        }

        info!("Page {}: {} vacancies", page + 1, listing.items.len());
        summaries.extend(listing.items);

        if let Some(pages) = listing.pages {
            if page + 1 >= pages {
                return Listing {
                    summaries,
                    requests,
                    stop: StopReason::DeclaredBound,
                };
            }
        }
    }

    Listing {
        summaries,
        requests,
        stop: StopReason::MaxPages,
    }
}

/// One detail request. Failures become `Skip`; they never end the batch.
pub async fn fetch_detail<S: VacancySource, P: Pacer>(
    source: &S,
    pacer: &P,
    id: &str,
) -> Fetched<PostingDetail> {
    pacer.ready().await;
    match source.vacancy(id).await {
        Ok(detail) => Fetched::Ok(detail),
        Err(e) => Fetched::Skip(describe(id, &e)),
    }
}

fn describe(id: &str, e: &SourceError) -> String {
    format!("vacancy {}: {}", id, e)
}

pub struct DetailBatch {
    pub pairs: Vec<(PostingSummary, Option<PostingDetail>)>,
    /// Summaries dropped by the title filter without a request.
    pub filtered_out: usize,
}

pub fn title_matches(title: &str, filter: &[String]) -> bool {
    if filter.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    filter.iter().any(|f| title.contains(&f.to_lowercase()))
}

/// Fetch details in listing order until `max_details` were obtained.
pub async fn fetch_details<S: VacancySource, P: Pacer>(
    source: &S,
    pacer: &P,
    summaries: &[PostingSummary],
    max_details: usize,
    title_filter: &[String],
) -> DetailBatch {
    let pb = progress_bar(summaries.len().min(max_details) as u64);
    let mut pairs = Vec::new();
    let mut fetched = 0usize;
    let mut filtered_out = 0usize;

    for summary in summaries {
        if fetched >= max_details {
            break;
        }
        if !title_matches(&summary.title, title_filter) {
            filtered_out += 1;
            continue;
        }

        let detail = match fetch_detail(source, pacer, &summary.id).await {
            Fetched::Ok(detail) => {
                fetched += 1;
                pb.inc(1);
                Some(detail)
            }
            Fetched::Skip(reason) | Fetched::Abort(reason) => {
                warn!("Skipping {}", reason);
                None
            }
        };
        pairs.push((summary.clone(), detail));
    }

    pb.finish_and_clear();
    DetailBatch {
        pairs,
        filtered_out,
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})",
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    /// Scripted source: page sizes per index, ids that fail on detail.
    struct FakeSource {
        page_sizes: Vec<usize>,
        declared_pages: Option<u32>,
        fail_page: Option<u32>,
        fail_ids: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(page_sizes: Vec<usize>, declared_pages: Option<u32>) -> Self {
            FakeSource {
                page_sizes,
                declared_pages,
                fail_page: None,
                fail_ids: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn failure() -> SourceError {
        SourceError::Status {
            status: 503,
            url: "http://fake/vacancies".into(),
        }
    }

    impl VacancySource for FakeSource {
        async fn search(
            &self,
            _query: &SearchQuery,
            page: u32,
            _per_page: u32,
        ) -> Result<ListingPage, SourceError> {
            self.calls.lock().unwrap().push(format!("page:{page}"));
            if self.fail_page == Some(page) {
                return Err(failure());
            }
            let size = self.page_sizes.get(page as usize).copied().unwrap_or(0);
            let items = (0..size)
                .map(|i| PostingSummary {
                    id: format!("{page}-{i}"),
                    title: format!("Аналитик {i}"),
                })
                .collect();
            Ok(ListingPage {
                items,
                pages: self.declared_pages,
            })
        }

        async fn vacancy(&self, id: &str) -> Result<PostingDetail, SourceError> {
            self.calls.lock().unwrap().push(format!("detail:{id}"));
            if self.fail_ids.iter().any(|f| f == id) {
                return Err(failure());
            }
            Ok(PostingDetail {
                id: id.to_string(),
                title: String::new(),
                description: String::new(),
                skills: BTreeSet::new(),
                salary: None,
                experience: None,
                schedule: None,
            })
        }
    }

    fn query() -> SearchQuery {
        SearchQuery {
            text: "аналитик".into(),
            area: Some(1),
        }
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        let source = FakeSource::new(vec![100, 100, 0], Some(3));
        let listing = fetch_listing(&source, &Unpaced, &query(), 100, 10).await;
        assert_eq!(listing.requests, 3);
        assert_eq!(source.calls().len(), 3);
        assert_eq!(listing.summaries.len(), 200);
        assert_eq!(listing.stop, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn declared_bound_wins_over_non_empty_page() {
        let source = FakeSource::new(vec![100, 100, 100, 100], Some(2));
        let listing = fetch_listing(&source, &Unpaced, &query(), 100, 10).await;
        assert_eq!(listing.requests, 2);
        assert_eq!(listing.summaries.len(), 200);
        assert_eq!(listing.stop, StopReason::DeclaredBound);
    }

    #[tokio::test]
    async fn max_pages_without_declared_bound() {
        let source = FakeSource::new(vec![5, 5, 5, 5, 5], None);
        let listing = fetch_listing(&source, &Unpaced, &query(), 5, 3).await;
        assert_eq!(listing.requests, 3);
        assert_eq!(listing.summaries.len(), 15);
        assert_eq!(listing.stop, StopReason::MaxPages);
    }

    #[tokio::test]
    async fn failure_keeps_partial_results() {
        let mut source = FakeSource::new(vec![10, 10, 10], Some(3));
        source.fail_page = Some(1);
        let listing = fetch_listing(&source, &Unpaced, &query(), 10, 10).await;
        assert_eq!(listing.requests, 2);
        assert_eq!(listing.summaries.len(), 10);
        assert!(matches!(listing.stop, StopReason::Aborted(_)));
    }

    #[tokio::test]
    async fn failed_detail_is_skipped() {
        let mut source = FakeSource::new(vec![], None);
        source.fail_ids = vec!["b".into()];
        let summaries: Vec<PostingSummary> = ["a", "b", "c"]
            .iter()
            .map(|id| PostingSummary {
                id: id.to_string(),
                title: "Аналитик".into(),
            })
            .collect();

        assert!(matches!(
            fetch_detail(&source, &Unpaced, "b").await,
            Fetched::Skip(_)
        ));

        let batch = fetch_details(&source, &Unpaced, &summaries, 10, &[]).await;
        assert_eq!(batch.pairs.len(), 3);
        assert!(batch.pairs[0].1.is_some());
        assert!(batch.pairs[1].1.is_none());
        assert!(batch.pairs[2].1.is_some());
    }

    #[tokio::test]
    async fn detail_budget_counts_successes() {
        let mut source = FakeSource::new(vec![], None);
        source.fail_ids = vec!["1".into()];
        let summaries: Vec<PostingSummary> = (0..6)
            .map(|i| PostingSummary {
                id: i.to_string(),
                title: "QA".into(),
            })
            .collect();

        let batch = fetch_details(&source, &Unpaced, &summaries, 3, &[]).await;
        let present = batch.pairs.iter().filter(|(_, d)| d.is_some()).count();
        assert_eq!(present, 3);
        // ids 0, 1 (failed), 2, 3
        assert_eq!(batch.pairs.len(), 4);
    }

    #[tokio::test]
    async fn title_filter_skips_without_request() {
        let source = FakeSource::new(vec![], None);
        let summaries = vec![
            PostingSummary {
                id: "1".into(),
                title: "AML аналитик".into(),
            },
            PostingSummary {
                id: "2".into(),
                title: "Менеджер по продажам".into(),
            },
        ];
        let filter = vec!["aml".to_string(), "комплаенс".to_string()];
        let batch = fetch_details(&source, &Unpaced, &summaries, 10, &filter).await;
        assert_eq!(batch.pairs.len(), 1);
        assert_eq!(batch.filtered_out, 1);
        assert_eq!(source.calls(), vec!["detail:1".to_string()]);
    }

    #[test]
    fn title_filter_rules() {
        assert!(title_matches("anything", &[]));
        assert!(title_matches("Risk Manager", &["risk".into()]));
        assert!(!title_matches("Бухгалтер", &["risk".into()]));
    }

    /// Counts every wait on the gate.
    #[derive(Default)]
    struct CountingPacer {
        waits: Cell<u32>,
    }

    impl Pacer for CountingPacer {
        async fn ready(&self) {
            self.waits.set(self.waits.get() + 1);
        }
    }

    #[tokio::test]
    async fn listing_waits_before_every_request() {
        let mut source = FakeSource::new(vec![10, 10, 10, 10], None);
        source.fail_page = Some(2);
        let pacer = CountingPacer::default();

        let listing = fetch_listing(&source, &pacer, &query(), 10, 10).await;
        assert!(matches!(listing.stop, StopReason::Aborted(_)));
        assert_eq!(listing.requests, 3);
        assert_eq!(pacer.waits.get(), 3);
    }

    #[tokio::test]
    async fn details_wait_per_request_including_failures() {
        let mut source = FakeSource::new(vec![], None);
        source.fail_ids = vec!["1".into()];
        let summaries: Vec<PostingSummary> = (0..5)
            .map(|i| PostingSummary {
                id: i.to_string(),
                title: if i == 2 { "Курьер" } else { "Аналитик" }.into(),
            })
            .collect();
        let filter = vec!["аналитик".to_string()];
        let pacer = CountingPacer::default();

        // 0 ok, 1 failed, 2 filtered, 3 ok, then the budget of 2 is spent
        let batch = fetch_details(&source, &pacer, &summaries, 2, &filter).await;
        assert_eq!(batch.pairs.len(), 3);
        assert_eq!(batch.filtered_out, 1);
        assert_eq!(pacer.waits.get(), 3);
        assert_eq!(source.calls(), vec!["detail:0", "detail:1", "detail:3"]);
    }

    #[tokio::test]
    async fn zero_budget_never_waits() {
        let source = FakeSource::new(vec![], None);
        let summaries = vec![PostingSummary {
            id: "1".into(),
            title: "Аналитик".into(),
        }];
        let pacer = CountingPacer::default();

        let batch = fetch_details(&source, &pacer, &summaries, 0, &[]).await;
        assert!(batch.pairs.is_empty());
        assert_eq!(pacer.waits.get(), 0);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn interval_gate_spaces_requests() {
        let gate = IntervalGate::new(Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..3 {
            gate.ready().await;
        }
        // first permit is immediate, the next two wait one period each
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
