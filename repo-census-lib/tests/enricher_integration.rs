//! Per-repository enrichment with fake content fetching and analysis.

use chrono::{DateTime, TimeZone, Utc};
use core::time::Duration;
use ohno::bail;
use repo_census_lib::collect::{
    ContentFetcher, Enricher, EnricherSettings, Executor, GitFetcher, ItemOutcome, NoProgress, QualityAnalyzer, QualityMetrics, QualityStatus,
    RawItem, RetryPolicy, SkipStage,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

type DestinationLog = Arc<Mutex<Vec<PathBuf>>>;

/// Writes a single file where the clone would go and remembers the destination.
#[derive(Debug, Default)]
struct FakeFetcher {
    destinations: DestinationLog,
}

impl FakeFetcher {
    fn log(&self) -> DestinationLog {
        Arc::clone(&self.destinations)
    }
}

impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, _item: &RawItem, destination: &Path) -> repo_census_lib::Result<()> {
        self.destinations.lock().unwrap().push(destination.to_path_buf());
        std::fs::create_dir_all(destination)?;
        std::fs::write(destination.join("Main.java"), "class Main {}")?;
        Ok(())
    }
}

/// Fails like a clone of a deleted repository, after leaving partial content behind.
#[derive(Debug, Default)]
struct FailingFetcher {
    destinations: DestinationLog,
}

impl ContentFetcher for FailingFetcher {
    async fn fetch(&self, item: &RawItem, destination: &Path) -> repo_census_lib::Result<()> {
        self.destinations.lock().unwrap().push(destination.to_path_buf());
        std::fs::create_dir_all(destination.join(".git"))?;
        bail!("git clone failed: repository '{}' not found", item.full_name);
    }
}

#[derive(Debug)]
struct FixedAnalyzer(QualityMetrics);

impl QualityAnalyzer for FixedAnalyzer {
    async fn analyze(&self, content: &Path, output: &Path) -> repo_census_lib::Result<QualityMetrics> {
        assert!(content.join("Main.java").is_file(), "analyzer runs against fetched content");
        assert!(output.is_dir(), "output directory exists before analysis");
        Ok(self.0)
    }
}

#[derive(Debug)]
struct FailingAnalyzer;

impl QualityAnalyzer for FailingAnalyzer {
    async fn analyze(&self, _content: &Path, _output: &Path) -> repo_census_lib::Result<QualityMetrics> {
        bail!("analyzer exited with exit status: 1");
    }
}

fn metrics() -> QualityMetrics {
    QualityMetrics {
        units: 12,
        loc: 3400,
        loc_comments: 420,
        cbo: 4.17,
        dit: 1.5,
        lcom: 22.08,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn executor(base_url: &str) -> Executor {
    let policy = RetryPolicy {
        max_attempts: 2,
        rate_limit_wait: Duration::ZERO,
        max_rate_limit_wait: Duration::ZERO,
        server_error_wait: Duration::ZERO,
        transport_error_wait: Duration::ZERO,
    };
    Executor::new(base_url, None, Duration::from_secs(5), policy).unwrap()
}

fn settings(work_root: &Path, extra_metrics: bool) -> EnricherSettings {
    EnricherSettings {
        work_root: work_root.to_path_buf(),
        item_delay: Duration::ZERO,
        collect_contributors: extra_metrics,
        collect_merged_pull_requests: extra_metrics,
    }
}

fn item(name: &str) -> RawItem {
    serde_json::from_value(json!({
        "full_name": name,
        "stargazers_count": 1234,
        "clone_url": format!("https://github.com/{name}.git"),
        "created_at": "2023-01-02T00:00:00Z",
        "license": { "spdx_id": "Apache-2.0", "key": "apache-2.0", "name": "Apache License 2.0" }
    }))
    .unwrap()
}

async fn mount_releases(server: &MockServer, name: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{name}/releases")))
        .and(query_param("per_page", "1"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_release_count_from_link_header() {
    let server = MockServer::start().await;
    let link = r#"<https://api.github.com/repositories/1/releases?per_page=1&page=2>; rel="next", <https://api.github.com/repositories/1/releases?per_page=1&page=7>; rel="last""#;
    mount_releases(&server, "octo/widget", ResponseTemplate::new(200).insert_header("link", link).set_body_string("[{}]")).await;

    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let ItemOutcome::Enriched(enriched) = enricher.enrich(item("octo/widget")).await else {
        panic!("item should be enriched");
    };

    let e = &enriched.enrichment;
    assert_eq!(e.release_count, 7);
    assert_eq!(e.popularity, 1234);
    assert!((e.maturity_years - 2.0).abs() < f64::EPSILON);
    assert_eq!(e.loc, 3400);
    assert_eq!(e.loc_comments, 420);
    assert!((e.cbo - 4.17).abs() < f64::EPSILON);
    assert_eq!(e.quality, QualityStatus::Measured { units: 12 });
    assert_eq!(enriched.item.full_name, "octo/widget");
}

#[tokio::test]
async fn test_release_count_from_body_length() {
    let server = MockServer::start().await;
    mount_releases(&server, "octo/widget", ResponseTemplate::new(200).set_body_string("[{}, {}, {}]")).await;

    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let ItemOutcome::Enriched(enriched) = enricher.enrich(item("octo/widget")).await else {
        panic!("item should be enriched");
    };
    assert_eq!(enriched.enrichment.release_count, 3);
}

#[tokio::test]
async fn test_release_lookup_failure_degrades_to_zero() {
    let server = MockServer::start().await;
    mount_releases(&server, "octo/widget", ResponseTemplate::new(500)).await;

    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let ItemOutcome::Enriched(enriched) = enricher.enrich(item("octo/widget")).await else {
        panic!("a failed release lookup must not skip the item");
    };
    assert_eq!(enriched.enrichment.release_count, 0);
    assert_eq!(enriched.enrichment.loc, 3400);
}

#[tokio::test]
async fn test_clone_failure_skips_item_and_cleans_up() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FailingFetcher::default();
    let log = Arc::clone(&fetcher.destinations);
    let enricher = Enricher::new(executor(&server.uri()), fetcher, FixedAnalyzer(metrics()), settings(tmp.path(), true), now());

    let outcome = enricher.enrich(item("octo/gone")).await;

    let ItemOutcome::Skipped(skipped) = outcome else {
        panic!("item should be skipped");
    };
    assert_eq!(skipped.name, "octo/gone");
    assert_eq!(skipped.stage, SkipStage::ContentFetch);
    assert!(skipped.reason.contains("not found"));

    let destinations = log.lock().unwrap().clone();
    assert_eq!(destinations.len(), 1);
    assert!(!destinations[0].exists(), "partial clone must be removed");
    assert!(!tmp.path().join("octo_gone").exists(), "working area must be removed");
    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "no metadata is fetched for skipped items");
}

#[tokio::test]
async fn test_unusable_name_skips_at_staging_and_keeps_work_root() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "unrelated").unwrap();

    let fetcher = FakeFetcher::default();
    let log = fetcher.log();
    let enricher = Enricher::new(executor(&server.uri()), fetcher, FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let ItemOutcome::Skipped(skipped) = enricher.enrich(item("")).await else {
        panic!("an item without a usable name should be skipped");
    };

    assert_eq!(skipped.stage, SkipStage::Staging);
    assert!(log.lock().unwrap().is_empty(), "nothing is fetched without a working area");
    assert!(tmp.path().join("notes.txt").is_file(), "the work root is left alone");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_analyzer_failure_zeroes_quality_only() {
    let server = MockServer::start().await;
    mount_releases(&server, "octo/widget", ResponseTemplate::new(200).set_body_string("[{}, {}]")).await;

    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FailingAnalyzer, settings(tmp.path(), false), now());

    let ItemOutcome::Enriched(enriched) = enricher.enrich(item("octo/widget")).await else {
        panic!("an analyzer failure must not skip the item");
    };

    let e = &enriched.enrichment;
    assert_eq!(e.loc, 0);
    assert_eq!(e.loc_comments, 0);
    assert!(e.cbo.abs() < f64::EPSILON);
    assert!(e.dit.abs() < f64::EPSILON);
    assert!(e.lcom.abs() < f64::EPSILON);
    assert!(matches!(&e.quality, QualityStatus::Unavailable(reason) if reason.contains("exit status")));

    assert_eq!(e.release_count, 2);
    assert_eq!(e.popularity, 1234);
    assert!(!tmp.path().join("octo_widget").exists());
}

#[tokio::test]
async fn test_working_area_removed_after_success() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::default();
    let enricher = Enricher::new(executor(&server.uri()), fetcher, FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let outcome = enricher.enrich(item("octo/widget")).await;
    assert!(matches!(outcome, ItemOutcome::Enriched(_)));
    assert!(!tmp.path().join("octo_widget").exists());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_each_item_gets_its_own_area_under_work_root() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::default();
    let log = fetcher.log();
    let enricher = Enricher::new(executor(&server.uri()), fetcher, FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let report = enricher.enrich_all(vec![item("octo/one"), item("octo/two")], &NoProgress).await;
    assert_eq!(report.enriched.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(report.quality_unavailable(), 0);

    let destinations = log.lock().unwrap().clone();
    assert_eq!(destinations.len(), 2);
    assert_ne!(destinations[0], destinations[1]);
    assert!(destinations.iter().all(|d| d.starts_with(tmp.path())));
    assert!(destinations.iter().all(|d| !d.exists()));
}

#[tokio::test]
async fn test_optional_metrics() {
    let server = MockServer::start().await;
    mount_releases(&server, "octo/widget", ResponseTemplate::new(200).set_body_string("[]")).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/contributors"))
        .and(query_param("per_page", "1"))
        .and(query_param("anon", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", r#"<https://api.github.com/repositories/1/contributors?per_page=1&anon=true&page=58>; rel="last""#)
                .set_body_string("[{}]"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .and(query_param("q", "repo:octo/widget is:pr is:merged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total_count": 311, "incomplete_results": false, "items": [] })))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FixedAnalyzer(metrics()), settings(tmp.path(), true), now());

    let ItemOutcome::Enriched(enriched) = enricher.enrich(item("octo/widget")).await else {
        panic!("item should be enriched");
    };
    assert_eq!(enriched.enrichment.release_count, 0);
    assert_eq!(enriched.enrichment.contributors, 58);
    assert_eq!(enriched.enrichment.merged_pull_requests, 311);
}

#[tokio::test]
async fn test_optional_metrics_disabled_make_no_requests() {
    let server = MockServer::start().await;
    mount_releases(&server, "octo/widget", ResponseTemplate::new(200).set_body_string("[]")).await;

    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FixedAnalyzer(metrics()), settings(tmp.path(), false), now());

    let ItemOutcome::Enriched(enriched) = enricher.enrich(item("octo/widget")).await else {
        panic!("item should be enriched");
    };
    assert_eq!(enriched.enrichment.contributors, 0);
    assert_eq!(enriched.enrichment.merged_pull_requests, 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_missing_clone_url_is_skipped() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(
        executor(&server.uri()),
        GitFetcher::new(Duration::from_secs(5)),
        FailingAnalyzer,
        settings(tmp.path(), false),
        now(),
    );

    let mut bare = item("octo/bare");
    bare.clone_url = None;

    let report = enricher.enrich_all(vec![bare], &NoProgress).await;
    assert!(report.enriched.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "octo/bare");
    assert_eq!(report.skipped[0].stage, SkipStage::ContentFetch);
    assert!(report.skipped[0].reason.contains("no clone URL"));
    assert!(!tmp.path().join("octo_bare").exists());
}

#[tokio::test]
async fn test_mixed_outcomes_keep_listing_order() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let enricher = Enricher::new(executor(&server.uri()), FakeFetcher::default(), FailingAnalyzer, settings(tmp.path(), false), now());

    let report = enricher.enrich_all(vec![item("octo/one"), item("octo/two"), item("octo/three")], &NoProgress).await;

    let names: Vec<_> = report.enriched.iter().map(|e| e.item.full_name.as_str()).collect();
    assert_eq!(names, ["octo/one", "octo/two", "octo/three"]);
    assert_eq!(report.quality_unavailable(), 3);
}
