//! End-to-end runs: orchestrator, detection and real adapters over canned
//! HTTP responses.

use std::time::Duration;

use nomad_client::{PlatformAdapter, PlatformRegistry};
use nomad_core::models::{ScrapeTarget, TargetStatus};
use nomad_core::testutil::{MockHttpClient, MockReporter, MockTargetStore, make_test_target};
use nomad_core::{BatchOrchestrator, ErrorKind, JobMerger, ScrapeConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn target(slug: &str, url: &str) -> ScrapeTarget {
    let mut target = make_test_target(slug);
    target.source_url = Some(url.to_string());
    target
}

fn fast_config(max_concurrent: usize) -> ScrapeConfig {
    ScrapeConfig::default()
        .with_max_concurrent(max_concurrent)
        .with_inter_batch_delay(Duration::from_millis(5))
}

fn http_fixture() -> MockHttpClient {
    let greenhouse = json!({"jobs": [
        {
            "id": 1,
            "title": "Senior Rust Engineer",
            "content": "&lt;p&gt;Own the &lt;b&gt;core&lt;/b&gt;&lt;/p&gt;",
            "location": {"name": "Remote - Americas"},
            "absolute_url": "https://boards.greenhouse.io/acme/jobs/1"
        },
        {
            "id": 2,
            "title": "Office Manager",
            "location": {"name": "New York"},
            "absolute_url": "https://boards.greenhouse.io/acme/jobs/2"
        }
    ]});
    let lever = json!([
        {
            "id": "abc",
            "text": "Staff Go Developer",
            "workplaceType": "remote",
            "hostedUrl": "https://jobs.lever.co/globex/abc",
            "categories": {"location": "Lisbon", "commitment": "Contract"}
        }
    ]);
    let feed = r#"<rss version="2.0"><channel>
        <item>
            <title>Initech: Remote Python Developer</title>
            <guid>https://weworkremotely.com/jobs/77</guid>
            <link>https://weworkremotely.com/jobs/77</link>
            <category>Python</category>
            <region>Anywhere</region>
        </item>
    </channel></rss>"#;

    MockHttpClient::new()
        .with_response(
            "https://boards-api.greenhouse.io/v1/boards/acme/jobs?content=true",
            200,
            &greenhouse.to_string(),
        )
        .with_response(
            "https://api.lever.co/v0/postings/globex?mode=json",
            200,
            &lever.to_string(),
        )
        .with_response("https://weworkremotely.com/remote-jobs.rss", 200, feed)
        .with_response(
            "https://boards-api.greenhouse.io/v1/boards/throttled/jobs?content=true",
            429,
            "Too Many Requests",
        )
}

#[tokio::test]
async fn mixed_platform_run() {
    let targets = vec![
        target("acme", "https://boards.greenhouse.io/acme"),
        target("globex", "https://jobs.lever.co/globex"),
        target("wwr", "https://weworkremotely.com/"),
        target("gone", "https://boards.greenhouse.io/gone"),
        target("throttled", "https://boards.greenhouse.io/throttled"),
    ];
    let store = MockTargetStore::with_targets(targets.clone());
    let source = PlatformAdapter::generic(http_fixture(), PlatformRegistry::builtin());
    let orchestrator = BatchOrchestrator::new(store.clone(), source, fast_config(2));
    let reporter = MockReporter::new();

    let run = orchestrator
        .run(targets[0].job_board_id, &CancellationToken::new(), &reporter)
        .await
        .unwrap();

    assert_eq!(reporter.batch_sizes(), vec![2, 2, 1]);
    assert_eq!(run.stats.successful, 3);
    assert_eq!(run.stats.failed, 2);
    assert_eq!(run.stats.total_jobs_seen, 4);
    assert_eq!(run.stats.remote_jobs_kept, 3);

    let titles: Vec<_> = run.jobs.iter().map(|j| j.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Senior Rust Engineer", "Staff Go Developer", "Remote Python Developer"]
    );
    assert_eq!(run.jobs[0].description, "Own the core");
    assert_eq!(run.jobs[1].platform, "lever");
    assert_eq!(run.jobs[2].company_slug, "initech");
    assert_eq!(run.jobs[2].tags, vec!["python"]);

    for t in &targets {
        assert!(store.final_status(t.id).unwrap().is_terminal());
    }
    let gone = store.final_message(targets[3].id).unwrap();
    assert!(gone.starts_with(ErrorKind::NotFound.as_str()), "{gone}");
    let throttled = store.final_message(targets[4].id).unwrap();
    assert!(throttled.starts_with(ErrorKind::RateLimited.as_str()), "{throttled}");
    assert_eq!(store.final_status(targets[1].id), Some(TargetStatus::Success));
}

#[tokio::test]
async fn repeated_runs_share_a_merger() {
    let targets = vec![target("acme", "https://boards.greenhouse.io/acme")];
    let store = MockTargetStore::with_targets(targets.clone());
    let source = PlatformAdapter::generic(http_fixture(), PlatformRegistry::builtin());
    let orchestrator = BatchOrchestrator::new(store, source, fast_config(5));
    let reporter = MockReporter::new();
    let cancel = CancellationToken::new();
    let mut merger = JobMerger::new();

    let first = orchestrator
        .run_with_merger(targets[0].job_board_id, &mut merger, &cancel, &reporter)
        .await
        .unwrap();
    let second = orchestrator
        .run_with_merger(targets[0].job_board_id, &mut merger, &cancel, &reporter)
        .await
        .unwrap();

    assert_eq!(first.jobs.len(), 1);
    assert!(second.jobs.is_empty());
    assert_eq!(second.stats.successful, 1);
    assert!(merger.contains("greenhouse", "1"));
}

#[tokio::test]
async fn fixed_platform_ignores_detection() {
    let mut globex = make_test_target("globex");
    globex.source_url = None;
    let store = MockTargetStore::with_targets(vec![globex.clone()]);

    let registry = PlatformRegistry::builtin();
    let lever = registry.get("lever").unwrap();
    let source = PlatformAdapter::for_descriptor(http_fixture(), lever);
    let orchestrator = BatchOrchestrator::new(store, source, fast_config(1));

    let run = orchestrator
        .run(globex.job_board_id, &CancellationToken::new(), &MockReporter::new())
        .await
        .unwrap();
    assert_eq!(run.jobs.len(), 1);
    assert_eq!(run.jobs[0].external_id, "abc");
}
