//! End-to-end discovery runs against mock backends, fetcher and prober.

use std::sync::Arc;
use std::time::Duration;

use grant_oracle::backends::{BackendAdapter, FallbackController, RateLimiter};
use grant_oracle::error::BackendErrorKind;
use grant_oracle::testing::{MockBackend, MockFetcher, MockProber, RecordingNotifier};
use grant_oracle::{
    DiscoveryOrchestrator, DiscoveryTask, GrantOracle, MemoryStore, QualityPipeline,
    SessionLifecycleManager, TaskTarget,
};
use tokio_util::sync::CancellationToken;

const SEED_FUND_URL: &str = "https://seedfund.startupindia.gov.in";
const SCHEMES_URL: &str = "https://dpiit.gov.in/schemes";

const SEED_FUND: &str =
    r#"{"grants":[{"title":"Seed Fund","agency":"DPIIT","typical_ticket_lakh":60}]}"#;
const SEED_FUND_SCHEME: &str =
    r#"{"grants":[{"title":"Seed Fund Scheme","agency":"DPIIT, GoI","typical_ticket_lakh":62}]}"#;

fn sessions(backends: Vec<Arc<MockBackend>>, fetcher: MockFetcher) -> SessionLifecycleManager {
    let adapters = backends
        .into_iter()
        .map(|b| b as Arc<dyn BackendAdapter>)
        .collect();
    SessionLifecycleManager::new(
        Arc::new(FallbackController::new(adapters)),
        Arc::new(fetcher),
    )
}

fn page() -> MockFetcher {
    MockFetcher::new().with_default_page("Funding for early-stage startups")
}

#[tokio::test(start_paused = true)]
async fn test_same_grant_from_two_sources_is_stored_once() {
    let backend = Arc::new(
        MockBackend::new("openai")
            .replying_for(SEED_FUND_URL, SEED_FUND)
            .replying_for(SCHEMES_URL, SEED_FUND_SCHEME),
    );
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let oracle = GrantOracle::new(
        DiscoveryOrchestrator::new(sessions(vec![backend], page())),
        QualityPipeline::new(Arc::new(MockProber::new())),
        store.clone(),
        notifier.clone(),
    );

    let run = oracle
        .run_discovery(
            vec![
                DiscoveryTask::discover(SEED_FUND_URL),
                DiscoveryTask::discover(SCHEMES_URL),
            ],
            None,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(run.report.tasks_succeeded, 2);
    assert_eq!(run.report.candidates_found, 2);
    assert_eq!(run.quality.dedup_report.duplicates_found, 1);

    let originals: Vec<_> = run.quality.originals().collect();
    assert_eq!(originals.len(), 1);
    let original = originals[0];
    assert_eq!(original.source_urls.len(), 2);
    assert!(original.source_urls.iter().any(|u| u.contains("seedfund")));
    assert!(original.source_urls.iter().any(|u| u.contains("dpiit.gov.in")));

    let duplicate = run
        .quality
        .records
        .iter()
        .find(|r| r.is_duplicate)
        .expect("one duplicate");
    assert_eq!(duplicate.original_id.as_deref(), Some(original.id.as_str()));

    assert_eq!(run.report.new_records, 1);
    assert_eq!(notifier.events_of_kind("new_record").len(), 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_batch_continues_after_a_failed_task() {
    let backend = Arc::new(MockBackend::new("openai").replying(SEED_FUND));
    let fetcher = page().fail_target("https://offline.gov.in");
    let orchestrator = DiscoveryOrchestrator::new(sessions(vec![backend], fetcher));

    let summary = orchestrator
        .run_batch(
            vec![
                DiscoveryTask::discover(SEED_FUND_URL),
                DiscoveryTask::discover("https://offline.gov.in"),
                DiscoveryTask::discover(SCHEMES_URL),
            ],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(summary.succeeded.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].target.as_str(), "https://offline.gov.in");
    assert!(summary.not_started.is_empty());
    assert_eq!(orchestrator.sessions().active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_abandons_running_task_and_skips_the_rest() {
    let backend = Arc::new(
        MockBackend::new("openai")
            .replying(SEED_FUND)
            .with_delay(Duration::from_secs(600)),
    );
    let orchestrator = DiscoveryOrchestrator::new(sessions(vec![backend], page()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let summary = orchestrator
        .run_batch(
            vec![
                DiscoveryTask::discover(SEED_FUND_URL),
                DiscoveryTask::discover(SCHEMES_URL),
                DiscoveryTask::validate(TaskTarget::Url("https://birac.nic.in".into())),
            ],
            &cancel,
        )
        .await;

    assert!(summary.cancelled);
    assert!(summary.succeeded.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, "cancelled");
    assert_eq!(summary.not_started.len(), 2);
    assert_eq!(orchestrator.sessions().active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_releases_session() {
    let backend = Arc::new(MockBackend::new("openai").with_delay(Duration::from_secs(600)));
    let orchestrator = DiscoveryOrchestrator::new(sessions(vec![backend], page()));

    let summary = orchestrator
        .run_batch(
            vec![DiscoveryTask::discover(SEED_FUND_URL).with_deadline(Duration::from_secs(30))],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, "deadline_exceeded");
    assert_eq!(orchestrator.sessions().active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_calls_to_one_backend_respect_its_floor() {
    let limiter = Arc::new(RateLimiter::new().with_backend("openai", Duration::from_secs(2)));
    let backend = Arc::new(MockBackend::new("openai").with_limiter(limiter));
    let orchestrator = DiscoveryOrchestrator::new(sessions(vec![backend.clone()], page()))
        .with_inter_task_delay(Duration::ZERO);

    let tasks = ["https://a.gov.in", "https://b.gov.in", "https://c.gov.in"]
        .into_iter()
        .map(|url| DiscoveryTask::validate(TaskTarget::Url(url.into())))
        .collect();
    let summary = orchestrator.run_batch(tasks, &CancellationToken::new()).await;

    assert_eq!(summary.succeeded.len(), 3);
    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(2));
    }
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_primary_falls_back_for_the_whole_task() {
    let openai = Arc::new(MockBackend::new("openai").failing(BackendErrorKind::Unavailable));
    let gemini = Arc::new(MockBackend::new("gemini").replying(SEED_FUND));
    let orchestrator =
        DiscoveryOrchestrator::new(sessions(vec![openai.clone(), gemini.clone()], page()));

    let summary = orchestrator
        .run_batch(
            vec![DiscoveryTask::discover(SEED_FUND_URL)],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(summary.succeeded.len(), 1);
    assert_eq!(summary.candidate_count(), 1);
    // Survey fails once on openai, then both exchanges run on gemini.
    assert_eq!(openai.call_count(), 1);
    assert_eq!(gemini.call_count(), 2);
}
