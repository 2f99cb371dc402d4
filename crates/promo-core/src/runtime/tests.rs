use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value, json};
use tokio::sync::{Notify, Semaphore};

use crate::runtime::orchestrator::{Generators, INTERNAL_FAILURE, Orchestrator, OrchestratorConfig};
use crate::runtime::params::MarketingParams;
use crate::runtime::session::MemorySessionStore;
use crate::runtime::storage::{MemoryTaskStore, TaskStore};
use crate::runtime::types::{
    ImageSlot, MarketingCopy, OverallStatus, RuntimeError, StageStatus, StatusReport, TaskSnapshot,
};
use crate::services::{ContentGenerator, GenerationError, ImageGenerator};

// ── Fakes ────────────────────────────────────────────────────────────────────

fn copy_for(params: &MarketingParams) -> MarketingCopy {
    MarketingCopy {
        title: format!("All about {}", params.product),
        punchline: "Try it today".into(),
        body: format!("{} is here.", params.product),
        hashtags: vec!["#new".into()],
        keywords: vec![params.product.clone()],
    }
}

/// Records every request; optionally fails or waits on a gate first.
#[derive(Default)]
struct FakeCopywriter {
    seen: Mutex<Vec<MarketingParams>>,
    fail_with: Option<String>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

#[async_trait]
impl ContentGenerator for FakeCopywriter {
    async fn generate_copy(
        &self,
        params: &MarketingParams,
    ) -> Result<MarketingCopy, GenerationError> {
        self.seen.lock().unwrap().push(params.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match &self.fail_with {
            Some(message) => Err(GenerationError::Rejected {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(copy_for(params)),
        }
    }
}

struct PanickingCopywriter;

#[async_trait]
impl ContentGenerator for PanickingCopywriter {
    async fn generate_copy(&self, _: &MarketingParams) -> Result<MarketingCopy, GenerationError> {
        panic!("model client bug");
    }
}

#[derive(Default)]
struct FakeImager {
    /// `(img_prompt, logo)` per call.
    seen: Mutex<Vec<(String, String)>>,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl ImageGenerator for FakeImager {
    async fn generate_image(
        &self,
        _copy: &MarketingCopy,
        img_prompt: &str,
        logo: &str,
    ) -> Result<Bytes, GenerationError> {
        self.seen
            .lock()
            .unwrap()
            .push((img_prompt.to_owned(), logo.to_owned()));
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail {
            Err(GenerationError::Unavailable {
                status: 503,
                message: "model loading".into(),
            })
        } else {
            Ok(Bytes::from_static(b"\xff\xd8jpeg"))
        }
    }
}

struct Harness {
    orchestrator: Orchestrator,
    tasks: MemoryTaskStore,
}

fn harness_with(
    content: Arc<dyn ContentGenerator>,
    image: Arc<dyn ImageGenerator>,
    config: OrchestratorConfig,
) -> Harness {
    let tasks = MemoryTaskStore::new();
    let sessions = MemorySessionStore::new(Duration::from_secs(3600));
    let orchestrator = Orchestrator::start(
        Arc::new(tasks.clone()),
        Arc::new(sessions),
        Generators { content, image },
        config,
    );
    Harness {
        orchestrator,
        tasks,
    }
}

fn harness(content: Arc<dyn ContentGenerator>, image: Arc<dyn ImageGenerator>) -> Harness {
    harness_with(content, image, OrchestratorConfig::default())
}

fn params() -> MarketingParams {
    MarketingParams::from_json(json!({
        "img_prompt": "sunlit shelves of bread",
        "prompt": "Announce our spring range",
        "platform": ["Instagram", "Facebook"],
        "product": "Y",
        "logo": "b3JpZ2luYWw=",
        "tone": "warm",
    }))
    .unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Poll the store (not `check_status`, which may consume) until terminal.
async fn wait_terminal(tasks: &MemoryTaskStore, token: &str) -> TaskSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = tasks.snapshot(token).await.unwrap();
            if snapshot.status.overall_status.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task did not finish")
}

// ── Full generation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn full_generation_completes_with_content_and_image() {
    let h = harness(Arc::new(FakeCopywriter::default()), Arc::new(FakeImager::default()));

    let token = h.orchestrator.submit_generation(params()).await.unwrap();
    let snapshot = wait_terminal(&h.tasks, &token).await;

    assert_eq!(snapshot.status.overall_status, OverallStatus::Completed);
    assert_eq!(snapshot.status.content_status, StageStatus::Completed);
    assert_eq!(snapshot.status.image_status, StageStatus::Completed);
    assert_eq!(snapshot.status.error, None);

    match h.orchestrator.check_status(&token).await.unwrap() {
        StatusReport::Completed(result) => {
            assert_eq!(result.content.unwrap().title, "All about Y");
            assert!(matches!(result.image, ImageSlot::Ready(_)));
        }
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn content_failure_fails_the_task_and_skips_the_image() {
    let imager = Arc::new(FakeImager::default());
    let h = harness(
        Arc::new(FakeCopywriter {
            fail_with: Some("prompt blocked by safety filter".into()),
            ..Default::default()
        }),
        imager.clone(),
    );

    let token = h.orchestrator.submit_generation(params()).await.unwrap();
    let snapshot = wait_terminal(&h.tasks, &token).await;

    assert_eq!(snapshot.status.overall_status, OverallStatus::Failed);
    assert_eq!(snapshot.status.content_status, StageStatus::Processing);
    assert!(snapshot.result.content.is_none());
    assert!(imager.seen.lock().unwrap().is_empty());

    match h.orchestrator.check_status(&token).await.unwrap() {
        StatusReport::Failed(message) => assert!(message.contains("safety filter"), "{message}"),
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn image_failure_is_tolerated() {
    let h = harness(
        Arc::new(FakeCopywriter::default()),
        Arc::new(FakeImager {
            fail: true,
            ..Default::default()
        }),
    );

    let token = h.orchestrator.submit_generation(params()).await.unwrap();
    let snapshot = wait_terminal(&h.tasks, &token).await;

    assert_eq!(snapshot.status.overall_status, OverallStatus::Completed);
    assert_eq!(snapshot.status.image_status, StageStatus::Completed);
    assert!(snapshot.result.content.is_some());
    assert_eq!(snapshot.result.image, ImageSlot::Unavailable);
}

#[tokio::test]
async fn worker_panic_is_recorded_on_the_task() {
    let h = harness(Arc::new(PanickingCopywriter), Arc::new(FakeImager::default()));

    let token = h.orchestrator.submit_generation(params()).await.unwrap();
    let snapshot = wait_terminal(&h.tasks, &token).await;

    assert_eq!(snapshot.status.overall_status, OverallStatus::Failed);
    assert_eq!(snapshot.status.error.as_deref(), Some(INTERNAL_FAILURE));
}

#[tokio::test]
async fn content_is_visible_before_its_status_flips_and_before_the_image() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        Arc::new(FakeCopywriter::default()),
        Arc::new(FakeImager {
            gate: Some(gate.clone()),
            ..Default::default()
        }),
    );

    let token = h.orchestrator.submit_generation(params()).await.unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = h.tasks.snapshot(&token).await.unwrap();
            if snapshot.status.content_status == StageStatus::Completed {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(snapshot.result.content.is_some());
    assert_eq!(snapshot.status.image_status, StageStatus::Processing);
    assert_eq!(snapshot.status.overall_status, OverallStatus::Processing);

    match h.orchestrator.check_status(&token).await.unwrap() {
        StatusReport::Processing(progress) => {
            assert_eq!(progress.content_status, StageStatus::Completed);
        }
        other => panic!("unexpected report: {other:?}"),
    }

    gate.add_permits(1);
    let done = wait_terminal(&h.tasks, &token).await;
    assert!(matches!(done.result.image, ImageSlot::Ready(_)));
}

// ── Regeneration ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn content_regeneration_merges_overrides_over_stored_params() {
    let writer = Arc::new(FakeCopywriter::default());
    let imager = Arc::new(FakeImager::default());
    let h = harness(writer.clone(), imager.clone());

    let root = h.orchestrator.submit_generation(params()).await.unwrap();
    wait_terminal(&h.tasks, &root).await;

    let derived = h
        .orchestrator
        .regenerate_content(&root, object(json!({ "task_id": root, "product": "X" })))
        .await
        .unwrap();
    assert_ne!(derived, root);
    let snapshot = wait_terminal(&h.tasks, &derived).await;

    assert_eq!(snapshot.status.overall_status, OverallStatus::Completed);
    assert_eq!(snapshot.status.image_status, StageStatus::NotStarted);
    assert_eq!(snapshot.result.image, ImageSlot::NotRequested);
    assert_eq!(snapshot.result.content.unwrap().title, "All about X");

    let seen = writer.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let original = &seen[0];
    let regenerated = &seen[1];
    assert_eq!(original.product, "Y");
    assert_eq!(regenerated.product, "X");
    assert_eq!(regenerated.prompt, original.prompt);
    assert_eq!(regenerated.img_prompt, original.img_prompt);
    assert_eq!(regenerated.platform, original.platform);
    assert_eq!(regenerated.logo, original.logo);
    assert_eq!(regenerated.extra, original.extra);

    // Only the full generation asked for an image.
    assert_eq!(imager.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn image_regeneration_reuses_or_replaces_the_logo() {
    let writer = Arc::new(FakeCopywriter::default());
    let imager = Arc::new(FakeImager::default());
    let h = harness(writer.clone(), imager.clone());

    let root = h.orchestrator.submit_generation(params()).await.unwrap();
    let root_snapshot = wait_terminal(&h.tasks, &root).await;

    let same_logo = h.orchestrator.regenerate_image(&root, None).await.unwrap();
    let snapshot = wait_terminal(&h.tasks, &same_logo).await;
    assert_eq!(snapshot.status.content_status, StageStatus::NotStarted);
    assert_eq!(snapshot.status.overall_status, OverallStatus::Completed);
    assert_eq!(snapshot.result.content, root_snapshot.result.content);

    let new_logo = h
        .orchestrator
        .regenerate_image(&root, Some("bmV3LWxvZ28=".into()))
        .await
        .unwrap();
    wait_terminal(&h.tasks, &new_logo).await;

    let seen = imager.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1], ("sunlit shelves of bread".to_owned(), "b3JpZ2luYWw=".to_owned()));
    assert_eq!(seen[2].1, "bmV3LWxvZ28=");
    // Content was never regenerated.
    assert_eq!(writer.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn image_regeneration_requires_root_content() {
    let h = harness(
        Arc::new(FakeCopywriter {
            fail_with: Some("quota exceeded".into()),
            ..Default::default()
        }),
        Arc::new(FakeImager::default()),
    );

    let root = h.orchestrator.submit_generation(params()).await.unwrap();
    wait_terminal(&h.tasks, &root).await;

    let err = h.orchestrator.regenerate_image(&root, None).await.unwrap_err();
    assert_eq!(err, RuntimeError::ContentNotFound { root: root.clone() });
    // Nothing was registered for the rejected request.
    assert_eq!(h.tasks.len().await, 1);
}

#[tokio::test]
async fn regeneration_of_unknown_root_is_session_not_found() {
    let h = harness(Arc::new(FakeCopywriter::default()), Arc::new(FakeImager::default()));

    let err = h
        .orchestrator
        .regenerate_content("no-such-task", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::SessionNotFound { .. }));

    let err = h
        .orchestrator
        .regenerate_image("no-such-task", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::SessionNotFound { .. }));
}

// ── Sessions and consume-on-read ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn session_lives_for_a_fixed_hour_from_creation() {
    let h = harness(Arc::new(FakeCopywriter::default()), Arc::new(FakeImager::default()));

    let root = h.orchestrator.submit_generation(params()).await.unwrap();
    wait_terminal(&h.tasks, &root).await;

    tokio::time::advance(Duration::from_secs(59 * 60)).await;
    let derived = h
        .orchestrator
        .regenerate_content(&root, Map::new())
        .await
        .expect("session alive at T+59min");
    wait_terminal(&h.tasks, &derived).await;

    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    let err = h
        .orchestrator
        .regenerate_content(&root, Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::SessionNotFound { .. }));

    // With its session gone the root record is now one-shot as well.
    assert!(matches!(
        h.orchestrator.check_status(&root).await,
        Ok(StatusReport::Completed(_))
    ));
    assert!(matches!(
        h.orchestrator.check_status(&root).await,
        Err(RuntimeError::UnknownTask { .. })
    ));
}

#[tokio::test]
async fn derived_tasks_are_consumed_on_first_terminal_read() {
    let h = harness(Arc::new(FakeCopywriter::default()), Arc::new(FakeImager::default()));

    let root = h.orchestrator.submit_generation(params()).await.unwrap();
    wait_terminal(&h.tasks, &root).await;
    let derived = h
        .orchestrator
        .regenerate_content(&root, Map::new())
        .await
        .unwrap();
    wait_terminal(&h.tasks, &derived).await;

    assert!(matches!(
        h.orchestrator.check_status(&derived).await,
        Ok(StatusReport::Completed(_))
    ));
    assert!(matches!(
        h.orchestrator.check_status(&derived).await,
        Err(RuntimeError::UnknownTask { .. })
    ));

    // The root is kept while its session is live.
    for _ in 0..2 {
        assert!(matches!(
            h.orchestrator.check_status(&root).await,
            Ok(StatusReport::Completed(_))
        ));
    }
}

#[tokio::test]
async fn mistyped_overrides_register_nothing() {
    let h = harness(Arc::new(FakeCopywriter::default()), Arc::new(FakeImager::default()));
    let root = h.orchestrator.submit_generation(params()).await.unwrap();
    wait_terminal(&h.tasks, &root).await;

    // `platform` must stay a string or list; a number makes the merge fail.
    let err = h
        .orchestrator
        .regenerate_content(&root, object(json!({ "platform": 7 })))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidParams { .. }));
    assert_eq!(h.tasks.len().await, 1);
}

// ── Worker pool ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn saturated_queue_rejects_and_rolls_back() {
    let gate = Arc::new(Semaphore::new(0));
    let writer = Arc::new(FakeCopywriter {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let h = harness_with(
        writer.clone(),
        Arc::new(FakeImager::default()),
        OrchestratorConfig {
            queue_capacity: 1,
            max_workers: 1,
        },
    );

    let running = h.orchestrator.submit_generation(params()).await.unwrap();
    // Wait until the single worker holds the first job.
    writer.entered.notified().await;
    let queued = h.orchestrator.submit_generation(params()).await.unwrap();

    let err = h
        .orchestrator
        .submit_generation(params())
        .await
        .unwrap_err();
    assert_eq!(err, RuntimeError::QueueFull { capacity: 1 });
    assert_eq!(h.tasks.len().await, 2);

    gate.add_permits(2);
    for token in [&running, &queued] {
        let snapshot = wait_terminal(&h.tasks, token).await;
        assert_eq!(snapshot.status.overall_status, OverallStatus::Completed);
    }
}
