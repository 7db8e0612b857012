use async_trait::async_trait;
use image_mirror::image::{DestinationRoot, ImageReference};
use image_mirror::registry::{
    AdapterSet, DestinationReader, ListingOutcome, RegistryHttp, TagIndexAdapter, TagRecord,
};
use image_mirror::sync::{ImageStatus, SyncEngine, SyncOrchestrator};
use image_mirror::transfer::{DryRunTransfer, TransferInvoker, TransferRequest};
use image_mirror::{MirrorError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Adapter answering from a fixed table; unknown names do not exist
#[derive(Default)]
struct Fixture {
    listings: HashMap<String, Result<ListingOutcome>>,
}

impl Fixture {
    fn with(mut self, name: &str, records: Vec<TagRecord>) -> Self {
        self.listings
            .insert(name.to_string(), Ok(ListingOutcome::Found(records)));
        self
    }

    fn failing(mut self, name: &str, error: MirrorError) -> Self {
        self.listings.insert(name.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl TagIndexAdapter for Fixture {
    fn kind(&self) -> &'static str {
        "fixture"
    }

    async fn list_tags(&self, name: &str) -> Result<ListingOutcome> {
        self.listings
            .get(name)
            .cloned()
            .unwrap_or(Ok(ListingOutcome::NotFound))
    }
}

struct Panicking;

#[async_trait]
impl TagIndexAdapter for Panicking {
    fn kind(&self) -> &'static str {
        "panicking"
    }

    async fn list_tags(&self, name: &str) -> Result<ListingOutcome> {
        panic!("adapter exploded on {name}");
    }
}

/// Fails every copy of one tag
struct FailingOn(&'static str);

#[async_trait]
impl TransferInvoker for FailingOn {
    async fn transfer(&self, request: &TransferRequest) -> Result<()> {
        if request.tag == self.0 {
            return Err(MirrorError::Transfer {
                reference: request.source_reference(),
                message: "exit status 1: manifest unknown".to_string(),
            });
        }
        Ok(())
    }
}

/// Tracks how many copies run at the same time
#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

#[async_trait]
impl TransferInvoker for Gauge {
    async fn transfer(&self, _request: &TransferRequest) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn rec(tag: &str, at: i64, digest: Option<&str>) -> TagRecord {
    TagRecord::new(tag, at, digest.map(str::to_string))
}

fn image(reference: &str) -> ImageReference {
    reference.parse().unwrap()
}

fn root() -> DestinationRoot {
    "docker.io/gcmirrors".parse().unwrap()
}

fn orchestrator(
    source: Fixture,
    destination: Fixture,
    transfer: Arc<dyn TransferInvoker>,
) -> SyncOrchestrator {
    let source = Arc::new(source);
    let sources = AdapterSet::new(RegistryHttp::builder().build().unwrap())
        .register("gcr.io", source.clone())
        .register("k8s.gcr.io", source)
        .register("quay.io", Arc::new(Panicking));
    let destination = DestinationReader::new(Arc::new(destination));
    SyncOrchestrator::new(Arc::new(sources), Arc::new(destination), root(), transfer)
}

fn api_server_source() -> Fixture {
    Fixture::default().with(
        "ml-pipeline/api-server",
        vec![
            rec("latest", 200, Some("sha256:b")),
            rec("v2", 200, Some("sha256:b")),
            rec("v1", 100, Some("sha256:a")),
        ],
    )
}

#[tokio::test]
async fn incremental_pass_copies_only_new_tags() {
    let source = api_server_source().with("pause", vec![rec("3.2", 20, None), rec("3.1", 10, None)]);
    let destination = Fixture::default().with(
        "gcmirrors/ml-pipeline-api-server",
        vec![rec("v1", 100, Some("sha256:a"))],
    );
    let recorder = Arc::new(DryRunTransfer::new());

    let reports = orchestrator(source, destination, recorder.clone())
        .run(&[image("gcr.io/ml-pipeline/api-server"), image("k8s.gcr.io/pause")])
        .await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].destination_name, "ml-pipeline-api-server");
    assert_eq!(reports[0].transferred, vec!["v2", "latest"]);
    assert_eq!(reports[0].tags, vec!["v1", "v2", "latest"]);
    assert_eq!(reports[0].status, ImageStatus::Synced);

    // Never mirrored before: full history, oldest first.
    assert_eq!(reports[1].destination_name, "pause");
    assert_eq!(reports[1].transferred, vec!["3.1", "3.2"]);

    let requests = recorder.requests();
    assert_eq!(requests.len(), 4);
    let first = requests
        .iter()
        .find(|r| r.name == "api-server" && r.tag == "v2")
        .unwrap();
    assert_eq!(first.source_reference(), "docker://gcr.io/ml-pipeline/api-server:v2");
    assert_eq!(
        first.destination_reference(),
        "docker://docker.io/gcmirrors/ml-pipeline-api-server:v2"
    );
}

#[tokio::test]
async fn up_to_date_image_copies_nothing() {
    let destination = Fixture::default().with(
        "gcmirrors/ml-pipeline-api-server",
        vec![
            rec("latest", 200, Some("sha256:b")),
            rec("v2", 200, Some("sha256:b")),
            rec("v1", 100, Some("sha256:a")),
        ],
    );
    let recorder = Arc::new(DryRunTransfer::new());

    let reports = orchestrator(api_server_source(), destination, recorder.clone())
        .run(&[image("gcr.io/ml-pipeline/api-server")])
        .await;

    assert_eq!(reports[0].status, ImageStatus::UpToDate);
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn unreadable_destination_defers_image() {
    let destination = Fixture::default().failing(
        "gcmirrors/ml-pipeline-api-server",
        MirrorError::RateLimited("429".into()),
    );
    let recorder = Arc::new(DryRunTransfer::new());

    let reports = orchestrator(api_server_source(), destination, recorder.clone())
        .run(&[image("gcr.io/ml-pipeline/api-server")])
        .await;

    assert_eq!(reports[0].status, ImageStatus::Deferred);
    assert_eq!(reports[0].tag_count, 3);
    assert!(reports[0].transferred.is_empty());
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn panicking_worker_is_recorded_and_others_finish() {
    let recorder = Arc::new(DryRunTransfer::new());
    let reports = orchestrator(api_server_source(), Fixture::default(), recorder.clone())
        .run(&[
            image("quay.io/metallb/controller"),
            image("gcr.io/ml-pipeline/api-server"),
        ])
        .await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].source, "quay.io/metallb/controller");
    assert_eq!(reports[0].destination_name, "metallb-controller");
    match &reports[0].status {
        ImageStatus::Failed(message) => {
            assert!(message.contains("Worker panicked"), "{message}");
            assert!(message.contains("adapter exploded"), "{message}");
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(reports[1].status, ImageStatus::Synced);
    assert_eq!(reports[1].transferred.len(), 3);
}

#[tokio::test]
async fn failed_copies_are_reported_per_tag() {
    let destination = Fixture::default().with(
        "gcmirrors/ml-pipeline-api-server",
        vec![rec("v1", 100, Some("sha256:a"))],
    );
    let reports = orchestrator(api_server_source(), destination, Arc::new(FailingOn("v2")))
        .run(&[image("gcr.io/ml-pipeline/api-server")])
        .await;

    let report = &reports[0];
    assert_eq!(report.transferred, vec!["latest"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].tag, "v2");
    assert!(report.failed[0].error.contains("manifest unknown"));
    assert!(report.status.is_failed());
}

#[tokio::test]
async fn cutoff_is_applied_to_every_image() {
    let source = Fixture::default().with(
        "ml-pipeline/api-server",
        vec![
            rec("v3", 300, Some("sha256:c")),
            rec("v2", 120, None),
            rec("v1", 100, None),
        ],
    );
    let destination = Fixture::default().with(
        "gcmirrors/ml-pipeline-api-server",
        vec![rec("v3", 300, Some("sha256:c")), rec("v1", 100, None)],
    );
    let recorder = Arc::new(DryRunTransfer::new());

    let reports = orchestrator(source, destination, recorder.clone())
        .with_engine(SyncEngine::new(150))
        .run(&[image("gcr.io/ml-pipeline/api-server")])
        .await;

    assert_eq!(reports[0].status, ImageStatus::UpToDate);
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn pool_size_bounds_concurrent_images() {
    let mut source = Fixture::default();
    let mut catalog = Vec::new();
    for i in 0..6 {
        let name = format!("project/tool{i}");
        source = source.with(&name, vec![rec("v1", 1, None)]);
        catalog.push(image(&format!("gcr.io/{name}")));
    }
    let gauge = Arc::new(Gauge::default());

    let reports = orchestrator(source, Fixture::default(), gauge.clone())
        .with_pool_size(2)
        .run(&catalog)
        .await;

    assert_eq!(reports.len(), 6);
    let names: Vec<&str> = reports.iter().map(|r| r.destination_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "project-tool0",
            "project-tool1",
            "project-tool2",
            "project-tool3",
            "project-tool4",
            "project-tool5"
        ]
    );
    assert_eq!(gauge.total.load(Ordering::SeqCst), 6);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak {peak}");
}
