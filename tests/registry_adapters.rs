use image_mirror::registry::{
    DestinationReader, DistributionAdapter, DockerHubAdapter, GoogleRegistryAdapter, QuayAdapter,
    RegistryHttp, TagIndex, TagIndexAdapter, TagRecord,
};
use image_mirror::sync::{DestinationState, SyncEngine};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> RegistryHttp {
    RegistryHttp::builder().build().unwrap()
}

fn tags_of(listing: &image_mirror::registry::TagListing) -> Vec<&str> {
    listing.index.records().iter().map(|r| r.tag.as_str()).collect()
}

#[tokio::test]
async fn docker_hub_follows_next_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/gcmirrors/pause/tags"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": format!("{}/next-page", server.uri()),
            "results": [
                {
                    "name": "3.2",
                    "tag_last_pushed": "2020-06-28T11:46:53.539425Z",
                    "images": [{"digest": "sha256:b"}]
                },
                {
                    "name": "sha256-abc.sig",
                    "tag_last_pushed": "2020-06-28T11:46:53.539425Z"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next-page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [
                {
                    "name": "3.1",
                    "tag_last_pushed": "2019-01-01T00:00:00Z",
                    "digest": "sha256:a"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = DockerHubAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("docker.io/gcmirrors/pause").await;

    assert!(listing.ok);
    assert_eq!(tags_of(&listing), vec!["3.2", "3.1"]);
    let newest = listing.index.newest().unwrap();
    assert_eq!(newest.pushed_at_ms, 1_593_344_813_539);
    assert_eq!(newest.digest.as_deref(), Some("sha256:b"));
    assert_eq!(listing.index.get("3.1").unwrap().digest.as_deref(), Some("sha256:a"));
}

#[tokio::test]
async fn docker_hub_missing_repository_is_confirmed_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/repositories/gcmirrors/new-image/tags"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"message": "object not found", "errinfo": {}})),
        )
        .mount(&server)
        .await;

    let adapter = DockerHubAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("gcmirrors/new-image").await;

    assert!(listing.ok);
    assert!(listing.index.is_empty());
    assert_eq!(listing.last_tag(), (None, None));
}

#[tokio::test]
async fn docker_hub_rate_limit_is_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let adapter = DockerHubAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("gcmirrors/pause").await;

    assert!(!listing.ok);
    assert!(listing.index.is_empty());
}

#[tokio::test]
async fn malformed_payload_is_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let adapter = DockerHubAdapter::with_base_url(http(), server.uri());
    assert!(!adapter.sorted_tags("gcmirrors/pause").await.ok);
}

#[tokio::test]
async fn google_manifest_map_is_flattened() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/ml-pipeline/api-server/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "child": [],
            "manifest": {
                "sha256:a": {
                    "imageSizeBytes": "1024",
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "tag": ["1.0.0", "latest"],
                    "timeCreatedMs": "0",
                    "timeUploadedMs": "2000"
                },
                "sha256:b": {
                    "tag": ["0.9.0"],
                    "timeUploadedMs": "1000"
                },
                "sha256:untagged": {
                    "tag": [],
                    "timeUploadedMs": "3000"
                }
            },
            "name": "ml-pipeline/api-server",
            "tags": ["0.9.0", "1.0.0", "latest"]
        })))
        .mount(&server)
        .await;

    let adapter = GoogleRegistryAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("ml-pipeline/api-server").await;

    assert!(listing.ok);
    assert_eq!(tags_of(&listing), vec!["1.0.0", "latest", "0.9.0"]);
    assert_eq!(listing.index.get("latest").unwrap().digest.as_deref(), Some("sha256:a"));
    assert_eq!(listing.index.get("0.9.0").unwrap().pushed_at_ms, 1000);

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.starts_with("google-cloud-sdk"), "{agent}");
}

#[tokio::test]
async fn google_null_manifest_is_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/pause/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "pause",
            "manifest": null
        })))
        .mount(&server)
        .await;

    let adapter = GoogleRegistryAdapter::with_base_url(http(), server.uri()).kubernetes();
    assert_eq!(adapter.kind(), "kubernetes");
    let listing = adapter.sorted_tags("pause").await;
    assert!(!listing.ok);
}

#[tokio::test]
async fn google_unknown_repository_is_confirmed_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("NAME_UNKNOWN"))
        .mount(&server)
        .await;

    let adapter = GoogleRegistryAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("does/not-exist").await;
    assert!(listing.ok);
    assert!(listing.index.is_empty());
}

#[tokio::test]
async fn quay_pages_until_no_more_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repository/metallb/controller/tag/"))
        .and(query_param("onlyActiveTags", "true"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [
                {"name": "v0.13.0", "start_ts": 1_680_000_000, "manifest_digest": "sha256:new"},
                {"name": "sha256-deadbeef.att", "start_ts": 1_680_000_001}
            ],
            "page": 1,
            "has_additional": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repository/metallb/controller/tag/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [
                {"name": "v0.12.1", "start_ts": 1_650_000_000, "manifest_digest": "sha256:old"}
            ],
            "page": 2,
            "has_additional": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = QuayAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("metallb/controller").await;

    assert!(listing.ok);
    assert_eq!(tags_of(&listing), vec!["v0.13.0", "v0.12.1"]);
    assert_eq!(listing.index.newest().unwrap().pushed_at_ms, 1_680_000_000_000);
    assert_eq!(
        listing.index.get("v0.12.1").unwrap().digest.as_deref(),
        Some("sha256:old")
    );
}

#[tokio::test]
async fn distribution_listing_uses_position_as_age() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/org/tool/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "org/tool",
            "tags": ["v1", "v2", "v3"]
        })))
        .mount(&server)
        .await;

    let adapter = DistributionAdapter::with_base_url(http(), server.uri());
    let listing = adapter.sorted_tags("org/tool").await;
    assert!(listing.ok);
    assert_eq!(tags_of(&listing), vec!["v3", "v2", "v1"]);
    assert!(listing.index.records().iter().all(|r| r.digest.is_none()));
    assert!(!listing.index.has_push_times());
    assert_eq!(listing.last_tag(), (Some("v3".to_string()), None));
}

#[tokio::test]
async fn distribution_destination_is_not_recopied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/mirror/tool/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "mirror/tool",
            "tags": ["v1", "v2", "v3"]
        })))
        .mount(&server)
        .await;

    let reader = DestinationReader::new(Arc::new(DistributionAdapter::with_base_url(
        http(),
        server.uri(),
    )));
    let listing = reader.sorted_tags("mirror/tool").await;
    let (last_tag, last_timestamp) = reader.last_tag("mirror/tool", Some(&listing.index)).await;
    let destination = DestinationState::new(listing, last_tag, last_timestamp);

    let source = TagIndex::from_records(vec![
        TagRecord::new("v4", 1_700_000_400_000, None),
        TagRecord::new("v3", 1_700_000_300_000, None),
        TagRecord::new("v2", 1_700_000_200_000, None),
        TagRecord::new("v1", 1_700_000_100_000, None),
    ]);
    let engine = SyncEngine::new(0);
    assert_eq!(engine.decide("tool", &source, &destination).tags_to_transfer, vec!["v4"]);

    let mirrored = TagIndex::from_records(source.records()[1..].to_vec());
    assert!(engine.decide("tool", &mirrored, &destination).tags_to_transfer.is_empty());
}

#[tokio::test]
async fn destination_reader_serves_repeats_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/repositories/gcmirrors/etcd/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [
                {"name": "3.5.0-0", "tag_last_pushed": "2021-07-01T00:00:00Z", "digest": "sha256:e"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reader = DestinationReader::new(Arc::new(DockerHubAdapter::with_base_url(http(), server.uri())));
    let first = reader.sorted_tags("gcmirrors/etcd").await;
    let second = reader.sorted_tags("docker.io/gcmirrors/etcd").await;

    assert_eq!(first, second);
    assert_eq!(
        reader.last_tag("gcmirrors/etcd", None).await.0.as_deref(),
        Some("3.5.0-0")
    );
}
