//! Integration tests for the feedsmith feed-generation core
//!
//! These tests verify the full workflow from configuration loading through
//! fetching (against a local mock server), merging, and feed files landing
//! on disk.

use std::time::Duration;

use feedsmith::config::{Config, SourceConfig};
use feedsmith::fetch::{AdapterRegistry, FetchContext};
use feedsmith::model::{FailureKind, SourceOutcome};
use feedsmith::orchestrator::{Orchestrator, RunOptions};
use feedsmith::store::FeedStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common {
    use super::*;
    use tempfile::TempDir;

    /// Create a temporary directory for feed files
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    pub fn rss_body(source: &str, items: &[(&str, &str, &str)]) -> String {
        let items_xml: String = items
            .iter()
            .map(|(guid, title, date)| {
                format!(
                    "<item>\
                     <title>{title}</title>\
                     <link>https://{source}.example.com/{guid}</link>\
                     <guid>{guid}</guid>\
                     <pubDate>{date}</pubDate>\
                     <description>About {title}</description>\
                     </item>"
                )
            })
            .collect();

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <rss version=\"2.0\"><channel>\
             <title>{source}</title>\
             <link>https://{source}.example.com</link>\
             <description>Articles from {source}</description>\
             {items_xml}\
             </channel></rss>"
        )
    }

    pub fn source(id: &str, server_uri: &str) -> SourceConfig {
        SourceConfig {
            id: id.to_string(),
            title: format!("Source {}", id),
            link: format!("https://{}.example.com", id),
            description: format!("Articles from {}", id),
            url: format!("{}/{}/rss", server_uri, id),
            adapter: "remote_feed".to_string(),
            max_items: None,
            enabled: true,
        }
    }

    pub fn orchestrator(dir: &TempDir, fetch_timeout: Duration) -> Orchestrator {
        Orchestrator::with_context(
            AdapterRegistry::with_defaults(),
            FeedStore::new(dir.path()),
            RunOptions {
                fetch_timeout,
                max_items: 50,
                concurrency: 4,
            },
            FetchContext {
                client: reqwest::Client::new(),
            },
        )
    }

    pub async fn mount_feed(server: &MockServer, id: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/rss", id)))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml"))
            .mount(server)
            .await;
    }
}

mod config_integration_tests {
    use super::*;

    #[test]
    fn test_load_actual_feeds_config() {
        // Test loading the actual feeds.toml from the project
        let config = Config::load("feeds.toml");
        assert!(config.is_ok(), "Failed to load feeds.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(!config.sources.is_empty(), "feeds.toml should have at least one source");
        assert!(config.max_items > 0, "max_items should be positive");
    }
}

mod run_workflow_tests {
    use super::common::*;
    use super::*;

    #[tokio::test]
    async fn test_full_run_writes_feed_files() {
        let server = MockServer::start().await;
        mount_feed(
            &server,
            "alpha",
            rss_body(
                "alpha",
                &[
                    ("a1", "First", "Mon, 09 Dec 2024 10:00:00 +0000"),
                    ("a2", "Second", "Mon, 09 Dec 2024 12:00:00 +0000"),
                ],
            ),
        )
        .await;

        let dir = create_temp_dir();
        let orch = orchestrator(&dir, Duration::from_secs(5));
        let report = orch.run(&[source("alpha", &server.uri())]).await;

        assert_eq!(
            report.get("alpha"),
            Some(&SourceOutcome::Success { items: 2 })
        );

        let store = FeedStore::new(dir.path());
        let feed = store.load("alpha").unwrap();
        assert_eq!(feed.source_id, "alpha");
        assert_eq!(feed.items.len(), 2);
        // Newest first
        assert_eq!(feed.items[0].guid, "a2");
        assert_eq!(feed.items[1].guid, "a1");
        assert_eq!(feed.items[0].title, "Second");
    }

    #[tokio::test]
    async fn test_middle_source_failure_does_not_affect_others() {
        let server = MockServer::start().await;
        let date = "Mon, 09 Dec 2024 10:00:00 +0000";
        mount_feed(&server, "one", rss_body("one", &[("g1", "One", date)])).await;
        Mock::given(method("GET"))
            .and(path("/two/rss"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_feed(&server, "three", rss_body("three", &[("g3", "Three", date)])).await;

        let dir = create_temp_dir();

        // Source two already has a valid feed from an earlier run; the
        // failed fetch must leave it byte-for-byte untouched.
        let prior = rss_body("two", &[]);
        let store = FeedStore::new(dir.path());
        std::fs::write(store.feed_path("two"), &prior).unwrap();

        let orch = orchestrator(&dir, Duration::from_secs(5));
        let report = orch
            .run(&[
                source("one", &server.uri()),
                source("two", &server.uri()),
                source("three", &server.uri()),
            ])
            .await;

        assert_eq!(report.get("one"), Some(&SourceOutcome::Success { items: 1 }));
        assert!(matches!(
            report.get("two"),
            Some(SourceOutcome::Failed {
                kind: FailureKind::Network,
                ..
            })
        ));
        assert_eq!(
            report.get("three"),
            Some(&SourceOutcome::Success { items: 1 })
        );

        assert!(dir.path().join("one.xml").exists());
        assert!(dir.path().join("three.xml").exists());
        let after = std::fs::read_to_string(store.feed_path("two")).unwrap();
        assert_eq!(after, prior);

        // Report order matches input order
        let ids: Vec<&str> = report
            .outcomes()
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_refetch_updates_without_duplicating() {
        let server = MockServer::start().await;
        let dir = create_temp_dir();
        let orch = orchestrator(&dir, Duration::from_secs(5));
        let src = source("steady", &server.uri());

        {
            let _guard = Mock::given(method("GET"))
                .and(path("/steady/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(
                    rss_body(
                        "steady",
                        &[("s1", "Original title", "Mon, 09 Dec 2024 10:00:00 +0000")],
                    ),
                    "application/rss+xml",
                ))
                .mount_as_scoped(&server)
                .await;
            orch.run(std::slice::from_ref(&src)).await;
        }

        // Same guid comes back with an amended title and a newer date
        mount_feed(
            &server,
            "steady",
            rss_body(
                "steady",
                &[("s1", "Corrected title", "Mon, 09 Dec 2024 11:00:00 +0000")],
            ),
        )
        .await;
        let report = orch.run(std::slice::from_ref(&src)).await;

        assert_eq!(
            report.get("steady"),
            Some(&SourceOutcome::Success { items: 1 })
        );
        let feed = FeedStore::new(dir.path()).load("steady").unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title, "Corrected title");
    }

    #[tokio::test]
    async fn test_slow_source_reported_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sluggish/rss"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(10))
                    .set_body_raw(rss_body("sluggish", &[]), "application/rss+xml"),
            )
            .mount(&server)
            .await;

        let dir = create_temp_dir();
        let orch = orchestrator(&dir, Duration::from_millis(200));
        let report = orch.run(&[source("sluggish", &server.uri())]).await;

        assert!(matches!(
            report.get("sluggish"),
            Some(SourceOutcome::Failed {
                kind: FailureKind::Timeout,
                ..
            })
        ));
        assert!(!dir.path().join("sluggish.xml").exists());
    }

    #[tokio::test]
    async fn test_unparseable_upstream_reported_as_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/noise/rss"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("this is not a feed", "text/html"),
            )
            .mount(&server)
            .await;

        let dir = create_temp_dir();
        let orch = orchestrator(&dir, Duration::from_secs(5));
        let report = orch.run(&[source("noise", &server.uri())]).await;

        assert!(matches!(
            report.get("noise"),
            Some(SourceOutcome::Failed {
                kind: FailureKind::Parse,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_per_source_max_items_override() {
        let server = MockServer::start().await;
        mount_feed(
            &server,
            "capped",
            rss_body(
                "capped",
                &[
                    ("c1", "Oldest", "Mon, 09 Dec 2024 08:00:00 +0000"),
                    ("c2", "Middle", "Mon, 09 Dec 2024 09:00:00 +0000"),
                    ("c3", "Newest", "Mon, 09 Dec 2024 10:00:00 +0000"),
                ],
            ),
        )
        .await;

        let dir = create_temp_dir();
        let orch = orchestrator(&dir, Duration::from_secs(5));
        let mut src = source("capped", &server.uri());
        src.max_items = Some(2);

        let report = orch.run(&[src]).await;

        assert_eq!(
            report.get("capped"),
            Some(&SourceOutcome::Success { items: 2 })
        );
        let feed = FeedStore::new(dir.path()).load("capped").unwrap();
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].guid, "c3");
        assert_eq!(feed.items[1].guid, "c2");
    }

    #[tokio::test]
    async fn test_items_accumulate_across_runs_and_survive_upstream_rotation() {
        let server = MockServer::start().await;
        let dir = create_temp_dir();
        let orch = orchestrator(&dir, Duration::from_secs(5));
        let src = source("rolling", &server.uri());

        {
            let _guard = Mock::given(method("GET"))
                .and(path("/rolling/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(
                    rss_body(
                        "rolling",
                        &[("r1", "Early post", "Mon, 09 Dec 2024 08:00:00 +0000")],
                    ),
                    "application/rss+xml",
                ))
                .mount_as_scoped(&server)
                .await;
            orch.run(std::slice::from_ref(&src)).await;
        }

        // Upstream rotated: r1 fell off, r2 is new. The stored feed keeps both.
        mount_feed(
            &server,
            "rolling",
            rss_body(
                "rolling",
                &[("r2", "Later post", "Mon, 09 Dec 2024 12:00:00 +0000")],
            ),
        )
        .await;
        orch.run(std::slice::from_ref(&src)).await;

        let feed = FeedStore::new(dir.path()).load("rolling").unwrap();
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].guid, "r2");
        assert_eq!(feed.items[1].guid, "r1");
    }
}

mod remote_feed_adapter_tests {
    use super::common::*;
    use super::*;
    use feedsmith::fetch::{FetchAdapter, RemoteFeedAdapter};

    #[tokio::test]
    async fn test_entries_parse_without_explicit_guid() {
        let server = MockServer::start().await;
        let body = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <rss version=\"2.0\"><channel>\
             <title>bare</title>\
             <link>https://bare.example.com</link>\
             <description>bare</description>\
             <item>\
             <title>No guid here</title>\
             <link>https://bare.example.com/post</link>\
             <pubDate>Mon, 09 Dec 2024 10:00:00 +0000</pubDate>\
             </item>\
             </channel></rss>";
        Mock::given(method("GET"))
            .and(path("/bare/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml"))
            .mount(&server)
            .await;

        let adapter = RemoteFeedAdapter;
        let ctx = FetchContext {
            client: reqwest::Client::new(),
        };
        let raws = adapter
            .fetch(&ctx, &source("bare", &server.uri()))
            .await
            .unwrap();

        assert_eq!(raws.len(), 1);
        assert_eq!(raws[0].title, "No guid here");
        assert_eq!(raws[0].link, "https://bare.example.com/post");
        assert!(raws[0].published_at.is_some());
    }

    #[tokio::test]
    async fn test_http_error_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone/rss"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = RemoteFeedAdapter;
        let ctx = FetchContext {
            client: reqwest::Client::new(),
        };
        let result = adapter.fetch(&ctx, &source("gone", &server.uri())).await;

        assert!(matches!(
            result,
            Err(feedsmith::fetch::FetchError::Network(_))
        ));
    }
}
