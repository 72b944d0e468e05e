//! Tests for ArtifactCache against a mock HTTP server.

use lib_plugin_deps::{ArtifactCache, ArtifactMap, ArtifactRecord, CacheOutcome, DependencyError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache(dir: &std::path::Path) -> ArtifactCache {
    ArtifactCache::with_client(dir, reqwest::Client::new())
}

fn record(name: &str, url: String) -> ArtifactRecord {
    ArtifactRecord {
        name: name.to_string(),
        url,
    }
}

#[tokio::test]
async fn ensure_downloads_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/libfoo.so"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"foo-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("data").join("libs");
    let cache = cache(&dir);
    let url = format!("{}/libfoo.so", server.uri());

    let first = cache.ensure("libfoo.so", &url).await.unwrap();
    assert_eq!(first, CacheOutcome::Downloaded { bytes: 9 });
    assert_eq!(std::fs::read(dir.join("libfoo.so")).unwrap(), b"foo-bytes");

    let second = cache.ensure("libfoo.so", &url).await.unwrap();
    assert_eq!(second, CacheOutcome::Hit);

    // Only the final file remains, no partial leftovers.
    let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn ensure_all_fetches_every_entry() {
    let server = MockServer::start().await;
    for name in ["a.so", "b.so", "c.so"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_string(name))
            .expect(1)
            .mount(&server)
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let cache = cache(tmp.path());
    let map = ArtifactMap::from_records(
        ["a.so", "b.so", "c.so"].map(|n| record(n, format!("{}/{}", server.uri(), n))),
    );

    let report = cache.ensure_all(&map).await.unwrap();
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.hits, 0);

    let mut names: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.so", "b.so", "c.so"]);
    assert_eq!(std::fs::read_to_string(tmp.path().join("b.so")).unwrap(), "b.so");
}

#[tokio::test]
async fn ensure_all_stops_at_first_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.so"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c.so"))
        .respond_with(ResponseTemplate::new(200).set_body_string("c"))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = cache(tmp.path());
    let map = ArtifactMap::from_records([
        record("a.so", format!("{}/a.so", server.uri())),
        // Closed port
        record("b.so", "http://127.0.0.1:1/b.so".to_string()),
        record("c.so", format!("{}/c.so", server.uri())),
    ]);

    let err = cache.ensure_all(&map).await.unwrap_err();
    assert!(matches!(err, DependencyError::Download { .. }));
    assert_eq!(err.artifact(), Some("b.so"));

    assert!(tmp.path().join("a.so").exists());
    assert!(!tmp.path().join("b.so").exists());
    assert!(!tmp.path().join("c.so").exists());
}

#[tokio::test]
async fn http_error_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = cache(tmp.path());

    let err = cache
        .ensure("libgone.so", &format!("{}/libgone.so", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.artifact(), Some("libgone.so"));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn timeout_is_a_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let config = lib_plugin_deps::DependencyConfig::new(tmp.path().to_path_buf())
        .with_timeout(Some(std::time::Duration::from_millis(200)));
    let cache = ArtifactCache::new(&config).unwrap();

    let err = cache
        .ensure("libslow.so", &format!("{}/libslow.so", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, DependencyError::Download { .. }));
    assert!(!config.libs_dir().join("libslow.so").exists());
}
