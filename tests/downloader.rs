//! Downloader behaviour against a mock HTTP server and scripted fetchers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use pdf_harvest::download::{ChunkStream, DownloadOutcome};
use pdf_harvest::{DownloadError, Downloader, Fetch, HttpFetcher, RetryPolicy};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY: &[u8] = b"%PDF-1.4 fake body";

fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
    }
}

fn http_downloader(max_attempts: u32) -> Downloader<HttpFetcher> {
    Downloader::new(HttpFetcher::default())
        .retry(quick_retry(max_attempts))
        .timeout(Duration::from_secs(5))
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn downloads_once_then_reports_present() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = http_downloader(3);
    let url = format!("{}/docs/a.pdf", server.uri());

    let first = downloader.download_file(&url, dir.path()).await.unwrap();
    assert_eq!(
        first,
        DownloadOutcome::Downloaded {
            path: dir.path().join("a.pdf"),
            bytes: BODY.len() as u64
        }
    );
    assert_eq!(std::fs::read(dir.path().join("a.pdf")).unwrap(), BODY);

    let second = downloader.download_file(&url, dir.path()).await.unwrap();
    assert!(matches!(second, DownloadOutcome::AlreadyPresent { .. }));
    assert_eq!(entries(dir.path()), vec!["a.pdf"]);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = http_downloader(3)
        .download_file(&format!("{}/a.pdf", server.uri()), dir.path())
        .await
        .unwrap();

    assert!(matches!(outcome, DownloadOutcome::Downloaded { .. }));
    assert_eq!(entries(dir.path()), vec!["a.pdf"]);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = http_downloader(3)
        .download_file(&format!("{}/missing.pdf", server.uri()), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Status { status: 404, .. }));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn exhausted_retries_leave_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = http_downloader(3)
        .download_file(&format!("{}/a.pdf", server.uri()), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Status { status: 500, .. }));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(BODY)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = Downloader::new(HttpFetcher::default())
        .retry(RetryPolicy::none())
        .timeout(Duration::from_millis(100))
        .download_file(&format!("{}/a.pdf", server.uri()), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Timeout { .. }));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn one_failure_does_not_abort_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<String> = ["a.pdf", "b.pdf", "c.pdf"]
        .iter()
        .map(|name| format!("{}/{}", server.uri(), name))
        .collect();
    let report = http_downloader(3).download_documents(&urls, dir.path()).await;

    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].url.ends_with("/b.pdf"));
    assert!(!report.is_complete());
    assert_eq!(entries(dir.path()), vec!["a.pdf", "c.pdf"]);
}

// ── Scripted fetchers ────────────────────────────────────────────────────

/// Records how many `open` calls overlap.
#[derive(Default)]
struct CountingFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetch for CountingFetcher {
    async fn open(&self, _url: &str) -> Result<ChunkStream, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(stream::iter(vec![Ok(Bytes::from_static(BODY))]).boxed())
    }
}

#[tokio::test]
async fn at_most_one_batch_is_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<String> = (0..10).map(|i| format!("https://x.test/f/{i}.pdf")).collect();

    let downloader = Downloader::new(CountingFetcher::default()).batch_size(4);
    let report = downloader.download_documents(&urls, dir.path()).await;

    assert_eq!(report.downloaded, 10);
    assert_eq!(downloader.fetcher().calls.load(Ordering::SeqCst), 10);
    assert_eq!(downloader.fetcher().peak.load(Ordering::SeqCst), 4);
    assert_eq!(entries(dir.path()).len(), 10);
}

/// Sends one chunk, then breaks the connection.
struct TruncatingFetcher;

#[async_trait]
impl Fetch for TruncatingFetcher {
    async fn open(&self, url: &str) -> Result<ChunkStream, DownloadError> {
        let url = url.to_string();
        Ok(stream::iter(vec![
            Ok(Bytes::from_static(b"%PDF-1.4 partial")),
            Err(DownloadError::Transport {
                url,
                reason: "connection reset".into(),
            }),
        ])
        .boxed())
    }
}

#[tokio::test]
async fn interrupted_body_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Downloader::new(TruncatingFetcher)
        .retry(quick_retry(2))
        .download_file("https://x.test/a.pdf", dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Transport { .. }));
    assert!(entries(dir.path()).is_empty());
}
