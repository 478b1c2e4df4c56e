//! End-to-end harvest runs with a mock source server and a scripted renderer.

use async_trait::async_trait;
use pdf_harvest::pipeline::render::{page_image_name, prepare_output_dir};
use pdf_harvest::{
    Downloader, HarvestConfig, HarvestError, HarvestProgress, Harvester, HttpFetcher,
    LinkExtractor, NoopProgress, RegisterOutcome, RenderError, Renderer, RetryPolicy,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fixtures ─────────────────────────────────────────────────────────────

struct StaticLinks(Vec<String>);

#[async_trait]
impl LinkExtractor for StaticLinks {
    async fn extract_links(&self) -> Result<Vec<String>, HarvestError> {
        Ok(self.0.clone())
    }
}

/// Writes a fixed number of placeholder images per document stem.
struct ScriptedRenderer {
    pages: HashMap<&'static str, usize>,
    fail_stem: Option<&'static str>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedRenderer {
    fn new(pages: &[(&'static str, usize)]) -> Self {
        Self {
            pages: pages.iter().copied().collect(),
            fail_stem: None,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, stem: &'static str) -> Self {
        self.fail_stem = Some(stem);
        self.failing.store(true, Ordering::SeqCst);
        self
    }
}

impl Renderer for ScriptedRenderer {
    fn render(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<String>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !pdf_path.is_file() {
            return Err(RenderError::MissingSource {
                path: pdf_path.to_path_buf(),
            });
        }
        let (stem, dir) = prepare_output_dir(pdf_path, out_dir)?;
        if self.failing.load(Ordering::SeqCst) && self.fail_stem == Some(stem.as_str()) {
            return Err(RenderError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: "truncated xref".into(),
            });
        }

        let count = self.pages.get(stem.as_str()).copied().unwrap_or(1);
        let mut names = Vec::with_capacity(count);
        for ordinal in 0..count {
            let name = page_image_name(&stem, ordinal);
            std::fs::write(dir.join(&name), b"\x89PNG").unwrap();
            names.push(name);
        }
        Ok(names)
    }
}

#[derive(Default)]
struct Tracking {
    started: AtomicUsize,
    complete: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
}

impl HarvestProgress for Tracking {
    fn on_render_start(&self, total_documents: usize) {
        self.started.store(total_documents, Ordering::SeqCst);
    }
    fn on_document_complete(&self, _name: &str, _pages: usize) {
        self.complete.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_skipped(&self, _name: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_error(&self, _name: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

struct Env {
    _dir: tempfile::TempDir,
    server: MockServer,
    config: HarvestConfig,
}

impl Env {
    async fn start(documents: &[&str]) -> Self {
        init_tracing();
        let server = MockServer::start().await;
        for name in documents {
            Mock::given(method("GET"))
                .and(path(format!("/files/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig::builder()
            .database_path(dir.path().join("catalog.sqlite"))
            .files_dir(dir.path().join("files"))
            .images_dir(dir.path().join("images"))
            .links_cache_path(dir.path().join("links.txt"))
            .workers(2)
            .build()
            .unwrap();
        Self {
            _dir: dir,
            server,
            config,
        }
    }

    fn links(&self, names: &[&str]) -> StaticLinks {
        StaticLinks(
            names
                .iter()
                .map(|name| format!("{}/files/{}", self.server.uri(), name))
                .collect(),
        )
    }

    fn downloader(&self) -> Downloader<HttpFetcher> {
        Downloader::new(HttpFetcher::default()).retry(RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        })
    }
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_catalogs_documents_and_pages() {
    let env = Env::start(&["a.pdf", "b.pdf"]).await;
    let mut harvester = Harvester::new(env.config.clone());

    let fetched = harvester
        .fetch(&env.links(&["a.pdf", "b.pdf"]), &env.downloader())
        .await
        .unwrap();
    assert_eq!(fetched.links, 2);
    assert_eq!(fetched.downloads.downloaded, 2);
    assert_eq!(fetched.registration, RegisterOutcome::Inserted(2));
    assert!(env.config.links_cache_path.is_file());

    let renderer = Arc::new(ScriptedRenderer::new(&[("a", 3), ("b", 1)]));
    let report = harvester
        .render_all(renderer.clone(), Arc::new(NoopProgress))
        .await
        .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.pages_added, 4);

    let catalog = harvester.catalog().unwrap();
    let a = catalog.document_by_name("a.pdf").unwrap().unwrap();
    let b = catalog.document_by_name("b.pdf").unwrap().unwrap();
    assert!(a.href.ends_with("/files/a.pdf"));

    let a_pages = catalog.list_pages(a.id).unwrap();
    let ordinals: Vec<u32> = a_pages.iter().map(|p| p.page).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
    assert_eq!(catalog.list_pages(b.id).unwrap().len(), 1);

    let names: HashSet<String> = a_pages.iter().map(|p| p.name.clone()).collect();
    assert_eq!(names.len(), 3);
    for page in &a_pages {
        assert!(env.config.images_dir.join("a").join(&page.name).is_file());
    }
}

#[tokio::test]
async fn rerun_does_no_work() {
    let env = Env::start(&["a.pdf", "b.pdf"]).await;
    let links = env.links(&["a.pdf", "b.pdf"]);
    let renderer = Arc::new(ScriptedRenderer::new(&[("a", 2), ("b", 2)]));

    let mut harvester = Harvester::new(env.config.clone());
    harvester.fetch(&links, &env.downloader()).await.unwrap();
    harvester
        .render_all(renderer.clone(), Arc::new(NoopProgress))
        .await
        .unwrap();

    // A fresh orchestrator over the same storage, as after a restart.
    let mut harvester = Harvester::new(env.config.clone());
    let fetched = harvester.fetch(&links, &env.downloader()).await.unwrap();
    assert_eq!(fetched.downloads.downloaded, 0);
    assert_eq!(fetched.downloads.already_present, 2);
    assert_eq!(fetched.registration, RegisterOutcome::Rejected);

    let progress = Arc::new(Tracking::default());
    let report = harvester
        .render_all(renderer.clone(), progress.clone())
        .await
        .unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.pages_added, 0);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(progress.skipped.load(Ordering::SeqCst), 2);

    let catalog = harvester.catalog().unwrap();
    assert_eq!(catalog.count_documents().unwrap(), 2);
    assert_eq!(catalog.count_pages().unwrap(), 4);
}

#[tokio::test]
async fn failed_render_is_retried_on_the_next_run() {
    let env = Env::start(&["a.pdf", "b.pdf"]).await;
    let renderer = Arc::new(ScriptedRenderer::new(&[("a", 1), ("b", 2)]).failing_on("b"));

    let mut harvester = Harvester::new(env.config.clone());
    harvester
        .fetch(&env.links(&["a.pdf", "b.pdf"]), &env.downloader())
        .await
        .unwrap();

    let progress = Arc::new(Tracking::default());
    let first = harvester
        .render_all(renderer.clone(), progress.clone())
        .await
        .unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(first.failed, 1);
    assert_eq!(progress.started.load(Ordering::SeqCst), 2);
    assert_eq!(progress.errors.load(Ordering::SeqCst), 1);

    let b = harvester.catalog().unwrap().document_by_name("b.pdf").unwrap().unwrap();
    assert!(!harvester.catalog().unwrap().has_pages(b.id).unwrap());

    renderer.failing.store(false, Ordering::SeqCst);
    let second = harvester
        .render_all(renderer.clone(), Arc::new(NoopProgress))
        .await
        .unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.pages_added, 2);
    assert_eq!(harvester.catalog().unwrap().list_pages(b.id).unwrap().len(), 2);
}

#[tokio::test]
async fn undownloaded_document_stays_pending() {
    let env = Env::start(&["a.pdf"]).await;
    let mut harvester = Harvester::new(env.config.clone());

    let fetched = harvester
        .fetch(&env.links(&["a.pdf", "gone.pdf"]), &env.downloader())
        .await
        .unwrap();
    assert_eq!(fetched.downloads.failed.len(), 1);
    assert_eq!(fetched.registration, RegisterOutcome::Inserted(2));

    let renderer = Arc::new(ScriptedRenderer::new(&[("a", 1)]));
    let report = harvester
        .render_all(renderer, Arc::new(NoopProgress))
        .await
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);

    let catalog = harvester.catalog().unwrap();
    let gone = catalog.document_by_name("gone.pdf").unwrap().unwrap();
    assert!(!catalog.has_pages(gone.id).unwrap());
}

#[tokio::test]
async fn export_lists_every_document() {
    let env = Env::start(&["a.pdf", "b.pdf"]).await;
    let mut harvester = Harvester::new(env.config.clone());
    harvester
        .fetch(&env.links(&["a.pdf", "b.pdf"]), &env.downloader())
        .await
        .unwrap();

    let out = env.config.files_dir.join("documents.csv");
    let rows = harvester.export_csv(&out).unwrap();
    assert_eq!(rows, 2);

    let text = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "id,name,href");
    assert!(lines[1].starts_with("1,a.pdf,"));
    assert!(lines[2].starts_with("2,b.pdf,"));
}
