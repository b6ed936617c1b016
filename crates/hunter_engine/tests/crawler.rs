use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use hunter_core::{JobId, JobStatus};
use hunter_engine::{
    CrawlRequest, CrawlSettings, FailureKind, FetchError, FetchOutput, FetchSettings, Fetcher,
    ImageSource, JobContext, PageCrawler, ReqwestFetcher, SourceError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(hunter_logging::initialize_for_tests);
}

/// Serves scripted pages; anything past the script is an empty page.
struct ScriptedSource {
    max_page_size: u32,
    pages: Vec<Result<Vec<String>, SourceError>>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedSource {
    fn new(max_page_size: u32, pages: Vec<Result<Vec<String>, SourceError>>) -> Self {
        Self {
            max_page_size,
            pages,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(u32, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ImageSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    async fn search(
        &self,
        _query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<String>, SourceError> {
        self.calls.lock().unwrap().push((page, page_size));
        self.pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"jpeg-bytes".to_vec(), "image/jpeg"))
        .mount(&server)
        .await;
    server
}

fn crawler(source: Arc<ScriptedSource>) -> PageCrawler {
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    PageCrawler::new(source, Arc::new(fetcher), CrawlSettings::default())
}

fn request(target: usize, dir: &Path) -> CrawlRequest {
    CrawlRequest {
        job_id: JobId::new(),
        query: "cats".to_string(),
        target,
        output_dir: dir.to_path_buf(),
    }
}

fn context() -> JobContext {
    JobContext::new(CancellationToken::new(), Duration::from_secs(30))
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn img(server: &MockServer, name: &str) -> String {
    format!("{}/img/{}", server.uri(), name)
}

#[tokio::test]
async fn one_item_per_page_stops_at_target() {
    init_logging();
    let server = image_server().await;
    let pages = (1..=5)
        .map(|n| Ok(vec![img(&server, &format!("{n}.jpg"))]))
        .collect();
    let source = Arc::new(ScriptedSource::new(1, pages));
    let temp = TempDir::new().unwrap();

    let report = crawler(Arc::clone(&source))
        .run(&request(3, temp.path()), &context())
        .await;

    assert_eq!(report.status, JobStatus::Done);
    assert_eq!(report.message, "Downloaded 3 images");
    assert_eq!(files_in(temp.path()), vec!["000.jpg", "001.jpg", "002.jpg"]);
    assert_eq!(source.calls(), vec![(1, 1), (2, 1), (3, 1)]);
}

#[tokio::test]
async fn rate_limit_on_second_page_keeps_first_page_files() {
    init_logging();
    let server = image_server().await;
    let source = Arc::new(ScriptedSource::new(
        2,
        vec![
            Ok(vec![img(&server, "a.png"), img(&server, "b.jpeg")]),
            Err(SourceError::HttpStatus(429)),
        ],
    ));
    let temp = TempDir::new().unwrap();

    let report = crawler(source)
        .run(&request(10, temp.path()), &context())
        .await;

    assert_eq!(report.status, JobStatus::Error);
    assert!(report.message.contains("429"), "{}", report.message);
    assert_eq!(files_in(temp.path()), vec!["000.png", "001.jpeg"]);
}

#[tokio::test]
async fn empty_first_page_is_done() {
    init_logging();
    let source = Arc::new(ScriptedSource::new(80, Vec::new()));
    let temp = TempDir::new().unwrap();

    let report = crawler(source)
        .run(&request(50, temp.path()), &context())
        .await;

    assert_eq!(report.status, JobStatus::Done);
    assert_eq!(report.message, "Downloaded 0 images");
    assert!(files_in(temp.path()).is_empty());
}

#[tokio::test]
async fn failed_item_does_not_fail_the_job() {
    init_logging();
    let server = image_server().await;
    let broken = format!("{}/broken.jpg", server.uri());
    let source = Arc::new(ScriptedSource::new(
        3,
        vec![Ok(vec![img(&server, "x.jpg"), broken, img(&server, "z.gif")])],
    ));
    let temp = TempDir::new().unwrap();

    let report = crawler(source)
        .run(&request(3, temp.path()), &context())
        .await;

    assert_eq!(report.status, JobStatus::Done);
    assert_eq!(report.message, "Downloaded 2 images");
    assert_eq!(report.summary.failed, 1);
    assert_eq!(files_in(temp.path()), vec!["000.jpg", "002.gif"]);
}

#[tokio::test]
async fn page_is_truncated_at_target() {
    init_logging();
    let server = image_server().await;
    let urls = (0..6).map(|n| img(&server, &format!("{n}.jpg"))).collect();
    let source = Arc::new(ScriptedSource::new(200, vec![Ok(urls)]));
    let temp = TempDir::new().unwrap();

    let report = crawler(Arc::clone(&source))
        .run(&request(4, temp.path()), &context())
        .await;

    assert_eq!(report.status, JobStatus::Done);
    assert_eq!(files_in(temp.path()).len(), 4);
    assert_eq!(source.calls(), vec![(1, 4)]);
}

#[tokio::test]
async fn cancelled_job_ends_in_error() {
    init_logging();
    let server = image_server().await;
    let source = Arc::new(ScriptedSource::new(
        1,
        vec![Ok(vec![img(&server, "1.jpg")])],
    ));
    let temp = TempDir::new().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = JobContext::new(token, Duration::from_secs(30));

    let report = crawler(source).run(&request(5, temp.path()), &ctx).await;

    assert_eq!(report.status, JobStatus::Error);
    assert_eq!(report.message, "job cancelled: server shutting down");
}

#[tokio::test]
async fn transport_failure_is_an_error() {
    init_logging();
    let source = Arc::new(ScriptedSource::new(
        10,
        vec![Err(SourceError::Network("connection refused".to_string()))],
    ));
    let temp = TempDir::new().unwrap();

    let report = crawler(source)
        .run(&request(5, temp.path()), &context())
        .await;

    assert_eq!(report.status, JobStatus::Error);
    assert!(report.message.contains("connection refused"), "{}", report.message);
}

/// Never answers within any reasonable budget.
struct StalledSource;

#[async_trait::async_trait]
impl ImageSource for StalledSource {
    fn name(&self) -> &str {
        "stalled"
    }

    fn max_page_size(&self) -> u32 {
        10
    }

    async fn search(
        &self,
        _query: &str,
        _page: u32,
        _page_size: u32,
    ) -> Result<Vec<String>, SourceError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn stalled_source_hits_the_job_deadline() {
    init_logging();
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let crawler = PageCrawler::new(
        Arc::new(StalledSource),
        Arc::new(fetcher),
        CrawlSettings::default(),
    );
    let temp = TempDir::new().unwrap();
    let ctx = JobContext::new(CancellationToken::new(), Duration::from_millis(100));

    let started = Instant::now();
    let report = crawler.run(&request(5, temp.path()), &ctx).await;

    assert_eq!(report.status, JobStatus::Error);
    assert_eq!(report.message, "job deadline exceeded");
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
}

/// Tracks how many fetches overlap; URLs containing "broken" fail.
#[derive(Default)]
struct CountingFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait::async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchOutput, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if url.contains("broken") {
            return Err(FetchError {
                kind: FailureKind::HttpStatus(500),
                message: url.to_string(),
            });
        }
        Ok(FetchOutput {
            url: url.to_string(),
            path: destination.to_path_buf(),
            content_type: Some("image/jpeg".to_string()),
            bytes_written: 0,
        })
    }
}

#[tokio::test]
async fn in_flight_fetches_stay_under_the_ceiling() {
    init_logging();
    let urls = (0..6)
        .map(|n| {
            if n == 3 {
                "http://images.test/broken.jpg".to_string()
            } else {
                format!("http://images.test/{n}.jpg")
            }
        })
        .collect();
    let source = Arc::new(ScriptedSource::new(200, vec![Ok(urls)]));
    let fetcher = Arc::new(CountingFetcher::default());
    let crawler = PageCrawler::new(
        source,
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        CrawlSettings {
            max_concurrent_fetches: 2,
        },
    );
    let temp = TempDir::new().unwrap();

    let report = crawler.run(&request(6, temp.path()), &context()).await;

    assert_eq!(report.status, JobStatus::Done);
    assert_eq!(report.message, "Downloaded 5 images");
    assert_eq!(report.summary.failed, 1);
    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak in-flight fetches was {peak}");
    assert_eq!(peak, 2);
}
