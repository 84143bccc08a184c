//! Concurrent chapter download engine.
//!
//! Chapters are processed concurrently, and each chapter's images are
//! downloaded concurrently. One shared semaphore, sized once from the
//! configured worker width, bounds every in-flight network operation
//! across chapters and image batches alike. Failures stay local: a bad
//! chapter is skipped, a bad image is dropped from the result set, and
//! siblings carry on.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::archive;
use crate::console::Console;
use crate::extract::{Chapter, parse_chapter_images};
use crate::fetch::Fetcher;
use crate::utils::{extension_for, image_filename, sanitize_title};

/// Options controlling a download run.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Merge each completed chapter into a PDF.
    pub create_pdf: bool,

    /// Delete a chapter's images after successful PDF conversion.
    pub delete_images: bool,

    /// Width of the shared worker pool.
    pub workers: usize,

    /// Root directory chapters are downloaded into.
    pub directory: PathBuf,
}

/// Overall progress, reported after each chapter reaches a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Chapters that reached a terminal state so far.
    pub completed: usize,

    /// Total chapters in this run.
    pub total: usize,
}

impl Progress {
    /// Integer percentage of finished chapters.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            (self.completed * 100 / self.total) as u8
        }
    }
}

/// Terminal state of one chapter within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterStatus {
    /// All wanted images were attempted; at least the folder exists.
    Completed,

    /// Completed and merged into a PDF.
    Archived,

    /// Fetch or extraction yielded nothing; no folder was created.
    Skipped,
}

/// Outcome of one chapter.
#[derive(Debug)]
pub struct ChapterReport {
    /// The chapter this report is about.
    pub chapter: Chapter,

    /// Successfully written image files, in sequence order.
    pub image_paths: Vec<PathBuf>,

    /// Number of images that failed to download or save.
    pub failed_images: usize,

    /// Terminal state the chapter reached.
    pub status: ChapterStatus,
}

/// Progress notification callback.
pub type ProgressFn = dyn Fn(Progress) + Send + Sync;

/// Shared state of one download run.
struct RunContext {
    fetcher: Arc<Fetcher>,
    options: DownloadOptions,
    console: Console,
    pool: Arc<Semaphore>,
    progress: Option<Arc<ProgressFn>>,
    completed: AtomicUsize,
    total: usize,
    manga_dir: PathBuf,
}

/// Drives concurrent chapter downloads for one manga.
pub struct DownloadEngine {
    fetcher: Arc<Fetcher>,
    options: DownloadOptions,
    console: Console,
    pool: Arc<Semaphore>,
    progress: Option<Arc<ProgressFn>>,
}

impl DownloadEngine {
    /// Creates an engine with a worker pool sized from the options.
    pub fn new(fetcher: Fetcher, options: DownloadOptions, console: Console) -> Self {
        let width = options.workers.max(1);

        Self {
            fetcher: Arc::new(fetcher),
            options,
            console,
            pool: Arc::new(Semaphore::new(width)),
            progress: None,
        }
    }

    /// Registers a callback invoked after each chapter finishes.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Downloads the given chapters under `downloads/<manga title>/`.
    ///
    /// Returns one report per chapter, sorted by chapter number. Only a
    /// panicked worker task aborts the run; ordinary fetch, extraction,
    /// and image failures are reported per chapter.
    pub async fn run(&self, manga_title: &str, chapters: Vec<Chapter>) -> Result<Vec<ChapterReport>> {
        let total = chapters.len();
        let ctx = Arc::new(RunContext {
            fetcher: self.fetcher.clone(),
            options: self.options.clone(),
            console: self.console,
            pool: self.pool.clone(),
            progress: self.progress.clone(),
            completed: AtomicUsize::new(0),
            total,
            manga_dir: self.options.directory.join(sanitize_title(manga_title)),
        });

        let mut tasks = JoinSet::new();
        for chapter in chapters {
            let ctx = ctx.clone();
            tasks.spawn(async move { process_chapter(ctx, chapter).await });
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            reports.push(joined.context("chapter download task panicked")?);
        }

        reports.sort_by(|a, b| a.chapter.number.total_cmp(&b.chapter.number));
        Ok(reports)
    }
}

/// Runs one chapter to a terminal state and bumps the shared counter.
async fn process_chapter(ctx: Arc<RunContext>, chapter: Chapter) -> ChapterReport {
    let report = download_chapter(&ctx, chapter).await;

    let completed = ctx.completed.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(progress) = &ctx.progress {
        progress(Progress {
            completed,
            total: ctx.total,
        });
    }

    report
}

fn skipped(chapter: Chapter) -> ChapterReport {
    ChapterReport {
        chapter,
        image_paths: Vec::new(),
        failed_images: 0,
        status: ChapterStatus::Skipped,
    }
}

async fn download_chapter(ctx: &RunContext, chapter: Chapter) -> ChapterReport {
    ctx.console
        .step(&format!("Processing chapter: {}", chapter.title));

    let html = {
        let _permit = ctx.pool.acquire().await.expect("worker pool closed");
        ctx.fetcher.fetch_html(&chapter.url).await
    };
    let html = match html {
        Ok(html) => html,
        Err(e) => {
            ctx.console.error(&format!(
                "Skipping chapter '{}' (could not fetch): {}",
                chapter.title, e
            ));
            return skipped(chapter);
        }
    };

    let image_urls = parse_chapter_images(&html);
    if image_urls.is_empty() {
        ctx.console.warning(&format!(
            "Skipping chapter '{}' (no images found)",
            chapter.title
        ));
        return skipped(chapter);
    }

    // The folder is only created once there is something to put in it,
    // so skipped chapters leave no trace on disk.
    let chapter_dir = ctx.manga_dir.join(sanitize_title(&chapter.title));
    if let Err(e) = fs::create_dir_all(&chapter_dir).await {
        ctx.console.error(&format!(
            "Skipping chapter '{}' (cannot create {}): {}",
            chapter.title,
            chapter_dir.display(),
            e
        ));
        return skipped(chapter);
    }

    // Sequence indices are bound here, before dispatch, so filenames
    // follow document order no matter which download finishes first.
    let downloads = image_urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| download_image(ctx, url, i + 1, &chapter.url, &chapter_dir));
    let results = join_all(downloads).await;

    let failed_images = results.iter().filter(|r| r.is_none()).count();
    let mut image_paths: Vec<PathBuf> = results.into_iter().flatten().collect();
    // Zero-padded names make this equal to sequence order.
    image_paths.sort();

    ctx.console.success(&format!(
        "Finished chapter: {} ({} images, {} failed)",
        chapter.title,
        image_paths.len(),
        failed_images
    ));

    let mut status = ChapterStatus::Completed;
    if ctx.options.create_pdf && !image_paths.is_empty() {
        status = archive_chapter(ctx, &chapter, &image_paths).await;
    }

    ChapterReport {
        chapter,
        image_paths,
        failed_images,
        status,
    }
}

async fn download_image(
    ctx: &RunContext,
    url: String,
    index: usize,
    referer: &str,
    chapter_dir: &std::path::Path,
) -> Option<PathBuf> {
    let fetched = {
        let _permit = ctx.pool.acquire().await.expect("worker pool closed");
        ctx.fetcher.fetch_bytes(&url, Some(referer)).await
    };

    let (bytes, content_type) = match fetched {
        Ok(fetched) => fetched,
        Err(e) => {
            ctx.console
                .error(&format!("Failed to download {}: {}", url, e));
            return None;
        }
    };

    let ext = extension_for(content_type.as_deref(), &url);
    let name = image_filename(index, &ext);
    let path = chapter_dir.join(&name);

    match fs::write(&path, &bytes).await {
        Ok(()) => Some(path),
        Err(e) => {
            ctx.console
                .error(&format!("Failed to save {}: {}", path.display(), e));
            None
        }
    }
}

/// Hands a finished chapter to the PDF archiver; on archive failure the
/// images are retained regardless of the delete flag.
async fn archive_chapter(
    ctx: &RunContext,
    chapter: &Chapter,
    image_paths: &[PathBuf],
) -> ChapterStatus {
    let pdf_path = ctx
        .manga_dir
        .join(format!("{}.pdf", sanitize_title(&chapter.title)));

    let paths = image_paths.to_vec();
    let target = pdf_path.clone();
    let result = tokio::task::spawn_blocking(move || archive::images_to_pdf(&paths, &target)).await;

    match result {
        Ok(Ok(())) => {
            ctx.console
                .success(&format!("Created PDF: {}", pdf_path.display()));
            if ctx.options.delete_images {
                for path in archive::remove_images(image_paths) {
                    ctx.console
                        .error(&format!("Failed to delete image {}", path.display()));
                }
            }
            ChapterStatus::Archived
        }
        Ok(Err(e)) => {
            ctx.console
                .error(&format!("Failed to create PDF for '{}': {}", chapter.title, e));
            ChapterStatus::Completed
        }
        Err(e) => {
            ctx.console
                .error(&format!("PDF task failed for '{}': {}", chapter.title, e));
            ChapterStatus::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> Fetcher {
        Fetcher::new(&NetworkConfig {
            retries: 0,
            retry_delay_sec: 0,
            ..NetworkConfig::default()
        })
        .unwrap()
    }

    fn test_chapter(server: &MockServer, slug: &str, number: f64) -> Chapter {
        Chapter {
            title: format!("Chapter {}", number),
            url: format!("{}/{}", server.uri(), slug),
            number,
            is_side_story: false,
        }
    }

    fn chapter_html(image_urls: &[String]) -> String {
        let imgs: String = image_urls
            .iter()
            .map(|u| format!(r#"<img class="wp-manga-chapter-img" data-src="{}">"#, u))
            .collect();
        format!(r#"<html><body><div class="reading-content">{}</div></body></html>"#, imgs)
    }

    async fn mount_page(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_image(server: &MockServer, route: &str, bytes: &[u8], delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(bytes.to_vec())
                    .insert_header("content-type", "image/jpeg")
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(server)
            .await;
    }

    fn engine_for(dir: &std::path::Path) -> DownloadEngine {
        let options = DownloadOptions {
            create_pdf: false,
            delete_images: false,
            workers: 4,
            directory: dir.to_path_buf(),
        };
        DownloadEngine::new(test_fetcher(), options, Console::with_colors(false))
    }

    fn archiving_engine_for(dir: &std::path::Path, delete_images: bool) -> DownloadEngine {
        let options = DownloadOptions {
            create_pdf: true,
            delete_images,
            workers: 4,
            directory: dir.to_path_buf(),
        };
        DownloadEngine::new(test_fetcher(), options, Console::with_colors(false))
    }

    fn png_bytes() -> Vec<u8> {
        use printpdf::image_crate::{ImageOutputFormat, Rgb, RgbImage};

        let mut img = RgbImage::new(4, 6);
        for pixel in img.pixels_mut() {
            *pixel = Rgb([200, 100, 50]);
        }
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    async fn mount_png(server: &MockServer, route: &str, bytes: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(bytes)
                    .insert_header("content-type", "image/png"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_sequence_order_survives_out_of_order_completion() {
        let server = MockServer::start().await;
        let image_urls: Vec<String> = (1..=3)
            .map(|i| format!("{}/img/{}.jpg", server.uri(), i))
            .collect();

        mount_page(&server, "/chapter-1", chapter_html(&image_urls)).await;
        // The first image finishes last.
        mount_image(&server, "/img/1.jpg", b"first", 300).await;
        mount_image(&server, "/img/2.jpg", b"second", 0).await;
        mount_image(&server, "/img/3.jpg", b"third", 0).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());
        let reports = engine
            .run("Test Manga", vec![test_chapter(&server, "chapter-1", 1.0)])
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ChapterStatus::Completed);
        assert_eq!(reports[0].failed_images, 0);

        let chapter_dir = dir.path().join("Test Manga").join("Chapter 1");
        assert_eq!(
            std::fs::read(chapter_dir.join("001.jpg")).unwrap(),
            b"first"
        );
        assert_eq!(
            std::fs::read(chapter_dir.join("002.jpg")).unwrap(),
            b"second"
        );
        assert_eq!(
            std::fs::read(chapter_dir.join("003.jpg")).unwrap(),
            b"third"
        );
    }

    #[tokio::test]
    async fn test_empty_chapter_skipped_siblings_complete() {
        let server = MockServer::start().await;

        mount_page(
            &server,
            "/chapter-1",
            chapter_html(&[format!("{}/img/a.jpg", server.uri())]),
        )
        .await;
        mount_image(&server, "/img/a.jpg", b"page", 0).await;
        // No images on this one.
        mount_page(&server, "/chapter-2", chapter_html(&[])).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());
        let reports = engine
            .run(
                "Test Manga",
                vec![
                    test_chapter(&server, "chapter-1", 1.0),
                    test_chapter(&server, "chapter-2", 2.0),
                ],
            )
            .await
            .unwrap();

        assert_eq!(reports[0].status, ChapterStatus::Completed);
        assert_eq!(reports[1].status, ChapterStatus::Skipped);

        let manga_dir = dir.path().join("Test Manga");
        assert!(manga_dir.join("Chapter 1").exists());
        // Skipped chapters create no folder.
        assert!(!manga_dir.join("Chapter 2").exists());
    }

    #[tokio::test]
    async fn test_failed_image_excluded_but_chapter_continues() {
        let server = MockServer::start().await;
        let image_urls = vec![
            format!("{}/img/ok.jpg", server.uri()),
            format!("{}/img/broken.jpg", server.uri()),
        ];

        mount_page(&server, "/chapter-1", chapter_html(&image_urls)).await;
        mount_image(&server, "/img/ok.jpg", b"page", 0).await;
        Mock::given(method("GET"))
            .and(path("/img/broken.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());
        let reports = engine
            .run("Test Manga", vec![test_chapter(&server, "chapter-1", 1.0)])
            .await
            .unwrap();

        assert_eq!(reports[0].status, ChapterStatus::Completed);
        assert_eq!(reports[0].failed_images, 1);
        assert_eq!(reports[0].image_paths.len(), 1);
        assert!(reports[0].image_paths[0].ends_with("001.jpg"));
    }

    #[tokio::test]
    async fn test_unreachable_chapter_skipped() {
        let server = MockServer::start().await;
        // Nothing mounted: every request 404s.

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());
        let reports = engine
            .run("Test Manga", vec![test_chapter(&server, "gone", 1.0)])
            .await
            .unwrap();

        assert_eq!(reports[0].status, ChapterStatus::Skipped);
        assert!(!dir.path().join("Test Manga").join("Chapter 1").exists());
    }

    #[tokio::test]
    async fn test_progress_reported_per_chapter() {
        let server = MockServer::start().await;
        for slug in ["c1", "c2"] {
            mount_page(&server, &format!("/{}", slug), chapter_html(&[])).await;
        }

        let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path()).on_progress(move |p| {
            sink.lock().unwrap().push((p.completed, p.total));
        });

        engine
            .run(
                "Test Manga",
                vec![
                    test_chapter(&server, "c1", 1.0),
                    test_chapter(&server, "c2", 2.0),
                ],
            )
            .await
            .unwrap();

        let mut updates = seen.lock().unwrap().clone();
        updates.sort();
        assert_eq!(updates, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_reports_sorted_by_chapter_number() {
        let server = MockServer::start().await;
        for slug in ["c1", "c2", "c3"] {
            mount_page(&server, &format!("/{}", slug), chapter_html(&[])).await;
        }

        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());
        let reports = engine
            .run(
                "Test Manga",
                vec![
                    test_chapter(&server, "c3", 7.5),
                    test_chapter(&server, "c1", 2.0),
                    test_chapter(&server, "c2", 5.0),
                ],
            )
            .await
            .unwrap();

        let numbers: Vec<f64> = reports.iter().map(|r| r.chapter.number).collect();
        assert_eq!(numbers, vec![2.0, 5.0, 7.5]);
    }

    #[tokio::test]
    async fn test_chapter_archived_and_images_pruned() {
        let server = MockServer::start().await;
        let image_urls = vec![format!("{}/img/1.png", server.uri())];

        mount_page(&server, "/chapter-1", chapter_html(&image_urls)).await;
        mount_png(&server, "/img/1.png", png_bytes()).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = archiving_engine_for(dir.path(), true);
        let reports = engine
            .run("Test Manga", vec![test_chapter(&server, "chapter-1", 1.0)])
            .await
            .unwrap();

        assert_eq!(reports[0].status, ChapterStatus::Archived);

        let manga_dir = dir.path().join("Test Manga");
        assert!(manga_dir.join("Chapter 1.pdf").exists());
        // Images deleted, and the emptied chapter folder pruned with them.
        assert!(!manga_dir.join("Chapter 1").exists());
    }

    #[tokio::test]
    async fn test_archive_failure_keeps_images() {
        let server = MockServer::start().await;
        let image_urls = vec![format!("{}/img/1.png", server.uri())];

        mount_page(&server, "/chapter-1", chapter_html(&image_urls)).await;
        // Saves fine, but no PDF can come of it.
        mount_png(&server, "/img/1.png", b"not an image".to_vec()).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = archiving_engine_for(dir.path(), true);
        let reports = engine
            .run("Test Manga", vec![test_chapter(&server, "chapter-1", 1.0)])
            .await
            .unwrap();

        assert_eq!(reports[0].status, ChapterStatus::Completed);

        let manga_dir = dir.path().join("Test Manga");
        assert!(!manga_dir.join("Chapter 1.pdf").exists());
        // The delete flag does not apply when archiving failed.
        assert_eq!(
            std::fs::read(manga_dir.join("Chapter 1").join("001.png")).unwrap(),
            b"not an image"
        );
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress { completed: 0, total: 4 }.percent(), 0);
        assert_eq!(Progress { completed: 1, total: 4 }.percent(), 25);
        assert_eq!(Progress { completed: 2, total: 3 }.percent(), 66);
        assert_eq!(Progress { completed: 4, total: 4 }.percent(), 100);
        assert_eq!(Progress { completed: 0, total: 0 }.percent(), 100);
    }
}
