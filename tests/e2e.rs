//! End-to-end integration tests for docmerge.
//!
//! Every test runs against a local wiremock server; fixtures are generated
//! in-process (PDFs via lopdf, images via the image crate), so the suite is
//! hermetic and needs no network or checked-in binaries.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use docmerge::{
    merge, merge_to_file, merge_to_store, FsObjectStore, MergeConfig, MergeError,
    MergeProgressCallback, SourceErrorKind,
};
use lopdf::{dictionary, Document, Object};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A PDF with one page per entry in `widths`, each page `w × 792` points.
/// Distinct widths make pages identifiable after merging.
fn pdf_bytes(widths: &[i64]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = widths
        .iter()
        .map(|&w| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), w.into(), 792.into()],
            });
            Object::Reference(page_id)
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => widths.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize fixture PDF");
    bytes
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([15, 160, 90]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode fixture PNG");
    buf
}

/// `(width, height)` of every page of a serialized PDF, in page order.
fn page_dims(bytes: &[u8]) -> Vec<(i64, i64)> {
    let doc = Document::load_mem(bytes).expect("merged output must reload");
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let page = doc.get_dictionary(page_id).expect("page dict");
            let media_box = page
                .get(b"MediaBox")
                .and_then(Object::as_array)
                .expect("page MediaBox");
            (
                media_box[2].as_i64().expect("width"),
                media_box[3].as_i64().expect("height"),
            )
        })
        .collect()
}

async fn mount(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn mount_delayed(server: &MockServer, route: &str, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

fn quiet_config() -> MergeConfig {
    MergeConfig::default()
}

// ── Success-path properties ──────────────────────────────────────────────────

#[tokio::test]
async fn page_count_is_sum_and_order_is_input_order() {
    let server = MockServer::start().await;
    mount(&server, "/a.pdf", pdf_bytes(&[111, 111])).await;
    mount(&server, "/b.pdf", pdf_bytes(&[222, 222, 222])).await;

    let sources = [
        format!("{}/a.pdf", server.uri()),
        format!("{}/b.pdf", server.uri()),
    ];
    let output = merge(&sources, &quiet_config()).await.expect("merge succeeds");

    assert_eq!(output.stats.total_sources, 2);
    assert_eq!(output.stats.total_pages, 5);
    assert_eq!(output.stats.pages_per_source, vec![2, 3]);
    assert_eq!(output.stats.byte_size, output.pdf.len());

    let dims = page_dims(&output.pdf);
    let widths: Vec<i64> = dims.iter().map(|(w, _)| *w).collect();
    assert_eq!(widths, vec![111, 111, 222, 222, 222]);
}

#[tokio::test]
async fn scenario_pdf_then_image_appends_full_page_image() {
    let server = MockServer::start().await;
    mount(&server, "/contract.pdf", pdf_bytes(&[612, 612])).await;
    // The URL lies about the extension on purpose; detection is content-based.
    mount(&server, "/scan.dat", png_bytes(120, 80)).await;

    let sources = [
        format!("{}/contract.pdf", server.uri()),
        format!("{}/scan.dat", server.uri()),
    ];
    let output = merge(&sources, &quiet_config()).await.expect("merge succeeds");

    assert_eq!(output.stats.total_pages, 3);
    let dims = page_dims(&output.pdf);
    assert_eq!(dims[0], (612, 792));
    assert_eq!(dims[1], (612, 792));
    // Image page canvas equals the image's pixel dimensions (72 dpi).
    assert_eq!(dims[2], (120, 80));
}

#[tokio::test]
async fn reordering_inputs_reorders_whole_source_blocks() {
    let server = MockServer::start().await;
    mount(&server, "/a.pdf", pdf_bytes(&[101, 102])).await;
    mount(&server, "/b.pdf", pdf_bytes(&[201])).await;

    let a = format!("{}/a.pdf", server.uri());
    let b = format!("{}/b.pdf", server.uri());

    let forward = merge(&[a.clone(), b.clone()], &quiet_config()).await.unwrap();
    let reversed = merge(&[b, a], &quiet_config()).await.unwrap();

    let widths = |bytes: &[u8]| page_dims(bytes).iter().map(|(w, _)| *w).collect::<Vec<_>>();
    assert_eq!(widths(&forward.pdf), vec![101, 102, 201]);
    assert_eq!(widths(&reversed.pdf), vec![201, 101, 102]);
}

#[tokio::test]
async fn merging_same_inputs_twice_is_idempotent() {
    let server = MockServer::start().await;
    mount(&server, "/a.pdf", pdf_bytes(&[300, 301])).await;
    mount(&server, "/b.png", png_bytes(50, 60)).await;

    let sources = [
        format!("{}/a.pdf", server.uri()),
        format!("{}/b.png", server.uri()),
    ];
    let first = merge(&sources, &quiet_config()).await.unwrap();
    let second = merge(&sources, &quiet_config()).await.unwrap();

    assert_eq!(first.stats.total_pages, second.stats.total_pages);
    assert_eq!(page_dims(&first.pdf), page_dims(&second.pdf));
}

#[tokio::test]
async fn single_source_round_trips_pages_unmodified() {
    let server = MockServer::start().await;
    mount(&server, "/only.pdf", pdf_bytes(&[400, 500, 600])).await;

    let sources = [format!("{}/only.pdf", server.uri())];
    let output = merge(&sources, &quiet_config()).await.unwrap();

    assert_eq!(output.stats.total_pages, 3);
    assert_eq!(
        page_dims(&output.pdf),
        vec![(400, 792), (500, 792), (600, 792)]
    );
}

#[tokio::test]
async fn twenty_sources_with_mixed_delays_preserve_order() {
    let server = MockServer::start().await;
    let mut sources = Vec::new();
    for i in 0..20i64 {
        let route = format!("/doc{i}.pdf");
        let body = pdf_bytes(&[1000 + i]);
        if i % 3 == 0 {
            // Delay a subset so completion order diverges from input order.
            mount_delayed(&server, &route, body, Duration::from_millis(150)).await;
        } else {
            mount(&server, &route, body).await;
        }
        sources.push(format!("{}{route}", server.uri()));
    }

    let config = MergeConfig::builder().concurrency(8).build().unwrap();
    let output = merge(&sources, &config).await.expect("merge succeeds");

    assert_eq!(output.stats.total_pages, 20);
    let widths: Vec<i64> = page_dims(&output.pdf).iter().map(|(w, _)| *w).collect();
    let expected: Vec<i64> = (0..20).map(|i| 1000 + i).collect();
    assert_eq!(widths, expected, "completion order must never leak into page order");
}

// ── Failure-path properties ──────────────────────────────────────────────────

#[tokio::test]
async fn empty_source_list_is_rejected_before_dispatch() {
    let result = merge(&[] as &[&str], &quiet_config()).await;
    assert!(matches!(result, Err(MergeError::EmptySources)));
}

#[tokio::test]
async fn unreachable_url_fails_whole_merge_with_indexed_entry() {
    let server = MockServer::start().await;
    mount(&server, "/good.pdf", pdf_bytes(&[100])).await;

    let sources = [
        format!("{}/good.pdf", server.uri()),
        // Port 1 is essentially never listening: connection refused.
        "http://127.0.0.1:1/bad.pdf".to_string(),
    ];
    match merge(&sources, &quiet_config()).await {
        Err(MergeError::SourcesFailed {
            failed,
            total,
            failures,
        }) => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
            assert_eq!(failures[0].url, "http://127.0.0.1:1/bad.pdf");
            assert_eq!(failures[0].kind, SourceErrorKind::NetworkError);
        }
        other => panic!("expected SourcesFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn http_404_reported_with_http_error_kind() {
    let server = MockServer::start().await;
    mount(&server, "/good.pdf", pdf_bytes(&[100])).await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sources = [
        format!("{}/good.pdf", server.uri()),
        format!("{}/missing.pdf", server.uri()),
    ];
    let err = merge(&sources, &quiet_config()).await.unwrap_err();
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, SourceErrorKind::HttpError);
    assert!(failures[0].message.contains("404"), "got: {}", failures[0].message);
}

#[tokio::test]
async fn every_failed_source_is_reported_not_just_the_first() {
    let server = MockServer::start().await;
    mount(&server, "/ok.pdf", pdf_bytes(&[100])).await;
    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    mount(&server, "/junk", b"not a document at all".to_vec()).await;

    let sources = [
        format!("{}/gone.pdf", server.uri()),
        format!("{}/ok.pdf", server.uri()),
        format!("{}/junk", server.uri()),
    ];
    match merge(&sources, &quiet_config()).await {
        Err(MergeError::SourcesFailed { failed, failures, .. }) => {
            assert_eq!(failed, 2);
            let mut indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
            indices.sort_unstable();
            assert_eq!(indices, vec![0, 2]);
            let kinds: Vec<SourceErrorKind> = failures.iter().map(|f| f.kind).collect();
            assert!(kinds.contains(&SourceErrorKind::HttpError));
            assert!(kinds.contains(&SourceErrorKind::UnsupportedFormat));
        }
        other => panic!("expected SourcesFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_image_bytes_fail_as_decode_error() {
    let server = MockServer::start().await;
    // PNG signature followed by garbage: detected as image, fails to decode.
    let mut corrupt = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    corrupt.extend_from_slice(&[0u8; 32]);
    mount(&server, "/broken.png", corrupt).await;

    let sources = [format!("{}/broken.png", server.uri())];
    let err = merge(&sources, &quiet_config()).await.unwrap_err();
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, SourceErrorKind::ImageDecodeError);
}

#[tokio::test]
async fn zero_byte_body_fails_as_empty_body() {
    let server = MockServer::start().await;
    mount(&server, "/void.pdf", Vec::new()).await;

    let sources = [format!("{}/void.pdf", server.uri())];
    let err = merge(&sources, &quiet_config()).await.unwrap_err();
    assert_eq!(err.failures()[0].kind, SourceErrorKind::EmptyBody);
}

#[tokio::test]
async fn truncated_pdf_fails_as_parse_error() {
    let server = MockServer::start().await;
    mount(&server, "/half.pdf", b"%PDF-1.4\nxref garbage".to_vec()).await;

    let sources = [format!("{}/half.pdf", server.uri())];
    let err = merge(&sources, &quiet_config()).await.unwrap_err();
    assert_eq!(err.failures()[0].kind, SourceErrorKind::PdfParseError);
}

#[tokio::test]
async fn malformed_url_fails_without_any_fetch() {
    let sources = ["not a url at all".to_string()];
    let err = merge(&sources, &quiet_config()).await.unwrap_err();
    assert_eq!(err.failures()[0].kind, SourceErrorKind::InvalidUrl);
}

#[tokio::test]
async fn fail_fast_aborts_before_slow_sources_finish() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fails.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_delayed(
        &server,
        "/slow.pdf",
        pdf_bytes(&[100]),
        Duration::from_secs(20),
    )
    .await;

    let config = MergeConfig::builder()
        .fail_fast(true)
        .concurrency(2)
        .build()
        .unwrap();
    let sources = [
        format!("{}/fails.pdf", server.uri()),
        format!("{}/slow.pdf", server.uri()),
    ];

    let start = std::time::Instant::now();
    let err = merge(&sources, &config).await.unwrap_err();
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "fail-fast must not wait out the slow source"
    );
    match err {
        MergeError::SourcesFailed { total, ref failures, .. } => {
            assert_eq!(total, 2);
            assert!(failures.iter().any(|f| f.kind == SourceErrorKind::HttpError));
        }
        other => panic!("expected SourcesFailed, got {other:?}"),
    }
}

// ── Delivery paths ───────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_to_file_writes_a_loadable_pdf() {
    let server = MockServer::start().await;
    mount(&server, "/a.pdf", pdf_bytes(&[100])).await;
    mount(&server, "/b.png", png_bytes(30, 40)).await;

    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("nested/dossier.pdf");
    let sources = [
        format!("{}/a.pdf", server.uri()),
        format!("{}/b.png", server.uri()),
    ];
    let stats = merge_to_file(&sources, &out_path, &quiet_config())
        .await
        .expect("merge_to_file succeeds");

    assert_eq!(stats.total_pages, 2);
    let written = std::fs::read(&out_path).expect("output file exists");
    assert_eq!(written.len(), stats.byte_size);
    assert_eq!(page_dims(&written).len(), 2);
    // No temp file left behind.
    assert!(!out_path.with_extension("pdf.tmp").exists());
}

#[tokio::test]
async fn merge_to_store_persists_under_key() {
    let server = MockServer::start().await;
    mount(&server, "/a.pdf", pdf_bytes(&[100, 200])).await;

    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path());
    let config = MergeConfig::builder()
        .correlation_id("LEAD123")
        .build()
        .unwrap();

    let sources = [format!("{}/a.pdf", server.uri())];
    let (location, stats) = merge_to_store(
        &sources,
        &store,
        "LEAD123/merged/merged_document_1.pdf",
        &config,
    )
    .await
    .expect("merge_to_store succeeds");

    assert!(location.ends_with("LEAD123/merged/merged_document_1.pdf"));
    let stored = std::fs::read(dir.path().join("LEAD123/merged/merged_document_1.pdf")).unwrap();
    assert_eq!(stored.len(), stats.byte_size);
    assert_eq!(page_dims(&stored).len(), 2);
}

#[tokio::test]
async fn failed_merge_stores_nothing() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path());

    let sources = ["http://127.0.0.1:1/unreachable.pdf".to_string()];
    let result = merge_to_store(&sources, &store, "lead/doc.pdf", &quiet_config()).await;
    assert!(result.is_err());
    assert!(
        std::fs::read_dir(dir.path()).unwrap().next().is_none(),
        "store root must stay empty after a failed merge"
    );
}

// ── Progress events ──────────────────────────────────────────────────────────

struct CountingCallback {
    starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    merge_starts: AtomicUsize,
    merge_completes: AtomicUsize,
}

impl MergeProgressCallback for CountingCallback {
    fn on_merge_start(&self, _total: usize) {
        self.merge_starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_source_start(&self, _index: usize, _total: usize, _url: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_source_complete(&self, _index: usize, _total: usize, _pages: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_source_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_merge_complete(&self, _total: usize, _success: usize) {
        self.merge_completes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_source() {
    let server = MockServer::start().await;
    mount(&server, "/a.pdf", pdf_bytes(&[100])).await;
    mount(&server, "/b.pdf", pdf_bytes(&[200])).await;
    Mock::given(method("GET"))
        .and(path("/c.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let callback = Arc::new(CountingCallback {
        starts: AtomicUsize::new(0),
        completes: AtomicUsize::new(0),
        errors: AtomicUsize::new(0),
        merge_starts: AtomicUsize::new(0),
        merge_completes: AtomicUsize::new(0),
    });
    let config = MergeConfig::builder()
        .progress_callback(callback.clone() as Arc<dyn MergeProgressCallback>)
        .build()
        .unwrap();

    let sources = [
        format!("{}/a.pdf", server.uri()),
        format!("{}/b.pdf", server.uri()),
        format!("{}/c.pdf", server.uri()),
    ];
    let result = merge(&sources, &config).await;
    assert!(result.is_err());

    assert_eq!(callback.merge_starts.load(Ordering::SeqCst), 1);
    assert_eq!(callback.starts.load(Ordering::SeqCst), 3);
    assert_eq!(callback.completes.load(Ordering::SeqCst), 2);
    assert_eq!(callback.errors.load(Ordering::SeqCst), 1);
    assert_eq!(callback.merge_completes.load(Ordering::SeqCst), 1);
}
