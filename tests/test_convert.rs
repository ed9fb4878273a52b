use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use excuse_form::form::template::{fallback_template, save_document};
use excuse_form::pdf::converter::{
    cleanup, DocumentConverter, MAX_ATTEMPT_TIMEOUT, MIN_ATTEMPT_TIMEOUT,
};
use excuse_form::pdf::models::{
    ConversionOutcome, ConvertError, ConverterConfig, HostProfile, StrategyKind,
};
use excuse_form::pdf::strategy::{
    HtmlRenderStrategy, LibreOfficeStrategy, PandocStrategy, RemoteStrategy, Strategy,
};
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const MISSING_PROGRAM: &str = "definitely-not-an-installed-converter";

pub struct FailingStrategy;

#[async_trait]
impl Strategy for FailingStrategy {
    fn name(&self) -> &str {
        "failing"
    }

    async fn attempt(&self, _source: &Path, _target: &Path) -> ConversionOutcome {
        ConversionOutcome::Failed("always fails".to_owned())
    }
}

/// Leaves garbage at the target before failing.
pub struct PartialStrategy;

#[async_trait]
impl Strategy for PartialStrategy {
    fn name(&self) -> &str {
        "partial"
    }

    async fn attempt(&self, _source: &Path, target: &Path) -> ConversionOutcome {
        fs::write(target, b"%PDF-1.7 trunc").unwrap();
        ConversionOutcome::Failed("crashed halfway".to_owned())
    }
}

pub struct WritingStrategy {
    pub name: &'static str,
    pub desktop: bool,
}

impl WritingStrategy {
    pub fn boxed(name: &'static str) -> Box<dyn Strategy> {
        Box::new(Self {
            name,
            desktop: false,
        })
    }

    pub fn boxed_desktop(name: &'static str) -> Box<dyn Strategy> {
        Box::new(Self {
            name,
            desktop: true,
        })
    }
}

#[async_trait]
impl Strategy for WritingStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn requires_desktop_suite(&self) -> bool {
        self.desktop
    }

    async fn attempt(&self, _source: &Path, target: &Path) -> ConversionOutcome {
        fs::write(target, self.name.as_bytes()).unwrap();
        ConversionOutcome::Success(target.to_path_buf())
    }
}

/// Claims success without writing anything.
pub struct LyingStrategy;

#[async_trait]
impl Strategy for LyingStrategy {
    fn name(&self) -> &str {
        "lying"
    }

    async fn attempt(&self, _source: &Path, target: &Path) -> ConversionOutcome {
        ConversionOutcome::Success(target.to_path_buf())
    }
}

/// Writes a PDF, but not where it was asked to.
pub struct ElsewhereStrategy;

#[async_trait]
impl Strategy for ElsewhereStrategy {
    fn name(&self) -> &str {
        "elsewhere"
    }

    async fn attempt(&self, _source: &Path, target: &Path) -> ConversionOutcome {
        let elsewhere = target.with_file_name("elsewhere.pdf");
        fs::write(&elsewhere, b"%PDF-1.7").unwrap();
        ConversionOutcome::Success(elsewhere)
    }
}

pub struct SlowStrategy;

#[async_trait]
impl Strategy for SlowStrategy {
    fn name(&self) -> &str {
        "slow"
    }

    async fn attempt(&self, _source: &Path, target: &Path) -> ConversionOutcome {
        tokio::time::sleep(Duration::from_secs(10)).await;
        ConversionOutcome::Success(target.to_path_buf())
    }
}

pub struct PanickingStrategy;

#[async_trait]
impl Strategy for PanickingStrategy {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn attempt(&self, _source: &Path, _target: &Path) -> ConversionOutcome {
        panic!("converter blew up")
    }
}

fn source_docx(dir: &TempDir) -> PathBuf {
    let source = dir.path().join("entschuldigung.docx");
    save_document(&fallback_template(), &source).unwrap();
    source
}

/// An executable shell script standing in for an external converter.
#[cfg(unix)]
fn fake_tool(dir: &TempDir, name: &str, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let program = dir.path().join(name);
    fs::write(&program, format!("#!/bin/sh\n{script}\n")).unwrap();
    fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();
    program
}

fn header_end(request: &[u8]) -> Option<usize> {
    request.windows(4).position(|window| window == b"\r\n\r\n")
}

fn request_complete(request: &[u8]) -> bool {
    let Some(end) = header_end(request) else {
        return false;
    };
    let headers = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
    let length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok());
    match length {
        Some(length) => request.len() >= end + 4 + length,
        None => request.ends_with(b"0\r\n\r\n"),
    }
}

/// Answers exactly one HTTP request with the given status and body.
/// Resolves to the raw request once the answer is sent.
async fn serve_once(status: &'static str, body: &'static [u8]) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 8192];
        while !request_complete(&request) {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();
        stream.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });
    (url, handle)
}

#[tokio::test]
async fn falls_back_to_the_next_strategy() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let converter =
        DocumentConverter::new(vec![Box::new(FailingStrategy), WritingStrategy::boxed("second")]);

    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(pdf, dir.path().join("entschuldigung.pdf"));
    assert_eq!(fs::read(&pdf).unwrap(), b"second");
}

#[tokio::test]
async fn first_success_wins() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let converter = DocumentConverter::new(vec![
        WritingStrategy::boxed("first"),
        WritingStrategy::boxed("second"),
    ]);

    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(fs::read(&pdf).unwrap(), b"first");
}

#[tokio::test]
async fn all_failing_leaves_no_output() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let converter = DocumentConverter::new(vec![
        Box::new(PartialStrategy),
        Box::new(LyingStrategy),
        Box::new(FailingStrategy),
    ]);

    let result = converter.convert(&source).await;
    assert!(matches!(
        result,
        Err(ConvertError::AllStrategiesFailed { attempted: 3 })
    ));
    assert!(!dir.path().join("entschuldigung.pdf").exists());
    assert!(source.exists());
}

#[tokio::test]
async fn stale_output_is_not_mistaken_for_success() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    fs::write(dir.path().join("entschuldigung.pdf"), b"old run").unwrap();
    let converter = DocumentConverter::new(vec![Box::new(LyingStrategy)]);

    assert!(converter.convert(&source).await.is_err());
    assert!(!dir.path().join("entschuldigung.pdf").exists());
}

#[tokio::test]
async fn slow_strategy_times_out() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let converter =
        DocumentConverter::new(vec![Box::new(SlowStrategy), WritingStrategy::boxed("fast")])
            .with_timeout(Duration::from_millis(100));

    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(fs::read(&pdf).unwrap(), b"fast");
}

#[tokio::test]
async fn panicking_strategy_is_contained() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let converter =
        DocumentConverter::new(vec![Box::new(PanickingStrategy), WritingStrategy::boxed("after")]);

    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(fs::read(&pdf).unwrap(), b"after");
}

#[tokio::test]
async fn missing_source_is_reported() {
    let dir = tempdir().unwrap();
    let converter = DocumentConverter::new(vec![WritingStrategy::boxed("unused")]);
    let result = converter.convert(&dir.path().join("missing.docx")).await;
    assert!(matches!(result, Err(ConvertError::SourceNotFound(_))));
}

#[tokio::test]
async fn pdf_source_is_refused() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("already.pdf");
    fs::write(&source, b"%PDF").unwrap();
    let converter = DocumentConverter::new(vec![WritingStrategy::boxed("unused")]);

    let result = converter.convert(&source).await;
    assert!(matches!(result, Err(ConvertError::SourceIsTarget(_))));
    assert_eq!(fs::read(&source).unwrap(), b"%PDF");
}

#[test]
fn full_desktop_moves_office_suite_first() {
    let converter = DocumentConverter::with_profile(
        vec![
            WritingStrategy::boxed("light"),
            WritingStrategy::boxed_desktop("suite"),
            WritingStrategy::boxed("other"),
        ],
        HostProfile::FullDesktop,
    );
    assert_eq!(converter.strategy_names(), ["suite", "light", "other"]);
}

#[test]
fn managed_host_skips_office_suite() {
    let converter = DocumentConverter::with_profile(
        vec![
            WritingStrategy::boxed_desktop("suite"),
            WritingStrategy::boxed("light"),
            WritingStrategy::boxed("other"),
        ],
        HostProfile::ManagedHost,
    );
    assert_eq!(converter.strategy_names(), ["light", "other"]);
}

#[test]
fn builds_converter_from_config() {
    let managed = DocumentConverter::from_config(&ConverterConfig::default());
    assert_eq!(managed.strategy_names(), ["html_render", "pandoc"]);

    let desktop = DocumentConverter::from_config(&ConverterConfig {
        profile: HostProfile::FullDesktop,
        strategies: vec![
            StrategyKind::Pandoc,
            StrategyKind::Remote,
            StrategyKind::LibreOffice,
        ],
        timeout_secs: 600,
        remote_url: Some("http://127.0.0.1:9".to_owned()),
        ..ConverterConfig::default()
    });
    assert_eq!(
        desktop.strategy_names(),
        ["libre_office", "pandoc", "remote"]
    );
    assert_eq!(desktop.timeout(), MAX_ATTEMPT_TIMEOUT);
}

#[tokio::test]
async fn missing_tools_are_unavailable() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let target = dir.path().join("entschuldigung.pdf");

    let strategies: Vec<Box<dyn Strategy>> = vec![
        Box::new(LibreOfficeStrategy::new(MISSING_PROGRAM)),
        Box::new(PandocStrategy::new(MISSING_PROGRAM)),
        Box::new(HtmlRenderStrategy::new(MISSING_PROGRAM)),
    ];
    for strategy in strategies.iter() {
        assert_eq!(
            strategy.attempt(&source, &target).await,
            ConversionOutcome::Unavailable,
            "{}",
            strategy.name()
        );
    }
    assert!(!HtmlRenderStrategy::intermediate_path(&target).exists());
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let strategy = RemoteStrategy::new("http://127.0.0.1:9");
    let outcome = strategy
        .attempt(&source, &dir.path().join("entschuldigung.pdf"))
        .await;
    assert_eq!(outcome, ConversionOutcome::Unavailable);
}

#[cfg(unix)]
#[tokio::test]
async fn html_strategy_removes_intermediate_markup() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let renderer = fake_tool(&dir, "fake-renderer", "cp \"$1\" \"$2\"");

    let converter = DocumentConverter::new(vec![Box::new(HtmlRenderStrategy::new(
        renderer.to_string_lossy(),
    ))]);
    let pdf = converter.convert(&source).await.unwrap();

    let rendered = fs::read_to_string(&pdf).unwrap();
    assert!(rendered.contains("Entschuldigungsformular"));
    assert!(rendered.contains("<td>1./2.</td>"));
    assert!(!HtmlRenderStrategy::intermediate_path(&pdf).exists());
}

#[cfg(unix)]
#[tokio::test]
async fn libre_office_output_is_moved_to_the_target() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    // Same argument order as the suite: --headless --convert-to pdf --outdir DIR SRC
    let suite = fake_tool(
        &dir,
        "fake-soffice",
        "cp \"$6\" \"$5/$(basename \"$6\" .docx).pdf\"",
    );
    let target = dir.path().join("umbenannt.pdf");

    let outcome = LibreOfficeStrategy::new(suite.to_string_lossy())
        .attempt(&source, &target)
        .await;
    assert_eq!(outcome, ConversionOutcome::Success(target.clone()));
    assert_eq!(fs::read(&target).unwrap(), fs::read(&source).unwrap());
    assert!(!dir.path().join("entschuldigung.pdf").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn libre_office_output_already_at_the_target() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let suite = fake_tool(
        &dir,
        "fake-soffice",
        "cp \"$6\" \"$5/$(basename \"$6\" .docx).pdf\"",
    );

    let converter = DocumentConverter::new(vec![Box::new(LibreOfficeStrategy::new(
        suite.to_string_lossy(),
    ))]);
    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(pdf, dir.path().join("entschuldigung.pdf"));
    assert_eq!(fs::read(&pdf).unwrap(), fs::read(&source).unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn pandoc_writes_the_target() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let pandoc = fake_tool(&dir, "fake-pandoc", "printf '%%PDF-1.7 pandoc' > \"$3\"");
    let target = dir.path().join("entschuldigung.pdf");

    let outcome = PandocStrategy::new(pandoc.to_string_lossy())
        .attempt(&source, &target)
        .await;
    assert_eq!(outcome, ConversionOutcome::Success(target.clone()));
    assert_eq!(fs::read(&target).unwrap(), b"%PDF-1.7 pandoc");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_tool_reports_its_stderr() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let pandoc = fake_tool(&dir, "fake-pandoc", "echo 'no LaTeX engine' >&2\nexit 43");

    let outcome = PandocStrategy::new(pandoc.to_string_lossy())
        .attempt(&source, &dir.path().join("entschuldigung.pdf"))
        .await;
    match outcome {
        ConversionOutcome::Failed(reason) => assert!(reason.contains("no LaTeX engine"), "{reason}"),
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[tokio::test]
async fn service_answer_is_written_to_the_target() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let target = dir.path().join("entschuldigung.pdf");
    let (url, server) = serve_once("200 OK", b"%PDF-1.7 remote").await;

    let outcome = RemoteStrategy::new(url).attempt(&source, &target).await;
    assert_eq!(outcome, ConversionOutcome::Success(target.clone()));
    assert_eq!(fs::read(&target).unwrap(), b"%PDF-1.7 remote");
    assert!(!RemoteStrategy::part_path(&target).exists());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /forms/libreoffice/convert "), "{request}");
    assert!(request.contains("name=\"files\""));
    assert!(request.contains("filename=\"entschuldigung.docx\""));
}

#[tokio::test]
async fn service_error_fails_the_conversion() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let target = dir.path().join("entschuldigung.pdf");
    let (url, server) = serve_once("500 Internal Server Error", b"LibreOffice crashed").await;

    let outcome = RemoteStrategy::new(url.as_str())
        .attempt(&source, &target)
        .await;
    match outcome {
        ConversionOutcome::Failed(reason) => assert!(reason.contains("500"), "{reason}"),
        other => panic!("expected a failure, got {other:?}"),
    }
    server.await.unwrap();
    assert!(!target.exists());
    assert!(!RemoteStrategy::part_path(&target).exists());
}

#[tokio::test]
async fn service_error_leaves_no_output() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let target = dir.path().join("entschuldigung.pdf");
    let (url, server) = serve_once("500 Internal Server Error", b"LibreOffice crashed").await;

    let converter = DocumentConverter::new(vec![Box::new(RemoteStrategy::new(url))]);
    let result = converter.convert(&source).await;
    assert!(matches!(
        result,
        Err(ConvertError::AllStrategiesFailed { attempted: 1 })
    ));
    server.await.unwrap();
    assert!(!target.exists());
    assert!(!RemoteStrategy::part_path(&target).exists());
}

#[tokio::test]
async fn output_at_another_path_is_not_success() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);
    let converter = DocumentConverter::new(vec![
        Box::new(ElsewhereStrategy),
        WritingStrategy::boxed("second"),
    ]);

    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(pdf, dir.path().join("entschuldigung.pdf"));
    assert_eq!(fs::read(&pdf).unwrap(), b"second");

    let alone = DocumentConverter::new(vec![Box::new(ElsewhereStrategy)]);
    assert!(matches!(
        alone.convert(&source).await,
        Err(ConvertError::AllStrategiesFailed { attempted: 1 })
    ));
}

#[tokio::test]
async fn zero_timeout_is_raised_to_the_minimum() {
    let dir = tempdir().unwrap();
    let source = source_docx(&dir);

    let configured = DocumentConverter::from_config(&ConverterConfig {
        timeout_secs: 0,
        ..ConverterConfig::default()
    });
    assert_eq!(configured.timeout(), MIN_ATTEMPT_TIMEOUT);

    let converter = DocumentConverter::new(vec![WritingStrategy::boxed("quick")])
        .with_timeout(Duration::ZERO);
    assert_eq!(converter.timeout(), MIN_ATTEMPT_TIMEOUT);
    let pdf = converter.convert(&source).await.unwrap();
    assert_eq!(fs::read(&pdf).unwrap(), b"quick");
}

#[test]
fn cleanup_tolerates_missing_files() {
    let dir = tempdir().unwrap();
    let present = dir.path().join("present.docx");
    fs::write(&present, b"x").unwrap();

    cleanup(&[dir.path().join("never-existed.pdf"), present.clone()]);
    assert!(!present.exists());
}
