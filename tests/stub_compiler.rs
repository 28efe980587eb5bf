//! Integration tests driving the real process runner against stub compilers.
//!
//! Each stub is a small POSIX shell script that honours the compiler
//! contract: flags, then the staged path as the last argument, source on
//! stdin, artifacts written next to the staged file.
#![cfg(unix)]

use edgequake_texpdf::pipeline::stage::fingerprint;
use edgequake_texpdf::{
    render, render_batch, render_to_file, EngineConfig, ErrorKind, RenderError, TexToPdfEngine,
};
use once_cell::sync::Lazy;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Stub compilers ───────────────────────────────────────────────────────────

const PRELUDE: &str = "#!/bin/sh\nfor last; do :; done\n";

const STUBS: &[(&str, &str, bool)] = &[
    (
        "ok",
        "cat > /dev/null\n\
         printf '%s' '%PDF-1.4 stub' > \"$last.pdf\"\n\
         echo '\\relax' > \"$last.aux\"\n\
         echo 'transcript' > \"$last.log\"\n\
         echo \"Output written on $last.pdf (1 page).\"\n",
        true,
    ),
    (
        "echo_stdin",
        "cat > \"$last.pdf\"\necho done\n",
        true,
    ),
    (
        "record_path",
        "cat > /dev/null\n\
         dir=$(dirname \"$last\")\n\
         echo \"$last\" >> \"$dir/../calls.log\"\n\
         printf x > \"$last.pdf\"\n\
         echo done\n",
        true,
    ),
    (
        "stderr_error",
        "echo 'error occurred' >&2\necho 'transcript'\nexit 0\n",
        true,
    ),
    ("silent", "exit 0\n", true),
    (
        "exit1_quiet",
        "cat > /dev/null\nprintf '%s' 'B' > \"$last.pdf\"\necho 'warnings only'\nexit 1\n",
        true,
    ),
    (
        "exit1_no_pdf",
        "echo 'warnings only'\nexit 1\n",
        true,
    ),
    (
        "exit2_stderr",
        "echo transcript\necho 'kpathsea: mktexpk failed' >&2\nexit 2\n",
        true,
    ),
    (
        "tex_error",
        "echo '! Undefined control sequence.'\necho 'l.7 \\foo'\n\
         echo 'Fatal Error occurred' >&2\n\
         echo x > \"$last.aux\"\necho x > \"$last.log\"\nexit 1\n",
        true,
    ),
    (
        "warns",
        "cat > /dev/null\n\
         echo \"LaTeX Warning: Citation 'knuth' on page 1 undefined on input line 3.\"\n\
         printf x > \"$last.pdf\"\n",
        true,
    ),
    ("slow", "sleep 5\necho late\n", true),
    (
        "pdf_then_pause",
        "cat > /dev/null\nprintf x > \"$last.pdf\"\nsleep 0.3\necho ok\n",
        true,
    ),
    (
        "not_executable",
        "touch \"$(dirname \"$last\")/../spawned\"\necho x\n",
        false,
    ),
];

/// All stubs are written before any test spawns a process, so no child can
/// inherit an open write handle to a script (which would make exec fail
/// with ETXTBSY).
static STUB_DIR: Lazy<TempDir> = Lazy::new(|| {
    let dir = TempDir::new().unwrap();
    for (name, body, executable) in STUBS {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("{PRELUDE}{body}")).unwrap();
        let mode = if *executable { 0o755 } else { 0o644 };
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
    }
    dir
});

fn stub(name: &str) -> PathBuf {
    STUB_DIR.path().join(name)
}

/// A work dir plus a config pointing at `<work>/pdf` and the named stub.
fn setup(name: &str) -> (TempDir, EngineConfig) {
    let binary = stub(name);
    let work = TempDir::new().unwrap();
    let config = EngineConfig::builder()
        .binary(binary)
        .output_directory(work.path().join("pdf"))
        .timeout_secs(10)
        .build()
        .unwrap();
    (work, config)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// ── Success path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn returns_exact_pdf_bytes_and_removes_artifacts() {
    let (work, config) = setup("ok");
    let source = r"\documentclass{article}\begin{document}Hi\end{document}";

    let output = render(source, &config).await.unwrap();
    assert_eq!(output.pdf, b"%PDF-1.4 stub");
    assert_eq!(output.stats.exit_code, 0);

    let staged = work.path().join("pdf").join(fingerprint(source));
    for ext in ["aux", "log", "pdf"] {
        let artifact = PathBuf::from(format!("{}.{ext}", staged.display()));
        assert!(!artifact.exists(), "{} left behind", artifact.display());
    }
    assert!(!staged.exists());
    assert!(files_in(&work.path().join("pdf")).is_empty());
}

#[tokio::test]
async fn source_is_piped_to_stdin() {
    let (_work, config) = setup("echo_stdin");
    let source = "héllo wörld\n".repeat(10_000);
    let output = render(&source, &config).await.unwrap();
    assert_eq!(output.pdf, source.as_bytes());
}

#[tokio::test]
async fn staged_path_is_deterministic() {
    let (work, config) = setup("record_path");
    let engine = TexToPdfEngine::new(config);
    engine.output("same content").await.unwrap();
    engine.output("same content").await.unwrap();
    engine.output("other content").await.unwrap();

    let log = std::fs::read_to_string(work.path().join("calls.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    let expected = work.path().join("pdf").join(fingerprint("same content"));
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], expected.to_str().unwrap());
    assert_eq!(lines[0], lines[1]);
    assert_ne!(lines[0], lines[2]);
}

#[tokio::test]
async fn output_directory_is_created_on_demand() {
    let work = TempDir::new().unwrap();
    let nested = work.path().join("a/b/c");
    let config = EngineConfig::builder()
        .binary(stub("ok"))
        .output_directory(&nested)
        .build()
        .unwrap();
    render("x", &config).await.unwrap();
    assert!(nested.is_dir());
}

// ── Classifier outcomes ──────────────────────────────────────────────────────

#[tokio::test]
async fn stderr_error_with_exit_zero_is_compiler_reported() {
    let (_work, config) = setup("stderr_error");
    let err = render("x", &config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompilerReported);
    assert!(err.to_string().contains("error occurred"));
}

#[tokio::test]
async fn silent_compiler_is_no_output() {
    let (_work, config) = setup("silent");
    let err = render("x", &config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOutput);
}

#[tokio::test]
async fn exit_one_with_quiet_stderr_still_reads_pdf() {
    let (_work, config) = setup("exit1_quiet");
    let output = render("x", &config).await.unwrap();
    assert_eq!(output.pdf, b"B");
    assert_eq!(output.stats.exit_code, 1);
}

#[tokio::test]
async fn exit_one_without_pdf_is_read_failure() {
    let (work, config) = setup("exit1_no_pdf");
    let err = render("x", &config).await.unwrap_err();
    assert!(matches!(err, RenderError::PdfReadFailed { .. }), "{err:?}");
    assert!(files_in(&work.path().join("pdf")).is_empty());
}

#[tokio::test]
async fn non_zero_exit_with_stderr_fails() {
    let (_work, config) = setup("exit2_stderr");
    match render("x", &config).await {
        Err(RenderError::NonZeroExit { exit_code, stderr }) => {
            assert_eq!(exit_code, 2);
            assert!(stderr.contains("mktexpk"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn failed_render_cleans_up_by_default() {
    let (work, config) = setup("tex_error");
    render("x", &config).await.unwrap_err();
    assert!(files_in(&work.path().join("pdf")).is_empty());
}

#[tokio::test]
async fn failed_render_can_keep_artifacts() {
    let (work, config) = setup("tex_error");
    let mut config = config;
    config.keep_failed_artifacts = true;
    render("x", &config).await.unwrap_err();

    let fp = fingerprint("x");
    assert_eq!(
        files_in(&work.path().join("pdf")),
        vec![fp.clone(), format!("{fp}.aux"), format!("{fp}.log")]
    );
}

// ── Preconditions and deadline ───────────────────────────────────────────────

#[tokio::test]
async fn non_executable_binary_fails_before_spawn() {
    let (work, config) = setup("not_executable");
    let err = render("x", &config).await.unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("not_executable"));
    assert!(!work.path().join("spawned").exists());
    assert!(!work.path().join("pdf").exists());
}

#[tokio::test]
async fn missing_binary_fails_before_spawn() {
    let work = TempDir::new().unwrap();
    let config = EngineConfig::builder()
        .binary(work.path().join("nope"))
        .output_directory(work.path().join("pdf"))
        .build()
        .unwrap();
    let err = render("x", &config).await.unwrap_err();
    assert!(matches!(err, RenderError::BinaryNotExecutable { .. }));
}

#[tokio::test]
async fn slow_compiler_times_out() {
    let (work, config) = setup("slow");
    let config = config.into_builder().timeout_secs(1).build().unwrap();

    let started = std::time::Instant::now();
    let err = render("x", &config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
    assert!(files_in(&work.path().join("pdf")).is_empty());
}

// ── Concurrency and entry points ─────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_renders_all_succeed() {
    let (work, config) = setup("ok");
    let engine = Arc::new(TexToPdfEngine::new(config));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.output("identical").await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), b"%PDF-1.4 stub");
    }
    assert!(files_in(&work.path().join("pdf")).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_one_off_renders_of_same_source_both_succeed() {
    let (_work, config) = setup("pdf_then_pause");
    for _ in 0..3 {
        let first = render("same", &config);
        let second = async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            render("same", &config).await
        };
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap().pdf, b"x");
        assert_eq!(b.unwrap().pdf, b"x");
    }
}

#[tokio::test]
async fn batch_results_follow_input_order() {
    let (_work, config) = setup("echo_stdin");
    let sources = ["first", "second", "third", "fourth"];
    let results = render_batch(&sources, &config, 2).await;
    let pdfs: Vec<Vec<u8>> = results.into_iter().map(Result::unwrap).map(|o| o.pdf).collect();
    assert_eq!(
        pdfs,
        sources.iter().map(|s| s.as_bytes().to_vec()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn render_to_file_writes_pdf() {
    let (work, config) = setup("ok");
    let target = work.path().join("out/letter.pdf");
    let stats = render_to_file("letter", &target, &config).await.unwrap();
    assert_eq!(stats.pdf_bytes, 13);
    assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.4 stub");
}

#[tokio::test]
async fn tex_warnings_are_reported() {
    let (_work, config) = setup("warns");
    let output = render("x", &config).await.unwrap();
    assert_eq!(output.warning_count(), 1);
    assert_eq!(output.diagnostics[0].line, Some(3));
}
