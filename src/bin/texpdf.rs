//! CLI binary for edgequake-texpdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `EngineConfig`, resolves inputs, and writes PDFs or JSON reports.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_texpdf::pipeline::input::{resolve_source, ResolvedSource};
use edgequake_texpdf::pipeline::stage::fingerprint;
use edgequake_texpdf::render::write_pdf;
use edgequake_texpdf::{
    render_batch_with, EngineConfig, ProgressCallback, RenderError, RenderOutput,
    RenderProgressCallback, RenderStage, TexToPdfEngine, TextEncoding,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner for a single render, bar for a batch. Renders are identified by
/// fingerprint, so the callback keeps a map back to the input labels.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Labels per fingerprint in input order. Identical inputs render one at
    /// a time, so the front label is the one in flight.
    labels: Mutex<HashMap<String, VecDeque<String>>>,
}

impl CliProgressCallback {
    fn new(sources: &[ResolvedSource]) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self::with_bar(sources, bar))
    }

    fn with_bar(sources: &[ResolvedSource], bar: ProgressBar) -> Self {
        let mut labels: HashMap<String, VecDeque<String>> = HashMap::new();
        for source in sources {
            labels
                .entry(fingerprint(&source.content))
                .or_default()
                .push_back(source.label.clone());
        }
        Self {
            bar,
            labels: Mutex::new(labels),
        }
    }

    fn labels(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.labels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self, fp: &str) -> String {
        self.labels()
            .get(fp)
            .and_then(|queue| queue.front().cloned())
            .unwrap_or_else(|| fp.to_string())
    }

    /// Label of the render that just finished; the next identical input
    /// moves to the front.
    fn take_label(&self, fp: &str) -> String {
        self.labels()
            .get_mut(fp)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| fp.to_string())
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        if total > 1 {
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len}  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
            self.bar.set_length(total as u64);
            self.bar.set_style(style);
        }
        self.bar.set_prefix("Rendering");
    }

    fn on_stage(&self, fingerprint: &str, stage: RenderStage) {
        self.bar
            .set_message(format!("{}: {}", self.label(fingerprint), stage));
    }

    fn on_render_complete(&self, fingerprint: &str, pdf_bytes: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            self.take_label(fingerprint),
            dim(&format!("{pdf_bytes} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_render_error(&self, fingerprint: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            self.take_label(fingerprint),
            red(first_line),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if total > 1 {
            let failed = total.saturating_sub(success_count);
            let mark = if failed == 0 { green("✔") } else { red("✘") };
            eprintln!(
                "{} {}/{} rendered{}",
                mark,
                bold(&success_count.to_string()),
                total,
                if failed > 0 {
                    format!("  ({} failed)", red(&failed.to_string()))
                } else {
                    String::new()
                }
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render to stdout
  texpdf letter.tex > letter.pdf

  # Render to a file with a specific compiler
  texpdf --binary /usr/bin/pdflatex -O interaction=nonstopmode letter.tex -o letter.pdf

  # Source from stdin
  cat report.tex | texpdf - -o report.pdf

  # Several sources into one directory, four at a time
  texpdf chapters/*.tex -o build/ --concurrency 4

  # Show the command that would run
  texpdf --print-command -O halt-on-error

  # Load flags from a JSON config file
  texpdf --config texpdf.json invoice.tex -o invoice.pdf

CONFIG FILE (JSON):
  {
    "binary": "/usr/bin/pdflatex",
    "options": { "interaction": "nonstopmode", "halt-on-error": true },
    "encoding": "UTF-8",
    "timeout_secs": 60,
    "keep_failed_artifacts": false
  }
  Command-line flags override the file.

ENVIRONMENT VARIABLES:
  TEXPDF_BINARY            Compiler binary (default /usr/bin/latexpdf)
  TEXPDF_OUTPUT_DIRECTORY  Staging directory (default <tmp>/pdf)
  TEXPDF_CONFIG            JSON config file
  TEXPDF_TIMEOUT           Compiler deadline in seconds (default 120)
  RUST_LOG                 Log filter, e.g. edgequake_texpdf=debug
"#;

/// Render TeX sources to PDF through an external compiler.
#[derive(Parser, Debug)]
#[command(
    name = "texpdf",
    version,
    about = "Render TeX sources to PDF through an external compiler",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source files, HTTP/HTTPS URLs, or `-` for stdin.
    inputs: Vec<String>,

    /// Output PDF file, or directory when rendering several inputs.
    #[arg(short, long, env = "TEXPDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Compiler binary.
    #[arg(long, env = "TEXPDF_BINARY")]
    binary: Option<PathBuf>,

    /// Staging directory, also passed to the compiler.
    #[arg(long, env = "TEXPDF_OUTPUT_DIRECTORY")]
    output_directory: Option<PathBuf>,

    /// Extra compiler flag: `KEY=VALUE` for `--KEY VALUE`, `KEY` for `--KEY`.
    #[arg(short = 'O', long = "option", value_name = "KEY[=VALUE]")]
    options: Vec<String>,

    /// JSON config file applied before the other flags.
    #[arg(long, env = "TEXPDF_CONFIG")]
    config: Option<PathBuf>,

    /// Encoding of the compiler's stdout: UTF-8 or ISO-8859-1.
    #[arg(long, env = "TEXPDF_ENCODING")]
    encoding: Option<String>,

    /// Compiler deadline in seconds.
    #[arg(long, env = "TEXPDF_TIMEOUT", conflicts_with = "no_timeout")]
    timeout: Option<u64>,

    /// Let the compiler run for as long as it takes.
    #[arg(long, env = "TEXPDF_NO_TIMEOUT")]
    no_timeout: bool,

    /// Renders in flight at once when several inputs are given.
    #[arg(short, long, env = "TEXPDF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Keep staged source and artifacts when the compiler fails.
    #[arg(long, env = "TEXPDF_KEEP_FAILED_ARTIFACTS")]
    keep_failed_artifacts: bool,

    /// Print the compiler command line and exit without running it.
    #[arg(long)]
    print_command: bool,

    /// Print a JSON render report to stdout instead of PDF bytes.
    #[arg(long, env = "TEXPDF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "TEXPDF_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "TEXPDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEXPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEXPDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless -v asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.print_command;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let engine = TexToPdfEngine::new(config);

    if cli.print_command {
        println!("{}", engine.command().command_line());
        return Ok(());
    }

    if cli.inputs.is_empty() {
        bail!("No input given. Pass a file, a URL, or '-' for stdin.");
    }
    if cli.inputs.len() > 1 && cli.output.is_none() {
        bail!("Several inputs need -o <DIR> to say where the PDFs go.");
    }
    if cli.inputs.iter().filter(|i| i.as_str() == "-").count() > 1 {
        bail!("stdin ('-') can only be given once.");
    }

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut sources = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let source = resolve_source(input, cli.download_timeout)
            .await
            .with_context(|| format!("Failed to read input '{input}'"))?;
        sources.push(source);
    }

    let engine = if show_progress {
        let cb = CliProgressCallback::new(&sources);
        engine.with_progress(cb as ProgressCallback)
    } else {
        engine
    };

    // ── Render ───────────────────────────────────────────────────────────
    let texts: Vec<&str> = sources.iter().map(|s| s.content.as_str()).collect();
    let results = render_batch_with(&engine, &texts, cli.concurrency).await;

    if sources.len() == 1 {
        let source = &sources[0];
        let result = results
            .into_iter()
            .next()
            .context("Renderer returned no result")?;
        let output = result.with_context(|| format!("Render of '{}' failed", source.label))?;
        emit_single(&cli, source, &output).await?;
        return Ok(());
    }

    emit_batch(&cli, &sources, results).await
}

/// Write one render to `-o`, or to stdout when no path was given.
async fn emit_single(cli: &Cli, source: &ResolvedSource, output: &RenderOutput) -> Result<()> {
    if let Some(path) = &cli.output {
        let target = if path.is_dir() {
            output_path(path, source)
        } else {
            path.clone()
        };
        write_pdf(&target, output.pdf.clone())
            .await
            .context("Failed to write PDF")?;
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {} bytes  {}ms  →  {}",
                green("✔"),
                output.stats.pdf_bytes,
                output.stats.total_duration_ms,
                bold(&target.display().to_string()),
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise report")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&output.pdf)
            .context("Failed to write to stdout")?;
        handle.flush().context("Failed to flush stdout")?;
    }
    Ok(())
}

/// Write every successful render into the `-o` directory as `<stem>.pdf`.
async fn emit_batch(
    cli: &Cli,
    sources: &[ResolvedSource],
    results: Vec<Result<RenderOutput, RenderError>>,
) -> Result<()> {
    let dir = cli
        .output
        .as_deref()
        .context("Several inputs need -o <DIR>")?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let targets = output_paths(dir, sources);
    let mut reports = Vec::with_capacity(results.len());
    let mut failed = 0usize;
    for ((source, target), result) in sources.iter().zip(targets).zip(results) {
        match result {
            Ok(output) => {
                write_pdf(&target, output.pdf.clone())
                    .await
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                reports.push(serde_json::json!({
                    "input": source.label,
                    "output": target,
                    "report": output,
                }));
            }
            Err(e) => {
                failed += 1;
                if !cli.json && (cli.quiet || cli.no_progress) {
                    eprintln!("{} {}: {}", red("✗"), source.label, e);
                }
                reports.push(serde_json::json!({
                    "input": source.label,
                    "error": e.to_string(),
                    "kind": e.kind(),
                }));
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise report")?;
        println!("{json}");
    }
    if failed > 0 {
        bail!("{failed} of {} renders failed", sources.len());
    }
    Ok(())
}

/// `<dir>/<stem>.pdf`. Stdin and URL inputs fall back to generic stems.
fn output_path(dir: &Path, source: &ResolvedSource) -> PathBuf {
    dir.join(format!("{}.pdf", source.output_stem()))
}

/// One target per input. A repeated stem gets `-2`, `-3`, ... so no two
/// inputs write the same file.
fn output_paths(dir: &Path, sources: &[ResolvedSource]) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    sources
        .iter()
        .map(|source| {
            let stem = source.output_stem();
            let mut name = format!("{stem}.pdf");
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{stem}-{n}.pdf");
                n += 1;
            }
            dir.join(name)
        })
        .collect()
}

/// Map CLI args to `EngineConfig`: config file first, then flags.
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let base = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut builder = base.into_builder();
    if let Some(binary) = &cli.binary {
        builder = builder.binary(binary);
    }
    if let Some(dir) = &cli.output_directory {
        builder = builder.output_directory(dir);
    }
    for raw in &cli.options {
        builder = match raw.split_once('=') {
            Some((key, value)) => builder.option(key.trim(), value),
            None => builder.switch(raw.trim()),
        };
    }
    if let Some(encoding) = &cli.encoding {
        let encoding: TextEncoding = encoding.parse().context("Invalid --encoding")?;
        builder = builder.encoding(encoding);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout_secs(secs);
    }
    if cli.no_timeout {
        builder = builder.no_timeout();
    }
    if cli.keep_failed_artifacts {
        builder = builder.keep_failed_artifacts(true);
    }

    builder.build().context("Invalid configuration")
}
