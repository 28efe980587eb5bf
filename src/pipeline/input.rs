//! Input resolution: turn a user-supplied path, URL or `-` into source text.
//!
//! The engine itself only ever sees a `&str`. This module is how the CLI
//! gets one: local files are read directly, `-` drains stdin, and
//! `http(s)://` inputs are downloaded with a timeout.

use crate::error::RenderError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Source text plus a human-readable label for logs and output naming.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// The original input string (`-` for stdin).
    pub label: String,
    pub content: String,
}

impl ResolvedSource {
    /// File stem used to name the PDF when writing into a directory.
    pub fn output_stem(&self) -> String {
        if self.label == "-" {
            return "stdin".to_string();
        }
        let last = if is_url(&self.label) {
            self.label
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or("download")
                .to_string()
        } else {
            Path::new(&self.label)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string())
        };
        let stem = Path::new(&last)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem.is_empty() {
            "document".to_string()
        } else {
            stem
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to source text.
pub async fn resolve_source(
    input: &str,
    download_timeout_secs: u64,
) -> Result<ResolvedSource, RenderError> {
    let content = if input == "-" {
        read_stdin().await?
    } else if is_url(input) {
        download_url(input, download_timeout_secs).await?
    } else {
        read_local(input).await?
    };
    Ok(ResolvedSource {
        label: input.to_string(),
        content,
    })
}

async fn read_stdin() -> Result<String, RenderError> {
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .map_err(|e| RenderError::InvalidInput {
            input: "-".to_string(),
            reason: format!("cannot read stdin as UTF-8: {e}"),
        })?;
    debug!("Read {} bytes from stdin", buf.len());
    Ok(buf)
}

async fn read_local(path_str: &str) -> Result<String, RenderError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            debug!("Read local source: {}", path.display());
            Ok(text)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RenderError::FileNotFound { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(RenderError::PermissionDenied { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(RenderError::InvalidInput {
            input: path_str.to_string(),
            reason: "file is not valid UTF-8".to_string(),
        }),
        Err(e) => Err(RenderError::InvalidInput {
            input: path_str.to_string(),
            reason: e.to_string(),
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<String, RenderError> {
    info!("Downloading source from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RenderError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            RenderError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            RenderError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(RenderError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let text = response.text().await.map_err(|e| RenderError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    info!("Downloaded {} bytes", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/report.html"));
        assert!(is_url("http://example.com/report.tex"));
        assert!(!is_url("/tmp/report.tex"));
        assert!(!is_url("report.tex"));
        assert!(!is_url(""));
    }

    #[test]
    fn output_stem_variants() {
        let src = |label: &str| ResolvedSource {
            label: label.to_string(),
            content: String::new(),
        };
        assert_eq!(src("-").output_stem(), "stdin");
        assert_eq!(src("docs/invoice.html").output_stem(), "invoice");
        assert_eq!(src("https://example.com/a/letter.tex").output_stem(), "letter");
        assert_eq!(src("https://example.com/").output_stem(), "example");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_source("/no/such/source.tex", 5).await.unwrap_err();
        assert!(matches!(err, RenderError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.html");
        std::fs::write(&path, "<p>hello</p>").unwrap();
        let resolved = resolve_source(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.content, "<p>hello</p>");
        assert_eq!(resolved.output_stem(), "doc");
    }
}
