//! Download content to disk
//!
//! The file name comes from the `filename` parameter of Content-Disposition
//! when present, otherwise from the md5 of the terminal URL.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::inspect::Inspector;
use crate::traverse::{Traversal, TraverseContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DownloadOutcome {
    Downloaded {
        dest_path: PathBuf,
        size_expected: Option<u64>,
        wrote_bytes: u64,
    },
    Failed {
        size_expected: Option<u64>,
        error: String,
    },
    Skipped {
        reason: String,
    },
}

/// `<temp dir>/traversal-downloads`
pub fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("traversal-downloads")
}

/// File name for content: the Content-Disposition `filename` without any
/// directory part, or the md5 of the terminal URL.
pub fn download_file_name(traversal: &Traversal) -> Option<String> {
    let content = traversal.content()?;
    let from_disposition = content
        .content_disposition
        .as_ref()
        .and_then(|params| params.get("filename"))
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    Some(from_disposition.unwrap_or_else(|| {
        format!("{:x}", md5::compute(content.traversal.terminal_url.as_bytes()))
    }))
}

/// Writes the content of a traversal into `dest_dir`.
#[derive(Debug, Clone)]
pub struct DownloadInspector {
    pub dest_dir: PathBuf,
}

impl Default for DownloadInspector {
    fn default() -> Self {
        Self::new(default_download_dir())
    }
}

impl DownloadInspector {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
        }
    }

    async fn write(&self, traversal: &Traversal, file_name: &str) -> Result<(PathBuf, u64)> {
        tokio::fs::create_dir_all(&self.dest_dir).await?;
        let dest_path = self.dest_dir.join(file_name);
        let mut file = tokio::fs::File::create(&dest_path).await?;

        let wrote_bytes = match (traversal.text_content(), traversal.content()) {
            (Some(text), _) => text.write_content(&mut file).await?,
            (None, Some(content)) => content.write_content(&mut file).await?,
            (None, None) => 0,
        };
        file.flush().await?;
        Ok((dest_path, wrote_bytes))
    }

    async fn download(&self, traversal: &Traversal) -> Option<DownloadOutcome> {
        let content = traversal.content()?;
        let size_expected = content.content_length();
        if traversal.is_structured_content() {
            return Some(DownloadOutcome::Skipped {
                reason: "Body was already decoded as structured content".to_string(),
            });
        }

        let file_name = download_file_name(traversal)?;
        let outcome = match self.write(traversal, &file_name).await {
            Ok((dest_path, wrote_bytes)) => {
                log::info!("Downloaded {wrote_bytes} bytes to {}", dest_path.display());
                DownloadOutcome::Downloaded {
                    dest_path,
                    size_expected,
                    wrote_bytes,
                }
            }
            Err(err) => {
                log::warn!("Download of {} failed: {err}", traversal.target.request);
                DownloadOutcome::Failed {
                    size_expected,
                    error: err.to_string(),
                }
            }
        };
        Some(outcome)
    }
}

impl Inspector<Traversal, TraverseContext> for DownloadInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            if traversal.download().is_some() {
                return traversal;
            }
            match self.download(&traversal).await {
                Some(outcome) => Traversal {
                    download: Some(outcome),
                    ..traversal
                },
                None => traversal,
            }
        })
    }
}
