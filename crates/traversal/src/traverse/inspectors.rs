//! Inspectors of the default traversal pipe
//!
//! Each one applies to a single stage and returns anything else unchanged, so
//! running one twice is the same as running it once.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use traversal_core::content::{content_disposition_params, is_html, is_text};
use traversal_core::html::{HtmlContent, HtmlSourceSupplier};
use traversal_core::inspect::{Inspected, Inspection};
use traversal_core::provenance::Provenance;
use traversal_core::redirect::{clean_label, extract_meta_refresh_url};
use url::Url;

use super::{
    traverse, InvalidHttpStatus, Traversal, TraversalContent, TraversalHtmlContent,
    TraversalPipe, TraversalRequest, TraversalStage, TraversalTextContent, TraverseContext,
};
use crate::inspect::Inspector;

/// Replaces line breaks in the label with spaces and trims it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanLabelInspector;

impl Inspector<Traversal, TraverseContext> for CleanLabelInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let Some(label) = traversal.target.label.as_deref() else {
                return traversal;
            };
            let cleaned = clean_label(label);
            if cleaned == label {
                return traversal;
            }

            let mut result = traversal.clone();
            result.target.label = Some(cleaned);
            result.provenance = Some(Provenance::derive(
                traversal,
                Some("Cleaned label".to_string()),
            ));
            result
        })
    }
}

/// Classifies a successful fetch by status: 200 is content, anything else is
/// an invalid status.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpStatusInspector;

impl HttpStatusInspector {
    fn classify(traversal: Traversal) -> Traversal {
        let TraversalStage::Successful(successful) = &traversal.stage else {
            return traversal;
        };
        let successful = successful.clone();

        if successful.status != 200 {
            log::debug!(
                "{} answered with HTTP {}",
                successful.terminal_url,
                successful.status
            );
            return traversal
                .with_stage(TraversalStage::InvalidHttpStatus(InvalidHttpStatus::new(successful)));
        }

        let content_type = successful
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        let content_disposition = successful
            .headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(content_disposition_params);

        traversal.with_stage(TraversalStage::Content(TraversalContent {
            traversal: successful,
            http_status: 200,
            content_type,
            content_disposition,
        }))
    }
}

impl Inspector<Traversal, TraverseContext> for HttpStatusInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(futures::future::ready(Self::classify(traversal)))
    }
}

/// Reads `text/*` content into memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextContentInspector;

impl Inspector<Traversal, TraverseContext> for TextContentInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let content = match &traversal.stage {
                TraversalStage::Content(content) if is_text(&content.content_type) => {
                    content.clone()
                }
                _ => return traversal,
            };

            match content.traversal.body.take_bytes().await {
                Ok(bytes) => {
                    let body_text = String::from_utf8_lossy(&bytes).into_owned();
                    traversal.with_stage(TraversalStage::Text(TraversalTextContent {
                        content,
                        body_text,
                    }))
                }
                Err(err) => traversal.into_exception(err),
            }
        })
    }
}

/// Runs the configured HTML enrichment pipe over `text/html` content.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlContentInspector;

impl Inspector<Traversal, TraverseContext> for HtmlContentInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let Some(pipe) = ctx.and_then(|ctx| ctx.options.html_content.as_ref()) else {
                return traversal;
            };
            let text = match &traversal.stage {
                TraversalStage::Text(text) if is_html(&text.content.content_type) => text.clone(),
                _ => return traversal,
            };

            let source = HtmlSourceSupplier {
                uri: text.content.traversal.terminal_url.clone(),
                html_source: text.body_text.clone(),
            };
            let enriched = pipe
                .run(Inspection::Target(HtmlContent::Source(source)), None)
                .await;

            if let Some(diagnostics) = enriched.diagnostics() {
                return traversal.into_issue(diagnostics.clone());
            }
            if let Some(exception) = enriched.exception() {
                return traversal.into_issue(format!("HTML content inspection failed: {exception}"));
            }
            let html_content = enriched.into_value();
            if !html_content.is_html_content() {
                return traversal.into_issue("Unable to produce HTML content");
            }

            traversal.with_stage(TraversalStage::Html(TraversalHtmlContent {
                text,
                html_content,
            }))
        })
    }
}

/// Follows `<meta http-equiv="refresh" content="0;url=...">` in HTML.
///
/// The redirect target is traversed with `follow` (by default status, text,
/// HTML enrichment and meta refresh again). Targets already visited by this
/// chain of contexts, and chains deeper than the context's
/// `max_redirect_depth`, become issues.
#[derive(Debug, Clone, Default)]
pub struct MetaRefreshRedirectInspector {
    follow: Option<Arc<TraversalPipe>>,
}

impl MetaRefreshRedirectInspector {
    pub fn with_follow_pipe(pipe: TraversalPipe) -> Self {
        Self {
            follow: Some(Arc::new(pipe)),
        }
    }

    fn follow_pipe(&self) -> Arc<TraversalPipe> {
        match &self.follow {
            Some(pipe) => Arc::clone(pipe),
            None => Arc::new(
                TraversalPipe::new()
                    .then(HttpStatusInspector)
                    .then(TextContentInspector)
                    .then(HtmlContentInspector)
                    .then(MetaRefreshRedirectInspector::default()),
            ),
        }
    }
}

/// Resolved meta refresh target of HTML text content, or the reason it can't
/// be resolved.
fn meta_refresh_target(traversal: &Traversal) -> Option<Result<String, String>> {
    let text = traversal.text_content()?;
    if !is_html(&text.content.content_type) {
        return None;
    }
    let target = extract_meta_refresh_url(&text.body_text)?;
    let base = &text.content.traversal.terminal_url;
    let resolved = Url::parse(base)
        .and_then(|base| base.join(&target))
        .map(|url| url.to_string())
        .map_err(|err| format!("Invalid meta refresh URL {target}: {err}"));
    Some(resolved)
}

impl Inspector<Traversal, TraverseContext> for MetaRefreshRedirectInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let Some(ctx) = ctx else {
                return traversal;
            };
            if traversal.is_traversal_redirect() {
                return traversal;
            }
            let redirect_url = match meta_refresh_target(&traversal) {
                None => return traversal,
                Some(Err(diagnostic)) => return traversal.into_issue(diagnostic),
                Some(Ok(url)) => url,
            };

            let visited = traversal.terminal_url() == Some(redirect_url.as_str())
                || ctx.request == redirect_url
                || ctx.ancestors().any(|ancestor| ancestor.request == redirect_url);
            if visited {
                return traversal.into_issue(format!("Meta refresh loop detected at {redirect_url}"));
            }
            if ctx.depth() >= ctx.options.max_redirect_depth {
                return traversal.into_issue(format!(
                    "Meta refresh depth limit of {} reached before {redirect_url}",
                    ctx.options.max_redirect_depth
                ));
            }

            log::info!("Following meta refresh from {} to {redirect_url}", ctx.request);
            let pipe = self.follow_pipe();
            let redirected = traverse(&ctx.child(redirect_url.clone()), &pipe).await;
            let label = traversal.target.label.clone();

            Traversal {
                target: TraversalRequest {
                    label,
                    ..redirected.target
                },
                content_redirect_url: Some(redirect_url.clone()),
                provenance: Some(Provenance::derive(
                    traversal,
                    Some(format!("Meta refresh redirect to {redirect_url}")),
                )),
                finalized_at: None,
                ..redirected
            }
        })
    }
}
