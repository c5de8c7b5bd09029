//! Fetch lifecycle
//!
//! [`traverse`] runs [`init_fetch`], threads the result through an inspection
//! pipe and closes it with [`finalize_fetch`]. The inspectors that make up the
//! default pipe live in [`inspectors`].

mod context;
pub mod inspectors;
mod model;

use chrono::Utc;
use traversal_core::inspect::Inspected;
use url::Url;

pub use context::{
    HtmlContentPipe, TraverseContext, TraverseOptions, UrlInspector, DEFAULT_MAX_REDIRECT_DEPTH,
    DEFAULT_TIMEOUT,
};
pub use inspectors::{
    CleanLabelInspector, HtmlContentInspector, HttpStatusInspector, MetaRefreshRedirectInspector,
    TextContentInspector,
};
pub use model::{
    InvalidHttpStatus, ResponseBody, SuccessfulTraversal, Traversal, TraversalContent,
    TraversalHtmlContent, TraversalJsonContent, TraversalRequest, TraversalRssContent,
    TraversalStage, TraversalTextContent,
};

use crate::error::TraversalError;
use crate::inspect::InspectionPipe;

pub type TraversalPipe = InspectionPipe<Traversal, TraverseContext>;

/// Sends the request described by `ctx`.
///
/// An empty or unparseable URL is an issue; a transport failure or an expired
/// deadline is an exception. Nothing is retried.
pub async fn init_fetch(ctx: &TraverseContext) -> Traversal {
    let pending = Traversal::pending(ctx.target());

    let request = ctx.request.trim();
    if request.is_empty() {
        return pending.into_issue("Request URL is empty");
    }
    if let Err(err) = Url::parse(request) {
        return pending.into_issue(format!("Invalid request URL {request}: {err}"));
    }

    let url = match &ctx.options.ri_inspector {
        Some(inspector) => inspector(ctx, request),
        None => request.to_string(),
    };

    let init_at = Utc::now();
    let fetch = ctx.options.transport.fetch(&url, &ctx.request_init);
    let response = match ctx.options.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, fetch).await {
            Ok(response) => response.map_err(TraversalError::from),
            Err(_) => Err(TraversalError::Timeout {
                url: url.clone(),
                timeout,
            }),
        },
        None => fetch.await.map_err(TraversalError::from),
    };

    match response {
        Ok(response) => {
            let terminal_url = match &ctx.options.turl_inspector {
                Some(inspector) => inspector(ctx, &response.url),
                None => response.url,
            };
            log::debug!("Fetched {url} ({}) -> {terminal_url}", response.status);
            pending.with_stage(TraversalStage::Successful(SuccessfulTraversal {
                init_at,
                terminal_url,
                status: response.status,
                headers: response.headers,
                body: ResponseBody::new(response.body),
            }))
        }
        Err(err) => {
            log::warn!("Unable to fetch {url}: {err}");
            pending.into_exception(err)
        }
    }
}

/// Releases unread response bodies and stamps `finalized_at`. Calling it on a
/// finalized traversal returns it unchanged.
pub fn finalize_fetch(mut traversal: Traversal) -> Traversal {
    if traversal.is_finalized() {
        return traversal;
    }
    let cancelled = traversal.cancel_unread_bodies();
    if cancelled > 0 {
        log::debug!(
            "Cancelled {cancelled} unread response bod{} for {}",
            if cancelled == 1 { "y" } else { "ies" },
            traversal.target.request
        );
    }
    traversal.finalized_at = Some(Utc::now());
    traversal
}

/// Fetches `ctx.request` and runs `pipe` over the result.
///
/// The pipe is skipped when the fetch itself did not get a response.
pub async fn traverse(ctx: &TraverseContext, pipe: &TraversalPipe) -> Traversal {
    let initial = init_fetch(ctx).await;
    let inspected = if initial.is_terminal() {
        initial
    } else {
        pipe.run(initial, Some(ctx)).await
    };
    finalize_fetch(inspected)
}

/// Label clean-up, status, text, HTML enrichment and meta refresh follow-up.
pub fn default_inspectors() -> TraversalPipe {
    TraversalPipe::new()
        .then(CleanLabelInspector)
        .then(HttpStatusInspector)
        .then(TextContentInspector)
        .then(HtmlContentInspector)
        .then(MetaRefreshRedirectInspector::default())
}

#[cfg(test)]
mod tests;
