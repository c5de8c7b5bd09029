use std::sync::Arc;
use std::time::Duration;

use traversal_core::html::HtmlContent;
use traversal_core::inspect::Inspection;
use traversal_core::redirect::remove_url_tracking_codes;

use super::model::TraversalRequest;
use crate::html::default_html_content_pipe;
use crate::inspect::InspectionPipe;
use crate::transport::{ReqwestTransport, RequestInit, Transport};

/// Rewrites a URL before it is sent (request) or after it was resolved
/// (terminal URL).
pub type UrlInspector = Arc<dyn Fn(&TraverseContext, &str) -> String + Send + Sync>;

pub type HtmlContentPipe = InspectionPipe<Inspection<HtmlContent>>;

pub const DEFAULT_MAX_REDIRECT_DEPTH: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn strip_tracking_codes(_ctx: &TraverseContext, url: &str) -> String {
    remove_url_tracking_codes(url)
}

#[derive(Clone)]
pub struct TraverseOptions {
    pub transport: Arc<dyn Transport>,
    /// Applied to the request URL before it is sent.
    pub ri_inspector: Option<UrlInspector>,
    /// Applied to the URL the transport ended up at.
    pub turl_inspector: Option<UrlInspector>,
    /// Enrichment for `text/html` content. `None` leaves HTML as text.
    pub html_content: Option<Arc<HtmlContentPipe>>,
    pub max_redirect_depth: usize,
    /// Deadline for the fetch step.
    pub timeout: Option<Duration>,
}

impl Default for TraverseOptions {
    fn default() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::default()),
            ri_inspector: Some(Arc::new(strip_tracking_codes)),
            turl_inspector: Some(Arc::new(strip_tracking_codes)),
            html_content: Some(Arc::new(default_html_content_pipe())),
            max_redirect_depth: DEFAULT_MAX_REDIRECT_DEPTH,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl TraverseOptions {
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_ri_inspector(mut self, inspector: Option<UrlInspector>) -> Self {
        self.ri_inspector = inspector;
        self
    }

    pub fn with_turl_inspector(mut self, inspector: Option<UrlInspector>) -> Self {
        self.turl_inspector = inspector;
        self
    }

    pub fn with_html_content(mut self, pipe: Option<HtmlContentPipe>) -> Self {
        self.html_content = pipe.map(Arc::new);
        self
    }

    pub fn with_max_redirect_depth(mut self, depth: usize) -> Self {
        self.max_redirect_depth = depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for TraverseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraverseOptions")
            .field("ri_inspector", &self.ri_inspector.is_some())
            .field("turl_inspector", &self.turl_inspector.is_some())
            .field("html_content", &self.html_content)
            .field("max_redirect_depth", &self.max_redirect_depth)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A request to traverse plus everything needed to carry it out.
#[derive(Debug, Clone)]
pub struct TraverseContext {
    pub request: String,
    pub request_init: RequestInit,
    pub label: Option<String>,
    /// The traversal that spawned this one, e.g. when following a redirect.
    pub parent: Option<Arc<TraverseContext>>,
    pub options: TraverseOptions,
}

impl TraverseContext {
    pub fn new(request: impl Into<String>) -> Self {
        Self::with_options(request, TraverseOptions::default())
    }

    pub fn with_options(request: impl Into<String>, options: TraverseOptions) -> Self {
        Self {
            request: request.into(),
            request_init: RequestInit::default(),
            label: None,
            parent: None,
            options,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn request_init(mut self, request_init: RequestInit) -> Self {
        self.request_init = request_init;
        self
    }

    /// Context for a nested traversal of `request`, keeping the label, options
    /// and request init of this one.
    pub fn child(&self, request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            request_init: self.request_init.clone(),
            label: self.label.clone(),
            parent: Some(Arc::new(self.clone())),
            options: self.options.clone(),
        }
    }

    /// Parent, grandparent, ... up to the root context.
    pub fn ancestors(&self) -> impl Iterator<Item = &TraverseContext> {
        std::iter::successors(self.parent.as_deref(), |ctx| ctx.parent.as_deref())
    }

    /// Number of ancestors; 0 for a root context.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    pub fn target(&self) -> TraversalRequest {
        TraversalRequest {
            request: self.request.clone(),
            request_init: self.request_init.clone(),
            label: self.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_context_depth_and_ancestors() {
        let root = TraverseContext::new("https://a.test/").label("root");
        let child = root.child("https://b.test/");
        let grandchild = child.child("https://c.test/");

        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
        assert_eq!(grandchild.depth(), 2);
        assert_eq!(grandchild.label.as_deref(), Some("root"));

        let requests: Vec<_> = grandchild.ancestors().map(|c| c.request.as_str()).collect();
        assert_eq!(requests, ["https://b.test/", "https://a.test/"]);
    }

    #[test]
    fn test_default_options() {
        let options = TraverseOptions::default();
        assert_eq!(options.max_redirect_depth, 5);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert!(options.html_content.is_some());

        let ctx = TraverseContext::new("https://a.test/?utm_source=x&id=2");
        let ri = options.ri_inspector.unwrap();
        assert_eq!(ri(&ctx, &ctx.request), "https://a.test/?id=2");
    }
}
