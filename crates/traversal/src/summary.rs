//! Serializable summary of a traversal, used for CLI output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use traversal_core::inspect::Inspected;

use crate::download::DownloadOutcome;
use crate::traverse::Traversal;

/// Serializable view of a finished traversal.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalSummary {
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub stage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_redirect_url: Option<String>,
    /// Remarks of every derivation, most recent first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fav_icon: Option<Box<TraversalSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<&Traversal> for TraversalSummary {
    fn from(traversal: &Traversal) -> Self {
        let successful = traversal.successful();
        let content = traversal.content();

        Self {
            request: traversal.target.request.clone(),
            label: traversal.target.label.clone(),
            stage: traversal.stage_name(),
            terminal_url: successful.map(|s| s.terminal_url.clone()),
            http_status: successful.map(|s| s.status),
            content_type: content.map(|c| c.content_type.clone()),
            content_disposition: content.and_then(|c| c.content_disposition.clone()),
            title: traversal
                .html_content()
                .and_then(|html| html.html_content.curatable())
                .map(|curatable| curatable.title.clone()),
            content_redirect_url: traversal.content_redirect_url.clone(),
            provenance: traversal
                .provenance
                .iter()
                .flat_map(|p| p.lineage())
                .filter_map(|d| d.remarks.clone())
                .collect(),
            diagnostics: traversal
                .diagnostics()
                .map(|d| d.unique_diagnostics().to_vec())
                .unwrap_or_default(),
            exception: traversal.exception().map(|e| e.to_string()),
            feed_items: traversal.rss_content().map(|rss| rss.feed.items.len()),
            json: traversal
                .json_content()
                .map(|json| json.json_instance.clone()),
            fav_icon: traversal
                .fav_icon()
                .map(|icon| Box::new(TraversalSummary::from(icon))),
            download: traversal.download.clone(),
            finalized_at: traversal.finalized_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubResponse, StubTransport};
    use crate::traverse::{default_inspectors, traverse, TraverseContext, TraverseOptions};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_summary_of_redirected_html() {
        let stub = StubTransport::new()
            .route(
                "https://site.test/a",
                StubResponse::html(r#"<meta http-equiv="refresh" content="0;url=/b">"#),
            )
            .route(
                "https://site.test/b",
                StubResponse::html("<title>Landing | Site</title>"),
            );
        let ctx = TraverseContext::with_options(
            "https://site.test/a",
            TraverseOptions::default().with_transport(Arc::new(stub)),
        );
        let result = traverse(&ctx, &default_inspectors()).await;
        let summary = TraversalSummary::from(&result);

        assert_eq!(summary.stage, "html");
        assert_eq!(summary.http_status, Some(200));
        assert_eq!(summary.title.as_deref(), Some("Landing"));
        assert_eq!(summary.provenance, ["Meta refresh redirect to https://site.test/b"]);
        assert!(summary.finalized_at.is_some());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["content_redirect_url"], "https://site.test/b");
        assert!(json.get("exception").is_none());
    }
}
