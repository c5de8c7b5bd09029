use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use traversal_core::html::HtmlContent;
use traversal_core::inspect::{Inspected, Inspection, InspectionException, InspectionIssue};
use traversal_core::provenance::Derivable;

use super::*;
use crate::error::TraversalError;
use crate::inspect::{inspector_fn, Inspector};
use crate::testing::{StubResponse, StubTransport};

const PAGE: &str = "https://site.test/page";

fn context(stub: &Arc<StubTransport>, url: &str) -> TraverseContext {
    let options = TraverseOptions::default().with_transport(stub.clone());
    TraverseContext::with_options(url, options)
}

fn status_only() -> TraversalPipe {
    TraversalPipe::new().then(HttpStatusInspector)
}

struct CountCalls(Arc<AtomicUsize>);

impl Inspector<Traversal, TraverseContext> for CountCalls {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::future::ready(traversal))
    }
}

// ============================================================================
// init_fetch / finalize_fetch tests
// ============================================================================

#[tokio::test]
async fn test_invalid_url_is_an_issue_without_a_request() {
    let stub = StubTransport::new().into_shared();
    let result = traverse(&context(&stub, "not a url"), &default_inspectors()).await;

    assert!(result.is_issue());
    assert!(result.successful().is_none());
    assert!(result.diagnostics().unwrap().unique_diagnostics()[0].starts_with("Invalid request URL"));
    assert!(stub.requests().is_empty());
    assert!(result.is_finalized());
}

#[tokio::test]
async fn test_transport_failure_is_an_exception() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::failing("connection refused"))
        .into_shared();
    let result = init_fetch(&context(&stub, PAGE)).await;

    assert!(result.is_exception());
    assert!(result.is_terminal());
    assert!(result.exception().unwrap().to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_unreachable_url_is_a_request_failure() {
    let stub = StubTransport::new().into_shared();
    let result = init_fetch(&context(&stub, PAGE)).await;

    assert!(result.is_exception());
    let message = result.exception().unwrap().to_string();
    assert!(message.starts_with("Request failed"));
    assert!(message.contains(PAGE));
}

#[tokio::test]
async fn test_fetch_deadline() {
    let stub = StubTransport::new()
        .route(
            PAGE,
            StubResponse::html("<p>late</p>").delayed(Duration::from_millis(200)),
        )
        .into_shared();
    let mut ctx = context(&stub, PAGE);
    ctx.options = ctx.options.with_timeout(Some(Duration::from_millis(10)));

    let result = init_fetch(&ctx).await;
    assert!(result.is_exception());
    assert!(result
        .exception()
        .unwrap()
        .to_string()
        .contains("did not complete within"));
}

#[tokio::test]
async fn test_tracking_codes_are_stripped_from_request_and_terminal_url() {
    let sent = "https://site.test/page?id=7";
    let stub = StubTransport::new()
        .route(
            sent,
            StubResponse::html("<p>hi</p>").redirected_to("https://site.test/final?utm_medium=x"),
        )
        .into_shared();
    let ctx = context(&stub, "https://site.test/page?utm_source=feed&id=7");

    let result = init_fetch(&ctx).await;
    assert_eq!(stub.requests(), [sent]);
    assert_eq!(result.terminal_url(), Some("https://site.test/final"));
    assert_eq!(result.target.request, "https://site.test/page?utm_source=feed&id=7");
}

#[tokio::test]
async fn test_finalize_is_idempotent_and_cancels_unread_body() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::html("<p>unread</p>"))
        .into_shared();
    let fetched = init_fetch(&context(&stub, PAGE)).await;
    let body = fetched.successful().unwrap().body.clone();
    assert!(body.is_unread());

    let finalized = finalize_fetch(fetched);
    let stamped = finalized.finalized_at;
    assert!(stamped.is_some());
    assert!(!body.is_unread());

    let again = finalize_fetch(finalized);
    assert_eq!(again.finalized_at, stamped);
    assert_eq!(stub.body_reads(), 0);
}

// ============================================================================
// Status classification tests
// ============================================================================

#[tokio::test]
async fn test_status_200_keeps_content_type_verbatim() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::html("<p>ok</p>"))
        .into_shared();
    let result = traverse(&context(&stub, PAGE), &status_only()).await;

    let content = result.content().unwrap();
    assert_eq!(content.http_status, 200);
    assert_eq!(content.content_type, "text/html; charset=utf-8");
    assert!(content.content_disposition.is_none());
    assert!(!result.is_terminal());
}

#[tokio::test]
async fn test_status_404_is_invalid_http_status() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::status(404).body("missing"))
        .into_shared();
    let result = traverse(&context(&stub, PAGE), &default_inspectors()).await;

    let invalid = result.invalid_http_status().unwrap();
    assert_eq!(invalid.invalid_http_status, 404);
    assert!(result.content().is_none());
    assert!(result.is_issue());
    assert_eq!(
        result.diagnostics().unwrap().unique_diagnostics(),
        ["Invalid HTTP status 404"]
    );
    assert_eq!(stub.body_reads(), 0);
}

#[tokio::test]
async fn test_content_disposition_is_parsed() {
    let stub = StubTransport::new()
        .route(
            PAGE,
            StubResponse::ok("application/pdf", "%PDF")
                .header("content-disposition", r#"attachment; filename="a b.pdf""#),
        )
        .into_shared();
    let result = traverse(&context(&stub, PAGE), &status_only()).await;
    let disposition = result.content().unwrap().content_disposition.as_ref().unwrap();
    assert_eq!(disposition["filename"], "a b.pdf");
}

// ============================================================================
// Pipe behavior tests
// ============================================================================

#[tokio::test]
async fn test_html_content_satisfies_earlier_guards() {
    let stub = StubTransport::new()
        .route(
            PAGE,
            StubResponse::html("<html><head><title>Launch | Site</title></head><body/></html>"),
        )
        .into_shared();
    let result = traverse(&context(&stub, PAGE), &default_inspectors()).await;

    let html = result.html_content().unwrap();
    assert!(result.text_content().is_some());
    assert!(result.content().is_some());
    assert!(result.successful().is_some());
    assert!(!result.is_structured_content());
    assert_eq!(html.html_content.curatable().unwrap().title, "Launch");
}

#[tokio::test]
async fn test_body_is_read_once() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::html("<p>once</p>"))
        .into_shared();
    let result = traverse(&context(&stub, PAGE), &default_inspectors()).await;

    assert_eq!(stub.body_reads(), 1);
    assert!(result.is_finalized());

    let mut sink = Vec::new();
    let err = result.content().unwrap().write_content(&mut sink).await.unwrap_err();
    assert!(matches!(err, TraversalError::BodyAlreadyConsumed));

    let written = result.text_content().unwrap().write_content(&mut sink).await.unwrap();
    assert_eq!(written, 11);
    assert_eq!(sink, b"<p>once</p>");
}

#[tokio::test]
async fn test_inspectors_are_idempotent() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::html("<p>twice</p>"))
        .into_shared();
    let ctx = context(&stub, PAGE).label(" Twice\n");
    let twice = TraversalPipe::new()
        .then(CleanLabelInspector)
        .then(CleanLabelInspector)
        .then(HttpStatusInspector)
        .then(HttpStatusInspector)
        .then(TextContentInspector)
        .then(TextContentInspector)
        .then(HtmlContentInspector)
        .then(HtmlContentInspector)
        .then(MetaRefreshRedirectInspector::default())
        .then(MetaRefreshRedirectInspector::default());

    let result = traverse(&ctx, &twice).await;
    assert_eq!(result.stage_name(), "html");
    assert_eq!(result.target.label.as_deref(), Some("Twice"));
    assert_eq!(result.provenance().unwrap().len(), 1);
    assert_eq!(stub.body_reads(), 1);
}

#[tokio::test]
async fn test_issue_short_circuits_pipe() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::status(500))
        .into_shared();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipe = TraversalPipe::new()
        .then(HttpStatusInspector)
        .then(CountCalls(Arc::clone(&calls)))
        .then(CountCalls(Arc::clone(&calls)));

    let result = traverse(&context(&stub, PAGE), &pipe).await;
    assert_eq!(result.invalid_http_status().unwrap().invalid_http_status, 500);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_clean_label_records_provenance() {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::html("<p>x</p>"))
        .into_shared();
    let ctx = context(&stub, PAGE).label("Breaking\r\nNews ");
    let result = traverse(&ctx, &default_inspectors()).await;

    assert_eq!(result.target.label.as_deref(), Some("Breaking News"));
    assert!(result.is_transformed());
    let provenance = result.provenance().unwrap();
    assert_eq!(provenance.remarks(), Some("Cleaned label"));
    assert_eq!(provenance.from().target.label.as_deref(), Some("Breaking\r\nNews "));
}

// ============================================================================
// Meta refresh tests
// ============================================================================

const REFRESH_TO_B: &str =
    r#"<html><head><meta http-equiv="refresh" content="0;url=/b"></head></html>"#;

#[tokio::test]
async fn test_meta_refresh_redirect_provenance() {
    let stub = StubTransport::new()
        .route("https://site.test/a", StubResponse::html(REFRESH_TO_B))
        .route(
            "https://site.test/b",
            StubResponse::html("<html><head><title>Landing</title></head></html>"),
        )
        .into_shared();
    let result = traverse(&context(&stub, "https://site.test/a"), &default_inspectors()).await;

    assert!(result.is_traversal_redirect());
    assert_eq!(result.content_redirect_url.as_deref(), Some("https://site.test/b"));
    assert_eq!(result.terminal_url(), Some("https://site.test/b"));
    assert_eq!(
        result.html_content().unwrap().html_content.curatable().unwrap().title,
        "Landing"
    );

    let provenance = result.provenance().unwrap();
    assert_eq!(provenance.position(), 0);
    let before = provenance.from();
    assert_eq!(before.terminal_url(), Some("https://site.test/a"));
    assert_eq!(before.text_content().unwrap().body_text, REFRESH_TO_B);
    assert!(result.is_finalized());
    assert_eq!(stub.body_reads(), 2);
}

#[tokio::test]
async fn test_meta_refresh_keeps_label() {
    let stub = StubTransport::new()
        .route("https://site.test/a", StubResponse::html(REFRESH_TO_B))
        .route("https://site.test/b", StubResponse::html("<p>b</p>"))
        .into_shared();
    let ctx = context(&stub, "https://site.test/a").label("Top story");
    let result = traverse(&ctx, &default_inspectors()).await;

    assert!(result.is_traversal_redirect());
    assert_eq!(result.target.label.as_deref(), Some("Top story"));
    assert_eq!(result.target.request, "https://site.test/b");
}

#[tokio::test]
async fn test_meta_refresh_after_cleaned_label_extends_provenance() {
    let stub = StubTransport::new()
        .route("https://site.test/a", StubResponse::html(REFRESH_TO_B))
        .route("https://site.test/b", StubResponse::html("<p>b</p>"))
        .into_shared();
    let ctx = context(&stub, "https://site.test/a").label("Top\nstory ");
    let result = traverse(&ctx, &default_inspectors()).await;

    assert_eq!(result.target.label.as_deref(), Some("Top story"));
    let provenance = result.provenance().unwrap();
    assert_eq!(provenance.position(), 1);
    assert_eq!(
        provenance.remarks(),
        Some("Meta refresh redirect to https://site.test/b")
    );

    let before = provenance.from();
    assert_eq!(before.target.label.as_deref(), Some("Top story"));
    assert_eq!(before.terminal_url(), Some("https://site.test/a"));
    assert_eq!(before.text_content().unwrap().body_text, REFRESH_TO_B);
    assert_eq!(provenance.origin().target.label.as_deref(), Some("Top\nstory "));
}

#[tokio::test]
async fn test_meta_refresh_loop_is_an_issue() {
    let stub = StubTransport::new()
        .route("https://site.test/a", StubResponse::html(REFRESH_TO_B))
        .route(
            "https://site.test/b",
            StubResponse::html(
                r#"<meta http-equiv="refresh" content="0;url=https://site.test/a">"#,
            ),
        )
        .into_shared();
    let result = traverse(&context(&stub, "https://site.test/a"), &default_inspectors()).await;

    assert!(result.is_issue());
    assert!(result.diagnostics().unwrap().unique_diagnostics()[0].starts_with("Meta refresh loop"));
    assert_eq!(stub.requests().len(), 2);
}

#[tokio::test]
async fn test_meta_refresh_depth_limit() {
    let stub = StubTransport::new()
        .route("https://site.test/a", StubResponse::html(REFRESH_TO_B))
        .into_shared();
    let mut ctx = context(&stub, "https://site.test/a");
    ctx.options = ctx.options.with_max_redirect_depth(0);

    let result = traverse(&ctx, &default_inspectors()).await;
    assert!(result.is_issue());
    assert!(result.diagnostics().unwrap().unique_diagnostics()[0].contains("depth limit"));
    assert!(result.content().is_none());
    assert_eq!(stub.requests(), ["https://site.test/a"]);
}

// ============================================================================
// Web link tests
// ============================================================================

#[tokio::test]
async fn test_web_links_from_response_header() {
    let stub = StubTransport::new()
        .route(
            PAGE,
            StubResponse::ok("application/json", "[]")
                .header("link", r#"<https://site.test/page?page=2>; rel="next""#),
        )
        .into_shared();
    let result = traverse(&context(&stub, PAGE), &status_only()).await;

    let links = result.web_links().unwrap();
    assert_eq!(links.next.unwrap().params["page"], "2");
}

// ============================================================================
// HTML enrichment tests
// ============================================================================

fn keep_source(target: Inspection<HtmlContent>, _ctx: Option<&()>) -> Inspection<HtmlContent> {
    target
}

fn reject_html(target: Inspection<HtmlContent>, _ctx: Option<&()>) -> Inspection<HtmlContent> {
    Inspection::Issue(InspectionIssue::new(target.into_value(), "No article body"))
}

fn fail_html(target: Inspection<HtmlContent>, _ctx: Option<&()>) -> Inspection<HtmlContent> {
    Inspection::Exception(InspectionException::new(
        target.into_value(),
        std::io::Error::other("parser crashed"),
    ))
}

async fn enrich_with(pipe: HtmlContentPipe) -> Traversal {
    let stub = StubTransport::new()
        .route(PAGE, StubResponse::html("<p>body</p>"))
        .into_shared();
    let mut ctx = context(&stub, PAGE);
    ctx.options = ctx.options.with_html_content(Some(pipe));
    traverse(&ctx, &default_inspectors()).await
}

#[tokio::test]
async fn test_html_pipe_without_html_content_is_an_issue() {
    let result = enrich_with(HtmlContentPipe::new().then(inspector_fn(keep_source))).await;

    assert!(result.is_issue());
    assert!(result.html_content().is_none());
    assert_eq!(
        result.diagnostics().unwrap().unique_diagnostics(),
        ["Unable to produce HTML content"]
    );
}

#[tokio::test]
async fn test_html_pipe_issue_becomes_traversal_issue() {
    let result = enrich_with(HtmlContentPipe::new().then(inspector_fn(reject_html))).await;

    assert!(result.is_issue());
    assert_eq!(
        result.diagnostics().unwrap().unique_diagnostics(),
        ["No article body"]
    );
}

#[tokio::test]
async fn test_html_pipe_exception_becomes_traversal_issue() {
    let result = enrich_with(HtmlContentPipe::new().then(inspector_fn(fail_html))).await;

    assert!(result.is_issue());
    assert!(!result.is_exception());
    assert!(result.diagnostics().unwrap().unique_diagnostics()[0].contains("parser crashed"));
}
