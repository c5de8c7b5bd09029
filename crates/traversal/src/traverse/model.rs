//! Traversal pipe state
//!
//! Every stage refines the previous one by composition: [`TraversalTextContent`]
//! wraps [`TraversalContent`], [`TraversalHtmlContent`] wraps the text, and so
//! on. The guards on [`Traversal`] look through that composition, so a value
//! at a later stage answers every earlier guard.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, LINK};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use traversal_core::feed::Feed;
use traversal_core::html::HtmlContent;
use traversal_core::inspect::{
    Diagnostics, Inspected, InspectionError, InspectionException, InspectionIssue,
};
use traversal_core::provenance::{Derivable, Provenance};
use traversal_core::web_link::{parse_rfc8288_link_header, WebLinks};

use crate::download::DownloadOutcome;
use crate::error::{Result, TraversalError};
use crate::transport::{RequestInit, TransportBody};

/// What was asked for.
#[derive(Debug, Clone)]
pub struct TraversalRequest {
    pub request: String,
    pub request_init: RequestInit,
    pub label: Option<String>,
}

enum BodyState {
    Unread(Box<dyn TransportBody>),
    Consumed,
    Cancelled,
}

/// Single-read handle on a response body, shared by every clone of the
/// traversal that produced it.
#[derive(Clone)]
pub struct ResponseBody(Arc<Mutex<BodyState>>);

impl ResponseBody {
    pub fn new(body: Box<dyn TransportBody>) -> Self {
        Self(Arc::new(Mutex::new(BodyState::Unread(body))))
    }

    fn state(&self) -> MutexGuard<'_, BodyState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads the whole body. Only the first call succeeds.
    pub async fn take_bytes(&self) -> Result<Bytes> {
        let body = {
            let mut state = self.state();
            match std::mem::replace(&mut *state, BodyState::Consumed) {
                BodyState::Unread(body) => body,
                BodyState::Consumed => return Err(TraversalError::BodyAlreadyConsumed),
                BodyState::Cancelled => {
                    *state = BodyState::Cancelled;
                    return Err(TraversalError::BodyCancelled);
                }
            }
        };
        Ok(body.bytes().await?)
    }

    /// Drops an unread body. Returns true if there was one.
    pub fn cancel(&self) -> bool {
        let mut state = self.state();
        if matches!(*state, BodyState::Unread(_)) {
            *state = BodyState::Cancelled;
            true
        } else {
            false
        }
    }

    pub fn is_unread(&self) -> bool {
        matches!(*self.state(), BodyState::Unread(_))
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.state() {
            BodyState::Unread(_) => "unread",
            BodyState::Consumed => "consumed",
            BodyState::Cancelled => "cancelled",
        };
        f.debug_tuple("ResponseBody").field(&state).finish()
    }
}

/// The transport returned a response.
#[derive(Debug, Clone)]
pub struct SuccessfulTraversal {
    pub init_at: DateTime<Utc>,
    /// URL after HTTP redirects and terminal URL rewriting.
    pub terminal_url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// HTTP 200 response.
#[derive(Debug, Clone)]
pub struct TraversalContent {
    pub traversal: SuccessfulTraversal,
    pub http_status: u16,
    /// Content-Type as sent, trimmed; empty when missing.
    pub content_type: String,
    pub content_disposition: Option<BTreeMap<String, String>>,
}

impl TraversalContent {
    /// `Content-Length` when the server sent a valid one.
    pub fn content_length(&self) -> Option<u64> {
        self.traversal
            .headers
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Streams the raw body into `sink` and returns the number of bytes written.
    pub async fn write_content<W>(&self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let bytes = self.traversal.body.take_bytes().await?;
        sink.write_all(&bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// `text/*` content read into memory.
#[derive(Debug, Clone)]
pub struct TraversalTextContent {
    pub content: TraversalContent,
    pub body_text: String,
}

impl TraversalTextContent {
    pub async fn write_content<W>(&self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        sink.write_all(self.body_text.as_bytes()).await?;
        Ok(self.body_text.len() as u64)
    }
}

#[derive(Debug, Clone)]
pub struct TraversalHtmlContent {
    pub text: TraversalTextContent,
    pub html_content: HtmlContent,
}

#[derive(Debug, Clone)]
pub struct TraversalJsonContent {
    pub content: TraversalContent,
    /// Set when the JSON was decoded from already-read text.
    pub text: Option<TraversalTextContent>,
    pub json_instance: Value,
}

#[derive(Debug, Clone)]
pub struct TraversalRssContent {
    pub content: TraversalContent,
    /// Set when the feed was decoded from already-read text.
    pub text: Option<TraversalTextContent>,
    pub feed: Feed,
}

/// Any non-200 response. Terminal.
#[derive(Debug, Clone)]
pub struct InvalidHttpStatus {
    pub traversal: SuccessfulTraversal,
    pub invalid_http_status: u16,
    pub diagnostics: Diagnostics,
}

impl InvalidHttpStatus {
    pub fn new(traversal: SuccessfulTraversal) -> Self {
        let status = traversal.status;
        Self {
            traversal,
            invalid_http_status: status,
            diagnostics: Diagnostics::from(format!("Invalid HTTP status {status}")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TraversalStage {
    /// Not fetched yet.
    Pending,
    /// The fetch or a body read failed.
    Unsuccessful(InspectionException<Box<TraversalStage>>),
    Successful(SuccessfulTraversal),
    InvalidHttpStatus(InvalidHttpStatus),
    Content(TraversalContent),
    Text(TraversalTextContent),
    Html(TraversalHtmlContent),
    Json(TraversalJsonContent),
    Rss(TraversalRssContent),
    /// Content failed a check; the subject is the stage that failed it.
    Issue(InspectionIssue<Box<TraversalStage>>),
}

impl TraversalStage {
    pub fn successful(&self) -> Option<&SuccessfulTraversal> {
        match self {
            TraversalStage::Pending => None,
            TraversalStage::Successful(s) => Some(s),
            TraversalStage::InvalidHttpStatus(invalid) => Some(&invalid.traversal),
            TraversalStage::Unsuccessful(exception) => exception.subject.successful(),
            TraversalStage::Issue(issue) => issue.subject.successful(),
            other => other.content().map(|content| &content.traversal),
        }
    }

    pub fn content(&self) -> Option<&TraversalContent> {
        match self {
            TraversalStage::Content(content) => Some(content),
            TraversalStage::Text(text) => Some(&text.content),
            TraversalStage::Html(html) => Some(&html.text.content),
            TraversalStage::Json(json) => Some(&json.content),
            TraversalStage::Rss(rss) => Some(&rss.content),
            _ => None,
        }
    }

    pub fn text_content(&self) -> Option<&TraversalTextContent> {
        match self {
            TraversalStage::Text(text) => Some(text),
            TraversalStage::Html(html) => Some(&html.text),
            TraversalStage::Json(json) => json.text.as_ref(),
            TraversalStage::Rss(rss) => rss.text.as_ref(),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TraversalStage::Pending => "pending",
            TraversalStage::Unsuccessful(_) => "unsuccessful",
            TraversalStage::Successful(_) => "successful",
            TraversalStage::InvalidHttpStatus(_) => "invalid-http-status",
            TraversalStage::Content(_) => "content",
            TraversalStage::Text(_) => "text",
            TraversalStage::Html(_) => "html",
            TraversalStage::Json(_) => "json",
            TraversalStage::Rss(_) => "rss",
            TraversalStage::Issue(_) => "issue",
        }
    }
}

/// Pipe state of a fetch.
#[derive(Debug, Clone)]
pub struct Traversal {
    pub target: TraversalRequest,
    pub stage: TraversalStage,
    pub provenance: Option<Provenance<Traversal>>,
    /// Set when this traversal is the result of following a meta refresh.
    pub content_redirect_url: Option<String>,
    pub fav_icon: Option<Box<Traversal>>,
    pub download: Option<DownloadOutcome>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Traversal {
    pub fn pending(target: TraversalRequest) -> Self {
        Self {
            target,
            stage: TraversalStage::Pending,
            provenance: None,
            content_redirect_url: None,
            fav_icon: None,
            download: None,
            finalized_at: None,
        }
    }

    /// Same traversal at a new stage.
    pub fn with_stage(self, stage: TraversalStage) -> Self {
        Self { stage, ..self }
    }

    /// Marks the current stage as an issue. An existing issue gains the new
    /// diagnostics instead.
    pub fn into_issue(self, diagnostics: impl Into<Diagnostics>) -> Self {
        let diagnostics = diagnostics.into();
        match self.stage {
            TraversalStage::Issue(mut issue) => {
                for message in diagnostics.unique_diagnostics() {
                    issue.diagnostics.push(message.clone());
                }
                Self {
                    stage: TraversalStage::Issue(issue),
                    ..self
                }
            }
            stage => Self {
                stage: TraversalStage::Issue(InspectionIssue::new(Box::new(stage), diagnostics)),
                ..self
            },
        }
    }

    /// Marks the current stage as failed with `error`.
    pub fn into_exception(self, error: TraversalError) -> Self {
        let stage = self.stage;
        Self {
            stage: TraversalStage::Unsuccessful(InspectionException::new(Box::new(stage), error)),
            ..self
        }
    }

    pub fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    pub fn successful(&self) -> Option<&SuccessfulTraversal> {
        self.stage.successful()
    }

    pub fn terminal_url(&self) -> Option<&str> {
        self.successful().map(|s| s.terminal_url.as_str())
    }

    pub fn content(&self) -> Option<&TraversalContent> {
        self.stage.content()
    }

    pub fn text_content(&self) -> Option<&TraversalTextContent> {
        self.stage.text_content()
    }

    pub fn html_content(&self) -> Option<&TraversalHtmlContent> {
        match &self.stage {
            TraversalStage::Html(html) => Some(html),
            _ => None,
        }
    }

    pub fn json_content(&self) -> Option<&TraversalJsonContent> {
        match &self.stage {
            TraversalStage::Json(json) => Some(json),
            _ => None,
        }
    }

    pub fn rss_content(&self) -> Option<&TraversalRssContent> {
        match &self.stage {
            TraversalStage::Rss(rss) => Some(rss),
            _ => None,
        }
    }

    pub fn is_structured_content(&self) -> bool {
        self.json_content().is_some() || self.rss_content().is_some()
    }

    pub fn invalid_http_status(&self) -> Option<&InvalidHttpStatus> {
        match &self.stage {
            TraversalStage::InvalidHttpStatus(invalid) => Some(invalid),
            _ => None,
        }
    }

    pub fn issue(&self) -> Option<&InspectionIssue<Box<TraversalStage>>> {
        match &self.stage {
            TraversalStage::Issue(issue) => Some(issue),
            _ => None,
        }
    }

    /// Derived from another traversal.
    pub fn is_transformed(&self) -> bool {
        self.provenance.is_some()
    }

    pub fn is_traversal_redirect(&self) -> bool {
        self.content_redirect_url.is_some()
    }

    pub fn fav_icon(&self) -> Option<&Traversal> {
        self.fav_icon.as_deref()
    }

    pub fn download(&self) -> Option<&DownloadOutcome> {
        self.download.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Parsed `Link` response header, if the response had one.
    pub fn web_links(&self) -> Option<WebLinks> {
        let header = self.successful()?.headers.get(LINK)?.to_str().ok()?;
        Some(parse_rfc8288_link_header(header))
    }

    /// Cancels every unread body reachable from this traversal, including
    /// those held by predecessors and the favicon probe. Returns how many were
    /// cancelled.
    pub(crate) fn cancel_unread_bodies(&mut self) -> usize {
        let mut cancelled = 0;
        if let Some(successful) = self.successful() {
            cancelled += usize::from(successful.body.cancel());
        }
        if let Some(provenance) = self.provenance.as_mut() {
            for predecessor in provenance.values_mut() {
                cancelled += predecessor.cancel_unread_bodies();
            }
        }
        if let Some(fav_icon) = self.fav_icon.as_mut() {
            cancelled += fav_icon.cancel_unread_bodies();
        }
        cancelled
    }
}

impl Inspected for Traversal {
    type Target = TraversalRequest;

    fn inspection_target(&self) -> &TraversalRequest {
        &self.target
    }

    fn is_inspection_result(&self) -> bool {
        !matches!(self.stage, TraversalStage::Pending)
    }

    fn diagnostics(&self) -> Option<&Diagnostics> {
        match &self.stage {
            TraversalStage::Issue(issue) => Some(&issue.diagnostics),
            TraversalStage::InvalidHttpStatus(invalid) => Some(&invalid.diagnostics),
            _ => None,
        }
    }

    fn exception(&self) -> Option<&InspectionError> {
        match &self.stage {
            TraversalStage::Unsuccessful(exception) => Some(&exception.exception),
            _ => None,
        }
    }
}

impl Derivable for Traversal {
    fn provenance(&self) -> Option<&Provenance<Self>> {
        self.provenance.as_ref()
    }

    fn provenance_mut(&mut self) -> &mut Option<Provenance<Self>> {
        &mut self.provenance
    }
}
