//! Feed content
//!
//! [`RssContentInspector`] decodes RSS 2.0, RSS 1.0 and Atom bodies whose
//! Content-Type starts with one of its configured prefixes.

use futures::future::BoxFuture;
use traversal_core::content::media_type_starts_with;
use traversal_core::feed::parse_feed;

use crate::inspect::Inspector;
use crate::traverse::{Traversal, TraversalRssContent, TraversalStage, TraverseContext};

pub const DEFAULT_FEED_MIME_TYPES: [&str; 3] =
    ["application/rss", "application/xml", "application/atom"];

/// Decodes RSS and Atom content.
#[derive(Debug, Clone)]
pub struct RssContentInspector {
    /// Content-Type prefixes treated as feeds.
    pub mime_types: Vec<String>,
}

impl Default for RssContentInspector {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_MIME_TYPES)
    }
}

impl RssContentInspector {
    pub fn new<I, S>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mime_types: mime_types.into_iter().map(Into::into).collect(),
        }
    }

    fn is_feed(&self, content_type: &str) -> bool {
        self.mime_types
            .iter()
            .any(|prefix| media_type_starts_with(content_type, prefix))
    }
}

impl Inspector<Traversal, TraverseContext> for RssContentInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let (content, text) = match &traversal.stage {
                TraversalStage::Content(content) if self.is_feed(&content.content_type) => {
                    (content.clone(), None)
                }
                TraversalStage::Text(text) if self.is_feed(&text.content.content_type) => {
                    (text.content.clone(), Some(text.clone()))
                }
                _ => return traversal,
            };

            let xml = match &text {
                Some(text) => text.body_text.clone(),
                None => match content.traversal.body.take_bytes().await {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(err) => return traversal.into_exception(err),
                },
            };

            match parse_feed(&xml) {
                Ok(feed) => {
                    log::debug!(
                        "Decoded {:?} feed with {} items",
                        feed.feed_type,
                        feed.items.len()
                    );
                    traversal.with_stage(TraversalStage::Rss(TraversalRssContent {
                        content,
                        text,
                        feed,
                    }))
                }
                Err(err) => traversal.into_issue(format!("Invalid feed: {err}")),
            }
        })
    }
}
