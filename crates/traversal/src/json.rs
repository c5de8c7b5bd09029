//! JSON content
//!
//! [`JsonContentInspector`] decodes `application/json` bodies. [`SafeFetchJson`]
//! builds on it to fetch a typed value without ever failing: non-JSON results
//! and values that don't match the target type go to callbacks instead.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use traversal_core::content::is_json;

use crate::inspect::Inspector;
use crate::traverse::{
    traverse, HttpStatusInspector, Traversal, TraversalJsonContent, TraversalPipe, TraversalStage,
    TraverseContext,
};

/// Reads and decodes `application/json` content.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContentInspector;

impl Inspector<Traversal, TraverseContext> for JsonContentInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        _ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let (content, text) = match &traversal.stage {
                TraversalStage::Content(content) if is_json(&content.content_type) => {
                    (content.clone(), None)
                }
                TraversalStage::Text(text) if is_json(&text.content.content_type) => {
                    (text.content.clone(), Some(text.clone()))
                }
                _ => return traversal,
            };

            let decoded: Result<serde_json::Value, serde_json::Error> = match &text {
                Some(text) => serde_json::from_str(&text.body_text),
                None => match content.traversal.body.take_bytes().await {
                    Ok(bytes) => serde_json::from_slice(&bytes),
                    Err(err) => return traversal.into_exception(err),
                },
            };

            match decoded {
                Ok(json_instance) => traversal.with_stage(TraversalStage::Json(TraversalJsonContent {
                    content,
                    text,
                    json_instance,
                })),
                Err(err) => traversal.into_issue(format!("Invalid JSON: {err}")),
            }
        })
    }
}

pub type GuardFailureHandler<T> =
    Box<dyn Fn(&Traversal, &serde_json::Error) -> Option<T> + Send + Sync>;
pub type InvalidResultHandler<T> = Box<dyn Fn(&Traversal) -> Option<T> + Send + Sync>;

/// Fetches JSON and deserializes it into `T`.
///
/// Deserializing is the guard: a JSON value that isn't a `T` is passed to
/// `on_guard_failure`; any traversal that didn't end as JSON content is passed
/// to `on_invalid_result`. Both default to returning `None`.
pub struct SafeFetchJson<T> {
    pipe: TraversalPipe,
    on_guard_failure: Option<GuardFailureHandler<T>>,
    on_invalid_result: Option<InvalidResultHandler<T>>,
}

impl<T: DeserializeOwned> Default for SafeFetchJson<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> SafeFetchJson<T> {
    pub fn new() -> Self {
        Self {
            pipe: TraversalPipe::new()
                .then(HttpStatusInspector)
                .then(JsonContentInspector),
            on_guard_failure: None,
            on_invalid_result: None,
        }
    }

    pub fn on_guard_failure(
        mut self,
        handler: impl Fn(&Traversal, &serde_json::Error) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        self.on_guard_failure = Some(Box::new(handler));
        self
    }

    pub fn on_invalid_result(
        mut self,
        handler: impl Fn(&Traversal) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        self.on_invalid_result = Some(Box::new(handler));
        self
    }

    /// Applies the guard to a finished traversal.
    pub fn guard(&self, traversal: &Traversal) -> Option<T> {
        let Some(json) = traversal.json_content() else {
            log::warn!(
                "Expected JSON from {}, got {}",
                traversal.target.request,
                traversal.stage_name()
            );
            return self.on_invalid_result.as_ref().and_then(|f| f(traversal));
        };

        match serde_json::from_value::<T>(json.json_instance.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!(
                    "JSON from {} failed the guard: {err}",
                    traversal.target.request
                );
                self.on_guard_failure
                    .as_ref()
                    .and_then(|f| f(traversal, &err))
            }
        }
    }

    /// Fetches `ctx.request` and returns the guarded value with the traversal.
    pub async fn fetch_traversal(&self, ctx: &TraverseContext) -> (Option<T>, Traversal) {
        let traversal = traverse(ctx, &self.pipe).await;
        (self.guard(&traversal), traversal)
    }

    pub async fn fetch(&self, ctx: &TraverseContext) -> Option<T> {
        self.fetch_traversal(ctx).await.0
    }
}
