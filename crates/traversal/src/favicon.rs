//! Favicon probe

use std::sync::Arc;

use futures::future::BoxFuture;
use url::Url;

use crate::inspect::Inspector;
use crate::traverse::{traverse, HttpStatusInspector, Traversal, TraversalPipe, TraverseContext};

/// `/favicon.ico` at the origin of `url`.
pub fn fav_icon_url(url: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    url.set_path("/favicon.ico");
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Probes the site's `/favicon.ico` and attaches the result as `fav_icon`.
#[derive(Debug, Clone, Default)]
pub struct FavIconInspector {
    follow: Option<Arc<TraversalPipe>>,
}

impl FavIconInspector {
    pub fn with_follow_pipe(pipe: TraversalPipe) -> Self {
        Self {
            follow: Some(Arc::new(pipe)),
        }
    }

    fn follow_pipe(&self) -> Arc<TraversalPipe> {
        match &self.follow {
            Some(pipe) => Arc::clone(pipe),
            None => Arc::new(TraversalPipe::new().then(HttpStatusInspector)),
        }
    }
}

impl Inspector<Traversal, TraverseContext> for FavIconInspector {
    fn inspect<'a>(
        &'a self,
        traversal: Traversal,
        ctx: Option<&'a TraverseContext>,
    ) -> BoxFuture<'a, Traversal> {
        Box::pin(async move {
            let Some(ctx) = ctx else {
                return traversal;
            };
            if traversal.fav_icon().is_some() {
                return traversal;
            }
            let Some(icon_url) = traversal.terminal_url().and_then(fav_icon_url) else {
                return traversal;
            };

            log::debug!("Probing {icon_url}");
            let pipe = self.follow_pipe();
            let fav_icon = traverse(&ctx.child(icon_url), &pipe).await;
            Traversal {
                fav_icon: Some(Box::new(fav_icon)),
                ..traversal
            }
        })
    }
}
