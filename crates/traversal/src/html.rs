//! HTML enrichment steps
//!
//! Steps of the pipe [`crate::traverse::HtmlContentInspector`] runs over the
//! source of an HTML response. Each one advances the content by one stage and
//! leaves other stages alone.

use traversal_core::html::{
    build_curatable_content, standardize_curation_title, HtmlContent, QueryableHtmlContent,
};
use traversal_core::inspect::Inspection;

use crate::inspect::inspector_fn;
use crate::traverse::HtmlContentPipe;

/// Source to queryable content.
pub fn queryable_html_content(
    inspection: Inspection<HtmlContent>,
    _ctx: Option<&()>,
) -> Inspection<HtmlContent> {
    match inspection {
        Inspection::Target(HtmlContent::Source(source))
        | Inspection::Result(HtmlContent::Source(source)) => {
            Inspection::Result(HtmlContent::Queryable(QueryableHtmlContent::new(source)))
        }
        other => other,
    }
}

/// Queryable to curatable content (title and social graph).
pub fn curatable_html_content(
    inspection: Inspection<HtmlContent>,
    _ctx: Option<&()>,
) -> Inspection<HtmlContent> {
    match inspection {
        Inspection::Target(HtmlContent::Queryable(queryable))
        | Inspection::Result(HtmlContent::Queryable(queryable)) => {
            Inspection::Result(HtmlContent::Curatable(build_curatable_content(queryable)))
        }
        other => other,
    }
}

/// Drops a trailing `" | Site Name"` from a curatable title.
pub fn standardized_curation_title(
    inspection: Inspection<HtmlContent>,
    _ctx: Option<&()>,
) -> Inspection<HtmlContent> {
    match inspection {
        Inspection::Result(HtmlContent::Curatable(curatable)) => {
            Inspection::Result(HtmlContent::Curatable(standardize_curation_title(curatable)))
        }
        other => other,
    }
}

/// Queryable, then curatable, then a standardized title.
pub fn default_html_content_pipe() -> HtmlContentPipe {
    HtmlContentPipe::new()
        .then(inspector_fn(queryable_html_content))
        .then(inspector_fn(curatable_html_content))
        .then(inspector_fn(standardized_curation_title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use traversal_core::html::HtmlSourceSupplier;
    use traversal_core::inspect::Inspected;

    fn source(html: &str) -> Inspection<HtmlContent> {
        Inspection::Target(HtmlContent::Source(HtmlSourceSupplier {
            uri: "https://news.test/story".to_string(),
            html_source: html.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_default_pipe_builds_curatable_content() {
        let pipe = default_html_content_pipe();
        let result = pipe
            .run(
                source("<html><head><title>Rocket Launch | Daily News</title></head></html>"),
                None,
            )
            .await;

        assert!(result.is_inspection_result());
        let curatable = result.value().curatable().unwrap();
        assert_eq!(curatable.title, "Rocket Launch");
        assert!(curatable.provenance.is_some());
    }

    #[test]
    fn test_steps_leave_other_stages_alone() {
        let queryable = queryable_html_content(source("<p>x</p>"), None);
        assert!(matches!(
            queryable.value(),
            HtmlContent::Queryable(_)
        ));

        let again = queryable_html_content(queryable, None);
        assert!(matches!(again.value(), HtmlContent::Queryable(_)));

        let untouched = standardized_curation_title(again, None);
        assert!(matches!(untouched.value(), HtmlContent::Queryable(_)));
    }
}
