//! HTML enrichment
//!
//! Turns fetched HTML source into queryable content (anchors, images, JSON-LD
//! schemas, page icons, meta tags) and from there into curatable content
//! (title plus OpenGraph/Twitter social graph). Parsing happens on demand in
//! each query, so every type here stays `Send` and cheap to clone.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provenance::{Derivable, Provenance};

/// Where the HTML came from and its raw source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlSourceSupplier {
    pub uri: String,
    pub html_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlAnchor {
    pub href: String,
    pub label: String,
}

/// Attribute value parsed as a number when possible.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    fn parse(value: &str) -> Self {
        value
            .trim()
            .parse::<f64>()
            .map(AttributeValue::Number)
            .unwrap_or_else(|_| AttributeValue::Text(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlImage {
    pub src: Option<String>,
    pub alt: Option<String>,
    pub width: Option<AttributeValue>,
    pub height: Option<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageIcon {
    pub name: String,
    pub icon_type: Option<String>,
    pub href: String,
    pub sizes: Option<String>,
}

/// `name` (or `property`) to `content` of every `<meta>` tag.
pub type HtmlMeta = BTreeMap<String, String>;

const PAGE_ICON_SELECTORS: [(&str, &str); 7] = [
    ("defaultIcon", "link[rel='icon']"),
    ("shortcutIcon", "link[rel='shortcut icon']"),
    ("appleTouchIcon", "link[rel='apple-touch-icon']"),
    ("appleTouchIconPrecomposed", "link[rel='apple-touch-icon-precomposed']"),
    ("appleTouchStartupImage", "link[rel='apple-touch-startup-image']"),
    ("maskIcon", "link[rel='mask-icon']"),
    ("fluidIcon", "link[rel='fluid-icon']"),
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selectors are valid")
}

fn attr(element: &ElementRef<'_>, name: &str) -> Option<String> {
    element.value().attr(name).map(str::to_string)
}

/// HTML content that can be queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryableHtmlContent {
    source: HtmlSourceSupplier,
}

impl QueryableHtmlContent {
    pub fn new(source: HtmlSourceSupplier) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &HtmlSourceSupplier {
        &self.source
    }

    pub fn uri(&self) -> &str {
        &self.source.uri
    }

    pub fn html_source(&self) -> &str {
        &self.source.html_source
    }

    /// Parses the source into a document for ad-hoc queries.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.source.html_source)
    }

    /// Text of every element matching `css`; `None` if the selector is invalid.
    pub fn select_text(&self, css: &str) -> Option<Vec<String>> {
        let selector = Selector::parse(css).ok()?;
        let document = self.document();
        let texts = document
            .select(&selector)
            .map(|el| el.text().collect::<String>())
            .collect();
        Some(texts)
    }

    /// `<a href>` elements, optionally filtered.
    pub fn anchors(&self, retain: Option<&dyn Fn(&HtmlAnchor) -> bool>) -> Vec<HtmlAnchor> {
        let document = self.document();
        document
            .select(&selector("a"))
            .filter_map(|el| {
                let href = attr(&el, "href").filter(|h| !h.is_empty())?;
                Some(HtmlAnchor {
                    href,
                    label: el.text().collect::<String>(),
                })
            })
            .filter(|anchor| retain.map_or(true, |keep| keep(anchor)))
            .collect()
    }

    /// `<img>` elements, optionally filtered.
    pub fn images(&self, retain: Option<&dyn Fn(&HtmlImage) -> bool>) -> Vec<HtmlImage> {
        let document = self.document();
        document
            .select(&selector("img"))
            .map(|el| HtmlImage {
                src: attr(&el, "src"),
                alt: attr(&el, "alt"),
                width: el.value().attr("width").map(AttributeValue::parse),
                height: el.value().attr("height").map(AttributeValue::parse),
            })
            .filter(|image| retain.map_or(true, |keep| keep(image)))
            .collect()
    }

    /// JSON-LD blocks from `<script type="application/ld+json">`.
    ///
    /// With `unwrap_graph`, a block holding an `@graph` array contributes its
    /// nodes instead of itself. Blocks that fail to parse are reported to
    /// `on_error` with their index and skipped.
    pub fn untyped_schemas(
        &self,
        unwrap_graph: bool,
        retain: Option<&dyn Fn(&Value) -> bool>,
        mut on_error: Option<&mut dyn FnMut(usize, &serde_json::Error)>,
    ) -> Vec<Value> {
        let document = self.document();
        let keep = |value: &Value| retain.map_or(true, |keep| keep(value));
        let mut result = Vec::new();

        for (index, script) in document
            .select(&selector(r#"script[type="application/ld+json"]"#))
            .enumerate()
        {
            let text = script.text().collect::<String>();
            if text.trim().is_empty() {
                continue;
            }
            let ld_json: Value = match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) => {
                    if let Some(handler) = on_error.as_mut() {
                        handler(index, &err);
                    }
                    continue;
                }
            };

            if unwrap_graph {
                if let Some(graph) = ld_json.get("@graph").and_then(Value::as_array) {
                    result.extend(graph.iter().filter(|node| keep(node)).cloned());
                    continue;
                }
            }
            if keep(&ld_json) {
                result.push(ld_json);
            }
        }
        result
    }

    /// Icons declared with the well-known `<link rel=...>` relations.
    pub fn page_icons(&self) -> Vec<PageIcon> {
        let document = self.document();
        let mut icons = Vec::new();
        for (name, css) in PAGE_ICON_SELECTORS {
            for link in document.select(&selector(css)) {
                let Some(href) = attr(&link, "href").filter(|h| !h.is_empty() && h != "#") else {
                    continue;
                };
                icons.push(PageIcon {
                    name: name.to_string(),
                    icon_type: attr(&link, "type"),
                    href,
                    sizes: attr(&link, "sizes"),
                });
            }
        }
        icons
    }

    pub fn meta(&self) -> HtmlMeta {
        let document = self.document();
        let mut meta = HtmlMeta::new();
        for el in document.select(&selector("meta")) {
            let key = el
                .value()
                .attr("name")
                .or_else(|| el.value().attr("property"));
            if let Some(key) = key.filter(|k| !k.is_empty()) {
                meta.insert(
                    key.to_string(),
                    el.value().attr("content").unwrap_or_default().to_string(),
                );
            }
        }
        meta
    }

    /// Text of `<head><title>`, empty when absent.
    pub fn head_title(&self) -> String {
        let document = self.document();
        document
            .select(&selector("head > title"))
            .map(|el| el.text().collect::<String>())
            .collect()
    }

    fn meta_matching(&self, attribute: &str, prefix: &str) -> Vec<(String, String)> {
        let document = self.document();
        document
            .select(&selector("meta"))
            .filter_map(|el| {
                let key = el.value().attr(attribute)?;
                key.starts_with(prefix).then(|| {
                    (
                        key.to_string(),
                        el.value().attr("content").unwrap_or_default().to_string(),
                    )
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenGraph {
    #[serde(rename = "type")]
    pub og_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub keywords: Option<Vec<String>>,
}

impl OpenGraph {
    fn is_empty(&self) -> bool {
        *self == OpenGraph::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TwitterCard {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site: Option<String>,
    pub creator: Option<String>,
}

impl TwitterCard {
    fn is_empty(&self) -> bool {
        *self == TwitterCard::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialGraph {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<OpenGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<TwitterCard>,
}

/// Parses `<meta property="og:*">` tags.
pub fn parse_open_graph(content: &QueryableHtmlContent) -> OpenGraph {
    let mut og = OpenGraph::default();
    for (key, value) in content.meta_matching("property", "og:") {
        match key.as_str() {
            "og:type" => og.og_type = Some(value),
            "og:title" => og.title = Some(value),
            "og:description" => og.description = Some(value),
            "og:image" => og.image_url = Some(value),
            "og:keywords" => {
                og.keywords = Some(value.split(',').map(|kw| kw.trim().to_string()).collect())
            }
            _ => {}
        }
    }
    og
}

/// Parses `<meta name="twitter:*">` tags.
pub fn parse_twitter_card(content: &QueryableHtmlContent) -> TwitterCard {
    let mut card = TwitterCard::default();
    for (key, value) in content.meta_matching("name", "twitter:") {
        match key.as_str() {
            "twitter:title" => card.title = Some(value),
            "twitter:description" => card.description = Some(value),
            "twitter:image" => card.image_url = Some(value),
            "twitter:site" => card.site = Some(value),
            "twitter:creator" => card.creator = Some(value),
            _ => {}
        }
    }
    card
}

pub fn parse_social_graph(content: &QueryableHtmlContent) -> SocialGraph {
    let og = parse_open_graph(content);
    let twitter = parse_twitter_card(content);
    SocialGraph {
        open_graph: (!og.is_empty()).then_some(og),
        twitter: (!twitter.is_empty()).then_some(twitter),
    }
}

/// Queryable content with a curated title and social graph.
#[derive(Debug, Clone)]
pub struct CuratableContent {
    pub queryable: QueryableHtmlContent,
    pub title: String,
    pub social_graph: SocialGraph,
    pub provenance: Option<Provenance<CuratableContent>>,
}

impl Derivable for CuratableContent {
    fn provenance(&self) -> Option<&Provenance<Self>> {
        self.provenance.as_ref()
    }

    fn provenance_mut(&mut self) -> &mut Option<Provenance<Self>> {
        &mut self.provenance
    }
}

/// Title precedence: `og:title`, then `twitter:title`, then `<head><title>`.
pub fn build_curatable_content(queryable: QueryableHtmlContent) -> CuratableContent {
    let social_graph = parse_social_graph(&queryable);
    let title = social_graph
        .open_graph
        .as_ref()
        .and_then(|og| og.title.clone())
        .or_else(|| social_graph.twitter.as_ref().and_then(|tc| tc.title.clone()))
        .unwrap_or_else(|| queryable.head_title());

    CuratableContent {
        queryable,
        title,
        social_graph,
        provenance: None,
    }
}

fn source_name_after_pipe() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches " | Healthcare IT News" in "xyz title | Healthcare IT News"
    RE.get_or_init(|| Regex::new(r" \| .*$").expect("valid title suffix regex"))
}

/// Strips a trailing `" | Source Name"` from the title.
///
/// Returns the content unchanged when there is nothing to strip, otherwise a
/// derived value whose provenance points at the original.
pub fn standardize_curation_title(content: CuratableContent) -> CuratableContent {
    let suggested = content.title.clone();
    let standardized = source_name_after_pipe().replace(&suggested, "").into_owned();
    if standardized == suggested {
        return content;
    }

    CuratableContent {
        queryable: content.queryable.clone(),
        title: standardized,
        social_graph: content.social_graph.clone(),
        provenance: Some(Provenance::derive(
            content,
            Some(format!("Standardized title (was \"{suggested}\")")),
        )),
    }
}

/// Stages of HTML enrichment.
#[derive(Debug, Clone)]
pub enum HtmlContent {
    /// Raw source, not yet HTML content.
    Source(HtmlSourceSupplier),
    Queryable(QueryableHtmlContent),
    Curatable(CuratableContent),
}

impl HtmlContent {
    pub fn source(&self) -> &HtmlSourceSupplier {
        match self {
            HtmlContent::Source(source) => source,
            HtmlContent::Queryable(queryable) => queryable.source(),
            HtmlContent::Curatable(curatable) => curatable.queryable.source(),
        }
    }

    pub fn is_html_content(&self) -> bool {
        !matches!(self, HtmlContent::Source(_))
    }

    /// Queryable view; curatable content is queryable too.
    pub fn queryable(&self) -> Option<&QueryableHtmlContent> {
        match self {
            HtmlContent::Source(_) => None,
            HtmlContent::Queryable(queryable) => Some(queryable),
            HtmlContent::Curatable(curatable) => Some(&curatable.queryable),
        }
    }

    pub fn curatable(&self) -> Option<&CuratableContent> {
        match self {
            HtmlContent::Curatable(curatable) => Some(curatable),
            _ => None,
        }
    }
}
