//! RFC 8288 `Link` header parsing
//!
//! See <https://tools.ietf.org/html/rfc8288>. Parsing is best effort: a
//! component that cannot be parsed is counted in [`WebLinks::errors`] and the
//! remaining components are still parsed.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

/// A single target/relation pair from a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebLink {
    pub target_iri: Url,
    /// See <https://www.iana.org/assignments/link-relations/link-relations.xhtml>
    pub relation_type: String,
    /// Query-string parameters of the target followed by the link parameters.
    pub params: BTreeMap<String, String>,
}

/// Result of parsing a `Link` header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WebLinks {
    pub source: String,
    pub is_empty: bool,
    pub errors: usize,
    /// `None` unless at least one link parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Vec<WebLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<WebLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<WebLink>,
    /// Set by either `prev` or `previous`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<WebLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<WebLink>,
}

impl WebLinks {
    /// First parsed link with the given relation type.
    ///
    /// Always `None` when nothing parsed.
    pub fn relation_type(&self, rel: &str) -> Option<&WebLink> {
        self.parsed
            .as_ref()?
            .iter()
            .find(|link| link.relation_type == rel)
    }

    /// True when `first`, `next`, `previous` and `last` are all present.
    pub fn is_pagination_suite(&self) -> bool {
        self.first.is_some() && self.next.is_some() && self.previous.is_some() && self.last.is_some()
    }
}

fn component_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*<").expect("valid link separator regex"))
}

fn component_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<?([^>]*)>(.*)").expect("valid link component regex"))
}

fn param_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|([^\s";,]+))"#).expect("valid link param regex")
    })
}

/// Parses the value of an RFC 8288 `Link` header.
pub fn parse_rfc8288_link_header(text: &str) -> WebLinks {
    if text.trim().is_empty() {
        return WebLinks {
            source: text.to_string(),
            is_empty: true,
            ..WebLinks::default()
        };
    }

    let mut links = WebLinks {
        source: text.to_string(),
        ..WebLinks::default()
    };
    let mut parsed = Vec::new();

    for component in component_separator().split(text) {
        let Some(link_params) = parse_component(component) else {
            links.errors += 1;
            continue;
        };
        let (target_iri, params) = link_params;
        let Some(rels) = params.get("rel").cloned() else {
            continue;
        };

        for rel in rels.split_whitespace() {
            let link = WebLink {
                target_iri: target_iri.clone(),
                relation_type: rel.to_string(),
                params: params.clone(),
            };
            match rel {
                "next" => links.next = Some(link.clone()),
                "prev" | "previous" => links.previous = Some(link.clone()),
                "first" => links.first = Some(link.clone()),
                "last" => links.last = Some(link.clone()),
                _ => {}
            }
            parsed.push(link);
        }
    }

    links.is_empty = parsed.is_empty();
    if !parsed.is_empty() {
        links.parsed = Some(parsed);
    }
    links
}

fn parse_component(component: &str) -> Option<(Url, BTreeMap<String, String>)> {
    let captures = component_pattern().captures(component)?;
    let target_iri = Url::parse(captures.get(1)?.as_str().trim()).ok()?;

    let mut params: BTreeMap<String, String> = target_iri
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let rest = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    if let Some((_, link_params)) = rest.split_once(';') {
        for param in param_pattern().captures_iter(link_params) {
            let value = param.get(2).or_else(|| param.get(3));
            if let (Some(key), Some(value)) = (param.get(1), value) {
                params.insert(key.as_str().to_string(), value.as_str().to_string());
            }
        }
    }

    Some((target_iri, params))
}
