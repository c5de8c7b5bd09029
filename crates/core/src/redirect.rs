//! Request and label rewriting used around a fetch: HTML meta-refresh
//! detection, tracking-parameter removal and label clean-up.

use std::sync::OnceLock;

use regex::Regex;

fn meta_refresh_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(CONTENT|content)=["']0;[ ]*(URL|url)=(.*?)(["']\s*>)"#)
            .expect("valid meta refresh regex")
    })
}

fn line_break_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r\n|\n|\r").expect("valid line break regex"))
}

/// Target of an immediate `<meta http-equiv="refresh" content="0;url=...">`.
pub fn extract_meta_refresh_url(html: &str) -> Option<String> {
    let captures = meta_refresh_pattern().captures(html)?;
    let url = captures.get(3)?.as_str().trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Removes every `utm_*` query parameter, keeping the rest of the URL intact.
///
/// Only the query is touched; the fragment and the encoding of the remaining
/// parameters are preserved as given.
pub fn remove_url_tracking_codes(url: &str) -> String {
    let (without_fragment, fragment) = match url.find('#') {
        Some(index) => url.split_at(index),
        None => (url, ""),
    };
    let Some((base, query)) = without_fragment.split_once('?') else {
        return url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("utm_"))
        .collect();

    if kept.is_empty() {
        format!("{base}{fragment}")
    } else {
        format!("{base}?{}{fragment}", kept.join("&"))
    }
}

/// Replaces line breaks with spaces and trims the result.
pub fn clean_label(label: &str) -> String {
    line_break_pattern().replace_all(label, " ").trim().to_string()
}
