//! RSS and Atom decoding
//!
//! Handles RSS 2.0 (`<rss>`), RSS 1.0 (`<rdf:RDF>`) and Atom (`<feed>`)
//! documents with a streaming reader. Only the fields needed to list a feed
//! are kept.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("unrecognized feed root element <{0}>")]
    UnknownFormat(String),

    #[error("document has no root element")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedType {
    Rss2,
    Rss1,
    Atom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub feed_type: FeedType,
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub items: Vec<FeedItem>,
}

enum Field {
    Id,
    Title,
    Link,
    Summary,
    Published,
}

impl Field {
    fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "guid" | "id" => Some(Field::Id),
            "title" => Some(Field::Title),
            "link" => Some(Field::Link),
            "description" | "summary" | "subtitle" => Some(Field::Summary),
            "pubDate" | "published" | "updated" | "date" => Some(Field::Published),
            _ => None,
        }
    }
}

fn is_entry(name: &str) -> bool {
    name == "item" || name == "entry"
}

fn is_channel(name: &str) -> bool {
    name == "channel" || name == "feed"
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn append(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => existing.push_str(text),
        None => *slot = Some(text.to_string()),
    }
}

/// `href` of an Atom `<link>` when it points at the alternate representation.
fn atom_link_href(element: &BytesStart<'_>) -> Result<Option<String>, FeedError> {
    let attribute = |name: &str| -> Result<Option<String>, FeedError> {
        let Some(attr) = element
            .try_get_attribute(name)
            .map_err(|e| FeedError::Xml(e.to_string()))?
        else {
            return Ok(None);
        };
        let value = attr
            .unescape_value()
            .map_err(|e| FeedError::Xml(e.to_string()))?;
        Ok(Some(value.into_owned()))
    };

    let rel = attribute("rel")?;
    if rel.as_deref().is_some_and(|rel| rel != "alternate") {
        return Ok(None);
    }
    attribute("href")
}

#[derive(Default)]
struct FeedBuilder {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    items: Vec<FeedItem>,
    current: Option<FeedItem>,
}

impl FeedBuilder {
    fn slot(&mut self, field: Field, in_entry: bool) -> Option<&mut Option<String>> {
        if in_entry {
            let item = self.current.as_mut()?;
            return Some(match field {
                Field::Id => &mut item.id,
                Field::Title => &mut item.title,
                Field::Link => &mut item.url,
                Field::Summary => &mut item.summary,
                Field::Published => &mut item.published,
            });
        }
        match field {
            Field::Title => Some(&mut self.title),
            Field::Link => Some(&mut self.link),
            Field::Summary => Some(&mut self.description),
            Field::Id | Field::Published => None,
        }
    }

    fn link_href(&mut self, href: String, in_entry: bool) {
        let slot = if in_entry {
            match self.current.as_mut() {
                Some(item) => &mut item.url,
                None => return,
            }
        } else {
            &mut self.link
        };
        if slot.is_none() {
            *slot = Some(href);
        }
    }
}

/// Position of the innermost open element relative to the feed structure.
fn context(stack: &[String]) -> Option<(Field, bool)> {
    let (name, ancestors) = stack.split_last()?;
    let parent = ancestors.last()?;
    let field = Field::from_local_name(name)?;
    if is_entry(parent) {
        Some((field, true))
    } else if is_channel(parent) {
        Some((field, false))
    } else {
        None
    }
}

/// Decodes an RSS 2.0, RSS 1.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<Feed, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed_type = None;
    let mut stack: Vec<String> = Vec::new();
    let mut builder = FeedBuilder::default();

    loop {
        match reader
            .read_event()
            .map_err(|e| FeedError::Xml(e.to_string()))?
        {
            Event::Start(element) => {
                let name = local_name(&element);
                if feed_type.is_none() {
                    feed_type = Some(match name.as_str() {
                        "rss" => FeedType::Rss2,
                        "RDF" => FeedType::Rss1,
                        "feed" => FeedType::Atom,
                        other => return Err(FeedError::UnknownFormat(other.to_string())),
                    });
                }
                if is_entry(&name) {
                    builder.current = Some(FeedItem::default());
                }
                stack.push(name);
                if feed_type == Some(FeedType::Atom) && stack.last().is_some_and(|n| n == "link") {
                    if let (Some(href), Some((_, in_entry))) = (atom_link_href(&element)?, context(&stack)) {
                        builder.link_href(href, in_entry);
                    }
                }
            }
            Event::Empty(element) => {
                let name = local_name(&element);
                if name == "link" {
                    stack.push(name);
                    if let (Some(href), Some((_, in_entry))) = (atom_link_href(&element)?, context(&stack)) {
                        builder.link_href(href, in_entry);
                    }
                    stack.pop();
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| FeedError::Xml(e.to_string()))?;
                if let Some((field, in_entry)) = context(&stack) {
                    if let Some(slot) = builder.slot(field, in_entry) {
                        append(slot, &text);
                    }
                }
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = String::from_utf8_lossy(&bytes);
                if let Some((field, in_entry)) = context(&stack) {
                    if let Some(slot) = builder.slot(field, in_entry) {
                        append(slot, text.trim());
                    }
                }
            }
            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    if is_entry(&name) {
                        if let Some(item) = builder.current.take() {
                            builder.items.push(item);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let feed_type = feed_type.ok_or(FeedError::Empty)?;
    Ok(Feed {
        feed_type,
        title: builder.title,
        link: builder.link,
        description: builder.description,
        items: builder.items,
    })
}
