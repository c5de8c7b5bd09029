//! Core library for traversal
//!
//! This crate implements the **Functional Core** of the traversal toolkit,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`traversal_core`** (this crate): Pure parsing and transformation functions with zero I/O
//! - **`traversal`**: Fetching, the inspection pipe and the CLI (the Imperative Shell)
//!
//! Nothing here touches the network or the filesystem. Every function takes
//! already-fetched text (a header value, an HTML document, a feed) and returns
//! structured data, so tests run against fixture strings.
//!
//! # Module Organization
//!
//! - [`inspect`]: Inspection result model (targets, results, issues, exceptions)
//! - [`provenance`]: Backward chains of the snapshots a value was derived from
//! - [`content`]: Content-Type predicates and Content-Disposition parameters
//! - [`web_link`]: RFC 8288 `Link` header parsing
//! - [`redirect`]: Meta-refresh extraction, tracking-code removal, label clean-up
//! - [`html`]: Queryable and curatable HTML content
//! - [`feed`]: RSS and Atom decoding
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use traversal_core::web_link::parse_rfc8288_link_header;
//!
//! let links = parse_rfc8288_link_header(r#"<https://x/?page=2>; rel="next""#);
//! assert_eq!(links.next.unwrap().target_iri.query(), Some("page=2"));
//! ```

pub mod content;
pub mod feed;
pub mod html;
pub mod inspect;
pub mod provenance;
pub mod redirect;
pub mod web_link;
