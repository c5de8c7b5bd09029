//! Imperative shell of the traversal toolkit
//!
//! Fetches a resource through a [`transport::Transport`], classifies the
//! response and threads it through an [`inspect::InspectionPipe`] of
//! inspectors. Parsing and the inspection model live in `traversal_core`.
//!
//! ```rust,ignore
//! use traversal::traverse::{default_inspectors, traverse, TraverseContext};
//!
//! let ctx = TraverseContext::new("https://example.com/");
//! let result = traverse(&ctx, &default_inspectors()).await;
//! if let Some(html) = result.html_content() {
//!     println!("{:?}", html.html_content.curatable().map(|c| &c.title));
//! }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod favicon;
pub mod html;
pub mod inspect;
pub mod json;
pub mod rss;
pub mod summary;
pub mod transport;
pub mod traverse;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, TransportError, TraversalError};
