pub mod feed;
pub mod fetch;
pub mod links;
