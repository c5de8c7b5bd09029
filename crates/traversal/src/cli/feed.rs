use crate::prelude::{eprintln, println, *};
use colored::Colorize;
use traversal::rss::{RssContentInspector, DEFAULT_FEED_MIME_TYPES};
use traversal::traverse::{traverse, HttpStatusInspector, TraversalPipe, TraverseContext};
use traversal_core::inspect::Inspected;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Feed URL
    #[clap(env = "TRAVERSE_FEED_URL")]
    url: String,

    /// Number of items to show
    #[arg(short, long, default_value = "20")]
    limit: usize,

    /// Additional Content-Type prefix to decode as a feed (repeatable)
    #[arg(long = "mime-type", value_name = "PREFIX")]
    mime_types: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let ctx = TraverseContext::with_options(options.url.clone(), global.options());
    let mime_types = DEFAULT_FEED_MIME_TYPES
        .iter()
        .map(|m| m.to_string())
        .chain(options.mime_types);
    let pipe = TraversalPipe::new()
        .then(HttpStatusInspector)
        .then(RssContentInspector::new(mime_types));

    let result = traverse(&ctx, &pipe).await;
    let Some(rss) = result.rss_content() else {
        let reason = result
            .diagnostics()
            .map(|d| d.to_string())
            .or_else(|| result.exception().map(|e| e.to_string()))
            .unwrap_or_else(|| {
                f!(
                    "unexpected Content-Type {:?}",
                    result.content().map(|c| c.content_type.as_str()).unwrap_or("")
                )
            });
        return Err(eyre!("{} is not a feed: {reason}", options.url));
    };

    if options.json {
        return print_json(&rss.feed);
    }

    let title = rss.feed.title.as_deref().unwrap_or("Untitled feed");
    println!("\n{} ({} items)\n", title.bold(), rss.feed.items.len());

    let mut table = new_table();
    table.add_row(prettytable::row!["Published", "Title", "URL"]);
    for item in rss.feed.items.iter().take(options.limit) {
        table.add_row(prettytable::row![
            item.published.as_deref().unwrap_or("-"),
            item.title.as_deref().unwrap_or("-"),
            item.url.as_deref().unwrap_or("-")
        ]);
    }
    table.printstd();

    if global.verbose {
        eprintln!("Feed type: {:?}", rss.feed.feed_type);
    }
    Ok(())
}
