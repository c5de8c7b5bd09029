use std::path::PathBuf;

use crate::prelude::{eprintln, println, *};
use colored::Colorize;
use traversal::download::DownloadInspector;
use traversal::favicon::FavIconInspector;
use traversal::json::JsonContentInspector;
use traversal::rss::RssContentInspector;
use traversal::summary::TraversalSummary;
use traversal::traverse::{default_inspectors, traverse, TraverseContext};
use traversal_core::inspect::Inspected;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// URL to traverse
    #[clap(env = "TRAVERSE_URL")]
    url: String,

    /// Label to attach to the request (line breaks are cleaned up)
    #[arg(short, long)]
    label: Option<String>,

    /// Also probe /favicon.ico at the site's origin
    #[arg(long)]
    favicon: bool,

    /// Save the content into this directory
    #[arg(long, value_name = "DIR")]
    download: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let mut ctx = TraverseContext::with_options(options.url.clone(), global.options());
    if let Some(label) = options.label {
        ctx = ctx.label(label);
    }

    let mut pipe = default_inspectors()
        .then(JsonContentInspector)
        .then(RssContentInspector::default());
    if options.favicon {
        pipe = pipe.then(FavIconInspector::default());
    }
    if let Some(dir) = options.download {
        pipe = pipe.then(DownloadInspector::new(dir));
    }

    if global.verbose {
        eprintln!("Traversing {} with {} inspectors", ctx.request, pipe.len());
    }

    let result = traverse(&ctx, &pipe).await;
    let summary = TraversalSummary::from(&result);

    if options.json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }

    if result.is_exception() {
        return Err(eyre!("Traversal of {} failed", options.url));
    }
    Ok(())
}

fn print_summary(summary: &TraversalSummary) {
    let stage = match summary.stage {
        "unsuccessful" | "issue" | "invalid-http-status" => summary.stage.red().bold(),
        _ => summary.stage.green().bold(),
    };
    println!("\n{} {}\n", stage, summary.request);

    let mut table = new_table();
    if let Some(label) = &summary.label {
        table.add_row(prettytable::row!["Label", label]);
    }
    if let Some(url) = &summary.terminal_url {
        table.add_row(prettytable::row!["Terminal URL", url]);
    }
    if let Some(status) = summary.http_status {
        table.add_row(prettytable::row!["HTTP status", status]);
    }
    if let Some(content_type) = &summary.content_type {
        table.add_row(prettytable::row!["Content-Type", content_type]);
    }
    if let Some(title) = &summary.title {
        table.add_row(prettytable::row!["Title", title]);
    }
    if let Some(url) = &summary.content_redirect_url {
        table.add_row(prettytable::row!["Meta refresh", url]);
    }
    if let Some(items) = summary.feed_items {
        table.add_row(prettytable::row!["Feed items", items]);
    }
    if let Some(icon) = &summary.fav_icon {
        let found = icon
            .http_status
            .map(|status| f!("{} (HTTP {status})", icon.request))
            .unwrap_or_else(|| f!("{} ({})", icon.request, icon.stage));
        table.add_row(prettytable::row!["Favicon", found]);
    }
    if let Some(download) = &summary.download {
        table.add_row(prettytable::row!["Download", f!("{download:?}")]);
    }
    table.printstd();

    if !summary.provenance.is_empty() {
        println!("\n{}", "Derived from:".bold());
        for remarks in &summary.provenance {
            println!("  - {remarks}");
        }
    }
    for diagnostic in &summary.diagnostics {
        println!("{} {diagnostic}", "issue:".yellow().bold());
    }
    if let Some(exception) = &summary.exception {
        println!("{} {exception}", "error:".red().bold());
    }
}
