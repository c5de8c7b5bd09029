use crate::prelude::{eprintln, println, *};
use traversal_core::web_link::parse_rfc8288_link_header;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Value of an RFC 8288 Link header, e.g. '<https://api.test/?page=2>; rel="next"'
    header: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let links = parse_rfc8288_link_header(&options.header);

    if options.json {
        return print_json(&links);
    }

    if global.verbose {
        eprintln!("Parsing: {}", links.source);
    }

    let Some(parsed) = &links.parsed else {
        println!("No links found ({} malformed).", links.errors);
        return Ok(());
    };

    let mut table = new_table();
    table.add_row(prettytable::row!["Rel", "Target", "Params"]);
    for link in parsed {
        let params = link
            .params
            .iter()
            .map(|(key, value)| f!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(prettytable::row![
            &link.relation_type,
            link.target_iri.as_str(),
            params
        ]);
    }
    table.printstd();

    if links.errors > 0 {
        eprintln!("Skipped {} malformed link(s)", links.errors);
    }
    if links.is_pagination_suite() {
        println!("\nComplete pagination suite (first, previous, next, last).");
    }
    Ok(())
}
