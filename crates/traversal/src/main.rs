use std::time::Duration;

use crate::prelude::*;
use clap::Parser;
use traversal::traverse::TraverseOptions;

mod cli;
mod prelude;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Fetch a resource and inspect what came back"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Seconds to wait for a response; 0 waits forever
    #[clap(long, env = "TRAVERSE_TIMEOUT", global = true, default_value = "30")]
    timeout: u64,

    /// Maximum number of meta refresh redirects to follow
    #[clap(long, env = "TRAVERSE_MAX_REDIRECTS", global = true, default_value = "5")]
    max_redirects: usize,

    /// Keep utm_* tracking parameters in request and terminal URLs
    #[clap(long, global = true)]
    keep_tracking_codes: bool,

    /// Whether to display additional information.
    #[clap(long, env = "TRAVERSE_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    pub fn options(&self) -> TraverseOptions {
        let timeout = (self.timeout > 0).then(|| Duration::from_secs(self.timeout));
        let options = TraverseOptions::default()
            .with_timeout(timeout)
            .with_max_redirect_depth(self.max_redirects);

        if self.keep_tracking_codes {
            options.with_ri_inspector(None).with_turl_inspector(None)
        } else {
            options
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Traverse a URL with the default inspectors
    Fetch(crate::cli::fetch::Options),

    /// Parse an RFC 8288 Link header
    Links(crate::cli::links::Options),

    /// List the items of an RSS or Atom feed
    Feed(crate::cli::feed::Options),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Fetch(options) => crate::cli::fetch::run(options, app.global).await,
        SubCommands::Links(options) => crate::cli::links::run(options, app.global).await,
        SubCommands::Feed(options) => crate::cli::feed::run(options, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
