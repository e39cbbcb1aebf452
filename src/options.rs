use std::time::Duration;

use clap::Parser;

use crate::commands::Command;
use crate::seventv_api::DEFAULT_API_BASE;

#[derive(Debug, Parser)]
#[clap(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Options {
    #[command(flatten)]
    pub global: Global,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Parser)]
pub struct Global {
    /// The base URL of the 7TV REST API. Useful for pointing at a mirror.
    #[clap(
        long,
        global(true),
        env("SEVENTV_API_BASE"),
        default_value(DEFAULT_API_BASE)
    )]
    pub api_base: String,

    /// Timeout for each HTTP request, in seconds.
    #[clap(long, global(true), default_value_t = 20)]
    pub timeout: u64,

    /// Sets verbosity level. Can be specified multiple times to increase the verbosity
    /// of this program.
    #[clap(long = "verbose", short, global(true), action(clap::ArgAction::Count))]
    pub verbosity: u8,
}

impl Global {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
