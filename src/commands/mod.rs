mod download;
mod list;

use clap::Subcommand;
pub use download::*;
pub use list::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Downloads every emote in a user's active emote set, or in the given
    /// emote set, converting them to PNG or GIF.
    Download(DownloadOptions),

    /// Prints the emotes in a set along with the CDN file that would be
    /// downloaded for each one, without downloading anything.
    List(ListOptions),
}
