use std::io::{self, BufWriter, Write};

use clap::Args;

use crate::{
    options::Global,
    pipeline::{load_collection, locate},
    seventv_api::ApiClient,
    variant::Scale,
};

#[derive(Debug, Args)]
pub struct ListOptions {
    /// A 7TV user or emote set URL.
    pub url: String,

    /// The scale to pick files for.
    #[clap(long, value_enum, default_value_t = Scale::X2)]
    pub scale: Scale,
}

pub async fn list(global: Global, options: ListOptions) -> anyhow::Result<()> {
    let api = ApiClient::new(&global.api_base, global.timeout())?;
    let collection = load_collection(&api, &options.url).await?;

    log::info!(
        "Emote set: {} ({} emotes)",
        collection.title(),
        collection.set.emotes.len()
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for emote in &collection.set.emotes {
        let kind = if emote.is_animated() {
            "animated"
        } else {
            "static"
        };

        match locate(emote, options.scale) {
            Ok(asset) => writeln!(out, "{}\t{}\t{}", emote.display_name(), kind, asset.url)?,
            Err(reason) => {
                log::debug!("{}: {}", emote.display_name(), reason);
                writeln!(out, "{}\t{}\t-", emote.display_name(), kind)?
            }
        }
    }

    out.flush()?;

    Ok(())
}
