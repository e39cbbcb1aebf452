use std::path::PathBuf;

use clap::Args;

use crate::{
    options::Global,
    pipeline::{self, PipelineConfig, DEFAULT_ITEM_DELAY},
    seventv_api::ApiClient,
    variant::Scale,
};

#[derive(Debug, Args)]
pub struct DownloadOptions {
    /// A 7TV user or emote set URL, like https://7tv.app/users/<id> or
    /// https://7tv.app/emote-sets/<id>.
    pub url: String,

    /// The scale to download.
    #[clap(long, value_enum, default_value_t = Scale::X2)]
    pub scale: Scale,

    /// Save files exactly as the CDN serves them instead of converting to
    /// PNG or GIF.
    #[clap(long)]
    pub no_convert: bool,

    /// The directory to write to. Defaults to a name derived from the user or
    /// emote set.
    #[clap(long)]
    pub out: Option<PathBuf>,
}

pub async fn download(global: Global, options: DownloadOptions) -> anyhow::Result<()> {
    let api = ApiClient::new(&global.api_base, global.timeout())?;

    let config = PipelineConfig {
        url: options.url,
        scale: options.scale,
        convert: !options.no_convert,
        output_dir: options.out,
        item_delay: DEFAULT_ITEM_DELAY,
    };

    pipeline::run(&api, &config).await?;

    Ok(())
}
