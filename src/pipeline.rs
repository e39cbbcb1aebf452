//! Resolve, fetch the emote set, then download and convert each emote in
//! order.
//!
//! Failures before the first emote is processed abort the run. After that,
//! every failure is confined to its emote: it is logged, counted as a skip,
//! and the run moves on.

use std::{
    collections::HashSet,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use fs_err as fs;
use log::{info, warn};
use thiserror::Error;

use crate::{
    asset_name::{disambiguate, file_name, output_dir, unconverted_file_name},
    convert::{convert, Conversion, TargetFormat},
    resolve::{resolve, Resolved},
    seventv_api::{error_chain, ApiClient, Emote, EmoteSet, FetchError},
    variant::{build_cdn_url, select_variant, ResolvedAsset, Scale},
};

/// Pause after each emote to keep the request rate polite.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub url: String,
    pub scale: Scale,
    pub convert: bool,
    pub output_dir: Option<PathBuf>,
    pub item_delay: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub saved: usize,
    pub skipped: usize,
}

/// A resolved emote set, fetched once per run.
#[derive(Debug)]
pub struct Collection {
    pub resolved: Resolved,
    pub set: EmoteSet,
}

impl Collection {
    pub fn title(&self) -> &str {
        self.set.name().unwrap_or(&self.resolved.set_id)
    }
}

#[derive(Debug, Error)]
enum Skip {
    #[error("missing host url")]
    MissingHost,

    #[error("no file available at scale {0}")]
    NoFile(Scale),

    #[error("invalid CDN URL")]
    BadCdnUrl,

    #[error("download failed")]
    Download(#[from] FetchError),

    #[error("could not write file")]
    Write(#[from] io::Error),
}

/// What ends up on disk for one emote.
#[derive(Debug)]
struct Prepared {
    file_name: String,
    bytes: Vec<u8>,
    note: Option<String>,
}

/// The fatal part of a run: find the emote set and fetch it.
pub async fn load_collection(api: &ApiClient, url: &str) -> anyhow::Result<Collection> {
    let resolved = resolve(api, url).await?;

    let set = api
        .emote_set(&resolved.set_id)
        .await
        .with_context(|| format!("failed to fetch emote set {}", resolved.set_id))?;

    Ok(Collection { resolved, set })
}

/// Picks the file to download for an emote and where it lives on the CDN.
pub fn locate(emote: &Emote, scale: Scale) -> Result<ResolvedAsset<'_>, SkipReason> {
    let host = emote.host_url().ok_or(SkipReason(Skip::MissingHost))?;

    let (file, animated) = select_variant(emote, scale);
    let file = file.ok_or(SkipReason(Skip::NoFile(scale)))?;

    let url = build_cdn_url(host, &file.name).ok_or(SkipReason(Skip::BadCdnUrl))?;

    Ok(ResolvedAsset {
        emote,
        file,
        animated,
        url,
    })
}

/// Why an emote was skipped, for display.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct SkipReason(Skip);

pub async fn run(api: &ApiClient, config: &PipelineConfig) -> anyhow::Result<Summary> {
    let collection = load_collection(api, &config.url).await?;

    let out_dir = output_dir(
        config.output_dir.as_deref(),
        &collection.resolved,
        &collection.set,
    );
    fs::create_dir_all(&out_dir)?;

    let emotes = &collection.set.emotes;
    if emotes.is_empty() {
        info!("No emotes found in this set.");
        return Ok(Summary::default());
    }

    info!("Emote set: {} ({} emotes)", collection.title(), emotes.len());
    if let Some(owner) = collection.set.owner_name() {
        info!("Owner: {}", owner);
    }
    info!("Output directory: {}", fs::canonicalize(&out_dir)?.display());

    let mut summary = Summary::default();
    let mut taken = HashSet::new();

    for emote in emotes {
        let name = emote.display_name();

        match process_emote(api, config, &out_dir, &mut taken, emote).await {
            Ok((file_name, note)) => {
                summary.saved += 1;
                match note {
                    Some(note) => info!("+ {}: {} ({})", name, file_name, note),
                    None => info!("+ {}: {}", name, file_name),
                }
            }
            Err(skip) => {
                summary.skipped += 1;
                warn!("- {}: {}, skipped", name, error_chain(&skip));
            }
        }

        tokio::time::sleep(config.item_delay).await;
    }

    info!(
        "Done: {} files saved, {} skipped.",
        summary.saved, summary.skipped
    );

    Ok(summary)
}

/// Downloads, converts and writes one emote, returning the file name it
/// was saved under and an optional note for the log.
async fn process_emote(
    api: &ApiClient,
    config: &PipelineConfig,
    out_dir: &Path,
    taken: &mut HashSet<String>,
    emote: &Emote,
) -> Result<(String, Option<String>), Skip> {
    let asset = locate(emote, config.scale).map_err(|SkipReason(skip)| skip)?;
    let blob = api.download(&asset.url).await?;

    let Prepared {
        file_name,
        bytes,
        note,
    } = prepare(&asset, config.scale, config.convert, blob);

    let file_name = claim_name(taken, file_name, config.scale, emote);
    write_atomic(&out_dir.join(&file_name), &bytes)?;

    Ok((file_name, note))
}

/// Reserves a file name for this run. Names another emote already took are
/// tagged with the emote id, so emotes like `Pog!` and `Pog?` both survive.
fn claim_name(
    taken: &mut HashSet<String>,
    file_name: String,
    scale: Scale,
    emote: &Emote,
) -> String {
    if taken.insert(file_name.clone()) {
        return file_name;
    }

    let mut attempt = 1;
    loop {
        let tag = match attempt {
            1 => emote.id.clone(),
            _ => format!("{}_{}", emote.id, attempt),
        };

        let candidate = disambiguate(&file_name, scale, &tag);
        if taken.insert(candidate.clone()) {
            warn!(
                "{} is already used by another emote, saving as {}",
                file_name, candidate
            );
            return candidate;
        }

        attempt += 1;
    }
}

/// Decides the output name and contents. Files already in the canonical
/// format for their kind are stored without decoding.
fn prepare(asset: &ResolvedAsset, scale: Scale, should_convert: bool, blob: Vec<u8>) -> Prepared {
    let name = asset.emote.display_name();
    let extension = asset.file.extension();

    if !should_convert {
        return Prepared {
            file_name: file_name(name, scale, &extension),
            bytes: blob,
            note: Some("no conversion".to_owned()),
        };
    }

    let target = TargetFormat::for_animated(asset.animated);
    if extension == target.extension() {
        return Prepared {
            file_name: file_name(name, scale, &extension),
            bytes: blob,
            note: None,
        };
    }

    match convert(&blob, asset.animated, target) {
        Conversion::Converted {
            bytes,
            format,
            frames,
        } => {
            let note = match format {
                TargetFormat::Gif => format!(
                    "converted from {}, {} frames",
                    extension.to_uppercase(),
                    frames
                ),
                TargetFormat::Png => format!("converted from {}", extension.to_uppercase()),
            };

            Prepared {
                file_name: file_name(name, scale, format.extension()),
                bytes,
                note: Some(note),
            }
        }
        Conversion::Verbatim(reason) => Prepared {
            file_name: unconverted_file_name(name, scale, &extension),
            bytes: blob,
            note: Some(format!("original kept, {}", error_chain(&reason))),
        },
    }
}

/// Writes to a `.part` sibling first so an interrupted run never leaves a
/// truncated file under the final name.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut partial = OsString::from(path.as_os_str());
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, contents)?;
    fs::rename(&partial, path)
}
