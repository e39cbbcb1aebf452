//! Picks which CDN rendition of an emote to download.

use std::fmt;

use clap::ValueEnum;

use crate::seventv_api::{Emote, HostFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scale {
    #[value(name = "1x")]
    X1,
    #[value(name = "2x")]
    X2,
    #[value(name = "3x")]
    X3,
    #[value(name = "4x")]
    X4,
}

impl Scale {
    pub fn as_str(self) -> &'static str {
        match self {
            Scale::X1 => "1x",
            Scale::X2 => "2x",
            Scale::X3 => "3x",
            Scale::X4 => "4x",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

const ANIMATED_PRIORITY: &[&str] = &["gif", "webp", "avif"];
const STATIC_PRIORITY: &[&str] = &["png", "webp", "avif"];

/// Chooses the best file for `scale`: an exact `<scale>.<format>` match in
/// format priority order, then anything starting with the scale, then the
/// last file listed. Returns `None` only when the emote has no files.
pub fn select_variant(emote: &Emote, scale: Scale) -> (Option<&HostFile>, bool) {
    let animated = emote.is_animated();
    let files = emote.files();
    let scale = scale.as_str();

    let priority = if animated {
        ANIMATED_PRIORITY
    } else {
        STATIC_PRIORITY
    };

    let exact = priority.iter().find_map(|format| {
        let wanted = format!("{}.{}", scale, format);
        files
            .iter()
            .find(|file| file.name.eq_ignore_ascii_case(&wanted))
    });

    let selected = exact
        .or_else(|| {
            files
                .iter()
                .find(|file| file.name.to_ascii_lowercase().starts_with(scale))
        })
        .or_else(|| files.last());

    (selected, animated)
}

/// Joins an emote's host URL and a file name, upgrading protocol-relative
/// hosts to https. `None` when there is no host to join onto.
pub fn build_cdn_url(host_url: &str, file_name: &str) -> Option<String> {
    let base = match host_url.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => host_url.to_owned(),
    };

    if base.is_empty() {
        return None;
    }

    if base.ends_with('/') {
        Some(format!("{}{}", base, file_name))
    } else {
        Some(format!("{}/{}", base, file_name))
    }
}

/// A file chosen for an emote, ready to download.
#[derive(Debug)]
pub struct ResolvedAsset<'a> {
    pub emote: &'a Emote,
    pub file: &'a HostFile,
    pub animated: bool,
    pub url: String,
}
