//! File and directory names derived from emote and set names.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    resolve::{Resolved, SourceKind},
    seventv_api::EmoteSet,
    variant::Scale,
};

lazy_static! {
    static ref UNSAFE_RUN: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Marks files whose bytes were kept because they couldn't be converted.
const UNCONVERTED_MARKER: &str = "unconverted";

/// Maps every run of characters outside `[A-Za-z0-9._-]` to a single `_`,
/// trims underscores from the ends, and never returns an empty string.
pub fn sanitize(name: &str) -> String {
    let replaced = UNSAFE_RUN.replace_all(name, "_");
    let trimmed = replaced.trim_matches('_');

    if trimmed.is_empty() {
        "unnamed".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Chooses the directory a run writes into, unless one was given explicitly.
pub fn output_dir(explicit: Option<&Path>, resolved: &Resolved, set: &EmoteSet) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_owned();
    }

    let fallback = sanitize(&resolved.source.id);

    let name = match resolved.source.kind {
        SourceKind::User => match resolved.user_name.as_deref() {
            Some(user_name) => format!("7tv_{}", sanitize(user_name)),
            None => format!("7tv_user_{}", fallback),
        },
        SourceKind::EmoteSet => match set.name() {
            Some(set_name) => format!("7tv_set_{}", sanitize(set_name)),
            None => format!("7tv_set_{}", fallback),
        },
    };

    PathBuf::from(name)
}

pub fn file_name(emote_name: &str, scale: Scale, extension: &str) -> String {
    format!("{}_{}.{}", sanitize(emote_name), scale, extension)
}

/// Name for bytes stored as-is after a failed conversion. Distinct from any
/// name [`file_name`] produces, so it never clobbers a `--no-convert` file.
pub fn unconverted_file_name(emote_name: &str, scale: Scale, extension: &str) -> String {
    format!(
        "{}_{}.{}.{}",
        sanitize(emote_name),
        scale,
        UNCONVERTED_MARKER,
        extension
    )
}

/// Tags a file name with something unique to its emote, just before the
/// scale, for when two emote names sanitize to the same file.
pub fn disambiguate(file_name: &str, scale: Scale, tag: &str) -> String {
    let marker = format!("_{}.", scale);

    match file_name.rfind(&marker) {
        Some(index) => format!(
            "{}_{}{}",
            &file_name[..index],
            sanitize(tag),
            &file_name[index..]
        ),
        None => format!("{}_{}", sanitize(tag), file_name),
    }
}
