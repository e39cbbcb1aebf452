//! Typed views of the 7TV v3 API responses. Every field the API is known to
//! omit or send as `null` is optional or defaulted here, so nothing further
//! down has to poke at loose JSON.

use serde::{Deserialize, Deserializer};

/// Treats an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub emote_set: Option<EmoteSetRef>,

    #[serde(default, deserialize_with = "nullable")]
    pub connections: Vec<Connection>,
}

impl UserProfile {
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.username).or_else(|| non_empty(&self.display_name))
    }

    /// The user's active emote set, falling back to the first connection
    /// that carries one.
    pub fn emote_set_id(&self) -> Option<&str> {
        self.emote_set
            .as_ref()
            .and_then(|set| non_empty(&set.id))
            .or_else(|| {
                self.connections
                    .iter()
                    .find_map(|connection| non_empty(&connection.emote_set_id))
            })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmoteSetRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub emote_set_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,
}

impl Owner {
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.username).or_else(|| non_empty(&self.display_name))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmoteSet {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub owner: Option<Owner>,

    #[serde(default)]
    pub user: Option<Owner>,

    /// Order matters: it is the order emotes are processed and logged in.
    #[serde(default, deserialize_with = "nullable")]
    pub emotes: Vec<Emote>,
}

impl EmoteSet {
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner
            .as_ref()
            .or(self.user.as_ref())
            .and_then(Owner::name)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Emote {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub data: EmoteData,
}

impl Emote {
    pub fn display_name(&self) -> &str {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.data.name))
            .or_else(|| Some(self.id.as_str()).filter(|id| !id.is_empty()))
            .unwrap_or("emote")
    }

    pub fn is_animated(&self) -> bool {
        self.data.animated
    }

    pub fn host_url(&self) -> Option<&str> {
        non_empty(&self.data.host.url)
    }

    pub fn files(&self) -> &[HostFile] {
        &self.data.host.files
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmoteData {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub animated: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub host: Host,
}

#[derive(Debug, Default, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub files: Vec<HostFile>,
}

/// One encoded rendition of an emote on the CDN, e.g. `2x.webp`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HostFile {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

impl HostFile {
    #[cfg(test)]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Lowercased extension taken from the file name.
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((_, extension)) => extension.to_ascii_lowercase(),
            None => self.name.to_ascii_lowercase(),
        }
    }
}
