//! Turns a 7TV URL into the id of the emote set it refers to.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::seventv_api::{error_chain, ApiClient, FetchError, UserProfile};

lazy_static! {
    static ref EMOTE_SET_PATH: Regex = Regex::new(r"/emote-sets/([A-Za-z0-9]+)").unwrap();
    static ref USER_PATH: Regex = Regex::new(r"/users/([A-Za-z0-9]+)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    User,
    EmoteSet,
}

/// The id captured from an input URL, before any lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    pub kind: SourceKind,
    pub id: String,
}

/// Where the emote set came from and what it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub source: SourceId,
    pub set_id: String,
    pub user_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("could not find /emote-sets/<id> or /users/<id> in {0:?}")]
    UnrecognizedUrl(String),

    #[error("could not determine the emote set for user {user_id}")]
    NoEmoteSet {
        user_id: String,
        #[source]
        last: ProfileLookupError,
    },
}

#[derive(Debug, Error)]
pub enum ProfileLookupError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("profile at {0} has no emote set")]
    MissingEmoteSet(String),
}

/// One place a user's profile can be looked up. Endpoints are tried in
/// order; the first that produces an emote set id wins.
struct ProfileEndpoint {
    url: fn(base: &str, user_id: &str) -> String,
}

const PROFILE_ENDPOINTS: &[ProfileEndpoint] = &[
    ProfileEndpoint {
        url: |base, user_id| format!("{}/users/{}", base, user_id),
    },
    ProfileEndpoint {
        url: |base, user_id| format!("{}/users/7tv/{}", base, user_id),
    },
];

impl ProfileEndpoint {
    async fn lookup(
        &self,
        api: &ApiClient,
        user_id: &str,
    ) -> Result<(Option<String>, String), ProfileLookupError> {
        let url = (self.url)(api.base(), user_id);
        let profile: UserProfile = api.get_json(&url).await?;

        match profile.emote_set_id() {
            Some(set_id) => Ok((profile.name().map(str::to_owned), set_id.to_owned())),
            None => Err(ProfileLookupError::MissingEmoteSet(url)),
        }
    }
}

/// Extracts the emote set or user id from a URL. Emote set paths take
/// precedence over user paths.
pub fn parse_source(url: &str) -> Result<SourceId, ResolutionError> {
    let patterns = [
        (SourceKind::EmoteSet, &*EMOTE_SET_PATH),
        (SourceKind::User, &*USER_PATH),
    ];

    patterns
        .iter()
        .find_map(|(kind, pattern)| {
            pattern.captures(url).map(|captures| SourceId {
                kind: *kind,
                id: captures[1].to_owned(),
            })
        })
        .ok_or_else(|| ResolutionError::UnrecognizedUrl(url.to_owned()))
}

pub async fn resolve(api: &ApiClient, url: &str) -> Result<Resolved, ResolutionError> {
    let source = parse_source(url)?;

    match source.kind {
        SourceKind::EmoteSet => Ok(Resolved {
            set_id: source.id.clone(),
            source,
            user_name: None,
        }),
        SourceKind::User => {
            let (user_name, set_id) = resolve_user(api, &source.id).await?;
            Ok(Resolved {
                source,
                set_id,
                user_name,
            })
        }
    }
}

async fn resolve_user(
    api: &ApiClient,
    user_id: &str,
) -> Result<(Option<String>, String), ResolutionError> {
    let mut last = None;

    for endpoint in PROFILE_ENDPOINTS {
        match endpoint.lookup(api, user_id).await {
            Ok(found) => return Ok(found),
            Err(err) => {
                log::debug!("profile lookup failed: {}", error_chain(&err));
                last = Some(err);
            }
        }
    }

    Err(ResolutionError::NoEmoteSet {
        user_id: user_id.to_owned(),
        last: last.unwrap_or_else(|| ProfileLookupError::MissingEmoteSet(user_id.to_owned())),
    })
}
