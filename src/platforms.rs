//! Platform catalog and OAuth provider resolution.
//!
//! Platforms are the social networks shown to the user. Some of them log in
//! through an OAuth provider hosted by the identity service (YouTube through
//! `google`, Instagram through `facebook`); the rest are connected manually
//! with API keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized join key for a platform: the trimmed, lowercased name.
///
/// Used everywhere a platform is matched across the catalog and the two
/// connection origins, so "YouTube" and "youtube" refer to the same row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformKey(String);

impl PlatformKey {
    /// Normalizes a platform name. Returns `None` for blank names.
    pub fn new(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static presentation data for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlatformDefinition {
    pub name: String,
    pub icon_ref: String,
    pub color_tag: String,
}

impl PlatformDefinition {
    pub fn new(name: &str, icon_ref: &str, color_tag: &str) -> Self {
        Self {
            name: name.to_string(),
            icon_ref: icon_ref.to_string(),
            color_tag: color_tag.to_string(),
        }
    }

    pub fn key(&self) -> Option<PlatformKey> {
        PlatformKey::new(&self.name)
    }
}

/// Built-in catalog, in display order. Seeded into the `platforms` table and
/// used as a fallback when the table cannot be read.
pub fn default_platforms() -> Vec<PlatformDefinition> {
    vec![
        PlatformDefinition::new("YouTube", "/assets/youtube.svg", "bg-red-500"),
        PlatformDefinition::new("Instagram", "/assets/instagram.svg", "bg-pink-500"),
        PlatformDefinition::new("TikTok", "/assets/tiktok.svg", "bg-black"),
        PlatformDefinition::new("Facebook", "/assets/facebook.svg", "bg-blue-600"),
        PlatformDefinition::new("Twitter/X", "/assets/twitter.svg", "bg-sky-500"),
        PlatformDefinition::new("LinkedIn", "/assets/linkedin.svg", "bg-blue-700"),
    ]
}

/// OAuth provider identifiers understood by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Google,
    Facebook,
    Twitter,
    LinkedinOidc,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Google => "google",
            ProviderId::Facebook => "facebook",
            ProviderId::Twitter => "twitter",
            ProviderId::LinkedinOidc => "linkedin_oidc",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderId::Google),
            "facebook" => Ok(ProviderId::Facebook),
            "twitter" => Ok(ProviderId::Twitter),
            "linkedin_oidc" => Ok(ProviderId::LinkedinOidc),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Maps a platform display name to the OAuth provider that backs its login.
///
/// Matching is exact on the canonical names; anything else (including
/// differently cased names) returns `None` and goes down the manual API-key
/// path.
pub fn resolve_provider(platform_name: &str) -> Option<ProviderId> {
    match platform_name {
        "YouTube" | "Google" => Some(ProviderId::Google),
        "Facebook" | "Instagram" => Some(ProviderId::Facebook),
        "Twitter" | "Twitter/X" => Some(ProviderId::Twitter),
        "LinkedIn" => Some(ProviderId::LinkedinOidc),
        _ => None,
    }
}
