//! OAuth redirect initiation.
//!
//! The hosted identity provider runs the OAuth handshake; this module only
//! builds the URL the browser is sent to.

use thiserror::Error;
use url::Url;

use crate::config::AppConfig;
use crate::platforms::ProviderId;

const MAX_AUTHORIZE_URL_LEN: usize = 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedirectError {
    #[error("invalid identity provider base url: {0}")]
    InvalidBase(String),
    #[error("generated authorization url must use https")]
    InsecureScheme,
    #[error("generated authorization url must not include a fragment")]
    Fragment,
    #[error("generated authorization url exceeds 2048 characters")]
    TooLong,
}

/// Starts OAuth handshakes.
pub trait OAuthRedirector: Send + Sync {
    fn authorize_url(&self, provider: ProviderId) -> Result<Url, RedirectError>;
}

/// Builds `{auth_base}/authorize?provider=<id>&redirect_to=<return url>`.
#[derive(Debug, Clone)]
pub struct IdentityProviderRedirector {
    auth_base: String,
    return_url: String,
    allow_http: bool,
}

impl IdentityProviderRedirector {
    pub fn new(auth_base: impl Into<String>, return_url: impl Into<String>) -> Self {
        Self {
            auth_base: auth_base.into(),
            return_url: return_url.into(),
            allow_http: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            allow_http: config.allow_insecure_urls,
            ..Self::new(&config.identity_auth_base, &config.oauth_return_url)
        }
    }

    /// Permits `http://` bases, for local identity providers.
    pub fn allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    fn validate_authorize_url(&self, url: &Url) -> Result<(), RedirectError> {
        match url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            _ => return Err(RedirectError::InsecureScheme),
        }

        // RFC 6749 section 3.1
        if url.fragment().is_some() {
            return Err(RedirectError::Fragment);
        }

        if url.as_str().len() > MAX_AUTHORIZE_URL_LEN {
            return Err(RedirectError::TooLong);
        }

        Ok(())
    }
}

impl OAuthRedirector for IdentityProviderRedirector {
    fn authorize_url(&self, provider: ProviderId) -> Result<Url, RedirectError> {
        let base = format!("{}/authorize", self.auth_base.trim_end_matches('/'));
        let mut url = Url::parse(&base).map_err(|e| RedirectError::InvalidBase(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", &self.return_url);

        self.validate_authorize_url(&url)?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_authorize_url_with_provider_and_return() {
        let redirector = IdentityProviderRedirector::new(
            "https://auth.example.com/auth/v1/",
            "https://app.example.com/dashboard",
        );
        let url = redirector.authorize_url(ProviderId::LinkedinOidc).unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("provider".to_string(), "linkedin_oidc".to_string()),
                (
                    "redirect_to".to_string(),
                    "https://app.example.com/dashboard".to_string()
                ),
            ]
        );
    }

    #[test]
    fn rejects_http_base_unless_allowed() {
        let redirector =
            IdentityProviderRedirector::new("http://localhost:9999", "http://localhost:3000");
        assert_eq!(
            redirector.authorize_url(ProviderId::Google),
            Err(RedirectError::InsecureScheme)
        );
        assert!(
            redirector
                .allow_http(true)
                .authorize_url(ProviderId::Google)
                .is_ok()
        );
    }

    #[test]
    fn rejects_overlong_urls() {
        let redirector = IdentityProviderRedirector::new(
            "https://auth.example.com",
            format!("https://app.example.com/{}", "x".repeat(2100)),
        );
        assert_eq!(
            redirector.authorize_url(ProviderId::Twitter),
            Err(RedirectError::TooLong)
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        let redirector = IdentityProviderRedirector::new("not a url", "https://app.example.com");
        assert!(matches!(
            redirector.authorize_url(ProviderId::Facebook),
            Err(RedirectError::InvalidBase(_))
        ));
    }
}
