//! HTTP client for scoped Plex library refreshes.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::PlexServerSettings;
use crate::error::{RefreshError, Result};
use crate::paths::slash_normalized;
use crate::plex::types::{Section, SectionsResponse};
use crate::scheduler::RefreshTarget;

/// Budget for listing library sections.
const SECTIONS_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for a refresh request, also the client-wide default.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Client bound to one Plex server.
pub struct PlexClient {
    base: Url,
    token: String,
    http: reqwest::Client,
}

impl PlexClient {
    pub fn new(settings: PlexServerSettings) -> Result<Self> {
        if settings.token.trim().is_empty() {
            return Err(RefreshError::Config("empty Plex token".into()));
        }
        let base = normalize_base_url(&settings.url)?;
        let http = reqwest::Client::builder().timeout(REFRESH_TIMEOUT).build()?;
        Ok(Self {
            base,
            token: settings.token,
            http,
        })
    }

    /// Lists library sections together with their filesystem locations.
    pub async fn sections(&self) -> Result<Vec<Section>> {
        let response = self
            .http
            .get(self.endpoint("library/sections"))
            .timeout(SECTIONS_TIMEOUT)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<SectionsResponse>()
            .await?;
        Ok(response.container.sections)
    }

    /// Asks the server to rescan one path inside a section.
    pub async fn refresh_section_path(&self, key: &str, path: &str) -> Result<()> {
        self.http
            .get(self.endpoint(&format!("library/sections/{key}/refresh")))
            .query(&[("path", path), ("X-Plex-Token", self.token.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for PlexClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexClient")
            .field("base", &self.base.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RefreshTarget for PlexClient {
    async fn refresh_path(&self, path: &str) -> bool {
        let sections = match self.sections().await {
            Ok(sections) => sections,
            Err(error) => {
                warn!(%error, "failed to list library sections");
                return false;
            }
        };
        if sections.is_empty() {
            warn!("server reported no library sections");
            return false;
        }
        let Some(section) = match_section(&sections, path) else {
            warn!(path, "no library section covers path");
            return false;
        };
        debug!(
            path,
            section = %section.title,
            key = %section.key,
            "matched library section"
        );
        match self.refresh_section_path(&section.key, path).await {
            Ok(()) => {
                info!(path, section = %section.title, "triggered partial refresh");
                true
            }
            Err(error) => {
                warn!(path, %error, "refresh request failed");
                false
            }
        }
    }
}

/// Picks the section whose location is the longest prefix of `path`.
///
/// Separators are normalized before comparison so a Windows-style library
/// location still matches. Ties keep the earlier section.
pub fn match_section<'a>(sections: &'a [Section], path: &str) -> Option<&'a Section> {
    let path = slash_normalized(path);
    let mut best: Option<(&Section, usize)> = None;
    for section in sections {
        for location in &section.locations {
            let location = slash_normalized(&location.path);
            if path.starts_with(&location)
                && best.is_none_or(|(_, len)| location.len() > len)
            {
                best = Some((section, location.len()));
            }
        }
    }
    best.map(|(section, _)| section)
}

/// Normalizes a configured base URL, assuming `http://` when no scheme is
/// present and dropping any trailing slash.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    Ok(Url::parse(&candidate)?)
}
