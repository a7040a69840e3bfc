//! Translation from local filesystem paths to the media server's view.
//!
//! Mounts rarely line up: the path a download lands on locally is not the
//! path Plex knows the file by. A [`PathMap`] rewrites local prefixes to
//! their server-side equivalents, picking the longest matching prefix when
//! several apply.

use serde::Deserialize;
use tracing::warn;

/// One local-to-server prefix rewrite.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct MapEntry {
    /// Prefix of the local path as seen by the watcher.
    pub local: String,
    /// Replacement prefix as the media server sees it.
    pub plex: String,
}

/// Ordered collection of prefix rewrites.
#[derive(Clone, Debug, Default)]
pub struct PathMap {
    entries: Vec<MapEntry>,
}

impl PathMap {
    pub fn new(entries: Vec<MapEntry>) -> Self {
        Self { entries }
    }

    /// Parses the `local => plex` line format, one mapping per line.
    /// Blank lines and entries missing either side are skipped.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let (local, plex) = line.split_once("=>")?;
                let local = local.trim();
                let plex = plex.trim();
                if local.is_empty() || plex.is_empty() {
                    return None;
                }
                Some(MapEntry {
                    local: local.to_string(),
                    plex: plex.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Local prefixes in declaration order, useful as default watch roots.
    pub fn local_prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.local.as_str())
    }

    /// Rewrites a local path into the server's namespace.
    ///
    /// The entry with the longest matching `local` prefix wins; on equal
    /// lengths the one declared first is kept. Only the first occurrence of
    /// the prefix is replaced. When the result contains a backslash the
    /// whole path is normalized to Windows separators, since mixing both
    /// would produce a path the server cannot resolve. Returns `None` when
    /// no entry matches, which callers should treat as "do not refresh".
    pub fn map(&self, path: &str) -> Option<String> {
        let mut best: Option<&MapEntry> = None;
        for entry in &self.entries {
            if entry.local.is_empty() || entry.plex.is_empty() {
                continue;
            }
            if path.starts_with(&entry.local)
                && best.is_none_or(|b| entry.local.len() > b.local.len())
            {
                best = Some(entry);
            }
        }
        let Some(entry) = best else {
            warn!(path, "no path mapping matches, dropping");
            return None;
        };
        let mapped = path.replacen(&entry.local, &entry.plex, 1);
        if mapped.contains('\\') {
            Some(mapped.replace('/', "\\"))
        } else {
            Some(mapped)
        }
    }
}
