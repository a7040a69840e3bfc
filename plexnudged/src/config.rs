use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use thiserror::Error;

use plexnudge_core::config::{
    DEFAULT_BATCH_DELAY_SECS, PlexServerSettings, SchedulerSettings,
};
use plexnudge_core::pathmap::{MapEntry, PathMap};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("plexnudge.toml"),
        PathBuf::from("config/plexnudge.toml"),
        PathBuf::from("/etc/plexnudge/plexnudge.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();

        let (file_config, config_path, config_present) =
            self.load_file_config(&env_config)?;

        let metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
            config_present,
        };
        let (config, warnings) = compose(file_config, env_config, metadata);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(FileConfig, Option<PathBuf>, bool), ConfigLoadError> {
        // A path from the CLI or from PLEXNUDGE_CONFIG must exist; default
        // locations are only probed.
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                Some(path)
            }
            None => DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned(),
        };

        let Some(path) = path else {
            return Ok((FileConfig::default(), None, false));
        };

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((file_config, Some(path), true))
    }
}

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    pub enabled: Option<bool>,
    /// Selects one of the `servers` entries by name.
    pub server: Option<String>,
    #[serde(default)]
    pub servers: Vec<FileServerEntry>,
    pub batch_delay_secs: Option<i64>,
    #[serde(default)]
    pub path_map: Vec<MapEntry>,
    #[serde(default)]
    pub watch: FileWatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileServerEntry {
    pub name: String,
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileWatchConfig {
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub enabled: Option<bool>,
    pub server: Option<String>,
    pub plex_url: Option<String>,
    pub plex_token: Option<String>,
    /// Kept raw so an unparsable value can be reported instead of silently
    /// treated as unset.
    pub batch_delay_secs: Option<String>,
    pub path_maps: Option<String>,
    pub watch_roots: Option<Vec<PathBuf>>,
    pub config_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.enabled = parse_bool_var("PLEXNUDGE_ENABLED");
        env_config.server = std::env::var("PLEXNUDGE_SERVER").ok();
        env_config.plex_url = std::env::var("PLEX_URL").ok();
        env_config.plex_token = std::env::var("PLEX_TOKEN").ok();
        env_config.batch_delay_secs = std::env::var("BATCH_DELAY_SECS").ok();
        env_config.path_maps = std::env::var("PATH_MAPS").ok();
        env_config.watch_roots = parse_csv_var("WATCH_ROOTS")
            .map(|roots| roots.into_iter().map(PathBuf::from).collect());
        env_config.config_path =
            std::env::var("PLEXNUDGE_CONFIG").ok().map(PathBuf::from);

        env_config
    }
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .filter_map(|part| {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    })
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub enabled: bool,
    pub server: Option<PlexServerSettings>,
    pub scheduler: SchedulerSettings,
    pub path_map: PathMap,
    pub watch_roots: Vec<PathBuf>,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
    pub config_present: bool,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: DaemonConfig,
    pub warnings: ConfigWarnings,
}

/// Merges file and environment values; environment wins on conflict.
pub(crate) fn compose(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> (DaemonConfig, ConfigWarnings) {
    let mut warnings = ConfigWarnings::default();

    if !metadata.config_present {
        warnings.push_with_hint(
            "no plexnudge.toml detected; falling back to environment variables",
            "pass --config or set PLEXNUDGE_CONFIG to silence this",
        );
    }

    let server = resolve_server(&file, &env, &mut warnings);

    let enabled = env.enabled.or(file.enabled).unwrap_or(false);

    let delay_secs = match env.batch_delay_secs.as_deref() {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(secs) => Some(secs),
            Err(_) => {
                warnings.push(format!(
                    "BATCH_DELAY_SECS {raw:?} is not an integer; using the default {DEFAULT_BATCH_DELAY_SECS}s"
                ));
                None
            }
        },
        None => file.batch_delay_secs,
    };
    let scheduler = delay_secs
        .map(SchedulerSettings::with_delay_secs)
        .unwrap_or_default();

    let path_map = match env.path_maps.as_deref() {
        Some(text) => PathMap::parse(text),
        None => PathMap::new(file.path_map),
    };
    if path_map.is_empty() {
        warnings.push_with_hint(
            "no path mappings configured; every arrival will be dropped",
            "add [[path_map]] entries or set PATH_MAPS",
        );
    }

    let watch_roots = match env.watch_roots {
        Some(roots) if !roots.is_empty() => roots,
        _ => {
            if file.watch.roots.is_empty() {
                path_map.local_prefixes().map(PathBuf::from).collect()
            } else {
                file.watch.roots
            }
        }
    };

    let config = DaemonConfig {
        enabled,
        server,
        scheduler,
        path_map,
        watch_roots,
        metadata,
    };
    (config, warnings)
}

fn resolve_server(
    file: &FileConfig,
    env: &EnvConfig,
    warnings: &mut ConfigWarnings,
) -> Option<PlexServerSettings> {
    let selection = env.server.clone().or_else(|| file.server.clone());

    let entry = match &selection {
        Some(name) => {
            let found = file.servers.iter().find(|entry| entry.name == *name);
            if found.is_none() {
                warnings.push(format!(
                    "server {name:?} is not defined in [[servers]]"
                ));
            }
            found
        }
        None => match file.servers.len() {
            0 => None,
            1 => file.servers.first(),
            _ => {
                warnings.push_with_hint(
                    "multiple [[servers]] entries but none selected",
                    "set `server` in plexnudge.toml or PLEXNUDGE_SERVER",
                );
                None
            }
        },
    };

    let url = match env
        .plex_url
        .clone()
        .or_else(|| entry.map(|entry| entry.url.clone()))
    {
        Some(url) => url,
        None => {
            if selection.is_none() && file.servers.is_empty() {
                warnings.push_with_hint(
                    "no Plex server configured",
                    "add a [[servers]] entry or set PLEX_URL",
                );
            }
            return None;
        }
    };

    let token = match entry.and_then(|entry| entry.token.clone()) {
        Some(token) => Some(token),
        None => {
            let fallback = env.plex_token.clone();
            if entry.is_some() && fallback.is_some() {
                warnings.push(
                    "selected server entry has no token; using PLEX_TOKEN",
                );
            }
            fallback
        }
    };
    let Some(token) = token else {
        warnings.push_with_hint(
            format!("no token for Plex server at {url}"),
            "set `token` on the server entry or export PLEX_TOKEN",
        );
        return None;
    };

    Some(PlexServerSettings { url, token })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn present() -> ConfigMetadata {
        ConfigMetadata {
            config_path: Some(PathBuf::from("plexnudge.toml")),
            env_file_loaded: false,
            config_present: true,
        }
    }

    fn absent() -> ConfigMetadata {
        ConfigMetadata {
            config_path: None,
            env_file_loaded: false,
            config_present: false,
        }
    }

    fn entry(name: &str, url: &str, token: Option<&str>) -> FileServerEntry {
        FileServerEntry {
            name: name.into(),
            url: url.into(),
            token: token.map(Into::into),
        }
    }

    fn mapping(local: &str, plex: &str) -> MapEntry {
        MapEntry {
            local: local.into(),
            plex: plex.into(),
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let (config, warnings) =
            compose(FileConfig::default(), EnvConfig::default(), absent());
        assert!(!config.enabled);
        assert_eq!(
            config.scheduler.batch_delay,
            Duration::from_secs(DEFAULT_BATCH_DELAY_SECS)
        );
        assert!(config.server.is_none());
        assert!(config.path_map.is_empty());
        assert!(config.watch_roots.is_empty());
        assert!(!warnings.is_empty());
    }

    #[test]
    fn file_values_are_honored() {
        let file = FileConfig {
            enabled: Some(true),
            servers: vec![entry("main", "http://plex:32400", Some("tok"))],
            batch_delay_secs: Some(120),
            path_map: vec![mapping("/downloads", "/media")],
            watch: FileWatchConfig {
                roots: vec![PathBuf::from("/downloads/complete")],
            },
            ..FileConfig::default()
        };
        let (config, warnings) = compose(file, EnvConfig::default(), present());
        assert!(config.enabled);
        assert_eq!(config.scheduler.batch_delay, Duration::from_secs(120));
        assert_eq!(config.scheduler.fallback_pacing, Duration::from_secs(1));
        let server = config.server.unwrap();
        assert_eq!(server.url, "http://plex:32400");
        assert_eq!(server.token, "tok");
        assert_eq!(config.path_map.len(), 1);
        assert_eq!(
            config.watch_roots,
            vec![PathBuf::from("/downloads/complete")]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn env_overrides_file() {
        let file = FileConfig {
            enabled: Some(false),
            servers: vec![entry("main", "http://file:32400", Some("tok"))],
            batch_delay_secs: Some(120),
            ..FileConfig::default()
        };
        let env = EnvConfig {
            enabled: Some(true),
            plex_url: Some("http://env:32400".into()),
            batch_delay_secs: Some("45".into()),
            ..EnvConfig::default()
        };
        let (config, _warnings) = compose(file, env, present());
        assert!(config.enabled);
        assert_eq!(config.scheduler.batch_delay, Duration::from_secs(45));
        assert_eq!(config.server.unwrap().url, "http://env:32400");
    }

    #[test]
    fn file_delay_is_clamped() {
        let low = FileConfig {
            batch_delay_secs: Some(5),
            ..FileConfig::default()
        };
        let (config, _) = compose(low, EnvConfig::default(), present());
        assert_eq!(config.scheduler.batch_delay, Duration::from_secs(10));

        let high = FileConfig {
            batch_delay_secs: Some(9999),
            ..FileConfig::default()
        };
        let (config, _) = compose(high, EnvConfig::default(), present());
        assert_eq!(config.scheduler.batch_delay, Duration::from_secs(300));
    }

    #[test]
    fn env_delay_is_clamped() {
        let env = EnvConfig {
            batch_delay_secs: Some("5".into()),
            ..EnvConfig::default()
        };
        let (config, _) = compose(FileConfig::default(), env, present());
        assert_eq!(config.scheduler.batch_delay, Duration::from_secs(10));
    }

    #[test]
    fn unparsable_env_delay_reverts_to_default_with_warning() {
        // The env var takes precedence even when garbage, so the file
        // value is not consulted.
        let file = FileConfig {
            batch_delay_secs: Some(120),
            ..FileConfig::default()
        };
        let env = EnvConfig {
            batch_delay_secs: Some("soon".into()),
            ..EnvConfig::default()
        };
        let (config, warnings) = compose(file, env, present());
        assert_eq!(
            config.scheduler.batch_delay,
            Duration::from_secs(DEFAULT_BATCH_DELAY_SECS)
        );
        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("BATCH_DELAY_SECS")));
    }

    #[test]
    fn single_server_is_selected_implicitly() {
        let file = FileConfig {
            servers: vec![entry("only", "http://plex:32400", Some("tok"))],
            ..FileConfig::default()
        };
        let (config, _) = compose(file, EnvConfig::default(), present());
        assert_eq!(config.server.unwrap().url, "http://plex:32400");
    }

    #[test]
    fn named_server_is_selected() {
        let file = FileConfig {
            server: Some("second".into()),
            servers: vec![
                entry("first", "http://a:32400", Some("ta")),
                entry("second", "http://b:32400", Some("tb")),
            ],
            ..FileConfig::default()
        };
        let (config, warnings) = compose(file, EnvConfig::default(), present());
        let server = config.server.unwrap();
        assert_eq!(server.url, "http://b:32400");
        assert_eq!(server.token, "tb");
        assert!(warnings.is_empty());
    }

    #[test]
    fn env_selection_beats_file_selection() {
        let file = FileConfig {
            server: Some("first".into()),
            servers: vec![
                entry("first", "http://a:32400", Some("ta")),
                entry("second", "http://b:32400", Some("tb")),
            ],
            ..FileConfig::default()
        };
        let env = EnvConfig {
            server: Some("second".into()),
            ..EnvConfig::default()
        };
        let (config, _) = compose(file, env, present());
        assert_eq!(config.server.unwrap().url, "http://b:32400");
    }

    #[test]
    fn unknown_server_name_warns_and_resolves_nothing() {
        let file = FileConfig {
            server: Some("nope".into()),
            servers: vec![entry("main", "http://plex:32400", Some("tok"))],
            ..FileConfig::default()
        };
        let (config, warnings) = compose(file, EnvConfig::default(), present());
        assert!(config.server.is_none());
        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("not defined")));
    }

    #[test]
    fn multiple_servers_require_a_selection() {
        let file = FileConfig {
            servers: vec![
                entry("first", "http://a:32400", Some("ta")),
                entry("second", "http://b:32400", Some("tb")),
            ],
            ..FileConfig::default()
        };
        let (config, warnings) = compose(file, EnvConfig::default(), present());
        assert!(config.server.is_none());
        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("multiple")));
    }

    #[test]
    fn token_falls_back_to_env() {
        let file = FileConfig {
            servers: vec![entry("main", "http://plex:32400", None)],
            ..FileConfig::default()
        };
        let env = EnvConfig {
            plex_token: Some("env-tok".into()),
            ..EnvConfig::default()
        };
        let (config, warnings) = compose(file, env, present());
        assert_eq!(config.server.unwrap().token, "env-tok");
        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("PLEX_TOKEN")));
    }

    #[test]
    fn missing_token_drops_the_server() {
        let file = FileConfig {
            servers: vec![entry("main", "http://plex:32400", None)],
            ..FileConfig::default()
        };
        let (config, warnings) = compose(file, EnvConfig::default(), present());
        assert!(config.server.is_none());
        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("no token")));
    }

    #[test]
    fn env_url_and_token_alone_make_a_server() {
        let env = EnvConfig {
            plex_url: Some("http://plex:32400".into()),
            plex_token: Some("tok".into()),
            ..EnvConfig::default()
        };
        let (config, _) = compose(FileConfig::default(), env, present());
        let server = config.server.unwrap();
        assert_eq!(server.url, "http://plex:32400");
        assert_eq!(server.token, "tok");
    }

    #[test]
    fn path_maps_env_overrides_file_table() {
        let file = FileConfig {
            path_map: vec![mapping("/from-file", "/file")],
            ..FileConfig::default()
        };
        let env = EnvConfig {
            path_maps: Some("/from-env => /env".into()),
            ..EnvConfig::default()
        };
        let (config, _) = compose(file, env, present());
        assert_eq!(config.path_map.map("/from-env/x.mkv").as_deref(), Some("/env/x.mkv"));
        assert_eq!(config.path_map.map("/from-file/x.mkv"), None);
    }

    #[test]
    fn watch_roots_default_to_map_prefixes() {
        let file = FileConfig {
            path_map: vec![
                mapping("/downloads/tv", "/media/tv"),
                mapping("/downloads/movies", "/media/movies"),
            ],
            ..FileConfig::default()
        };
        let (config, _) = compose(file, EnvConfig::default(), present());
        assert_eq!(
            config.watch_roots,
            vec![
                PathBuf::from("/downloads/tv"),
                PathBuf::from("/downloads/movies"),
            ]
        );
    }

    #[test]
    fn env_watch_roots_win() {
        let file = FileConfig {
            path_map: vec![mapping("/downloads", "/media")],
            watch: FileWatchConfig {
                roots: vec![PathBuf::from("/from-file")],
            },
            ..FileConfig::default()
        };
        let env = EnvConfig {
            watch_roots: Some(vec![PathBuf::from("/from-env")]),
            ..EnvConfig::default()
        };
        let (config, _) = compose(file, env, present());
        assert_eq!(config.watch_roots, vec![PathBuf::from("/from-env")]);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let (_, warnings) =
            compose(FileConfig::default(), EnvConfig::default(), absent());
        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("plexnudge.toml")));
    }

    #[test]
    fn file_config_parses_full_document() {
        let parsed: FileConfig = toml::from_str(
            r#"
            enabled = true
            server = "main"
            batch_delay_secs = 90

            [[servers]]
            name = "main"
            url = "http://plex:32400"
            token = "tok"

            [[path_map]]
            local = "/downloads"
            plex = "/media"

            [watch]
            roots = ["/downloads/complete"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.enabled, Some(true));
        assert_eq!(parsed.server.as_deref(), Some("main"));
        assert_eq!(parsed.batch_delay_secs, Some(90));
        assert_eq!(parsed.servers.len(), 1);
        assert_eq!(parsed.path_map.len(), 1);
        assert_eq!(parsed.watch.roots.len(), 1);
    }

    #[test]
    fn loader_reads_explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plexnudge.toml");
        fs::write(&path, "enabled = true\n").unwrap();
        let loader = ConfigLoader::new().with_config_path(&path);
        let (file, resolved, present) =
            loader.load_file_config(&EnvConfig::default()).unwrap();
        assert_eq!(file.enabled, Some(true));
        assert_eq!(resolved.as_deref(), Some(path.as_path()));
        assert!(present);
    }

    #[test]
    fn loader_rejects_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let loader = ConfigLoader::new().with_config_path(&path);
        let err = loader.load_file_config(&EnvConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn loader_rejects_mistyped_file_delay() {
        // A wrongly typed value in the file fails the load outright; only
        // the env channel degrades to the default.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plexnudge.toml");
        fs::write(&path, r#"batch_delay_secs = "soon""#).unwrap();
        let loader = ConfigLoader::new().with_config_path(&path);
        let err = loader.load_file_config(&EnvConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }
}
