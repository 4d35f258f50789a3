use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use toml;
use tracing::{debug, warn};

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_RECORD_FILE: &str = ".modelgate_config.json";
const DEFAULT_MODELS_FILE: &str = ".modelgate_models.json";

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("failed to read config \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to reserialize config: {0}")]
    Reserialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Storage {
    pub record_path: Option<PathBuf>,
    pub models_path: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Dispatch {
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Endpoint {
    pub api_base: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Providers {
    #[serde(default)]
    pub groq: Endpoint,
    #[serde(default)]
    pub openai: Endpoint,
    #[serde(default)]
    pub huggingface: Endpoint,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Config {
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub dispatch: Dispatch,
    #[serde(default)]
    pub providers: Providers,
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn in_home(file: &str) -> PathBuf {
    match home_dir() {
        Some(home) => home.join(file),
        None => PathBuf::from(file),
    }
}

impl Config {
    /// Where the configuration record is stored.
    pub(crate) fn record_path(&self) -> PathBuf {
        match &self.storage.record_path {
            Some(path) => expand_home(path),
            None => in_home(DEFAULT_RECORD_FILE),
        }
    }

    /// Where user-added model descriptors are stored.
    pub(crate) fn models_path(&self) -> PathBuf {
        match &self.storage.models_path {
            Some(path) => expand_home(path),
            None => in_home(DEFAULT_MODELS_FILE),
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

fn get_config_path() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        const USER_PATHS: [&str; 2] = [".config/modelgate/config.toml", ".modelgate.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/modelgate.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn extraneous_keys_helper<'a>(
    path: &mut Vec<&'a str>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extraneous: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extraneous_keys_helper(path, user_value, config_value, extraneous)
            }
            (_, Some(_)) => {}
            (_, None) => extraneous.push(path.join(".")),
        }

        path.pop();
    }
}

/// Dotted paths of every key in `raw_config` that `config` does not know about.
fn extraneous_keys(config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = toml::from_str(raw_config)?;
    let config: toml::Table = toml::from_str(&toml::to_string(config)?)?;

    let mut extraneous = Vec::new();

    extraneous_keys_helper(&mut Vec::new(), &user_config, &config, &mut extraneous);

    Ok(extraneous)
}

fn parse_config(raw_config: &str) -> Result<Config, Error> {
    let config: Config = toml::from_str(raw_config)?;

    for key in extraneous_keys(&config, raw_config)? {
        warn!(key = %key, "config contains extraneous key, ignoring");
    }

    Ok(config)
}

/// Reads the settings file given on the command line, or the first one found in the
/// default locations. No file at all means default settings.
pub(crate) fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    let config_path = match config.or_else(get_config_path) {
        Some(path) => path,
        None => return Ok(Config::default()),
    };

    debug!(path = %config_path.display(), "reading config");

    let raw_config = std::fs::read_to_string(&config_path).map_err(|source| Error::Read {
        path: config_path.clone(),
        source,
    })?;

    parse_config(&raw_config)
}
