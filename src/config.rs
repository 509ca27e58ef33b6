use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "kusto-seed";
const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_DATABASE: &str = "NetDefaultDB";
pub const DEFAULT_TOKEN: &str = "123456";
pub const DEFAULT_MAPPING_NAME: &str = "JsonMapping";
pub const DEFAULT_SAMPLE_DATA_DIR: &str = "sampledata";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything a run needs to know, resolved from defaults, the YAML file and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub database: String,
    pub sample_data_dir: PathBuf,
    pub token: String,
    pub mapping_name: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            sample_data_dir: PathBuf::from(DEFAULT_SAMPLE_DATA_DIR),
            token: DEFAULT_TOKEN.to_string(),
            mapping_name: DEFAULT_MAPPING_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// On-disk shape of `config.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub database: Option<String>,
    pub sample_data_dir: Option<PathBuf>,
    pub token: Option<String>,
    pub mapping_name: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Overlay the keys present in `file` on top of `self`.
    pub fn merge(mut self, file: FileConfig) -> Self {
        if let Some(v) = file.endpoint {
            self.endpoint = v;
        }
        if let Some(v) = file.database {
            self.database = v;
        }
        if let Some(v) = file.sample_data_dir {
            self.sample_data_dir = v;
        }
        if let Some(v) = file.token {
            self.token = v;
        }
        if let Some(v) = file.mapping_name {
            self.mapping_name = v;
        }
        if let Some(v) = file.timeout_secs {
            self.timeout_secs = v;
        }
        self
    }

    /// Load the config file if there is one.
    ///
    /// An explicit path must exist. Without one, the app config directory is
    /// consulted and a missing file just means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Config::load_from(explicit, default_config_path())
    }

    fn load_from(explicit: Option<&Path>, fallback: Option<PathBuf>) -> Result<Self> {
        let config = Config::default();
        match explicit {
            Some(path) => Ok(config.merge(read_file_config(path)?)),
            None => {
                let Some(path) = fallback else {
                    return Ok(config);
                };
                if !path.exists() {
                    return Ok(config);
                }
                Ok(config.merge(read_file_config(&path)?))
            }
        }
    }

    /// Reject values that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        if self.endpoint.trim().is_empty() {
            bail!("endpoint must not be empty");
        }
        Ok(())
    }
}

/// The application config directory, without touching the filesystem.
pub fn app_config_dir() -> Option<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs_next::home_dir().map(|h| h.join(".config"))
    } else {
        dirs_next::config_dir()
    };
    base.map(|path| path.join(APP_NAME))
}

/// Return the application config directory path, creating it if missing.
pub fn get_app_config_path() -> Result<PathBuf> {
    let path = app_config_dir().ok_or_else(|| anyhow::anyhow!("failed to find os config dir."))?;
    fs::create_dir_all(&path)?;
    Ok(path)
}

fn default_config_path() -> Option<PathBuf> {
    app_config_dir().map(|dir| dir.join(CONFIG_FILE))
}

pub fn read_file_config(path: &Path) -> Result<FileConfig> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    // An empty file is a valid "no overrides" config.
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(FileConfig::default());
    }
    let parsed: FileConfig = serde_yaml::from_slice(&data)
        .with_context(|| format!("failed to parse YAML at {}", path.display()))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_emulator() {
        let c = Config::default();
        assert_eq!(c.endpoint, "http://localhost:8080");
        assert_eq!(c.database, "NetDefaultDB");
        assert_eq!(c.sample_data_dir, PathBuf::from("sampledata"));
        assert_eq!(c.mapping_name, "JsonMapping");
    }

    #[test]
    fn file_overrides_only_present_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "endpoint: http://127.0.0.1:9000\ndatabase: Other\n").unwrap();

        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.endpoint, "http://127.0.0.1:9000");
        assert_eq!(c.database, "Other");
        assert_eq!(c.token, DEFAULT_TOKEN);
        assert_eq!(c.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn empty_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn missing_default_file_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("kusto-seed");
        let c = Config::load_from(None, Some(app_dir.join(CONFIG_FILE))).unwrap();
        assert_eq!(c, Config::default());
        assert!(!app_dir.exists());
    }

    #[test]
    fn default_file_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "mapping_name: FromDefault\n").unwrap();
        let c = Config::load_from(None, Some(path)).unwrap();
        assert_eq!(c.mapping_name, "FromDefault");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let c = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "endpont: http://typo\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse YAML"));
    }
}
