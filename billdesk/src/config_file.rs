use std::{
    env,
    fs,
    io,
    io::{Error, ErrorKind},
    path::{Path, PathBuf},
};

use dirs::home_dir;
use log::*;
use registry_tools::DeskConfig;
use serde::{Deserialize, Serialize};

/// The operator's `~/.billdesk/config.toml`.
///
/// Every value here can be overridden by the matching `BILLDESK_*` environment variable. The access token itself is
/// never stored in the file, only the name of the environment variable that holds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeskFile {
    #[serde(default)]
    pub registries: Vec<RegistryEntry>,
    pub token_envar: Option<String>,
    pub rate_url: Option<String>,
    pub rate_field: Option<String>,
    pub parallel_probes: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: String,
    pub url: String,
}

impl DeskFile {
    /// The value this file supplies for the configuration variable `name`, if any. `env` resolves the token variable.
    pub fn var<F>(&self, name: &str, env: &F) -> Option<String>
    where F: Fn(&str) -> Option<String> {
        match name {
            "BILLDESK_REGISTRIES" if !self.registries.is_empty() => Some(
                self.registries.iter().map(|r| format!("{}={}", r.key, r.url)).collect::<Vec<String>>().join(","),
            ),
            "BILLDESK_RATE_URL" => self.rate_url.clone(),
            "BILLDESK_RATE_FIELD" => self.rate_field.clone(),
            "BILLDESK_PARALLEL_PROBES" => self.parallel_probes.map(|p| p.to_string()),
            "BILLDESK_ACCESS_TOKEN" => self.token_envar.as_deref().and_then(|v| {
                let token = env(v);
                if token.is_none() {
                    warn!("🪛️ The token variable {v} named in the config file is not set.");
                }
                token
            }),
            _ => None,
        }
    }
}

/// Environment first, then the config file, then the defaults.
pub fn merged_config<F>(file: &DeskFile, env: F) -> DeskConfig
where F: Fn(&str) -> Option<String> {
    DeskConfig::from_vars(|name| env(name).or_else(|| file.var(name, &env)))
}

pub fn desk_config() -> DeskConfig {
    let file = read_config().unwrap_or_else(|e| {
        warn!("🪛️ Could not read the billdesk config file. {e}. Using the environment only.");
        DeskFile::default()
    });
    merged_config(&file, |name| env::var(name).ok())
}

pub fn get_config_path() -> io::Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::new(ErrorKind::NotFound, "Home directory not found"))?;
    let config_dir = home.join(".billdesk");
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
        set_permissions(&config_dir, 0o700)?;
    }
    let config_file = config_dir.join("config.toml");
    if !config_file.exists() {
        info!("Creating default config file at {}", config_file.display());
        write_file(&config_file, &DeskFile::default())?;
    }
    Ok(config_file)
}

fn set_permissions(path: &Path, perms: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_mode(perms);
        fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    let _ = (path, perms);
    Ok(())
}

fn write_file(path: &Path, config: &DeskFile) -> io::Result<()> {
    let config_str = toml::to_string(config).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
    fs::write(path, config_str)?;
    set_permissions(path, 0o600)
}

pub fn read_config() -> io::Result<DeskFile> {
    let config_str = fs::read_to_string(get_config_path()?)?;
    toml::from_str(&config_str).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use billdesk_engine::{registry_types::RegistryKey, ProbeStrategy};

    use super::*;

    const FILE: &str = r#"
token_envar = "MY_DESK_TOKEN"
rate_url = "https://quotes.example.com/today"
parallel_probes = true

[[registries]]
key = "north"
url = "https://north.example.com/api"

[[registries]]
key = "south"
url = "https://south.example.com/api"
"#;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<String, String>>();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn file_values_fill_in_missing_variables() {
        let file: DeskFile = toml::from_str(FILE).unwrap();
        assert_eq!(file.registries.len(), 2);
        let config = merged_config(&file, vars(&[("MY_DESK_TOKEN", "s3cret")]));
        let keys = config.registries.iter().map(|r| r.key.clone()).collect::<Vec<RegistryKey>>();
        assert_eq!(keys, vec![RegistryKey::from("north"), RegistryKey::from("south")]);
        assert_eq!(config.rate_url.as_deref(), Some("https://quotes.example.com/today"));
        assert_eq!(config.rate_field, "bcv");
        assert_eq!(config.access_token.reveal(), "s3cret");
        assert_eq!(config.probe_strategy(), ProbeStrategy::Parallel);
    }

    #[test]
    fn environment_overrides_file() {
        let file: DeskFile = toml::from_str(FILE).unwrap();
        let env = vars(&[
            ("BILLDESK_REGISTRIES", "east=https://east.example.com"),
            ("BILLDESK_PARALLEL_PROBES", "no"),
            ("BILLDESK_ACCESS_TOKEN", "from-env"),
            ("MY_DESK_TOKEN", "from-file-var"),
        ]);
        let config = merged_config(&file, env);
        assert_eq!(config.registries.len(), 1);
        assert_eq!(config.registries[0].key, RegistryKey::from("east"));
        assert_eq!(config.access_token.reveal(), "from-env");
        assert_eq!(config.probe_strategy(), ProbeStrategy::Sequential);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file: DeskFile = toml::from_str("").unwrap();
        assert_eq!(file, DeskFile::default());
        let config = merged_config(&file, vars(&[]));
        assert!(config.registries.is_empty());
        assert!(config.rate_url.is_none());
        assert!(config.access_token.is_empty());
    }

    #[test]
    fn default_file_round_trips_through_toml() {
        let file = DeskFile {
            registries: vec![RegistryEntry { key: "R1".into(), url: "https://r1.example.com".into() }],
            token_envar: Some("TOKEN".into()),
            ..Default::default()
        };
        let text = toml::to_string(&file).unwrap();
        assert_eq!(toml::from_str::<DeskFile>(&text).unwrap(), file);
    }
}
