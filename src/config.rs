use anyhow::{Context, Result};
use couchette_scripting::EngineConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const DEFAULT_CONFIG_PATH: &str = "couchette.toml";

/// Seed used when neither the config file nor the command line picks one.
pub const DEFAULT_WORLD_SEED: u64 = 0x00C0_FFEE;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Seed for scripted randomness in new worlds.
    pub world_seed: u64,
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            world_seed: DEFAULT_WORLD_SEED,
            log_filter: None,
            engine: EngineConfig::default(),
        }
    }
}

impl HostConfig {
    /// Read and parse `path`, returning errors to the caller.
    pub fn read(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Turn the result of [`HostConfig::read`] into a config, falling back to
    /// defaults with a warning. A missing file at the default path is expected.
    pub fn or_defaults(loaded: Result<Self>, path: &Path) -> Self {
        match loaded {
            Ok(cfg) => cfg,
            Err(err) => {
                let missing = err
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
                if missing && path == Path::new(DEFAULT_CONFIG_PATH) {
                    tracing::debug!("no config at {}, using defaults", path.display());
                } else {
                    tracing::warn!("{err:#}. Using defaults");
                }
                HostConfig::default()
            }
        }
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        Self::or_defaults(Self::read(path), path)
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchette_scripting::InterruptPolicy;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(stem: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "{stem}-{}.toml",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: HostConfig = toml::from_str(
            r#"
            world_seed = 7
            interrupt_policy = "refuse"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.world_seed, 7);
        assert_eq!(cfg.engine.interrupt_policy, InterruptPolicy::Refuse);
        assert_eq!(cfg.engine.time_speed, EngineConfig::default().time_speed);
        assert_eq!(cfg.log_filter, None);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let path = temp_path("couchette-bad");
        fs::write(&path, "time_speed = \"fast\"").unwrap();
        assert!(HostConfig::read(&path).is_err());
        assert_eq!(HostConfig::load_from_path(&path), HostConfig::default());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn save_then_load_keeps_values() {
        let path = temp_path("couchette-cfg");
        let cfg = HostConfig {
            world_seed: 99,
            log_filter: Some("couchette_scripting=debug".into()),
            engine: EngineConfig {
                time_speed: 5,
                ..EngineConfig::default()
            },
        };
        cfg.save_to_path(&path).unwrap();
        assert_eq!(HostConfig::load_from_path(&path), cfg);
        fs::remove_file(&path).ok();
    }
}
