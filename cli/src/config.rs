//! Configuration management for CLI tools.
//!
//! Configuration is stored in ~/.roadtrip/{app_name}/config.yaml and holds
//! named assistant profiles, one of which is current.

use std::collections::HashMap;
use std::path::PathBuf;

use roadtrip_voice::AssistantConfig;
use serde::{Deserialize, Serialize};

use crate::Paths;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application name (not serialized).
    #[serde(skip)]
    pub app_name: String,

    /// Name of the currently active profile.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_profile: String,

    /// Map of profile name to profile.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<String, Profile>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// A named assistant configuration, e.g. one per vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Assistant settings. Omitted fields take their defaults.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl Config {
    /// Gets the default config file path.
    pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
        Paths::new(app_name).ok().map(|paths| paths.config_file())
    }

    /// Returns the config file path.
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Returns the config directory path.
    pub fn dir(&self) -> Option<&std::path::Path> {
        self.config_path.parent()
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Adds or replaces a profile.
    pub fn add_profile(&mut self, name: &str, mut profile: Profile) -> anyhow::Result<()> {
        profile.name = name.to_string();
        self.profiles.insert(name.to_string(), profile);
        self.save()
    }

    pub fn delete_profile(&mut self, name: &str) -> anyhow::Result<()> {
        if self.profiles.remove(name).is_none() {
            anyhow::bail!("profile '{}' not found", name);
        }
        if self.current_profile == name {
            self.current_profile.clear();
        }
        self.save()
    }

    /// Sets the current profile.
    pub fn use_profile(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.profiles.contains_key(name) {
            anyhow::bail!("profile '{}' not found", name);
        }
        self.current_profile = name.to_string();
        self.save()
    }

    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn get_current_profile(&self) -> Option<&Profile> {
        if self.current_profile.is_empty() {
            return None;
        }
        self.profiles.get(&self.current_profile)
    }

    /// Resolves the profile by name, or the current profile if no name is
    /// given.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        match name {
            Some(n) if !n.is_empty() => self.get_profile(n),
            _ => self.get_current_profile(),
        }
    }

    /// Resolves the assistant settings to run with.
    ///
    /// An explicitly named profile must exist. Without a name, the current
    /// profile is used, falling back to the defaults when none is set.
    pub fn resolve_assistant(&self, name: Option<&str>) -> anyhow::Result<AssistantConfig> {
        match name {
            Some(n) if !n.is_empty() => self
                .get_profile(n)
                .map(|p| p.assistant.clone())
                .ok_or_else(|| anyhow::anyhow!("profile '{}' not found", n)),
            _ => Ok(self
                .get_current_profile()
                .map(|p| p.assistant.clone())
                .unwrap_or_default()),
        }
    }

    /// Lists all profile names, sorted.
    pub fn list_profiles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn resolve_path(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Config::default_config_path(app_name)
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Loads configuration for the specified app.
///
/// A missing file is created empty.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = resolve_path(app_name, custom_path)?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)?
        }
    } else {
        let cfg = Config::default();
        std::fs::write(&config_path, serde_yaml::to_string(&cfg)?)?;
        cfg
    };

    cfg.app_name = app_name.to_string();
    cfg.config_path = config_path;

    Ok(cfg)
}

/// Saves configuration to the specified path.
pub fn save_config(app_name: &str, config: &Config, custom_path: Option<&str>) -> anyhow::Result<()> {
    let config_path = resolve_path(app_name, custom_path)?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&config_path, serde_yaml::to_string(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadtrip_voice::synth::VoicePersonality;
    use tokio_test::{assert_err, assert_ok};

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = load_config("testapp", path.to_str()).unwrap();
        (dir, cfg)
    }

    #[test]
    fn test_load_creates_file() {
        let (_dir, cfg) = temp_config();
        assert!(cfg.path().exists());
        assert_eq!(cfg.app_name, "testapp");
        assert!(cfg.profiles.is_empty());
        assert!(cfg.get_current_profile().is_none());
    }

    #[test]
    fn test_profile_lifecycle() {
        let (_dir, mut cfg) = temp_config();

        let mut profile = Profile {
            description: "family van".to_string(),
            ..Default::default()
        };
        profile.assistant.capture.silence_timeout_ms = 2500;
        assert_ok!(cfg.add_profile("van", profile));
        assert_ok!(cfg.add_profile("coupe", Profile::default()));
        assert_eq!(cfg.list_profiles(), vec!["coupe", "van"]);

        assert_err!(cfg.use_profile("truck"));
        assert_ok!(cfg.use_profile("van"));

        let reloaded = load_config("testapp", cfg.path().to_str()).unwrap();
        assert_eq!(reloaded.current_profile, "van");
        let van = reloaded.get_current_profile().unwrap();
        assert_eq!(van.name, "van");
        assert_eq!(van.assistant.capture.silence_timeout_ms, 2500);

        assert_ok!(cfg.delete_profile("van"));
        assert!(cfg.current_profile.is_empty());
        assert_err!(cfg.delete_profile("van"));
    }

    #[test]
    fn test_resolve_assistant() {
        let (_dir, mut cfg) = temp_config();
        assert_eq!(cfg.resolve_assistant(None).unwrap(), AssistantConfig::default());
        assert_err!(cfg.resolve_assistant(Some("missing")));

        let mut profile = Profile::default();
        profile.assistant.dispatcher.voice.personality = VoicePersonality::Casual;
        cfg.add_profile("weekend", profile).unwrap();
        cfg.use_profile("weekend").unwrap();

        let assistant = cfg.resolve_assistant(None).unwrap();
        assert_eq!(assistant.dispatcher.voice.personality, VoicePersonality::Casual);
        assert_eq!(
            cfg.resolve_profile(Some("weekend")).map(|p| p.name.as_str()),
            Some("weekend")
        );
    }

    #[test]
    fn test_partial_profile_yaml() {
        let yaml = r#"
current_profile: van
profiles:
  van:
    assistant:
      podcast:
        target_secs: 8.0
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let assistant = cfg.resolve_assistant(None).unwrap();
        assert_eq!(assistant.podcast.target_secs, 8.0);
        assert_eq!(assistant.capture.silence_timeout_ms, 3000);
    }
}
