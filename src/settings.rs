use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, sync::RwLock};

/// Seasonal color theme, one per Grand Slam the shop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ThemeChoice {
    #[default]
    RG,
    WIM,
    AO,
}

impl ThemeChoice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "RG" => Some(Self::RG),
            "WIM" => Some(Self::WIM),
            "AO" => Some(Self::AO),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::RG => "RG",
            Self::WIM => "WIM",
            Self::AO => "AO",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RG => "Roland Garros",
            Self::WIM => "Wimbledon",
            Self::AO => "Australian Open",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    #[serde(default)]
    theme: ThemeChoice,
    #[serde(default)]
    api_base_url: Option<String>,
    /// Custom theme icons as data URIs, keyed by theme key. Opaque to us;
    /// the view layer renders them.
    #[serde(default)]
    theme_icons: HashMap<String, String>,
}

/// JSON-file preference store, the headless stand-in for the original's
/// browser local storage.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn theme(&self) -> ThemeChoice {
        self.data.read().unwrap().theme
    }

    pub fn update_theme(&self, theme: ThemeChoice) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.theme = theme;
        self.persist(&guard)
    }

    pub fn api_base_url(&self) -> Option<String> {
        self.data.read().unwrap().api_base_url.clone()
    }

    pub fn update_api_base_url(&self, url: Option<String>) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.api_base_url = url;
        self.persist(&guard)
    }

    pub fn theme_icon(&self, theme: ThemeChoice) -> Option<String> {
        self.data.read().unwrap().theme_icons.get(theme.key()).cloned()
    }

    pub fn set_theme_icon(&self, theme: ThemeChoice, data_uri: String) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.theme_icons.insert(theme.key().to_string(), data_uri);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// Default settings location under the platform config directory.
pub fn default_settings_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("cz", "GJ Strings", "gjstrings")
        .context("could not determine a config directory")?;
    Ok(dirs.config_dir().join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.theme(), ThemeChoice::RG);
        assert!(store.api_base_url().is_none());
        assert!(store.theme_icon(ThemeChoice::WIM).is_none());
    }

    #[test]
    fn updates_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store.update_theme(ThemeChoice::AO).unwrap();
        store
            .set_theme_icon(ThemeChoice::AO, "data:image/png;base64,AAAA".into())
            .unwrap();
        store
            .update_api_base_url(Some("https://example.test/exec".into()))
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.theme(), ThemeChoice::AO);
        assert_eq!(
            reloaded.theme_icon(ThemeChoice::AO).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(
            reloaded.api_base_url().as_deref(),
            Some("https://example.test/exec")
        );
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.theme(), ThemeChoice::RG);
    }

    #[test]
    fn theme_parsing_is_case_insensitive() {
        assert_eq!(ThemeChoice::parse("wim"), Some(ThemeChoice::WIM));
        assert_eq!(ThemeChoice::parse("US"), None);
    }
}
