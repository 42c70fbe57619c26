use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// ── Profile ───────────────────────────────────────────────────────────────────

/// One backend the front end can talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the backend; commands are posted to `{endpoint}/invoke/{name}`
    pub endpoint: String,
    /// Optional API key (sent as Bearer token)
    pub api_key: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7878".to_string(),
            api_key: None,
        }
    }
}

// ── Picker ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PickerBackend {
    /// Platform file dialog
    #[default]
    Native,
    /// External dialog program, one path per stdout line
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default)]
    pub backend: PickerBackend,
    /// Program + args for the `command` backend
    #[serde(default = "default_picker_command")]
    pub command: Vec<String>,
}

fn default_picker_command() -> Vec<String> {
    vec!["zenity".to_string(), "--file-selection".to_string()]
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            backend: PickerBackend::default(),
            command: default_picker_command(),
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    #[serde(default)]
    pub picker: PickerConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from the standard location, or defaults if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        write_default_to(&path)?;
        Ok(path)
    }

    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

fn write_default_to(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write config file at {}", path.display()))
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
    pub picker: PickerConfig,
}

impl ResolvedConfig {
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        endpoint_override: Option<&str>,
        api_key_override: Option<&str>,
        picker_override: Option<PickerBackend>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        let mut picker = file.picker.clone();
        if let Some(backend) = picker_override {
            picker.backend = backend;
        }

        Self {
            endpoint: endpoint_override
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            api_key: api_key_override
                .map(str::to_string)
                .or(base.api_key),
            profile_name,
            picker,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
        .unwrap_or_else(|| PathBuf::from("."))
        .join("embedsearch")
        .join("config.toml")
}

/// Where the log file lives.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
        .unwrap_or_else(|| PathBuf::from("."))
        .join("embedsearch")
}

fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(home_fallback))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# embedsearch configuration
# Run `embedsearch --init` to regenerate this file.

default_profile = "local"

# ── Local backend (default) ───────────────────────────────────────────────────
# Commands are sent as POST {endpoint}/invoke/{embed_file|find_file|db_fun}
[profiles.local]
endpoint = "http://127.0.0.1:7878"
# api_key = "..."

# ── Remote backend example ────────────────────────────────────────────────────
# [profiles.remote]
# endpoint = "https://search.example.com"
# api_key  = "sk-..."

# ── File dialog ───────────────────────────────────────────────────────────────
# backend = "native"   platform dialog (XDG portal on Linux)
# backend = "command"  run `command` and read one path per stdout line
[picker]
backend = "native"
command = ["zenity", "--file-selection"]
"#;

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let file: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_profile, "local");
        let local = file.resolve_profile(None).unwrap();
        assert_eq!(local.endpoint, "http://127.0.0.1:7878");
        assert!(local.api_key.is_none());
        assert_eq!(file.picker.backend, PickerBackend::Native);
        assert_eq!(file.picker.command, vec!["zenity", "--file-selection"]);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_from(&dir.path().join("nope.toml")).unwrap();
        assert!(file.profiles.is_empty());
        assert_eq!(file.picker.backend, PickerBackend::Native);
    }

    #[test]
    fn test_load_and_write_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default_to(&path).unwrap();
        let file = ConfigFile::load_from(&path).unwrap();
        assert!(file.profiles.contains_key("local"));

        // Existing file is left alone
        fs::write(&path, "default_profile = \"mine\"\n").unwrap();
        write_default_to(&path).unwrap();
        let file = ConfigFile::load_from(&path).unwrap();
        assert_eq!(file.default_profile, "mine");
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_profile = [").unwrap();
        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_resolve_priority() {
        let raw = r#"
default_profile = "a"

[profiles.a]
endpoint = "http://a:1"
api_key = "key-a"

[profiles.b]
endpoint = "http://b:2"

[picker]
backend = "command"
command = ["kdialog", "--getopenfilename"]
"#;
        let file: ConfigFile = toml::from_str(raw).unwrap();

        let r = ResolvedConfig::resolve(&file, None, None, None, None);
        assert_eq!(r.profile_name, "a");
        assert_eq!(r.endpoint, "http://a:1");
        assert_eq!(r.api_key.as_deref(), Some("key-a"));
        assert_eq!(r.picker.backend, PickerBackend::Command);

        let r = ResolvedConfig::resolve(&file, Some("b"), None, Some("cli-key"), Some(PickerBackend::Native));
        assert_eq!(r.profile_name, "b");
        assert_eq!(r.endpoint, "http://b:2");
        assert_eq!(r.api_key.as_deref(), Some("cli-key"));
        assert_eq!(r.picker.backend, PickerBackend::Native);
        assert_eq!(r.picker.command, vec!["kdialog", "--getopenfilename"]);

        let r = ResolvedConfig::resolve(&file, Some("missing"), Some("http://cli:3"), None, None);
        assert_eq!(r.endpoint, "http://cli:3");
        assert!(r.api_key.is_none());
    }
}
