use std::{fs, path::Path, path::PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "scm.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub data_dir: Option<PathBuf>,
    pub login_path: String,
    pub landing_path: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".into(),
            data_dir: None,
            login_path: "/login".into(),
            landing_path: "/dashboard".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    data_dir: Option<PathBuf>,
    login_path: Option<String>,
    landing_path: Option<String>,
}

pub fn load_settings() -> ClientSettings {
    load_settings_with(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment overrides.
pub fn load_settings_with(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.api_base_url {
                    apply_base_url(&mut settings, &v, "settings file");
                }
                if let Some(v) = file_cfg.data_dir {
                    settings.data_dir = Some(v);
                }
                if let Some(v) = file_cfg.login_path {
                    settings.login_path = v;
                }
                if let Some(v) = file_cfg.landing_path {
                    settings.landing_path = v;
                }
            }
            Err(err) => warn!("config: ignoring malformed {}: {err}", file.display()),
        }
    }

    for key in ["SCM_API_URL", "APP__API_URL"] {
        if let Some(v) = env(key) {
            apply_base_url(&mut settings, &v, key);
        }
    }
    for key in ["SCM_DATA_DIR", "APP__DATA_DIR"] {
        if let Some(v) = env(key) {
            settings.data_dir = Some(PathBuf::from(v));
        }
    }

    settings
}

fn apply_base_url(settings: &mut ClientSettings, raw: &str, source: &str) {
    match normalize_base_url(raw) {
        Ok(url) => settings.api_base_url = url,
        Err(err) => warn!("config: ignoring api base url from {source}: {err:#}"),
    }
}

pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).with_context(|| format!("invalid url '{trimmed}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!("unsupported scheme '{}'", parsed.scheme()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
