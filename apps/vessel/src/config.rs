use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use shared::domain::ParameterSet;

pub const DEFAULT_CONFIG_FILE: &str = "vessel.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub compute_url: String,
    pub definition: String,
    pub database_url: String,
    pub download_dir: PathBuf,
    pub export_file_name: String,
    pub parameters: ParameterSet,
    pub frame_rate: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub compute_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compute_url: "https://macad2021.compute.rhino3d.com/".into(),
            definition: "vassel.gh".into(),
            database_url: "sqlite://./data/vessel.db".into(),
            download_dir: PathBuf::from("."),
            export_file_name: "vassel.3dm".into(),
            parameters: ParameterSet::default(),
            frame_rate: 30,
            viewport_width: 1280,
            viewport_height: 720,
            compute_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn compute_timeout(&self) -> Option<Duration> {
        self.compute_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Defaults, then the config file (if any), then environment overrides.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let raw = match config_path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
    };

    Ok(load_settings_from(raw.as_deref(), |key| std::env::var(key).ok()))
}

pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => tracing::warn!("ignoring malformed config file: {err}"),
        }
    }

    if let Some(v) = env("VESSEL_COMPUTE_URL") {
        settings.compute_url = v;
    }
    if let Some(v) = env("APP__COMPUTE_URL") {
        settings.compute_url = v;
    }
    if let Some(v) = env("APP__DEFINITION") {
        settings.definition = v;
    }
    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }
    if let Some(v) = env("APP__FRAME_RATE") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.frame_rate = parsed;
        }
    }
    if let Some(v) = env("APP__COMPUTE_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.compute_timeout_secs = Some(parsed);
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = string_value(file_cfg, "compute_url") {
        settings.compute_url = v;
    }
    if let Some(v) = string_value(file_cfg, "definition") {
        settings.definition = v;
    }
    if let Some(v) = string_value(file_cfg, "database_url") {
        settings.database_url = v;
    }
    if let Some(v) = string_value(file_cfg, "download_dir") {
        settings.download_dir = PathBuf::from(v);
    }
    if let Some(v) = string_value(file_cfg, "export_file_name") {
        settings.export_file_name = v;
    }
    if let Some(v) = number_value(file_cfg, "density") {
        settings.parameters.density = v;
    }
    if let Some(v) = number_value(file_cfg, "radius") {
        settings.parameters.radius = v;
    }
    if let Some(v) = number_value(file_cfg, "rotate") {
        settings.parameters.rotate = v;
    }
    if let Some(v) = number_value(file_cfg, "frame_rate") {
        settings.frame_rate = v as u32;
    }
    if let Some(v) = number_value(file_cfg, "viewport_width") {
        settings.viewport_width = v as u32;
    }
    if let Some(v) = number_value(file_cfg, "viewport_height") {
        settings.viewport_height = v as u32;
    }
    if let Some(v) = number_value(file_cfg, "compute_timeout_secs") {
        settings.compute_timeout_secs = Some(v as u64);
    }
}

fn string_value(cfg: &HashMap<String, toml::Value>, key: &str) -> Option<String> {
    cfg.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

// Accepts integers, floats, and quoted numbers.
fn number_value(cfg: &HashMap<String, toml::Value>, key: &str) -> Option<f64> {
    match cfg.get(key)? {
        toml::Value::Integer(i) => Some(*i as f64),
        toml::Value::Float(f) => Some(*f),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Turns a bare file path into a sqlite url; `Storage::new` creates its directory.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
