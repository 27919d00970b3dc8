//! Plugin descriptor file: `~/.config/dlhost/plugins.toml`.
//!
//! Descriptors are data, not code; the host loads them at startup and a
//! default file is written on first run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::events::ConfigError;

use super::{OptionKind, PluginDescriptor, PluginKind, PluginRegistry};

#[derive(Debug, Serialize, Deserialize)]
struct PluginFile {
    #[serde(default, rename = "plugin")]
    plugins: Vec<PluginSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PluginSpec {
    name: String,
    kind: String,
    pattern: String,
    version: String,
    #[serde(default)]
    premium_endpoint: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default = "default_true")]
    disposition: bool,
    #[serde(default, rename = "option")]
    options: Vec<OptionSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OptionSpec {
    key: String,
    kind: String,
    label: String,
    default: String,
}

fn default_true() -> bool {
    true
}

fn parse_kind(name: &str, s: &str) -> Result<PluginKind, ConfigError> {
    match s {
        "hoster" => Ok(PluginKind::Hoster),
        "crypter" => Ok(PluginKind::Crypter),
        "addon" => Ok(PluginKind::Addon),
        "account" => Ok(PluginKind::Account),
        other => Err(ConfigError::BadDescriptor(format!(
            "{name}: unknown plugin kind {other:?}"
        ))),
    }
}

fn parse_option_kind(name: &str, s: &str) -> Result<OptionKind, ConfigError> {
    match s {
        "bool" => Ok(OptionKind::Bool),
        "int" => Ok(OptionKind::Int),
        "str" => Ok(OptionKind::Str),
        other => Err(ConfigError::BadDescriptor(format!(
            "{name}: unknown option kind {other:?}"
        ))),
    }
}

fn build_descriptor(spec: &PluginSpec) -> Result<PluginDescriptor, ConfigError> {
    let kind = parse_kind(&spec.name, &spec.kind)?;
    let mut descriptor = PluginDescriptor::new(&spec.name, kind, &spec.pattern, &spec.version)?;
    if let Some(endpoint) = &spec.premium_endpoint {
        descriptor = descriptor.with_premium(endpoint);
    }
    if let Some(service) = &spec.service {
        descriptor = descriptor.with_service(service);
    }
    if !spec.disposition {
        descriptor = descriptor.without_disposition();
    }
    for opt in &spec.options {
        let opt_kind = parse_option_kind(&spec.name, &opt.kind)?;
        descriptor = descriptor.with_option(&opt.key, opt_kind, &opt.label, &opt.default);
    }
    Ok(descriptor)
}

/// Parse descriptor TOML and register everything it declares.
pub fn register_from_str(registry: &PluginRegistry, toml_str: &str) -> Result<usize> {
    let file: PluginFile = toml::from_str(toml_str).context("invalid plugins file")?;
    let mut count = 0;
    for spec in &file.plugins {
        registry.register(build_descriptor(spec)?);
        count += 1;
    }
    Ok(count)
}

pub fn plugins_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlhost")?;
    Ok(xdg_dirs.place_config_file("plugins.toml")?)
}

/// Load the plugin file, writing a default one on first run.
pub fn load_or_init(registry: &PluginRegistry, path: &Path) -> Result<usize> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_PLUGINS)?;
        tracing::info!("created default plugins file at {}", path.display());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    register_from_str(registry, &data)
}

/// Shipped defaults: the known hosters plus a direct-HTTP fallback.
const DEFAULT_PLUGINS: &str = r#"# dlhost plugin descriptors. Most specific literal prefix wins.

[[plugin]]
name = "RehostTo"
kind = "hoster"
pattern = 'https?://(?:www\.)?rehost\.to/.+'
version = "0.17"
premium_endpoint = "http://rehost.to/process_download.php"
service = "rehost.to"

[[plugin]]
name = "WiiReloadedOrg"
kind = "crypter"
pattern = 'http://(?:www\.)?wii-reloaded\.org/protect/get\.php\?i=.+'
version = "0.16"

[[plugin.option]]
key = "enabled"
kind = "bool"
label = "Activated"
default = "true"

[[plugin]]
name = "DirectHttp"
kind = "hoster"
pattern = 'https?://.+'
version = "0.1"
"#;
