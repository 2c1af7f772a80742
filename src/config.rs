use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, ScanArgs};
use crate::decompiler::DEFAULT_TOOL;
use crate::model::ScanRequest;

pub const CACHE_ENV: &str = "DECOMP_SCAN_CACHE";
pub const DECOMPILER_ENV: &str = "DECOMP_SCAN_ILSPY";
pub const SETTINGS_ENV: &str = "DECOMP_SCAN_SETTINGS";

/// Read-only view of the settings file the UI maintains.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub base_directory: String,
    pub search_string: String,
    pub scan_dlls: bool,
    pub scan_xmls: bool,
    pub dll_whitelist: Vec<String>,
    pub dll_sha1_whitelist: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            base_directory: String::new(),
            search_string: String::new(),
            scan_dlls: true,
            scan_xmls: true,
            dll_whitelist: Vec::new(),
            dll_sha1_whitelist: Vec::new(),
        }
    }
}

/// Missing or malformed files fall back to defaults.
pub fn load_settings(path: &Path) -> ScanSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to read settings {}: {err}", path.display());
            }
            return ScanSettings::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!(
                "Error decoding JSON from {}: {err}. Using default settings.",
                path.display()
            );
            ScanSettings::default()
        }
    }
}

/// Command-line values win over the settings file; whitelists are merged.
pub fn build_request(args: &ScanArgs, settings: &ScanSettings) -> ScanRequest {
    let dirs = args.dirs.as_deref().unwrap_or(&settings.base_directory);
    let terms = args.terms.as_deref().unwrap_or(&settings.search_string);

    ScanRequest::from_delimited(dirs, terms)
        .with_text(settings.scan_xmls && !args.no_text)
        .with_binary(settings.scan_dlls && !args.no_binary)
        .with_whitelist(settings.dll_whitelist.iter().chain(args.whitelist.iter()))
        .with_hash_whitelist(settings.dll_sha1_whitelist.iter())
}

pub fn resolve_cache_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.cache_dir.clone() {
        return Ok(p);
    }
    if let Ok(p) = env::var(CACHE_ENV) {
        return Ok(PathBuf::from(p));
    }
    Ok(app_home()?.join("decompiled"))
}

pub fn resolve_decompiler(cli: &Cli) -> PathBuf {
    if let Some(p) = cli.decompiler.clone() {
        return p;
    }
    if let Ok(p) = env::var(DECOMPILER_ENV) {
        return PathBuf::from(p);
    }
    PathBuf::from(DEFAULT_TOOL)
}

pub fn resolve_settings_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.settings.clone() {
        return Ok(p);
    }
    if let Ok(p) = env::var(SETTINGS_ENV) {
        return Ok(PathBuf::from(p));
    }
    Ok(app_home()?.join("settings.json"))
}

fn app_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .context("Failed to resolve data directory")?;
    Ok(base.join("decomp-scan"))
}
