//! Platform-specific path utilities.
//!
//! This module provides:
//! - Target triples used in bundled server binary names
//! - Executable file suffixes
//! - The default settings file location

use super::Platform;
use crate::config::AppConfig;
use std::path::PathBuf;

/// Target triple of the host, in the form bundled server binaries are named with.
///
/// # Platform Behavior
/// - **Linux**: `{arch}-unknown-linux-gnu`
/// - **Windows**: `{arch}-pc-windows-msvc`
/// - **macOS**: `{arch}-apple-darwin`
pub fn target_triple() -> String {
    triple_for(Platform::current(), std::env::consts::ARCH)
}

pub(crate) fn triple_for(platform: Platform, arch: &str) -> String {
    match platform {
        Platform::Linux => format!("{}-unknown-linux-gnu", arch),
        Platform::Windows => format!("{}-pc-windows-msvc", arch),
        Platform::MacOs => format!("{}-apple-darwin", arch),
    }
}

/// Suffix appended to executable file names.
pub fn exe_suffix(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => ".exe",
        Platform::Linux | Platform::MacOs => "",
    }
}

/// Default location of the read-only settings file.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/leaxer/settings.json`
/// - **Windows**: `%APPDATA%\leaxer\settings.json`
/// - **macOS**: `~/Library/Application Support/leaxer/settings.json`
///
/// Returns `None` when the platform has no per-user config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| {
        dir.join(AppConfig::CONFIG_DIR_NAME)
            .join(AppConfig::SETTINGS_FILE_NAME)
    })
}
