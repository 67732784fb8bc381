//! Centralized configuration for the launcher core.
//!
//! Constants for probe timing, launch environment names and settings keys.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Leaxer";
    pub const CONFIG_DIR_NAME: &'static str = "leaxer";
    pub const SETTINGS_FILE_NAME: &'static str = "settings.json";
}

/// Configuration for hardware detection probes.
pub struct ProbeConfig;

impl ProbeConfig {
    /// Upper bound for any single vendor command.
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
    /// How often a running probe command is polled for exit.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

    pub const NVIDIA_SMI: &'static str = "nvidia-smi";
    pub const ROCM_SMI: &'static str = "rocm-smi";
    /// Marker `nvidia-smi -L` prints once per device ("GPU 0: ...").
    pub const NVIDIA_DEVICE_MARKER: &'static str = "GPU";
    /// Prefix of the machine architecture reported on Apple silicon.
    pub const ARM_ARCH_PREFIX: &'static str = "arm";
}

/// Configuration for launching native server executables.
pub struct LaunchConfig;

impl LaunchConfig {
    /// Server executable looked up by the DirectML probe.
    pub const SERVER_BINARY_NAME: &'static str = "sd-server";
    /// Variable advertising the runtime-library directory to ggml's backend loader.
    pub const BACKEND_DIR_ENV: &'static str = "GGML_BACKEND_DIR";
    /// Prefix for generated launcher scripts.
    pub const SCRIPT_PREFIX: &'static str = "leaxer-launch-";
    /// Number of directory entries included in a missing-library diagnostic.
    pub const DIAGNOSTIC_LISTING_LIMIT: usize = 64;
}

/// Keys read from the settings collaborator.
pub struct SettingsKeys;

impl SettingsKeys {
    pub const COMPUTE_BACKEND: &'static str = "compute_backend";
}
