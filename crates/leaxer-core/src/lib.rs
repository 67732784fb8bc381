//! Leaxer Core - compute backend detection and native server launching.
//!
//! Two components share only the backend-name vocabulary:
//!
//! - [`backend::BackendResolver`] works out which compute backend (`cpu`,
//!   `cuda`, `metal`, `directml`, `rocm`) the inference server should use,
//!   from the user's preference and cached hardware probes.
//! - [`process::ProcessLauncher`] starts the server executable so that its
//!   dynamic loader finds that backend's runtime libraries.
//!
//! Mapping a backend to an executable and library directory is up to the
//! caller (see [`backend::ArchBinDir`] for the bundled layout).
//!
//! # Example
//!
//! ```rust,no_run
//! use leaxer_core::backend::{ArchBinDir, BackendResolver, DetectionCache, SystemProbes};
//! use leaxer_core::config::LaunchConfig;
//! use leaxer_core::platform::Platform;
//! use leaxer_core::process::{LaunchOptions, ProcessLauncher};
//! use leaxer_core::settings::MemorySettings;
//! use leaxer_core::BinaryLocator;
//! use std::sync::Arc;
//!
//! fn main() -> leaxer_core::Result<()> {
//!     let bins = Arc::new(ArchBinDir::new("/opt/leaxer/bin"));
//!     let resolver = BackendResolver::new(
//!         Platform::current(),
//!         Arc::new(SystemProbes::new(bins.clone())),
//!         Arc::new(MemorySettings::new()),
//!         Arc::new(DetectionCache::new()),
//!     );
//!
//!     let backend = resolver.get_backend();
//!     let exe = bins.arch_bin_path(LaunchConfig::SERVER_BINARY_NAME, backend);
//!     let handle = ProcessLauncher::new().spawn_executable(
//!         &exe,
//!         &["--listen-port".to_string(), "8188".to_string()],
//!         &LaunchOptions::new(),
//!     )?;
//!     println!("{} server running as {:?}", backend, handle.pid());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod settings;
pub mod system;

// Re-export commonly used types
pub use backend::{
    valid_backends, ArchBinDir, BackendKind, BackendPreference, BackendResolver, BinaryLocator,
    DetectionCache, HardwareProbes, Probe, SystemProbes,
};
pub use error::{LeaxerError, Result};
pub use platform::Platform;
pub use process::{LaunchHandle, LaunchOptions, LaunchRequest, LaunchStrategy, ProcessLauncher};
pub use settings::{JsonSettingsFile, MemorySettings, SettingsStore};
pub use system::{GpuDevice, GpuInfo, GpuVendor, VendorGpuInfo};
