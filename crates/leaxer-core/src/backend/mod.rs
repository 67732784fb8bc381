//! Compute backend detection and resolution.
//!
//! The resolver answers "which backend should the server run with?" by
//! combining the user's `compute_backend` preference with cached hardware
//! probes.
//!
//! # Resolution
//!
//! - `auto` picks the first available of `cuda`, `metal`, `directml`, `rocm`,
//!   falling back to `cpu`.
//! - A valid but unavailable preference logs a warning and resolves as `auto`.
//! - An unknown name logs a warning and resolves as `auto`.
//!
//! # Example
//!
//! ```rust,no_run
//! use leaxer_core::backend::{ArchBinDir, BackendResolver, DetectionCache, SystemProbes};
//! use leaxer_core::platform::Platform;
//! use leaxer_core::settings::MemorySettings;
//! use std::sync::Arc;
//!
//! let probes = SystemProbes::new(Arc::new(ArchBinDir::new("bin")));
//! let resolver = BackendResolver::new(
//!     Platform::current(),
//!     Arc::new(probes),
//!     Arc::new(MemorySettings::with("compute_backend", "cuda")),
//!     Arc::new(DetectionCache::new()),
//! );
//!
//! println!("Running with {}", resolver.get_backend());
//! ```

mod cache;
mod kind;
mod locator;
mod probes;
mod resolver;

pub use cache::{CacheKeys, CachedValue, DetectionCache};
pub use kind::{valid_backends, BackendKind, BackendPreference, InvalidBackend};
pub use locator::{ArchBinDir, BinaryLocator};
pub use probes::{HardwareProbes, Probe, SystemProbes};
pub use resolver::BackendResolver;
