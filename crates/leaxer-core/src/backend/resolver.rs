//! Effective compute backend resolution.

use super::cache::{CacheKeys, DetectionCache};
use super::kind::{valid_backends, BackendKind, BackendPreference};
use super::probes::{HardwareProbes, Probe};
use crate::config::SettingsKeys;
use crate::platform::Platform;
use crate::settings::SettingsStore;
use crate::system::{GpuInfo, GpuVendor, VendorGpuInfo};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves the user's backend preference against detected hardware.
///
/// All detection goes through the shared [`DetectionCache`]; every probe
/// failure degrades to "not available".
pub struct BackendResolver {
    platform: Platform,
    probes: Arc<dyn HardwareProbes>,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<DetectionCache>,
}

impl BackendResolver {
    pub fn new(
        platform: Platform,
        probes: Arc<dyn HardwareProbes>,
        settings: Arc<dyn SettingsStore>,
        cache: Arc<DetectionCache>,
    ) -> Self {
        Self {
            platform,
            probes,
            settings,
            cache,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn cache(&self) -> &Arc<DetectionCache> {
        &self.cache
    }

    /// Effective backend for the stored `compute_backend` preference.
    ///
    /// An unset preference means `auto`. Never returns anything outside the
    /// detected set.
    pub fn get_backend(&self) -> BackendKind {
        let preference = self
            .settings
            .get(SettingsKeys::COMPUTE_BACKEND)
            .unwrap_or_else(|| BackendPreference::AUTO.to_string());
        self.resolve_backend(&preference)
    }

    /// Resolve a preference string to an available backend.
    pub fn resolve_backend(&self, preference: &str) -> BackendKind {
        match preference.parse::<BackendPreference>() {
            Ok(BackendPreference::Auto) => self.auto_detect(),
            Ok(BackendPreference::Explicit(kind)) => {
                if self.available_backends().contains(&kind) {
                    debug!("Using preferred backend {}", kind);
                    kind
                } else {
                    let fallback = self.auto_detect();
                    warn!(
                        "Preferred backend {} is not available on this {} machine, falling back to {}",
                        kind, self.platform, fallback
                    );
                    fallback
                }
            }
            Err(invalid) => {
                let fallback = self.auto_detect();
                warn!(
                    "Invalid compute_backend setting '{}' (expected one of {}), using {}",
                    invalid.0,
                    valid_backends().join(", "),
                    fallback
                );
                fallback
            }
        }
    }

    /// Backends usable on this machine. `cpu` is always first.
    pub fn available_backends(&self) -> Vec<BackendKind> {
        self.cache.backends(CacheKeys::AVAILABLE_BACKENDS, || {
            let mut backends = vec![BackendKind::Cpu];
            for probe in Probe::plan(self.platform) {
                if self.probe(*probe) {
                    backends.push(probe.backend());
                }
            }
            info!(
                "Available compute backends on {}: {}",
                self.platform,
                backends
                    .iter()
                    .map(BackendKind::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            backends
        })
    }

    /// Whether `name` is a backend in [`available_backends`](Self::available_backends).
    ///
    /// Unknown names and `auto` are simply not available.
    pub fn backend_available(&self, name: &str) -> bool {
        match name.parse::<BackendKind>() {
            Ok(kind) => self.available_backends().contains(&kind),
            Err(_) => false,
        }
    }

    /// GPU snapshot for display. Each vendor is probed and cached separately.
    pub fn gpu_info(&self) -> GpuInfo {
        let mut info = GpuInfo {
            platform: self.platform.to_string(),
            ..Default::default()
        };
        for vendor in GpuVendor::plan(self.platform) {
            info.set_vendor(*vendor, self.vendor_info(*vendor));
        }
        info
    }

    /// Forget every detection result.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Compute backend detection cache cleared");
    }

    /// Every name a preference may hold.
    pub fn valid_backends(&self) -> &'static [&'static str] {
        valid_backends()
    }

    /// Run detection on the blocking pool so later queries hit the cache.
    pub async fn prewarm(self: &Arc<Self>) {
        let resolver = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || {
            let backends = resolver.available_backends();
            let gpu = resolver.gpu_info();
            (backends.len(), gpu.device_count())
        })
        .await;

        match result {
            Ok((backends, devices)) => debug!(
                "Detection cache warmed: {} backends, {} GPU devices",
                backends, devices
            ),
            Err(e) => warn!("Detection pre-warm task failed: {}", e),
        }
    }

    fn auto_detect(&self) -> BackendKind {
        let available = self.available_backends();
        BackendKind::AUTO_PRIORITY
            .into_iter()
            .find(|kind| available.contains(kind))
            .unwrap_or(BackendKind::Cpu)
    }

    fn probe(&self, probe: Probe) -> bool {
        self.cache.flag(probe.cache_key(), || match self.probes.detect(probe) {
            Ok(found) => {
                debug!("Probe {} -> {}", probe.cache_key(), found);
                found
            }
            Err(e) => {
                debug!("Probe {} failed: {}", probe.cache_key(), e);
                false
            }
        })
    }

    fn vendor_info(&self, vendor: GpuVendor) -> VendorGpuInfo {
        self.cache.vendor(vendor.cache_key(), || {
            if !self.probe(vendor.precondition()) {
                return VendorGpuInfo::unavailable();
            }
            match self.probes.list_devices(vendor) {
                Ok(devices) => VendorGpuInfo::with_devices(devices),
                Err(e) => {
                    debug!("Listing {} devices failed: {}", vendor.as_str(), e);
                    VendorGpuInfo::unavailable()
                }
            }
        })
    }
}
