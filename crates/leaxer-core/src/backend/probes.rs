//! Hardware detection probes.
//!
//! Each probe is a plain `() -> Result<bool>` routine behind the
//! [`HardwareProbes`] trait. Which probes run on which platform is decided by
//! the tables on [`Probe`] and [`GpuVendor`], not by branching inside the
//! probes.

use super::cache::CacheKeys;
use super::kind::BackendKind;
use super::locator::BinaryLocator;
use crate::config::{LaunchConfig, ProbeConfig};
use crate::error::{LeaxerError, Result};
use crate::platform::{run_command, Platform};
use crate::system::{parse_name_memory_lines, parse_rocm_csv, GpuDevice, GpuVendor};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    Cuda,
    Rocm,
    DirectMl,
    AppleSilicon,
}

impl Probe {
    pub fn cache_key(&self) -> &'static str {
        match self {
            Probe::Cuda => CacheKeys::CUDA,
            Probe::Rocm => CacheKeys::ROCM,
            Probe::DirectMl => CacheKeys::DIRECTML,
            Probe::AppleSilicon => CacheKeys::APPLE_SILICON,
        }
    }

    /// Backend a successful probe makes available.
    pub fn backend(&self) -> BackendKind {
        match self {
            Probe::Cuda => BackendKind::Cuda,
            Probe::Rocm => BackendKind::Rocm,
            Probe::DirectMl => BackendKind::DirectMl,
            Probe::AppleSilicon => BackendKind::Metal,
        }
    }

    /// Backend probes run on `platform`, in listing order after `cpu`.
    pub fn plan(platform: Platform) -> &'static [Probe] {
        match platform {
            Platform::Linux => &[Probe::Cuda, Probe::Rocm],
            Platform::Windows => &[Probe::Cuda, Probe::DirectMl],
            Platform::MacOs => &[Probe::AppleSilicon],
        }
    }
}

impl GpuVendor {
    pub fn cache_key(&self) -> &'static str {
        match self {
            GpuVendor::Nvidia => CacheKeys::NVIDIA_INFO,
            GpuVendor::Amd => CacheKeys::AMD_INFO,
            GpuVendor::Apple => CacheKeys::APPLE_INFO,
        }
    }

    /// Availability probe that must succeed before devices are listed.
    pub fn precondition(&self) -> Probe {
        match self {
            GpuVendor::Nvidia => Probe::Cuda,
            GpuVendor::Amd => Probe::Rocm,
            GpuVendor::Apple => Probe::AppleSilicon,
        }
    }

    /// Vendors whose tooling exists on `platform`.
    pub fn plan(platform: Platform) -> &'static [GpuVendor] {
        match platform {
            Platform::Linux => &[GpuVendor::Nvidia, GpuVendor::Amd],
            Platform::Windows => &[GpuVendor::Nvidia],
            Platform::MacOs => &[GpuVendor::Apple],
        }
    }
}

/// Source of raw, uncached detection answers.
///
/// Implementations may fail freely; the resolver turns every error into a
/// negative result.
pub trait HardwareProbes: Send + Sync {
    fn detect(&self, probe: Probe) -> Result<bool>;

    fn list_devices(&self, vendor: GpuVendor) -> Result<Vec<GpuDevice>>;
}

/// Probes backed by vendor command-line tools and the host OS.
pub struct SystemProbes {
    locator: Arc<dyn BinaryLocator>,
    timeout: Duration,
}

impl SystemProbes {
    pub fn new(locator: Arc<dyn BinaryLocator>) -> Self {
        Self {
            locator,
            timeout: ProbeConfig::COMMAND_TIMEOUT,
        }
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn cuda(&self) -> Result<bool> {
        let output = run_command(ProbeConfig::NVIDIA_SMI, &["-L"], self.timeout)?;
        Ok(output.success() && output.stdout.contains(ProbeConfig::NVIDIA_DEVICE_MARKER))
    }

    fn rocm(&self) -> Result<bool> {
        let output = run_command(ProbeConfig::ROCM_SMI, &["--version"], self.timeout)?;
        Ok(output.success())
    }

    fn directml(&self) -> Result<bool> {
        let path = self
            .locator
            .arch_bin_path(LaunchConfig::SERVER_BINARY_NAME, BackendKind::DirectMl);
        debug!("Checking for DirectML server at {}", path.display());
        Ok(path.is_file())
    }

    fn apple_silicon(&self) -> Result<bool> {
        if Platform::current() != Platform::MacOs {
            return Ok(false);
        }
        let output = run_command("uname", &["-m"], self.timeout)?;
        if !output.success() {
            return Err(LeaxerError::probe("apple_silicon", "uname -m failed"));
        }
        Ok(output.stdout.trim().starts_with(ProbeConfig::ARM_ARCH_PREFIX))
    }

    fn nvidia_devices(&self) -> Result<Vec<GpuDevice>> {
        let output = run_command(
            ProbeConfig::NVIDIA_SMI,
            &["--query-gpu=name,memory.total", "--format=csv,noheader"],
            self.timeout,
        )?;
        if !output.success() {
            return Err(LeaxerError::probe(
                "nvidia_info",
                format!("nvidia-smi exited with {}", output.status),
            ));
        }
        Ok(parse_name_memory_lines(&output.stdout))
    }

    fn amd_devices(&self) -> Result<Vec<GpuDevice>> {
        let output = run_command(
            ProbeConfig::ROCM_SMI,
            &["--showproductname", "--showmeminfo", "vram", "--csv"],
            self.timeout,
        )?;
        if !output.success() {
            return Err(LeaxerError::probe(
                "amd_info",
                format!("rocm-smi exited with {}", output.status),
            ));
        }
        Ok(parse_rocm_csv(&output.stdout))
    }

    fn apple_devices(&self) -> Result<Vec<GpuDevice>> {
        let output = run_command("sysctl", &["-n", "machdep.cpu.brand_string"], self.timeout)?;
        let brand = output.stdout.trim();
        if !output.success() || brand.is_empty() {
            return Err(LeaxerError::probe("apple_info", "sysctl returned no brand string"));
        }

        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let gib = system.total_memory() / (1024 * 1024 * 1024);

        Ok(vec![GpuDevice {
            name: brand.to_string(),
            memory: format!("{} GB unified", gib),
        }])
    }
}

impl HardwareProbes for SystemProbes {
    fn detect(&self, probe: Probe) -> Result<bool> {
        match probe {
            Probe::Cuda => self.cuda(),
            Probe::Rocm => self.rocm(),
            Probe::DirectMl => self.directml(),
            Probe::AppleSilicon => self.apple_silicon(),
        }
    }

    fn list_devices(&self, vendor: GpuVendor) -> Result<Vec<GpuDevice>> {
        match vendor {
            GpuVendor::Nvidia => self.nvidia_devices(),
            GpuVendor::Amd => self.amd_devices(),
            GpuVendor::Apple => self.apple_devices(),
        }
    }
}
