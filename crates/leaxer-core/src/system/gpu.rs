//! GPU information snapshot.
//!
//! Device memory is kept as the vendor tool prints it. Output formats drift
//! between driver releases and the only consumer is a human-facing display,
//! so nothing here converts to bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// GPU vendor families that can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Apple,
}

impl GpuVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "nvidia",
            GpuVendor::Amd => "amd",
            GpuVendor::Apple => "apple",
        }
    }
}

/// One device as reported by vendor tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub name: String,
    pub memory: String,
}

/// Availability and devices for one vendor family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorGpuInfo {
    pub available: bool,
    pub devices: Vec<GpuDevice>,
}

impl VendorGpuInfo {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<GpuDevice>) -> Self {
        Self {
            available: true,
            devices,
        }
    }
}

/// GPU snapshot across vendor families.
///
/// A vendor record is `None` when the platform never carries that vendor's
/// tooling (no NVIDIA listing on macOS, no Apple listing elsewhere).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub platform: String,
    pub nvidia: Option<VendorGpuInfo>,
    pub amd: Option<VendorGpuInfo>,
    pub apple: Option<VendorGpuInfo>,
}

impl GpuInfo {
    pub fn vendor(&self, vendor: GpuVendor) -> Option<&VendorGpuInfo> {
        match vendor {
            GpuVendor::Nvidia => self.nvidia.as_ref(),
            GpuVendor::Amd => self.amd.as_ref(),
            GpuVendor::Apple => self.apple.as_ref(),
        }
    }

    pub(crate) fn set_vendor(&mut self, vendor: GpuVendor, info: VendorGpuInfo) {
        match vendor {
            GpuVendor::Nvidia => self.nvidia = Some(info),
            GpuVendor::Amd => self.amd = Some(info),
            GpuVendor::Apple => self.apple = Some(info),
        }
    }

    /// Total number of listed devices.
    pub fn device_count(&self) -> usize {
        [&self.nvidia, &self.amd, &self.apple]
            .into_iter()
            .flatten()
            .map(|v| v.devices.len())
            .sum()
    }
}

/// Parse `name, memory` lines as printed by
/// `nvidia-smi --query-gpu=name,memory.total --format=csv,noheader`.
///
/// Lines that do not split into two non-empty fields are dropped.
pub fn parse_name_memory_lines(output: &str) -> Vec<GpuDevice> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            // Memory is always the last field.
            let (name, memory) = match line.rsplit_once(',') {
                Some(parts) => parts,
                None => {
                    debug!("Dropping malformed GPU line: {}", line);
                    return None;
                }
            };
            let (name, memory) = (name.trim(), memory.trim());
            if name.is_empty() || memory.is_empty() {
                debug!("Dropping malformed GPU line: {}", line);
                return None;
            }
            Some(GpuDevice {
                name: name.to_string(),
                memory: memory.to_string(),
            })
        })
        .collect()
}

/// Parse `rocm-smi --showproductname --showmeminfo vram --csv` output.
///
/// The first line is a header naming the columns; device rows start with
/// `card`. The product name comes from the "Card series" column (falling back
/// to "Card model") and memory from "VRAM Total Memory".
pub fn parse_rocm_csv(output: &str) -> Vec<GpuDevice> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());

    let header: Vec<String> = match lines.next() {
        Some(h) => h.split(',').map(|c| c.trim().to_lowercase()).collect(),
        None => return Vec::new(),
    };

    let find = |needle: &str| header.iter().position(|c| c.contains(needle));
    let name_col = find("card series").or_else(|| find("card model"));
    let memory_col = find("vram total memory");

    let (Some(name_col), Some(memory_col)) = (name_col, memory_col) else {
        debug!("rocm-smi CSV header lacks product or VRAM columns: {:?}", header);
        return Vec::new();
    };

    lines
        .filter(|line| line.to_lowercase().starts_with("card"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let name = fields.get(name_col).filter(|s| !s.is_empty())?;
            let memory = fields.get(memory_col).filter(|s| !s.is_empty())?;
            Some(GpuDevice {
                name: name.to_string(),
                memory: memory.to_string(),
            })
        })
        .collect()
}
