//! Locating bundled server binaries.

use super::kind::BackendKind;
use crate::platform::{self, Platform};
use std::path::{Path, PathBuf};

/// Maps an executable name and backend to the architecture-specific path of
/// the bundled binary.
pub trait BinaryLocator: Send + Sync {
    fn arch_bin_path(&self, executable_name: &str, backend: BackendKind) -> PathBuf;
}

/// Binaries laid out per backend under a root directory:
/// `<root>/<backend>/<name>-<target triple><exe suffix>`.
#[derive(Debug, Clone)]
pub struct ArchBinDir {
    root: PathBuf,
    platform: Platform,
    triple: String,
}

impl ArchBinDir {
    /// Locator for the host platform.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            platform: Platform::current(),
            triple: platform::target_triple(),
        }
    }

    /// Locator for another platform and architecture.
    pub fn for_target(root: impl AsRef<Path>, platform: Platform, arch: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            platform,
            triple: platform::paths::triple_for(platform, arch),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the binaries and runtime libraries for `backend`.
    pub fn backend_dir(&self, backend: BackendKind) -> PathBuf {
        self.root.join(backend.as_str())
    }
}

impl BinaryLocator for ArchBinDir {
    fn arch_bin_path(&self, executable_name: &str, backend: BackendKind) -> PathBuf {
        self.backend_dir(backend).join(format!(
            "{}-{}{}",
            executable_name,
            self.triple,
            platform::exe_suffix(self.platform)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_directml_path() {
        let locator = ArchBinDir::for_target("/opt/leaxer/bin", Platform::Windows, "x86_64");
        assert_eq!(
            locator.arch_bin_path("sd-server", BackendKind::DirectMl),
            Path::new("/opt/leaxer/bin/directml/sd-server-x86_64-pc-windows-msvc.exe")
        );
    }

    #[test]
    fn test_host_path_has_triple() {
        let locator = ArchBinDir::new("bin");
        let path = locator.arch_bin_path("sd-server", BackendKind::Cpu);
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("sd-server-"));
        assert!(file_name.contains(std::env::consts::ARCH));
        assert!(path.starts_with(locator.backend_dir(BackendKind::Cpu)));
    }
}
