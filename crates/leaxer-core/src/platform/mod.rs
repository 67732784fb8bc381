//! Platform abstraction layer for cross-platform compatibility.
//!
//! OS-specific behavior is described by [`Platform`] values rather than
//! scattered `#[cfg]` blocks, so the resolver and the launcher can plan for a
//! platform other than the host (tests simulate all three).
//!
//! # Architecture
//!
//! - `paths` - Target triples, executable suffixes and settings locations
//! - `process` - Running vendor commands under a timeout
//! - `shell` - Argument quoting for command interpreters

pub mod paths;
pub mod process;
pub mod shell;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use paths::{default_settings_path, exe_suffix, target_triple};
pub use process::{run_command, CommandOutput};
pub use shell::{quote_if_needed, ShellDialect};

/// An operating system family the launcher knows how to plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    #[serde(rename = "macos")]
    MacOs,
}

impl Platform {
    /// The platform this binary was compiled for.
    ///
    /// Unknown Unix flavours are treated as Linux: they share the
    /// `LD_LIBRARY_PATH` convention and never offer Metal or DirectML.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
        }
    }

    /// Environment variable the dynamic loader consults for extra directories.
    pub fn library_path_var(&self) -> &'static str {
        match self {
            Platform::Linux => "LD_LIBRARY_PATH",
            Platform::Windows => "PATH",
            Platform::MacOs => "DYLD_LIBRARY_PATH",
        }
    }

    /// Separator between entries of a search-path variable.
    pub fn path_list_separator(&self) -> char {
        match self {
            Platform::Windows => ';',
            Platform::Linux | Platform::MacOs => ':',
        }
    }

    /// File name of the ggml core library that every backend build ships.
    pub fn critical_library(&self) -> &'static str {
        match self {
            Platform::Linux => "libggml.so",
            Platform::Windows => "ggml.dll",
            Platform::MacOs => "libggml.dylib",
        }
    }

    /// Whether environment variable names compare case-insensitively.
    pub fn env_keys_case_insensitive(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
