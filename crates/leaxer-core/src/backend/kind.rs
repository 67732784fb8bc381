//! Compute backend vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A concrete compute backend. Resolution always yields one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cpu,
    Cuda,
    Metal,
    #[serde(rename = "directml")]
    DirectMl,
    Rocm,
}

impl BackendKind {
    /// Accelerators in the order auto-detection prefers them.
    pub const AUTO_PRIORITY: [BackendKind; 4] = [
        BackendKind::Cuda,
        BackendKind::Metal,
        BackendKind::DirectMl,
        BackendKind::Rocm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cpu => "cpu",
            BackendKind::Cuda => "cuda",
            BackendKind::Metal => "metal",
            BackendKind::DirectMl => "directml",
            BackendKind::Rocm => "rocm",
        }
    }

    pub fn is_accelerated(&self) -> bool {
        !matches!(self, BackendKind::Cpu)
    }
}

impl FromStr for BackendKind {
    type Err = InvalidBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(BackendKind::Cpu),
            "cuda" => Ok(BackendKind::Cuda),
            "metal" => Ok(BackendKind::Metal),
            "directml" => Ok(BackendKind::DirectMl),
            "rocm" => Ok(BackendKind::Rocm),
            _ => Err(InvalidBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a user asked for: automatic detection or a specific backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Explicit(BackendKind),
}

impl BackendPreference {
    pub const AUTO: &'static str = "auto";

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendPreference::Auto => Self::AUTO,
            BackendPreference::Explicit(kind) => kind.as_str(),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = InvalidBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::AUTO {
            return Ok(BackendPreference::Auto);
        }
        s.parse::<BackendKind>().map(BackendPreference::Explicit)
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend name outside the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBackend(pub String);

impl fmt::Display for InvalidBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown compute backend '{}'", self.0)
    }
}

impl std::error::Error for InvalidBackend {}

/// Every name a user may request, `auto` included.
pub fn valid_backends() -> &'static [&'static str] {
    &["auto", "cpu", "cuda", "metal", "directml", "rocm"]
}
