//! Native server process launching.
//!
//! Starts an inference-server executable so that its dynamic loader finds the
//! backend's shared libraries in a chosen runtime-library directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use leaxer_core::process::{LaunchOptions, ProcessLauncher};
//! use std::io::{BufRead, BufReader};
//!
//! fn main() -> leaxer_core::Result<()> {
//!     let launcher = ProcessLauncher::new();
//!     let options = LaunchOptions::new().with_env("SD_THREADS", "8");
//!     let mut handle = launcher.spawn_executable(
//!         "/opt/leaxer/bin/cuda/sd-server",
//!         &["--port".to_string(), "8188".to_string()],
//!         &options,
//!     )?;
//!
//!     println!("pid: {:?}", handle.pid());
//!     if let Some(output) = handle.take_output() {
//!         for line in BufReader::new(output).lines().map_while(Result::ok) {
//!             println!("{}", line);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod handle;
mod launcher;
mod plan;
mod script;

pub use handle::LaunchHandle;
pub use launcher::{check_critical_library, ProcessLauncher};
pub use plan::{
    plan_environment, plan_spawn, script_invocation, InvalidStrategy, LaunchStrategy, SpawnPlan,
    CMD_EXE,
};
pub use script::write_launcher_script;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Options for a single launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Directory holding the runtime libraries. Defaults to the executable's directory.
    pub lib_dir: Option<PathBuf>,
    /// Extra environment entries, applied in order.
    pub env: Vec<(String, String)>,
    /// Library file checked before spawning. Defaults to the platform's ggml library.
    pub critical_library: Option<String>,
    /// Start the child in its own process group.
    pub new_process_group: bool,
    /// Caller data carried to the handle untouched.
    pub passthrough: HashMap<String, String>,
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lib_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.lib_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_critical_library(mut self, file_name: impl Into<String>) -> Self {
        self.critical_library = Some(file_name.into());
        self
    }

    pub fn with_new_process_group(mut self, enabled: bool) -> Self {
        self.new_process_group = enabled;
        self
    }

    pub fn with_passthrough(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.passthrough.insert(key.into(), value.into());
        self
    }
}

/// An executable to start, with its arguments and options.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub options: LaunchOptions,
}

impl LaunchRequest {
    pub fn new<I, S>(executable: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            executable: executable.as_ref().to_path_buf(),
            args: args.into_iter().map(Into::into).collect(),
            options: LaunchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LaunchOptions) -> Self {
        self.options = options;
        self
    }

    /// Effective runtime-library directory.
    pub fn lib_dir(&self) -> PathBuf {
        if let Some(dir) = &self.options.lib_dir {
            return dir.clone();
        }
        match self.executable.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}
