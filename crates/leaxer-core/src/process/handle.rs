//! Handle to a launched server process.

use super::plan::LaunchStrategy;
use crate::error::{LeaxerError, Result};
use std::collections::HashMap;
use std::io::PipeReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};

/// A spawned child process with its merged stdout/stderr stream.
///
/// Waiting, killing and output consumption are left to the caller; the handle
/// only bundles what they need.
#[derive(Debug)]
pub struct LaunchHandle {
    child: Child,
    output: Option<PipeReader>,
    strategy: LaunchStrategy,
    script_path: Option<PathBuf>,
    missing_library: Option<PathBuf>,
    passthrough: HashMap<String, String>,
}

impl LaunchHandle {
    pub(crate) fn new(
        child: Child,
        output: PipeReader,
        strategy: LaunchStrategy,
        script_path: Option<PathBuf>,
        missing_library: Option<PathBuf>,
        passthrough: HashMap<String, String>,
    ) -> Self {
        Self {
            child,
            output: Some(output),
            strategy,
            script_path,
            missing_library,
            passthrough,
        }
    }

    /// OS process id of the target executable.
    ///
    /// `None` for the shell strategies: the spawned child is `cmd.exe` and the
    /// server is its grandchild.
    pub fn pid(&self) -> Option<u32> {
        self.strategy.child_is_target().then(|| self.child.id())
    }

    /// Process id of the command interpreter, for the shell strategies.
    pub fn shell_pid(&self) -> Option<u32> {
        (!self.strategy.child_is_target()).then(|| self.child.id())
    }

    pub fn strategy(&self) -> LaunchStrategy {
        self.strategy
    }

    /// Launcher script the process was started from, if any.
    ///
    /// Removing it once the process has exited is the caller's job.
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    /// Critical library that was absent at launch time.
    pub fn missing_library(&self) -> Option<&Path> {
        self.missing_library.as_deref()
    }

    pub fn passthrough(&self) -> &HashMap<String, String> {
        &self.passthrough
    }

    /// Merged stdout/stderr of the child, unless already taken.
    pub fn output(&mut self) -> Option<&mut PipeReader> {
        self.output.as_mut()
    }

    pub fn take_output(&mut self) -> Option<PipeReader> {
        self.output.take()
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Block until the child exits.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().map_err(LeaxerError::from)
    }

    /// Kill the child. A child that already exited is not an error.
    pub fn kill(&mut self) -> Result<()> {
        match self.child.try_wait()? {
            Some(_) => Ok(()),
            None => self.child.kill().map_err(LeaxerError::from),
        }
    }

    pub fn into_parts(self) -> (Child, Option<PipeReader>) {
        (self.child, self.output)
    }
}
