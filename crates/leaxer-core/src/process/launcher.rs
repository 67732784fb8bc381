//! Process launching functionality.

use super::handle::LaunchHandle;
use super::plan::{plan_spawn, script_invocation, LaunchStrategy, SpawnPlan};
use super::script::{remove_launcher_script, write_launcher_script};
use super::{LaunchOptions, LaunchRequest};
use crate::config::LaunchConfig;
use crate::error::{LeaxerError, Result};
use crate::platform::shell::{join_quoted, ShellDialect};
use crate::platform::Platform;
use std::fs;
use std::io::PipeReader;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Launcher for native server executables.
///
/// The Windows strategy is fixed per launcher so every launch from one
/// instance behaves the same way.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    platform: Platform,
    windows_strategy: LaunchStrategy,
    scratch_dir: PathBuf,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher {
    /// Launcher for the host platform using [`LaunchStrategy::DirectSpawn`].
    pub fn new() -> Self {
        Self::for_platform(Platform::current())
    }

    /// Launcher that plans for `platform`.
    ///
    /// Only plans for the host platform can actually be spawned.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            windows_strategy: LaunchStrategy::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_windows_strategy(mut self, strategy: LaunchStrategy) -> Self {
        self.windows_strategy = strategy;
        self
    }

    /// Directory for launcher scripts. Defaults to the OS temp directory.
    pub fn with_scratch_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn windows_strategy(&self) -> LaunchStrategy {
        self.windows_strategy
    }

    /// Plan `request` against the current process environment.
    pub fn plan(&self, request: &LaunchRequest) -> SpawnPlan {
        plan_spawn(self.platform, self.windows_strategy, request, &|var| {
            std::env::var(var).ok()
        })
    }

    /// Start `executable` with `args`.
    ///
    /// Returns as soon as the child exists. A missing critical library is
    /// logged and recorded on the handle but does not stop the launch.
    pub fn spawn_executable(
        &self,
        executable: impl AsRef<Path>,
        args: &[String],
        options: &LaunchOptions,
    ) -> Result<LaunchHandle> {
        let request = LaunchRequest {
            executable: executable.as_ref().to_path_buf(),
            args: args.to_vec(),
            options: options.clone(),
        };
        self.spawn(&request)
    }

    /// Start the process described by `request`.
    pub fn spawn(&self, request: &LaunchRequest) -> Result<LaunchHandle> {
        if self.platform != Platform::current() {
            warn!(
                "Launching with a {} plan on a {} host",
                self.platform,
                Platform::current()
            );
        }

        let mut request = request.clone();
        request.executable = absolute_executable(&request.executable);
        let lib_dir = absolute_dir(&request.lib_dir());
        request.options.lib_dir = Some(lib_dir.clone());

        let critical = request
            .options
            .critical_library
            .clone()
            .unwrap_or_else(|| self.platform.critical_library().to_string());
        let missing_library = check_critical_library(&lib_dir, &critical);

        let mut plan = self.plan(&request);

        let script_path = match plan.script.as_deref() {
            Some(contents) => {
                let path = write_launcher_script(&self.scratch_dir, contents)?;
                plan.raw_args = Some(script_invocation(&path));
                Some(path)
            }
            None => None,
        };

        info!(
            "Launching {} (strategy: {}, libraries: {})",
            request.executable.display(),
            plan.strategy,
            lib_dir.display()
        );
        debug!("Command line: {}", render_plan(&plan));

        let (child, output) = match launch_planned(
            &plan,
            script_path.as_deref(),
            request.options.new_process_group,
        ) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!("Failed to spawn {}: {}", request.executable.display(), e);
                return Err(e);
            }
        };

        match plan.strategy {
            LaunchStrategy::DirectSpawn => info!("Launched process with PID {}", child.id()),
            _ => info!(
                "Launched {} through {} (shell PID {}, server PID not tracked)",
                request.executable.display(),
                plan.program.display(),
                child.id()
            ),
        }

        Ok(LaunchHandle::new(
            child,
            output,
            plan.strategy,
            script_path,
            missing_library,
            request.options.passthrough.clone(),
        ))
    }
}

/// Check that `file_name` exists in `lib_dir`.
///
/// Returns the expected path when it is missing, after logging an error with
/// the directory's contents.
pub fn check_critical_library(lib_dir: &Path, file_name: &str) -> Option<PathBuf> {
    let path = lib_dir.join(file_name);
    if path.is_file() {
        debug!("Found critical runtime library {}", path.display());
        return None;
    }

    error!(
        "Critical runtime library {} not found in {}; the server may fail to start or fall back to CPU. Directory contents: [{}]",
        file_name,
        lib_dir.display(),
        directory_listing(lib_dir)
    );
    Some(path)
}

fn directory_listing(dir: &Path) -> String {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => return format!("<unreadable: {}>", e),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let total = names.len();
    names.truncate(LaunchConfig::DIAGNOSTIC_LISTING_LIMIT);
    let mut listing = names.join(", ");
    if total > LaunchConfig::DIAGNOSTIC_LISTING_LIMIT {
        listing.push_str(&format!(", ... ({} more)", total - LaunchConfig::DIAGNOSTIC_LISTING_LIMIT));
    }
    listing
}

/// Paths with a directory component are made absolute so the working
/// directory change cannot alter which file is run. Bare names keep their
/// `PATH` lookup.
fn absolute_executable(executable: &Path) -> PathBuf {
    let has_dir = executable
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty());
    if !has_dir || executable.is_absolute() {
        return executable.to_path_buf();
    }
    std::path::absolute(executable).unwrap_or_else(|_| executable.to_path_buf())
}

/// The child starts inside the library directory, so a relative one would
/// be resolved a second time from there.
fn absolute_dir(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
}

fn render_plan(plan: &SpawnPlan) -> String {
    let program = plan.program.to_string_lossy();
    match &plan.raw_args {
        Some(raw) => format!("{} {}", program, raw),
        None => {
            let mut words = vec![program.into_owned()];
            words.extend(plan.args.iter().cloned());
            join_quoted(words, ShellDialect::Posix)
        }
    }
}

/// Execute `plan`, removing its launcher script if the spawn fails.
fn launch_planned(
    plan: &SpawnPlan,
    script_path: Option<&Path>,
    new_process_group: bool,
) -> Result<(Child, PipeReader)> {
    let result = execute(plan, new_process_group);
    if result.is_err() {
        if let Some(path) = script_path {
            remove_launcher_script(path);
        }
    }
    result
}

fn execute(plan: &SpawnPlan, new_process_group: bool) -> Result<(Child, PipeReader)> {
    let (reader, writer) = std::io::pipe()?;
    let writer_err = writer.try_clone()?;

    let mut cmd = Command::new(&plan.program);
    cmd.args(&plan.args);

    if let Some(raw) = &plan.raw_args {
        #[cfg(windows)]
        {
            cmd.raw_arg(raw);
        }
        #[cfg(not(windows))]
        {
            cmd.arg(raw);
        }
    }

    cmd.current_dir(&plan.current_dir);
    cmd.envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    cmd.stdin(Stdio::null());
    cmd.stdout(writer);
    cmd.stderr(writer_err);

    #[cfg(unix)]
    {
        if new_process_group {
            cmd.process_group(0);
        }
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, CREATE_NO_WINDOW};
        let mut flags = CREATE_NO_WINDOW;
        if new_process_group {
            flags |= CREATE_NEW_PROCESS_GROUP;
        }
        cmd.creation_flags(flags);
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = new_process_group;
    }

    let spawned = cmd.spawn();
    // The command holds the write ends; drop them so the reader sees EOF when
    // the child exits.
    drop(cmd);

    let child = spawned.map_err(|e| LeaxerError::Spawn {
        program: plan.program.display().to_string(),
        source: e,
    })?;
    Ok((child, reader))
}
