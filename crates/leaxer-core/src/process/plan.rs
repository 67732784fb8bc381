//! Spawn planning.
//!
//! Turning a [`LaunchRequest`] into a [`SpawnPlan`] is pure: it touches
//! neither the filesystem nor the process table, so Windows plans can be
//! checked on any host.
//!
//! # Windows library resolution
//!
//! Windows resolves a new process's DLL imports while creating the process
//! image, before anything the child runs can change its directory. Library
//! placement therefore has to be arranged by the parent:
//!
//! - [`LaunchStrategy::DirectSpawn`] spawns the executable itself with the
//!   library directory as its working directory and at the front of `PATH`.
//!   Both are documented steps of the DLL search order. The pid is the
//!   server's own.
//! - [`LaunchStrategy::ShellWrapper`] runs `cmd.exe /C "cd /d <dir> && <exe>"`.
//!   The server is a grandchild, so its pid is not observable.
//! - [`LaunchStrategy::LauncherScript`] writes the same sequence to a `.bat`
//!   file first, sidestepping `cmd.exe` command-line limits. Same pid caveat.

use super::{LaunchOptions, LaunchRequest};
use crate::config::LaunchConfig;
use crate::platform::shell::{join_quoted, quote_if_needed, ShellDialect};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Command interpreter used by the shell strategies.
pub const CMD_EXE: &str = "cmd.exe";

/// How the child process is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStrategy {
    /// Spawn the executable directly with an augmented search path.
    #[default]
    DirectSpawn,
    /// `cmd.exe /C "cd /d <dir> && <exe> <args>"`.
    ShellWrapper,
    /// A generated `.bat` file run through `cmd.exe`.
    LauncherScript,
}

impl LaunchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchStrategy::DirectSpawn => "direct",
            LaunchStrategy::ShellWrapper => "shell",
            LaunchStrategy::LauncherScript => "script",
        }
    }

    /// Whether the spawned child is the target executable itself.
    pub fn child_is_target(&self) -> bool {
        matches!(self, LaunchStrategy::DirectSpawn)
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchStrategy {
    type Err = InvalidStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(LaunchStrategy::DirectSpawn),
            "shell" => Ok(LaunchStrategy::ShellWrapper),
            "script" => Ok(LaunchStrategy::LauncherScript),
            _ => Err(InvalidStrategy(s.to_string())),
        }
    }
}

/// A strategy name other than `direct`, `shell` or `script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStrategy(pub String);

impl fmt::Display for InvalidStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown launch strategy '{}' (expected direct, shell or script)",
            self.0
        )
    }
}

impl std::error::Error for InvalidStrategy {}

/// Everything needed to create the child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnPlan {
    pub strategy: LaunchStrategy,
    pub program: PathBuf,
    /// Arguments passed through the platform's normal argument quoting.
    pub args: Vec<String>,
    /// Command-line tail passed verbatim to `cmd.exe`.
    pub raw_args: Option<String>,
    pub current_dir: PathBuf,
    /// Overrides applied on top of the inherited environment, in order.
    pub env: Vec<(String, String)>,
    /// Launcher script contents for [`LaunchStrategy::LauncherScript`].
    pub script: Option<String>,
    /// Runtime-library directory the plan was built for.
    pub lib_dir: PathBuf,
}

/// Build the plan for `request` on `platform`.
///
/// `windows_strategy` only applies to [`Platform::Windows`]; other platforms
/// always spawn directly. `inherited` looks up variables of the environment
/// the child will inherit.
pub fn plan_spawn(
    platform: Platform,
    windows_strategy: LaunchStrategy,
    request: &LaunchRequest,
    inherited: &dyn Fn(&str) -> Option<String>,
) -> SpawnPlan {
    let strategy = match platform {
        Platform::Windows => windows_strategy,
        Platform::Linux | Platform::MacOs => LaunchStrategy::DirectSpawn,
    };

    let lib_dir = request.lib_dir();
    let executable = request.executable.clone();
    let env = plan_environment(platform, &lib_dir, &request.options, inherited);

    let mut plan = SpawnPlan {
        strategy,
        program: executable.clone(),
        args: Vec::new(),
        raw_args: None,
        current_dir: lib_dir.clone(),
        env,
        script: None,
        lib_dir: lib_dir.clone(),
    };

    match strategy {
        LaunchStrategy::DirectSpawn => {
            plan.args = request.args.clone();
        }
        LaunchStrategy::ShellWrapper => {
            let line = cd_and_run(&lib_dir, &executable, &request.args);
            plan.program = PathBuf::from(CMD_EXE);
            plan.raw_args = Some(format!("/D /S /C \"{}\"", line));
        }
        LaunchStrategy::LauncherScript => {
            plan.program = PathBuf::from(CMD_EXE);
            plan.script = Some(script_contents(&lib_dir, &executable, &request.args));
        }
    }

    plan
}

/// `cmd.exe` arguments that run the launcher script at `script_path`.
pub fn script_invocation(script_path: &Path) -> String {
    format!(
        "/D /S /C \"{}\"",
        quote_if_needed(&script_path.to_string_lossy(), ShellDialect::Cmd)
    )
}

/// Environment overrides for the child.
///
/// Caller-supplied entries come first; the library directory is then
/// prepended to the search-path variable (on top of a caller override when
/// there is one) and the backend directory variable is set last.
pub fn plan_environment(
    platform: Platform,
    lib_dir: &Path,
    options: &LaunchOptions,
    inherited: &dyn Fn(&str) -> Option<String>,
) -> Vec<(String, String)> {
    let search_var = platform.library_path_var();
    let lib_dir_str = lib_dir.to_string_lossy().into_owned();

    let same_key = |key: &str| {
        if platform.env_keys_case_insensitive() {
            key.eq_ignore_ascii_case(search_var)
        } else {
            key == search_var
        }
    };

    let existing = options
        .env
        .iter()
        .rev()
        .find(|(key, _)| same_key(key))
        .map(|(_, value)| value.clone())
        .or_else(|| inherited(search_var));

    let search_path = match existing.filter(|v| !v.is_empty()) {
        Some(rest) => format!("{}{}{}", lib_dir_str, platform.path_list_separator(), rest),
        None => lib_dir_str.clone(),
    };

    let mut env: Vec<(String, String)> = options
        .env
        .iter()
        .filter(|(key, _)| !same_key(key))
        .cloned()
        .collect();
    env.push((search_var.to_string(), search_path));
    env.push((LaunchConfig::BACKEND_DIR_ENV.to_string(), lib_dir_str));
    env
}

fn cd_and_run(lib_dir: &Path, executable: &Path, args: &[String]) -> String {
    let mut line = format!(
        "cd /d {} && {}",
        quote_if_needed(&lib_dir.to_string_lossy(), ShellDialect::Cmd),
        quote_if_needed(&executable.to_string_lossy(), ShellDialect::Cmd)
    );
    if !args.is_empty() {
        line.push(' ');
        line.push_str(&join_quoted(args, ShellDialect::Cmd));
    }
    line
}

fn script_contents(lib_dir: &Path, executable: &Path, args: &[String]) -> String {
    let mut run = quote_if_needed(&executable.to_string_lossy(), ShellDialect::Batch);
    if !args.is_empty() {
        run.push(' ');
        run.push_str(&join_quoted(args, ShellDialect::Batch));
    }
    format!(
        "@echo off\r\ncd /d {}\r\n{}\r\nexit /b %ERRORLEVEL%\r\n",
        quote_if_needed(&lib_dir.to_string_lossy(), ShellDialect::Batch),
        run
    )
}
