//! Subcommand implementations.

use crate::interrupt;
use anyhow::{Context as _, Result};
use leaxer_core::config::SettingsKeys;
use leaxer_core::platform::default_settings_path;
use leaxer_core::{
    ArchBinDir, BackendResolver, DetectionCache, JsonSettingsFile, LaunchOptions, LaunchRequest,
    LaunchStrategy, MemorySettings, Platform, ProcessLauncher, SettingsStore, SystemProbes,
    VendorGpuInfo,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state for the detection subcommands.
pub struct Context {
    resolver: Arc<BackendResolver>,
}

impl Context {
    pub fn new(settings: Option<PathBuf>, bin_root: PathBuf) -> Result<Self> {
        let settings: Arc<dyn SettingsStore> = match settings.or_else(default_settings_path) {
            Some(path) => Arc::new(
                JsonSettingsFile::load(&path)
                    .with_context(|| format!("loading settings from {}", path.display()))?,
            ),
            None => {
                warn!("No settings location available, using defaults");
                Arc::new(MemorySettings::new())
            }
        };

        let bins = Arc::new(ArchBinDir::new(&bin_root));
        debug!("Bundled binaries under {}", bin_root.display());

        let resolver = BackendResolver::new(
            Platform::current(),
            Arc::new(SystemProbes::new(bins)),
            settings,
            Arc::new(DetectionCache::new()),
        );
        Ok(Self {
            resolver: Arc::new(resolver),
        })
    }
}

/// Probes run external tools; keep them off the async workers.
async fn blocking<T, F>(ctx: &Context, f: F) -> Result<T>
where
    F: FnOnce(&BackendResolver) -> T + Send + 'static,
    T: Send + 'static,
{
    let resolver = Arc::clone(&ctx.resolver);
    tokio::task::spawn_blocking(move || f(&resolver))
        .await
        .context("detection task panicked")
}

pub async fn backends(ctx: &Context) -> Result<ExitCode> {
    let (available, effective) =
        blocking(ctx, |r| (r.available_backends(), r.get_backend())).await?;

    let mut out = io::stdout().lock();
    for backend in &available {
        let marker = if *backend == effective { " *" } else { "" };
        writeln!(out, "{}{}", backend, marker)?;
    }
    writeln!(out, "valid: {}", ctx.resolver.valid_backends().join(", "))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn gpu_info(ctx: &Context, json: bool) -> Result<ExitCode> {
    let info = blocking(ctx, |r| r.gpu_info()).await?;

    let mut out = io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
        return Ok(ExitCode::SUCCESS);
    }

    writeln!(out, "platform: {}", info.platform)?;
    for (label, vendor) in [
        ("nvidia", &info.nvidia),
        ("amd", &info.amd),
        ("apple", &info.apple),
    ] {
        if let Some(vendor) = vendor {
            write_vendor(&mut out, label, vendor)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn write_vendor(out: &mut impl Write, label: &str, vendor: &VendorGpuInfo) -> io::Result<()> {
    if !vendor.available {
        return writeln!(out, "{}: not available", label);
    }
    writeln!(out, "{}: {} device(s)", label, vendor.devices.len())?;
    for device in &vendor.devices {
        writeln!(out, "  {} ({})", device.name, device.memory)?;
    }
    Ok(())
}

pub async fn resolve(ctx: &Context, preference: Option<&str>) -> Result<ExitCode> {
    let preference = preference.map(str::to_string);
    let backend = blocking(ctx, move |r| match preference {
        Some(p) => r.resolve_backend(&p),
        None => r.get_backend(),
    })
    .await?;

    debug!("Resolved {} from {}", backend, SettingsKeys::COMPUTE_BACKEND);
    println!("{}", backend);
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug)]
pub struct LaunchArgs {
    pub lib_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub strategy: LaunchStrategy,
    pub critical_lib: Option<String>,
    pub exe: PathBuf,
    pub args: Vec<String>,
}

impl LaunchArgs {
    fn request(&self) -> LaunchRequest {
        let mut options = LaunchOptions::new().with_new_process_group(true);
        if let Some(dir) = &self.lib_dir {
            options = options.with_lib_dir(dir);
        }
        for (key, value) in &self.env {
            options = options.with_env(key, value);
        }
        if let Some(name) = &self.critical_lib {
            options = options.with_critical_library(name);
        }
        LaunchRequest::new(&self.exe, self.args.iter()).with_options(options)
    }
}

pub async fn launch(args: LaunchArgs) -> Result<ExitCode> {
    let launcher = ProcessLauncher::new().with_windows_strategy(args.strategy);
    let mut handle = launcher.spawn(&args.request())?;

    let pid = handle.child_mut().id();
    let script = handle.script_path().map(PathBuf::from);

    let copier = handle.take_output().map(|mut output| {
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            io::copy(&mut output, &mut stdout)
        })
    });

    let mut waiter = tokio::task::spawn_blocking(move || handle.wait());

    let status = tokio::select! {
        status = &mut waiter => status,
        Ok(()) = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping process {}", pid);
            interrupt::terminate_group(pid);
            waiter.await
        }
    }
    .context("wait task panicked")??;

    if let Some(copier) = copier {
        match copier.await {
            Ok(Ok(bytes)) => debug!("Forwarded {} bytes of output", bytes),
            Ok(Err(e)) => warn!("Output stream ended with error: {}", e),
            Err(e) => warn!("Output task failed: {}", e),
        }
    }

    if let Some(path) = script {
        if let Err(e) = std::fs::remove_file(&path) {
            debug!("Could not remove launcher script {}: {}", path.display(), e);
        }
    }

    info!("Process {} exited with {}", pid, status);
    Ok(exit_code(status.code()))
}

/// Map a child exit code onto ours. Signal deaths report failure.
fn exit_code(code: Option<i32>) -> ExitCode {
    match code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code & 0xff).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}
