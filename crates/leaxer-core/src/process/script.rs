//! Launcher script files.

use crate::config::LaunchConfig;
use crate::error::{LeaxerError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `contents` to a uniquely named `.bat` file in `scratch_dir`.
///
/// The file outlives this call; the caller removes it when the launch fails
/// or hands it to whoever owns the process lifecycle.
pub fn write_launcher_script(scratch_dir: &Path, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(scratch_dir).map_err(|e| LeaxerError::Io {
        message: "create scratch directory".to_string(),
        path: Some(scratch_dir.to_path_buf()),
        source: Some(e),
    })?;

    let mut file = tempfile::Builder::new()
        .prefix(LaunchConfig::SCRIPT_PREFIX)
        .suffix(".bat")
        .tempfile_in(scratch_dir)
        .map_err(|e| LeaxerError::Io {
            message: "create launcher script".to_string(),
            path: Some(scratch_dir.to_path_buf()),
            source: Some(e),
        })?;

    file.write_all(contents.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| LeaxerError::Io {
            message: "write launcher script".to_string(),
            path: Some(file.path().to_path_buf()),
            source: Some(e),
        })?;

    let path = file
        .into_temp_path()
        .keep()
        .map_err(|e| LeaxerError::Io {
            message: "persist launcher script".to_string(),
            path: Some(e.path.to_path_buf()),
            source: Some(e.error),
        })?;

    debug!("Generated launcher script at {:?}", path);
    Ok(path)
}

/// Best-effort removal of a launcher script.
pub(crate) fn remove_launcher_script(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed launcher script {:?}", path),
        Err(e) => debug!("Could not remove launcher script {:?}: {}", path, e),
    }
}
