use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info};

use crate::error::UpdateError;

const BROWSER_DIR: &str = "chromium";

/// Directory name the browser archive unpacks to on this platform.
pub fn platform_browser_dir() -> &'static str {
    if cfg!(target_os = "windows") {
        "chrome-win32"
    } else {
        "chrome-linux"
    }
}

/// Rename the OS-qualified browser directory to `chromium`.
///
/// A missing source is a no-op. An existing `chromium` is replaced by the fresh copy.
pub fn fix_browser_directory_name(install_root: &Path) -> Result<(), UpdateError> {
    rename_browser_dir(install_root, platform_browser_dir())
}

fn rename_browser_dir(install_root: &Path, source_name: &str) -> Result<(), UpdateError> {
    let from = install_root.join(source_name);
    let to = install_root.join(BROWSER_DIR);
    let fixup_err = |source| UpdateError::Fixup {
        from: from.clone(),
        to: to.clone(),
        source,
    };

    match fs::symlink_metadata(&from) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            debug!("fixup: {} is not a directory; skipping", from.display());
            return Ok(());
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("fixup: nothing to rename at {}", from.display());
            return Ok(());
        }
        Err(err) => return Err(fixup_err(err)),
    }

    if to.exists() {
        debug!("fixup: replacing previous {}", to.display());
        fs::remove_dir_all(&to).map_err(fixup_err)?;
    }
    fs::rename(&from, &to).map_err(fixup_err)?;
    info!("fixup: {} -> {}", from.display(), to.display());
    Ok(())
}
