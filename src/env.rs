use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::UpdateError;

const MANIFEST_HOST: &str = "http://install-versions.risevision.com";

/// Returns the user's home directory.
pub fn home_dir() -> Result<PathBuf, UpdateError> {
    let home = match env::consts::OS {
        "windows" => env::var_os("USERPROFILE").or_else(|| env::var_os("HOME")),
        _ => env::var_os("HOME"),
    };
    home.filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(UpdateError::HomeDirUnavailable)
}

/// Root directory holding every component, the version records and the identity file.
pub fn default_install_dir() -> Result<PathBuf, UpdateError> {
    let home = home_dir()?;
    Ok(install_dir_under(&home))
}

fn install_dir_under(home: &Path) -> PathBuf {
    if cfg!(target_os = "windows") {
        home.join("AppData").join("Local").join("RVPlayer2")
    } else {
        home.join("rvplayer2")
    }
}

/// Where downloaded archives wait until the extract pass.
pub fn scratch_dir() -> PathBuf {
    env::temp_dir().join("rvplayer-updater")
}

/// Platform suffix of the remote components file.
pub fn manifest_platform_key() -> Result<&'static str, UpdateError> {
    let bits = if cfg!(target_pointer_width = "64") { 64 } else { 32 };
    match (env::consts::OS, bits) {
        ("windows", _) => Ok("win"),
        ("linux", 32) => Ok("lnx-32"),
        ("linux", 64) => Ok("lnx-64"),
        (os, bits) => Err(UpdateError::UnsupportedPlatform { os, bits }),
    }
}

pub fn default_manifest_url() -> Result<String, UpdateError> {
    let platform = manifest_platform_key()?;
    Ok(format!("{MANIFEST_HOST}/remote-components-{platform}.cfg"))
}

/// Java launcher inside the bundled runtime.
pub fn java_executable(install_root: &Path) -> PathBuf {
    let bin = install_root.join("JRE").join("bin");
    if cfg!(target_os = "windows") {
        bin.join("javaw.exe")
    } else {
        bin.join("java")
    }
}

/// Create the install root if it does not exist yet.
pub fn ensure_install_root(path: &Path) -> Result<(), UpdateError> {
    fs::create_dir_all(path).map_err(|source| UpdateError::InstallRoot {
        path: path.to_path_buf(),
        source,
    })
}
