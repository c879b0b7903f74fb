use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::UpdateError;

pub const IDENTITY_FILE: &str = "RiseDisplayNetworkII.ini";
const SECTION: &str = "RDNII";

/// Values written to a fresh identity file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayIdentity {
    pub display_id: String,
    pub claim_id: String,
    pub core_url: String,
    pub viewer_url: String,
}

impl Default for DisplayIdentity {
    fn default() -> Self {
        Self {
            display_id: String::new(),
            claim_id: String::new(),
            core_url: "https://rvacore-test.appspot.com".into(),
            viewer_url: "http://rvaviewer-test.appspot.com".into(),
        }
    }
}

impl DisplayIdentity {
    fn render(&self) -> String {
        format!(
            "[{SECTION}]\ndisplayid={}\nclaimid={}\ncoreurl={}\nviewerurl={}\n",
            self.display_id, self.claim_id, self.core_url, self.viewer_url
        )
    }
}

pub fn identity_path(install_root: &Path) -> PathBuf {
    install_root.join(IDENTITY_FILE)
}

/// Write the identity file unless one already exists. Returns whether it was created.
pub fn ensure_identity_file(
    install_root: &Path,
    identity: &DisplayIdentity,
) -> Result<bool, UpdateError> {
    let path = identity_path(install_root);
    if path.exists() {
        debug!("identity: keeping existing {}", path.display());
        return Ok(false);
    }
    fs::write(&path, identity.render()).map_err(|source| UpdateError::IdentityFile {
        path: path.clone(),
        source,
    })?;
    info!("identity: created {}", path.display());
    Ok(true)
}
