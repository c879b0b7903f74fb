use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::channel::Channel;
use crate::engine::models::Manifest;
use crate::error::UpdateError;
use crate::storage::VersionStore;

/// One independently versioned installable unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Component {
    /// Version record key and log label.
    pub name: &'static str,
    /// Prefix of the `<key>URL<Channel>` / `<key>Version<Channel>` manifest entries.
    pub manifest_key: &'static str,
    /// Extraction target below the install root; empty means the root itself.
    pub destination_subdir: &'static str,
}

/// Install order. Later entries may rely on earlier ones having been extracted.
pub const COMPONENTS: &[Component] = &[
    Component {
        name: "chromium",
        manifest_key: "Browser",
        destination_subdir: "",
    },
    Component {
        name: "RiseCache",
        manifest_key: "Cache",
        destination_subdir: "RiseCache",
    },
    Component {
        name: "java",
        manifest_key: "Java",
        destination_subdir: "JRE",
    },
    Component {
        name: "RisePlayer",
        manifest_key: "Player",
        destination_subdir: "",
    },
];

impl Component {
    pub fn url_key(&self, channel: Channel) -> String {
        format!("{}URL{}", self.manifest_key, channel)
    }

    pub fn version_key(&self, channel: Channel) -> String {
        format!("{}Version{}", self.manifest_key, channel)
    }

    pub fn destination(&self, install_root: &Path) -> PathBuf {
        if self.destination_subdir.is_empty() {
            install_root.to_path_buf()
        } else {
            install_root.join(self.destination_subdir)
        }
    }
}

/// A component whose manifest version differs from the recorded one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleComponent {
    pub component: Component,
    pub version: String,
    pub url: String,
}

impl StaleComponent {
    /// Base file name of the archive URL, used for the scratch copy.
    pub fn archive_name(&self) -> String {
        let trimmed = self.url.split(['?', '#']).next().unwrap_or_default();
        match trimmed.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("{}.zip", self.component.name),
        }
    }
}

/// Compare each component's manifest version to its record, in declaration order.
///
/// Staleness is plain string inequality: a rollback to an older version string
/// reinstalls exactly like an upgrade does.
pub async fn detect_stale(
    components: &[Component],
    manifest: &Manifest,
    channel: Channel,
    store: &VersionStore,
) -> Result<Vec<StaleComponent>, UpdateError> {
    let mut stale = Vec::new();
    for component in components {
        let remote = manifest.string(&component.version_key(channel))?;
        let url = manifest.string(&component.url_key(channel))?;
        let local = store.read(component.name).await;
        if remote == local {
            debug!("staleness: {} up to date at {}", component.name, local);
            continue;
        }
        info!(
            "staleness: {} is stale (local {:?}, remote {:?})",
            component.name, local, remote
        );
        stale.push(StaleComponent {
            component: *component,
            version: remote.to_owned(),
            url: url.to_owned(),
        });
    }
    Ok(stale)
}
