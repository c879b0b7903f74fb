use std::path::PathBuf;
use std::time::Duration;

use crate::channel::Channel;
use crate::env;
use crate::error::UpdateError;
use crate::identity::DisplayIdentity;
use crate::process::{Service, default_services};

/// Everything one orchestrator run needs to know, resolved up front.
#[derive(Clone, Debug)]
pub struct Settings {
    pub install_root: PathBuf,
    pub scratch_dir: PathBuf,
    pub manifest_url: String,
    /// Pinned channel; `None` draws from the manifest rollout settings.
    pub channel: Option<Channel>,
    pub http_timeout: Duration,
    pub download_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub poll_interval: Duration,
    pub skip_services: bool,
    pub services: Vec<Service>,
    pub identity: DisplayIdentity,
}

impl Settings {
    /// Platform defaults. Fails when the home directory or platform can't be resolved.
    pub fn from_platform() -> Result<Self, UpdateError> {
        Ok(Self::with_paths(
            env::default_install_dir()?,
            env::scratch_dir(),
            env::default_manifest_url()?,
        ))
    }

    pub fn with_paths(install_root: PathBuf, scratch_dir: PathBuf, manifest_url: String) -> Self {
        Self {
            install_root,
            scratch_dir,
            manifest_url,
            channel: None,
            http_timeout: Duration::from_secs(30 * 60),
            download_timeout: None,
            shutdown_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            skip_services: false,
            services: default_services(),
            identity: DisplayIdentity::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_keep_service_defaults() {
        let settings = Settings::with_paths(
            PathBuf::from("/srv/rvplayer2"),
            PathBuf::from("/tmp/scratch"),
            "http://manifest.test/remote-components-lnx-64.cfg".into(),
        );
        assert_eq!(settings.services.len(), 2);
        assert!(settings.channel.is_none());
        assert!(!settings.skip_services);
        assert_eq!(settings.identity, DisplayIdentity::default());
    }
}
