use std::path::PathBuf;

use crate::engine::state::RunState;

/// Errors that abort an update run.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The user's home directory could not be determined.
    #[error("unable to resolve home directory")]
    HomeDirUnavailable,

    #[error("platform {os}/{bits}-bit is not supported")]
    UnsupportedPlatform { os: &'static str, bits: u32 },

    /// The remote manifest was unreachable or unreadable.
    #[error("failed to load remote manifest from {url}: {reason}")]
    ManifestFetch { url: String, reason: String },

    /// A key required for the active channel is absent or has the wrong shape.
    #[error("manifest key {key}: {reason}")]
    ManifestKey { key: String, reason: String },

    #[error("failed to download {component}: {reason}")]
    Download { component: String, reason: String },

    #[error("download pass exceeded {secs}s")]
    Timeout { secs: u64 },

    #[error("unable to create install directory {}: {source}", path.display())]
    InstallRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extraction failed part-way; the component's recorded version is untouched.
    #[error("failed to extract {component}: {reason}")]
    Extraction { component: String, reason: String },

    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Fixup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Losing a commit would cause the component to be downloaded again on every run.
    #[error("unable to persist version {version} for {component}: {source}")]
    VersionPersist {
        component: String,
        version: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to write identity file {}: {source}", path.display())]
    IdentityFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{service} did not shut down within {secs}s")]
    ShutdownTimeout { service: String, secs: u64 },

    #[error("failed to start {service}: {reason}")]
    Launch { service: String, reason: String },
}

impl UpdateError {
    /// The terminal orchestrator state a run ends in when it fails with this error.
    pub fn terminal_state(&self) -> RunState {
        match self {
            UpdateError::HomeDirUnavailable
            | UpdateError::UnsupportedPlatform { .. }
            | UpdateError::ManifestFetch { .. }
            | UpdateError::ManifestKey { .. }
            | UpdateError::Download { .. }
            | UpdateError::Timeout { .. } => RunState::FetchFailed,
            UpdateError::InstallRoot { .. }
            | UpdateError::Extraction { .. }
            | UpdateError::Fixup { .. }
            | UpdateError::VersionPersist { .. }
            | UpdateError::IdentityFile { .. } => RunState::ExtractFailed,
            UpdateError::ShutdownTimeout { .. } | UpdateError::Launch { .. } => {
                RunState::LaunchFailed
            }
        }
    }
}
