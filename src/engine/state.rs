use std::fmt;

// Stages of one update run, in the order they are entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    FetchManifest,
    SelectChannel,
    DetectStaleness,
    EnsureInstallRoot,
    DownloadAll,
    ExtractAndCommitAll,
    ApplyFixups,
    EnsureFirstRunConfig,
    StopServices,
    StartServices,
    Done,
    FetchFailed,
    ExtractFailed,
    LaunchFailed,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            RunState::FetchManifest => "fetch manifest",
            RunState::SelectChannel => "select channel",
            RunState::DetectStaleness => "detect stale components",
            RunState::EnsureInstallRoot => "prepare install directory",
            RunState::DownloadAll => "download",
            RunState::ExtractAndCommitAll => "extract",
            RunState::ApplyFixups => "post-extract fixups",
            RunState::EnsureFirstRunConfig => "first-run config",
            RunState::StopServices => "stop services",
            RunState::StartServices => "start services",
            RunState::Done => "done",
            RunState::FetchFailed => "fetch failed",
            RunState::ExtractFailed => "extract failed",
            RunState::LaunchFailed => "update failed to start services",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
