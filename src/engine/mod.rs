use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::components::{COMPONENTS, detect_stale};
use crate::env;
use crate::error::UpdateError;
use crate::identity::ensure_identity_file;
use crate::networking::NetworkClient;
use crate::pipeline::{Pipeline, fixup};
use crate::process::ServiceSupervisor;
use crate::settings::Settings;
use crate::storage::VersionStore;

use self::state::RunState;

pub mod models;
pub mod state;

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub channel: Channel,
    pub updated: Vec<(String, String)>,
    pub identity_created: bool,
    pub started: Vec<String>,
}

/// Sequences one update run from manifest fetch to service restart.
pub struct UpdateEngine {
    pub state: RunState,
    settings: Settings,
    network: NetworkClient,
    store: VersionStore,
    updates: Option<mpsc::UnboundedSender<RunState>>,
}

impl UpdateEngine {
    pub fn new(settings: Settings) -> Self {
        let network = NetworkClient::new(settings.http_timeout);
        let store = VersionStore::new(&settings.install_root);
        Self {
            state: RunState::FetchManifest,
            settings,
            network,
            store,
            updates: None,
        }
    }

    /// Publish every state transition on `updates`.
    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<RunState>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub async fn run(&mut self) -> Result<RunReport, UpdateError> {
        match self.execute().await {
            Ok(report) => {
                self.enter(RunState::Done);
                info!("Process finished");
                Ok(report)
            }
            Err(err) => {
                let failed_during = self.state;
                self.enter(err.terminal_state());
                error!("update: {} during {}: {}", self.state, failed_during, err);
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> Result<RunReport, UpdateError> {
        let settings = self.settings.clone();
        let root = settings.install_root.as_path();

        self.enter(RunState::FetchManifest);
        let manifest = self.network.fetch_manifest(&settings.manifest_url).await?;

        self.enter(RunState::SelectChannel);
        let channel = match settings.channel {
            Some(pinned) => {
                info!("channel: {} (pinned)", pinned);
                pinned
            }
            None => Channel::from_manifest(&manifest)?,
        };

        self.enter(RunState::DetectStaleness);
        let stale = detect_stale(COMPONENTS, &manifest, channel, &self.store).await?;
        if stale.is_empty() {
            info!("update: all components up to date");
        }

        self.enter(RunState::EnsureInstallRoot);
        env::ensure_install_root(root)?;

        let pipeline = Pipeline::new(
            self.network.clone(),
            self.store.clone(),
            root,
            &settings.scratch_dir,
        )
        .with_download_timeout(settings.download_timeout);

        self.enter(RunState::DownloadAll);
        let archives = pipeline.download_all(&stale).await?;

        self.enter(RunState::ExtractAndCommitAll);
        let committed = pipeline.extract_and_commit_all(archives).await?;

        self.enter(RunState::ApplyFixups);
        fixup::fix_browser_directory_name(root)?;

        self.enter(RunState::EnsureFirstRunConfig);
        let identity_created = ensure_identity_file(root, &settings.identity)?;

        let mut started = Vec::new();
        if settings.skip_services {
            info!("update: leaving services untouched");
        } else {
            let supervisor = ServiceSupervisor::new(
                self.network.clone(),
                root,
                env::java_executable(root),
            )
            .with_shutdown_timeout(settings.shutdown_timeout)
            .with_poll_interval(settings.poll_interval);

            self.enter(RunState::StopServices);
            supervisor.stop_all(&settings.services).await?;

            self.enter(RunState::StartServices);
            supervisor.start_all(&settings.services)?;
            started = settings.services.iter().map(|s| s.name.clone()).collect();
        }

        Ok(RunReport {
            channel,
            updated: committed
                .into_iter()
                .map(|c| (c.component.name.to_owned(), c.version))
                .collect(),
            identity_created,
            started,
        })
    }

    fn enter(&mut self, state: RunState) {
        debug!("update: entering {:?}", state);
        self.state = state;
        if let Some(updates) = &self.updates {
            let _ = updates.send(state);
        }
    }
}
