use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Url;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};

use crate::error::UpdateError;
use crate::networking::NetworkClient;

const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// A long-running service started from the bundled Java runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    /// Local HTTP endpoint that asks a running instance to exit.
    pub shutdown_url: String,
    /// Jar path relative to the install root.
    pub entry: PathBuf,
}

/// Services in start order.
pub fn default_services() -> Vec<Service> {
    vec![
        Service {
            name: "RiseCache".into(),
            shutdown_url: "http://localhost:9494/shutdown".into(),
            entry: Path::new("RiseCache").join("RiseCache.jar"),
        },
        Service {
            name: "RisePlayer".into(),
            shutdown_url: "http://localhost:9449/shutdown".into(),
            entry: PathBuf::from("RisePlayer.jar"),
        },
    ]
}

/// Stops running service instances and launches fresh ones.
pub struct ServiceSupervisor {
    network: NetworkClient,
    install_root: PathBuf,
    runtime: PathBuf,
    shutdown_timeout: Duration,
    poll_interval: Duration,
}

impl ServiceSupervisor {
    pub fn new(
        network: NetworkClient,
        install_root: impl AsRef<Path>,
        runtime: impl AsRef<Path>,
    ) -> Self {
        Self {
            network,
            install_root: install_root.as_ref().to_path_buf(),
            runtime: runtime.as_ref().to_path_buf(),
            shutdown_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn with_shutdown_timeout(mut self, limit: Duration) -> Self {
        self.shutdown_timeout = limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn entry_path(&self, service: &Service) -> PathBuf {
        self.install_root.join(&service.entry)
    }

    /// Ask every service to exit, then wait until all of them are gone.
    pub async fn stop_all(&self, services: &[Service]) -> Result<(), UpdateError> {
        for service in services {
            self.request_shutdown(service).await;
        }
        for service in services {
            self.wait_for_exit(service).await?;
        }
        Ok(())
    }

    /// Unreachable endpoints usually mean the service is already down.
    pub async fn request_shutdown(&self, service: &Service) {
        info!("Shutting down {}", service.name);
        match timeout(self.shutdown_timeout, self.network.poke(&service.shutdown_url)).await {
            Ok(Ok(status)) => debug!("process: {} shutdown answered {}", service.name, status),
            Ok(Err(err)) => warn!(
                "process: shutdown request to {} failed ({err}); assuming it is not running",
                service.name
            ),
            Err(_) => warn!(
                "process: shutdown request to {} got no answer within {:?}",
                service.name, self.shutdown_timeout
            ),
        }
    }

    /// Poll until the service's endpoint and process are gone, up to the shutdown timeout.
    pub async fn wait_for_exit(&self, service: &Service) -> Result<(), UpdateError> {
        let deadline = deadline_after(self.shutdown_timeout);
        loop {
            if !self.is_running(service).await {
                debug!("process: {} has exited", service.name);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(UpdateError::ShutdownTimeout {
                    service: service.name.clone(),
                    secs: self.shutdown_timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn is_running(&self, service: &Service) -> bool {
        if endpoint_accepting(&service.shutdown_url).await {
            return true;
        }
        let entry = self.entry_path(service);
        tokio::task::spawn_blocking(move || entry_in_process_table(&entry))
            .await
            .unwrap_or(false)
    }

    /// Launch every service, stopping at the first one that fails to start.
    pub fn start_all(&self, services: &[Service]) -> Result<Vec<u32>, UpdateError> {
        services.iter().map(|service| self.launch(service)).collect()
    }

    /// Start `runtime -jar <entry>` detached from this process. Returns the child pid.
    pub fn launch(&self, service: &Service) -> Result<u32, UpdateError> {
        let launch_err = |reason: String| UpdateError::Launch {
            service: service.name.clone(),
            reason,
        };
        if !self.runtime.exists() {
            warn!("launch: Java runtime missing at {}", self.runtime.display());
            return Err(launch_err(format!(
                "Java runtime not found at {}",
                self.runtime.display()
            )));
        }
        let entry = self.entry_path(service);
        if !entry.exists() {
            return Err(launch_err(format!(
                "entry artifact not found at {}",
                entry.display()
            )));
        }

        info!("Starting {}", service.name);
        debug!(
            "launch: {} -jar {} (cwd {})",
            self.runtime.display(),
            entry.display(),
            self.install_root.display()
        );
        let mut cmd = Command::new(&self.runtime);
        cmd.arg("-jar").arg(&entry);
        cmd.current_dir(&self.install_root);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            // CREATE_NO_WINDOW | DETACHED_PROCESS
            cmd.creation_flags(0x08000000 | 0x00000008);
        }

        let child = cmd
            .spawn()
            .map_err(|e| launch_err(format!("failed to start process: {e}")))?;
        info!("launch: {} started (pid {})", service.name, child.id());
        Ok(child.id())
    }
}

// Oversized limits clamp to a far-off deadline instead of overflowing.
fn deadline_after(limit: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(limit)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

async fn endpoint_accepting(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let (Some(host), Some(port)) = (parsed.host_str(), parsed.port_or_known_default()) else {
        return false;
    };
    matches!(
        timeout(CONNECT_PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

fn entry_in_process_table(entry: &Path) -> bool {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
    );
    system
        .processes()
        .values()
        .any(|process| command_mentions(process.cmd(), entry))
}

fn command_mentions(cmd: &[OsString], entry: &Path) -> bool {
    cmd.iter().any(|arg| Path::new(arg) == entry)
}
