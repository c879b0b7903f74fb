use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

mod channel;
mod components;
mod engine;
mod env;
mod error;
mod identity;
mod networking;
mod pipeline;
mod process;
mod settings;
mod storage;

use channel::Channel;
use engine::UpdateEngine;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "rvplayer-updater",
    author,
    version,
    about = "Updates the display player components and restarts its services"
)]
struct Cli {
    /// Print updater version and exit.
    #[arg(long)]
    version_only: bool,

    /// Install root (defaults to ~/rvplayer2, or %LOCALAPPDATA%\RVPlayer2 on Windows).
    #[arg(long, env = "RVPLAYER_INSTALL_DIR")]
    install_dir: Option<PathBuf>,

    /// Remote components file to read instead of the platform default.
    #[arg(long, env = "RVPLAYER_MANIFEST_URL")]
    manifest_url: Option<String>,

    /// Pin the rollout channel instead of drawing one from the manifest.
    #[arg(long, value_enum, env = "RVPLAYER_CHANNEL", ignore_case = true)]
    channel: Option<Channel>,

    /// Seconds to wait for running services to exit.
    #[arg(long, env = "RVPLAYER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 15)]
    shutdown_timeout_secs: u64,

    /// Milliseconds between liveness checks while waiting for services to exit.
    #[arg(long, env = "RVPLAYER_POLL_INTERVAL_MS", default_value_t = 250)]
    poll_interval_ms: u64,

    /// Upper bound in seconds for the whole download pass.
    #[arg(long, env = "RVPLAYER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Update components but leave services alone.
    #[arg(long)]
    skip_services: bool,
}

impl Cli {
    fn into_settings(self) -> Result<Settings, error::UpdateError> {
        let mut settings = match (self.install_dir, self.manifest_url) {
            (Some(root), Some(url)) => Settings::with_paths(root, env::scratch_dir(), url),
            (root, url) => {
                let mut base = Settings::from_platform()?;
                if let Some(root) = root {
                    base.install_root = root;
                }
                if let Some(url) = url {
                    base.manifest_url = url;
                }
                base
            }
        };
        settings.channel = self.channel;
        settings.shutdown_timeout = Duration::from_secs(self.shutdown_timeout_secs);
        settings.poll_interval = Duration::from_millis(self.poll_interval_ms);
        settings.download_timeout = self.timeout_secs.map(Duration::from_secs);
        settings.skip_services = self.skip_services;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.version_only {
        println!("rvplayer-updater {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let settings = match cli.into_settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("update: unable to resolve settings: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "update: install root {}, manifest {}",
        settings.install_root.display(),
        settings.manifest_url
    );

    let mut engine = UpdateEngine::new(settings);
    match engine.run().await {
        Ok(report) => {
            info!(
                "update: finished on {} channel; {} component(s) updated, {} service(s) started",
                report.channel,
                report.updated.len(),
                report.started.len()
            );
            for (name, version) in &report.updated {
                info!("update: {name} -> {version}");
            }
            if report.identity_created {
                info!("update: wrote first-run identity file");
            }
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_skip_platform_lookup() {
        let cli = Cli::parse_from([
            "rvplayer-updater",
            "--install-dir",
            "/srv/rvplayer2",
            "--manifest-url",
            "http://manifest.test/remote-components-win.cfg",
            "--channel",
            "latest",
            "--timeout-secs",
            "90",
            "--skip-services",
        ]);
        let settings = cli.into_settings().unwrap();
        assert_eq!(settings.install_root, PathBuf::from("/srv/rvplayer2"));
        assert_eq!(settings.channel, Some(Channel::Latest));
        assert_eq!(settings.download_timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(15));
        assert!(settings.skip_services);
    }
}
