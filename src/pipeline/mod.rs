use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::components::StaleComponent;
use crate::error::UpdateError;
use crate::networking::NetworkClient;
use crate::storage::VersionStore;

pub mod archive;
pub mod fixup;

const BAR_TEMPLATE: &str = "{msg:12} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})";

/// An archive sitting in the scratch directory, waiting for the extract pass.
#[derive(Clone, Debug)]
pub struct DownloadedArchive {
    pub stale: StaleComponent,
    pub path: PathBuf,
}

/// Download, extract and commit stale components.
///
/// Extraction only starts once every download of the batch has landed, and a
/// version is only recorded after its archive extracted without error.
pub struct Pipeline {
    network: NetworkClient,
    store: VersionStore,
    install_root: PathBuf,
    scratch_dir: PathBuf,
    download_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        network: NetworkClient,
        store: VersionStore,
        install_root: impl AsRef<Path>,
        scratch_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            network,
            store,
            install_root: install_root.as_ref().to_path_buf(),
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
            download_timeout: None,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }

    fn scratch_path(&self, stale: &StaleComponent) -> PathBuf {
        self.scratch_dir
            .join(stale.component.name)
            .join(stale.archive_name())
    }

    /// Fetch every archive concurrently. Any failure discards the whole batch.
    pub async fn download_all(
        &self,
        stale: &[StaleComponent],
    ) -> Result<Vec<DownloadedArchive>, UpdateError> {
        if stale.is_empty() {
            debug!("pipeline: nothing to download");
            return Ok(Vec::new());
        }

        let bars = MultiProgress::new();
        let downloads = join_all(stale.iter().map(|item| self.download_one(item, &bars)));
        let results = match self.download_timeout {
            Some(limit) => match tokio::time::timeout(limit, downloads).await {
                Ok(results) => results,
                Err(_) => {
                    self.discard(stale).await;
                    return Err(UpdateError::Timeout {
                        secs: limit.as_secs(),
                    });
                }
            },
            None => downloads.await,
        };

        let mut archives = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(downloaded) => archives.push(downloaded),
                Err(err) => {
                    warn!("pipeline: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            self.discard(stale).await;
            return Err(err);
        }
        Ok(archives)
    }

    async fn download_one(
        &self,
        stale: &StaleComponent,
        bars: &MultiProgress,
    ) -> Result<DownloadedArchive, UpdateError> {
        let dest = self.scratch_path(stale);
        info!("Downloading: {}", stale.url);

        let bar = bars.add(ProgressBar::new(0));
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(stale.component.name);

        let result = self
            .network
            .download_to_path(&stale.url, &dest, |done, total| {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(done);
            })
            .await;

        match result {
            Ok(bytes) => {
                bar.finish();
                debug!(
                    "pipeline: {} downloaded ({} bytes) to {}",
                    stale.component.name,
                    bytes,
                    dest.display()
                );
                Ok(DownloadedArchive {
                    stale: stale.clone(),
                    path: dest,
                })
            }
            Err(reason) => {
                bar.abandon();
                Err(UpdateError::Download {
                    component: stale.component.name.to_owned(),
                    reason,
                })
            }
        }
    }

    /// Remove scratch archives of an abandoned batch.
    async fn discard(&self, stale: &[StaleComponent]) {
        for item in stale {
            let path = self.scratch_path(item);
            if tokio::fs::remove_file(&path).await.is_ok() {
                debug!("pipeline: discarded {}", path.display());
            }
        }
    }

    /// Extract each archive in order and commit its version right after it lands.
    ///
    /// The first failure aborts the pass; components committed before it stay committed.
    pub async fn extract_and_commit_all(
        &self,
        archives: Vec<DownloadedArchive>,
    ) -> Result<Vec<StaleComponent>, UpdateError> {
        let mut committed = Vec::with_capacity(archives.len());
        for downloaded in archives {
            let name = downloaded.stale.component.name;
            info!("Extracting: {}", downloaded.stale.archive_name());
            let dest = downloaded.stale.component.destination(&self.install_root);
            let source = downloaded.path.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                archive::extract_archive(&source, &dest)
            })
            .await
            .map_err(|e| format!("extraction task failed: {e}"))
            .and_then(|res| res);
            if let Err(reason) = outcome {
                return Err(UpdateError::Extraction {
                    component: name.to_owned(),
                    reason,
                });
            }

            self.store.write(name, &downloaded.stale.version).await?;
            info!("pipeline: {} committed at {}", name, downloaded.stale.version);

            if let Err(err) = tokio::fs::remove_file(&downloaded.path).await {
                warn!(
                    "pipeline: unable to remove {} ({err})",
                    downloaded.path.display()
                );
            }
            committed.push(downloaded.stale);
        }
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::COMPONENTS;
    use archive::write_test_zip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        scratch: PathBuf,
        store: VersionStore,
        server: MockServer,
    }

    impl Fixture {
        async fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().join("rvplayer2");
            let scratch = tmp.path().join("scratch");
            let store = VersionStore::new(&root);
            let server = MockServer::start().await;
            Self {
                _tmp: tmp,
                root,
                scratch,
                store,
                server,
            }
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                NetworkClient::new(Duration::from_secs(5)),
                self.store.clone(),
                &self.root,
                &self.scratch,
            )
        }

        async fn serve_zip(&self, route: &str, entries: &[(&str, Option<&str>)]) {
            let zip_path = self.scratch.with_extension("fixture.zip");
            write_test_zip(&zip_path, entries);
            let bytes = std::fs::read(&zip_path).unwrap();
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
                .mount(&self.server)
                .await;
        }

        fn stale(&self, index: usize, version: &str, route: &str) -> StaleComponent {
            StaleComponent {
                component: COMPONENTS[index],
                version: version.into(),
                url: format!("{}{}", self.server.uri(), route),
            }
        }
    }

    #[tokio::test]
    async fn downloads_then_extracts_and_commits() {
        let fx = Fixture::new().await;
        fx.serve_zip("/cache/RiseCache.zip", &[("RiseCache.jar", Some("cache"))])
            .await;
        let stale = vec![fx.stale(1, "2.1", "/cache/RiseCache.zip")];
        let pipeline = fx.pipeline();

        let archives = pipeline.download_all(&stale).await.unwrap();
        assert_eq!(archives.len(), 1);
        assert!(archives[0].path.ends_with("RiseCache/RiseCache.zip"));

        let committed = pipeline.extract_and_commit_all(archives).await.unwrap();
        assert_eq!(committed, stale);
        assert_eq!(
            std::fs::read(fx.root.join("RiseCache").join("RiseCache.jar")).unwrap(),
            b"cache"
        );
        assert_eq!(fx.store.read("RiseCache").await, "2.1");
        assert!(!fx.scratch.join("RiseCache").join("RiseCache.zip").exists());
    }

    #[tokio::test]
    async fn one_failed_download_blocks_every_extraction() {
        let fx = Fixture::new().await;
        fx.serve_zip("/player/RisePlayer.zip", &[("RisePlayer.jar", Some("p"))])
            .await;
        Mock::given(method("GET"))
            .and(path("/java/jre.zip"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&fx.server)
            .await;
        fx.store.write("java", "1.7").await.unwrap();
        fx.store.write("RisePlayer", "2.0").await.unwrap();
        let stale = vec![
            fx.stale(2, "1.8", "/java/jre.zip"),
            fx.stale(3, "2.1", "/player/RisePlayer.zip"),
        ];

        let err = fx.pipeline().download_all(&stale).await.unwrap_err();

        assert!(matches!(err, UpdateError::Download { ref component, .. } if component == "java"));
        assert_eq!(fx.store.read("java").await, "1.7");
        assert_eq!(fx.store.read("RisePlayer").await, "2.0");
        assert!(!fx.root.join("RisePlayer.jar").exists());
        assert!(!fx.scratch.join("RisePlayer").join("RisePlayer.zip").exists());
    }

    #[tokio::test]
    async fn failed_extraction_leaves_record_untouched() {
        let fx = Fixture::new().await;
        Mock::given(method("GET"))
            .and(path("/player/RisePlayer.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"truncated".to_vec()))
            .mount(&fx.server)
            .await;
        fx.store.write("RisePlayer", "2.0").await.unwrap();
        let stale = vec![fx.stale(3, "2.1", "/player/RisePlayer.zip")];
        let pipeline = fx.pipeline();

        let archives = pipeline.download_all(&stale).await.unwrap();
        let err = pipeline.extract_and_commit_all(archives).await.unwrap_err();

        assert!(matches!(err, UpdateError::Extraction { ref component, .. } if component == "RisePlayer"));
        assert_eq!(fx.store.read("RisePlayer").await, "2.0");
    }

    #[tokio::test]
    async fn earlier_commits_survive_a_later_extraction_failure() {
        let fx = Fixture::new().await;
        fx.serve_zip("/cache/RiseCache.zip", &[("RiseCache.jar", Some("c"))])
            .await;
        Mock::given(method("GET"))
            .and(path("/player/RisePlayer.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"nope".to_vec()))
            .mount(&fx.server)
            .await;
        let stale = vec![
            fx.stale(1, "2.1", "/cache/RiseCache.zip"),
            fx.stale(3, "2.1", "/player/RisePlayer.zip"),
        ];
        let pipeline = fx.pipeline();

        let archives = pipeline.download_all(&stale).await.unwrap();
        assert!(pipeline.extract_and_commit_all(archives).await.is_err());

        assert_eq!(fx.store.read("RiseCache").await, "2.1");
        assert_eq!(fx.store.read("RisePlayer").await, "");
    }

    #[tokio::test]
    async fn slow_batch_times_out_before_extraction() {
        let fx = Fixture::new().await;
        Mock::given(method("GET"))
            .and(path("/java/jre.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&fx.server)
            .await;
        let stale = vec![fx.stale(2, "1.8", "/java/jre.zip")];
        let pipeline = fx
            .pipeline()
            .with_download_timeout(Some(Duration::from_millis(200)));

        let err = pipeline.download_all(&stale).await.unwrap_err();

        assert!(matches!(err, UpdateError::Timeout { .. }));
        assert_eq!(fx.store.read("java").await, "");
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let fx = Fixture::new().await;
        let pipeline = fx.pipeline();
        let archives = pipeline.download_all(&[]).await.unwrap();
        assert!(archives.is_empty());
        assert!(pipeline.extract_and_commit_all(archives).await.unwrap().is_empty());
    }
}
