use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::engine::models::Manifest;
use crate::error::UpdateError;

const USER_AGENT: &str = concat!("rvplayer-updater/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    /// Fetch and parse the remote components file.
    pub async fn fetch_manifest(&self, url: &str) -> Result<Manifest, UpdateError> {
        info!("manifest: loading {url}");
        let body = self
            .fetch_text(url)
            .await
            .map_err(|reason| UpdateError::ManifestFetch {
                url: url.to_owned(),
                reason,
            })?;
        let manifest = Manifest::parse(&body);
        if manifest == Manifest::default() {
            return Err(UpdateError::ManifestFetch {
                url: url.to_owned(),
                reason: "document has no entries".into(),
            });
        }
        Ok(manifest)
    }

    /// GET `url` and return the body as text. Non-success statuses are errors.
    pub async fn fetch_text(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("bad status: {e}"))?;
        resp.text()
            .await
            .map_err(|e| format!("body error: {e}"))
    }

    /// Fire a GET and ignore whatever comes back. Returns the status on success.
    pub async fn poke(&self, url: &str) -> Result<u16, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        Ok(resp.status().as_u16())
    }

    /// Download a file to `dest`, calling `progress` with (downloaded, total).
    pub async fn download_to_path<F>(
        &self,
        url: &str,
        dest: &Path,
        mut progress: F,
    ) -> Result<u64, String>
    where
        F: FnMut(u64, Option<u64>),
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("download status error: {e}"))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create download dir: {e}"))?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| format!("failed to create file: {e}"))?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write error: {e}"))?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }

        file.flush()
            .await
            .map_err(|e| format!("flush error: {e}"))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(format!(
                "download incomplete: received {} of {} bytes",
                downloaded, total
            ));
        }

        debug!("network: saved {} bytes to {}", downloaded, dest.display());
        Ok(downloaded)
    }
}
