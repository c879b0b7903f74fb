use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs;

use crate::error::UpdateError;

const VERSION_EXTENSION: &str = "ver";

/// Last committed version per component, one `<name>.ver` file each under the install root.
#[derive(Clone, Debug)]
pub struct VersionStore {
    base_dir: PathBuf,
}

impl VersionStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn record_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.{VERSION_EXTENSION}"))
    }

    /// Read the recorded version. A missing or unreadable record reads as `""`,
    /// which never matches a real version and so schedules a reinstall.
    pub async fn read(&self, name: &str) -> String {
        let path = self.record_path(name);
        match fs::read(&path).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                text.lines().next().unwrap_or_default().trim_end().to_owned()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("storage: no version record for {name}");
                String::new()
            }
            Err(err) => {
                warn!(
                    "storage: unable to read {} ({err}); treating {name} as not installed",
                    path.display()
                );
                String::new()
            }
        }
    }

    /// Persist `version` as committed for `name`.
    pub async fn write(&self, name: &str, version: &str) -> Result<(), UpdateError> {
        let path = self.record_path(name);
        let persist_err = |source| UpdateError::VersionPersist {
            component: name.to_owned(),
            version: version.to_owned(),
            source,
        };
        fs::create_dir_all(&self.base_dir).await.map_err(persist_err)?;
        fs::write(&path, version.as_bytes())
            .await
            .map_err(persist_err)?;
        debug!("storage: {} -> {}", name, version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_record_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VersionStore::new(tmp.path());
        assert_eq!(store.read("RisePlayer").await, "");
    }

    #[tokio::test]
    async fn write_then_read_exact_string() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VersionStore::new(tmp.path());
        store.write("java", "1.8.0_221").await.unwrap();
        assert_eq!(store.read("java").await, "1.8.0_221");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("java.ver")).unwrap(),
            "1.8.0_221"
        );
    }

    #[tokio::test]
    async fn only_first_line_counts() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("chromium.ver"), "38.0\r\ngarbage\n").unwrap();
        let store = VersionStore::new(tmp.path());
        assert_eq!(store.read("chromium").await, "38.0");
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_version() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VersionStore::new(tmp.path());
        store.write("RiseCache", "2.0.10").await.unwrap();
        store.write("RiseCache", "2.0.9").await.unwrap();
        assert_eq!(store.read("RiseCache").await, "2.0.9");
    }

    #[tokio::test]
    async fn write_failure_is_surfaced() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("root");
        std::fs::write(&blocker, b"file in the way").unwrap();
        let store = VersionStore::new(&blocker);
        let err = store.write("RisePlayer", "2.1").await.unwrap_err();
        assert!(matches!(err, UpdateError::VersionPersist { ref component, .. } if component == "RisePlayer"));
    }
}
