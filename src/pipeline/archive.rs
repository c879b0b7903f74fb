use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, info};
use tar::Archive;
use zip::read::ZipArchive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Components ship as zip unless the file name says otherwise.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else {
            ArchiveKind::Zip
        }
    }
}

/// Unpack `archive_path` into `dest`, overwriting files already there.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = ArchiveKind::from_file_name(&name);
    info!(
        "extract: {} as {:?} into {}",
        archive_path.display(),
        kind,
        dest.display()
    );
    fs::create_dir_all(dest).map_err(|e| format!("unable to create {}: {e}", dest.display()))?;
    match kind {
        ArchiveKind::TarGz => extract_targz(archive_path, dest),
        ArchiveKind::Zip => extract_zip(archive_path, dest),
    }
}

fn extract_targz(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("tar.gz open error: {e}"))?;
    let dec = GzDecoder::new(file);
    let mut archive = Archive::new(dec);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| format!("tar.gz extract error: {e}"))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("zip open error: {e}"))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("zip parse error: {e}"))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| format!("zip entry escapes destination: {}", entry.name()))?;
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| format!("zip dir create error: {e}"))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("zip parent dir error: {e}"))?;
        }
        debug!("extract: creating {}", out_path.display());
        remove_existing_file(&out_path).map_err(|e| format!("zip replace file error: {e}"))?;
        let mut out_file =
            fs::File::create(&out_path).map_err(|e| format!("zip create file error: {e}"))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| format!("zip write error: {e}"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| format!("zip permissions error: {e}"))?;
            }
        }
    }
    Ok(())
}

/// Clear a previously extracted file so read-only modes from an earlier pass
/// cannot block the rewrite. Directories are left alone.
fn remove_existing_file(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if meta.is_dir() {
        return Ok(());
    }
    #[cfg(windows)]
    {
        let mut perms = meta.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            fs::set_permissions(path, perms)?;
        }
    }
    fs::remove_file(path)
}

/// Build a small zip for tests. `None` content marks a directory entry.
#[cfg(test)]
pub(crate) fn write_test_zip(path: &Path, entries: &[(&str, Option<&str>)]) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        match content {
            Some(bytes) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes.as_bytes()).unwrap();
            }
            None => writer.add_directory(*name, options).unwrap(),
        }
    }
    writer.finish().unwrap();
}
