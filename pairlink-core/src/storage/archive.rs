//! Credential archive packaging and upload

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::blob::BlobStore;
use crate::credentials::CredentialStore;
use crate::error::UploadError;

/// Content type of uploaded archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Blob key for a session's archive
pub fn archive_key(session_id: &str) -> String {
    format!("{session_id}.zip")
}

/// Zip every file below `dir`, with entry names relative to `dir`
pub fn build_archive(dir: &Path) -> Result<Vec<u8>, UploadError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    add_dir(&mut writer, dir, "", options)?;

    let cursor = writer
        .finish()
        .map_err(|e| UploadError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn add_dir(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<(), UploadError> {
    let archive_err = |e: std::io::Error| UploadError::Archive(format!("{}: {}", dir.display(), e));

    let mut entries = std::fs::read_dir(dir)
        .map_err(archive_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(archive_err)?;
    // Stable entry order keeps archives reproducible
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = format!("{prefix}{}", entry.file_name().to_string_lossy());
        let file_type = entry.file_type().map_err(archive_err)?;

        if file_type.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|e| UploadError::Archive(e.to_string()))?;
            add_dir(writer, &entry.path(), &format!("{name}/"), options)?;
        } else if file_type.is_file() {
            let bytes = std::fs::read(entry.path()).map_err(archive_err)?;
            writer
                .start_file(name, options)
                .map_err(|e| UploadError::Archive(e.to_string()))?;
            writer.write_all(&bytes).map_err(archive_err)?;
        }
    }
    Ok(())
}

/// Packages a session's credential directory and ships it to a blob store
pub struct ArchiveUploader {
    credentials: CredentialStore,
    store: Arc<dyn BlobStore>,
}

impl ArchiveUploader {
    /// Create an uploader reading from `credentials` and writing to `store`
    pub fn new(credentials: CredentialStore, store: Arc<dyn BlobStore>) -> Self {
        Self { credentials, store }
    }

    /// Archive and upload the credentials of `session_id`
    ///
    /// Returns the stored object path. Replaces any earlier archive.
    pub async fn upload(&self, session_id: &str) -> Result<String, UploadError> {
        let dir = self.credentials.dir_for(session_id);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(UploadError::MissingDirectory(dir.display().to_string()));
        }

        let bytes = tokio::task::spawn_blocking(move || build_archive(&dir))
            .await
            .map_err(|e| UploadError::Archive(format!("archive task failed: {}", e)))??;

        let key = archive_key(session_id);
        let size = bytes.len();
        let path = self.store.upload(&key, bytes, ARCHIVE_CONTENT_TYPE).await?;
        info!(session_id = %session_id, "Uploaded credential archive ({} bytes) to {}", size, path);
        Ok(path)
    }
}
