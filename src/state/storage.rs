// File system operations for storing photo copies
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::models::StoredImage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
    #[error("Failed to read image {reference}: {source}")]
    ImageRead {
        reference: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write image {}: {source}", .path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Opens a readable stream for a caller-supplied image reference
pub trait ContentResolver: Send + Sync {
    fn open(&self, reference: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Resolves plain filesystem paths and `file://` URIs
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResolver;

impl ContentResolver for FileResolver {
    fn open(&self, reference: &str) -> io::Result<Box<dyn Read + Send>> {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        Ok(Box::new(File::open(path)?))
    }
}

/// Get the app data directory for Dr. Banana
pub fn get_app_data_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
    let app_dir = data_dir.join("com.drbanana.app");
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Ensure the private images directory exists and return its absolute path
pub fn ensure_images_dir(images_dir: &Path) -> StorageResult<PathBuf> {
    fs::create_dir_all(images_dir).map_err(|source| StorageError::ImageWrite {
        path: images_dir.to_path_buf(),
        source,
    })?;
    Ok(fs::canonicalize(images_dir)?)
}

// Writer adapter that hashes and counts everything passing through it
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    bytes: u64,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn create_timestamped_file(dir: &Path, extension: &str) -> StorageResult<(PathBuf, File)> {
    create_timestamped_file_at(dir, Utc::now().timestamp_millis(), extension)
}

// `<millis>.<ext>`, falling back to `<millis>-<n>.<ext>` when that name is taken
fn create_timestamped_file_at(
    dir: &Path,
    millis: i64,
    extension: &str,
) -> StorageResult<(PathBuf, File)> {
    let mut attempt = 0u32;

    loop {
        let filename = if attempt == 0 {
            format!("{millis}.{extension}")
        } else {
            format!("{millis}-{attempt}.{extension}")
        };
        let path = dir.join(filename);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(StorageError::ImageWrite { path, source }),
        }
    }
}

/// Copy the image behind `reference` into `images_dir`.
///
/// The copy is named after the current time in milliseconds. Bytes are
/// streamed, never buffered whole. A partially written file is removed
/// when the copy fails.
pub fn save_image_locally(
    resolver: &dyn ContentResolver,
    reference: &str,
    images_dir: &Path,
    extension: &str,
) -> StorageResult<StoredImage> {
    let mut input = resolver
        .open(reference)
        .map_err(|source| StorageError::ImageRead {
            reference: reference.to_string(),
            source,
        })?;

    let dir = ensure_images_dir(images_dir)?;
    let (path, file) = create_timestamped_file(&dir, extension)?;

    match copy_hashed(&mut input, file) {
        Ok((sha256, bytes)) => {
            log::debug!("Copied {} ({} bytes) to {}", reference, bytes, path.display());
            Ok(StoredImage {
                path: path.to_string_lossy().to_string(),
                sha256,
                bytes: bytes as i64,
            })
        }
        Err(CopyError::Read(source)) => {
            remove_image(&path);
            Err(StorageError::ImageRead {
                reference: reference.to_string(),
                source,
            })
        }
        Err(CopyError::Write(source)) => {
            remove_image(&path);
            Err(StorageError::ImageWrite { path, source })
        }
    }
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

fn copy_hashed(input: &mut dyn Read, file: File) -> Result<(String, u64), CopyError> {
    let mut writer = HashingWriter {
        inner: BufWriter::new(file),
        hasher: Sha256::new(),
        bytes: 0,
    };
    let mut buf = [0u8; 8192];

    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
    }

    writer.flush().map_err(CopyError::Write)?;
    let file = writer
        .inner
        .into_inner()
        .map_err(|e| CopyError::Write(e.into_error()))?;
    file.sync_all().map_err(CopyError::Write)?;

    Ok((hex::encode(writer.hasher.finalize()), writer.bytes))
}

/// Best-effort removal of a stored image
pub fn remove_image(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("Failed to remove image {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
pub(crate) fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
