//! Firmware package handling.
//!
//! A firmware package is a ZIP distribution bundle on the local filesystem.
//! Opening only verifies the path points at a readable ZIP; the transfer
//! engine is responsible for everything inside the archive.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// ZIP local file header magic.
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Errors that can occur while opening a firmware package.
#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("firmware package not found: {0}")]
    NotFound(PathBuf),

    #[error("firmware package is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("firmware package is not a ZIP archive: {0}")]
    InvalidArchive(PathBuf),

    #[error("failed to read firmware package {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A validated handle to a firmware distribution package.
///
/// Immutable and read-only for the lifetime of the session that carries it.
#[derive(Debug, Clone)]
pub struct FirmwarePackage {
    path: PathBuf,
    size_bytes: u64,
}

impl FirmwarePackage {
    /// Open a firmware package, verifying the file exists, is readable and
    /// starts with the ZIP magic. No further parsing happens here.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FirmwareError> {
        let path = path.as_ref();

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FirmwareError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(FirmwareError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        if !metadata.is_file() {
            return Err(FirmwareError::NotAFile(path.to_path_buf()));
        }

        let mut file = File::open(path).map_err(|e| FirmwareError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|_| FirmwareError::InvalidArchive(path.to_path_buf()))?;

        if magic != ZIP_MAGIC {
            return Err(FirmwareError::InvalidArchive(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }

    /// Path to the package on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the package in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
