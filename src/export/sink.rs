//! Append-only output destinations for exports.

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Append-only byte sink.
///
/// The export engine only ever appends and flushes; creating, naming and
/// cleaning up the destination is the caller's concern.
pub trait ExportSink: Send {
    fn append(&mut self, bytes: &[u8]) -> impl Future<Output = DbResult<()>> + Send;

    fn flush(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// In-memory sink, mostly for tests and previews.
impl ExportSink for Vec<u8> {
    async fn append(&mut self, bytes: &[u8]) -> DbResult<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> DbResult<()> {
        Ok(())
    }
}

/// Buffered file sink. Refuses to overwrite an existing file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl FileSink {
    pub async fn create(path: impl Into<PathBuf>) -> DbResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => DbError::invalid_input(format!(
                    "Export file '{}' already exists. Choose another file_name",
                    path.display()
                )),
                _ => DbError::from(e),
            })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl ExportSink for FileSink {
    async fn append(&mut self, bytes: &[u8]) -> DbResult<()> {
        self.writer.write_all(bytes).await?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> DbResult<()> {
        self.writer.flush().await?;
        Ok(())
    }
}
