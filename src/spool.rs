//! Request-body capture and replay via an on-disk spool file.
//!
//! [`TeeSource`] sits between the inbound body and the trial execution:
//! everything the trial reads is transparently written to a uniquely
//! named temp file, so the body can later be replayed byte-for-byte by
//! [`ReplaySource`] when the request is forwarded upstream. The file is
//! created lazily on the first data chunk — an empty body never touches
//! disk — and removed after a single full replay or, as a backstop, by
//! [`SpooledBody`]'s `Drop`.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::UnderstudyError;
use crate::stream::{Chunk, ChunkSource};

/// The on-disk copy of a request body plus its open handle.
///
/// At most one exists per request. Removal is idempotent: explicit
/// removal at end of replay marks the file deleted, and `Drop` covers
/// every abnormal path (trial error, forward error, client abort).
pub struct SpooledBody {
    path: PathBuf,
    file: File,
    removed: bool,
}

impl SpooledBody {
    /// Create the spool file inside `dir`, creating the directory first
    /// if absent. Failure of either step is fatal for the request.
    pub async fn create(dir: &Path) -> Result<Self, UnderstudyError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| UnderstudyError::SpoolDir {
                path: dir.to_path_buf(),
                source,
            })?;

        let path = dir.join(format!("understudy-{}.body", uuid::Uuid::new_v4()));
        let file = File::options()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| UnderstudyError::Spool { source })?;

        Ok(Self {
            path,
            file,
            removed: false,
        })
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<(), UnderstudyError> {
        self.file
            .write_all(data)
            .await
            .map_err(|source| UnderstudyError::Spool { source })
    }

    /// Flush pending writes and rewind to position zero, making the
    /// body readable from the start. Must run before any replay read.
    pub async fn finish(&mut self) -> Result<(), UnderstudyError> {
        self.file
            .flush()
            .await
            .map_err(|source| UnderstudyError::Spool { source })?;
        self.file
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|source| UnderstudyError::Spool { source })?;
        Ok(())
    }

    /// Read up to `max` bytes from the current position. An empty
    /// result means end of file.
    pub async fn read(&mut self, max: usize) -> Result<Bytes, UnderstudyError> {
        let mut buf = vec![0u8; max.max(1)];
        let n = self
            .file
            .read(&mut buf)
            .await
            .map_err(|source| UnderstudyError::Spool { source })?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Delete the spool file. Idempotent; a file already removed (by a
    /// completed replay or an external cleaner) is not an error.
    pub fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove spool file");
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpooledBody {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Tee stage installed on the trial's input path.
///
/// Transparent: every chunk pulled from the inner source is returned
/// unchanged; data chunks are additionally written to the spool, and
/// the end-of-stream marker flushes and rewinds it.
pub struct TeeSource<S> {
    inner: S,
    dir: PathBuf,
    spool: Option<SpooledBody>,
    finished: bool,
}

impl<S: ChunkSource> TeeSource<S> {
    #[must_use]
    pub fn new(inner: S, dir: PathBuf) -> Self {
        Self {
            inner,
            dir,
            spool: None,
            finished: false,
        }
    }

    /// Pull the inner source to end-of-stream so the spool holds the
    /// complete body. No-op if the end marker was already seen.
    pub async fn drain(&mut self) -> Result<(), UnderstudyError> {
        while !self.finished {
            self.pull(crate::stream::CHUNK_SIZE).await?;
        }
        Ok(())
    }

    /// Hand the spooled body (if any) to the caller for replay.
    #[must_use]
    pub fn into_spooled(self) -> Option<SpooledBody> {
        self.spool
    }
}

#[async_trait]
impl<S: ChunkSource> ChunkSource for TeeSource<S> {
    async fn pull(&mut self, max: usize) -> Result<Chunk, UnderstudyError> {
        let chunk = self.inner.pull(max).await?;
        match &chunk {
            Chunk::Data(data) => {
                if self.spool.is_none() {
                    self.spool = Some(SpooledBody::create(&self.dir).await?);
                }
                if let Some(spool) = self.spool.as_mut() {
                    spool.write(data).await?;
                }
            }
            Chunk::End => {
                if !self.finished {
                    if let Some(spool) = self.spool.as_mut() {
                        spool.finish().await?;
                    }
                    self.finished = true;
                }
            }
        }
        Ok(chunk)
    }
}

/// Replay stage installed on the forward path.
///
/// Ignores whatever the original source would have produced and reads
/// the spooled body instead, in caller-requested sizes. Reaching end of
/// file deletes the spool and emits the end marker; with no spool
/// (empty original body) the end marker is emitted immediately.
pub struct ReplaySource {
    spool: Option<SpooledBody>,
    done: bool,
}

impl ReplaySource {
    #[must_use]
    pub const fn new(spool: Option<SpooledBody>) -> Self {
        Self { spool, done: false }
    }
}

#[async_trait]
impl ChunkSource for ReplaySource {
    async fn pull(&mut self, max: usize) -> Result<Chunk, UnderstudyError> {
        if self.done {
            return Ok(Chunk::End);
        }
        let Some(spool) = self.spool.as_mut() else {
            self.done = true;
            return Ok(Chunk::End);
        };
        let data = spool.read(max).await?;
        if data.is_empty() {
            spool.remove();
            self.spool = None;
            self.done = true;
            return Ok(Chunk::End);
        }
        Ok(Chunk::Data(data))
    }
}
