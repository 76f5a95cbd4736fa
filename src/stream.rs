//! Pull-based chunk streams shared by the spool, hold, and forward stages.
//!
//! Every interception stage in the request pipeline speaks the same
//! vocabulary: a [`ChunkSource`] hands out [`Chunk::Data`] frames on
//! demand and terminates with a single [`Chunk::End`]. Pulling instead
//! of pushing gives natural backpressure — no stage buffers more than
//! one chunk in memory on its own. [`BodySource`] adapts an inbound
//! Axum body, [`MemorySource`] replays already-buffered chunks, and
//! [`ChunkBody`] exposes any source as an `http_body::Body` for the
//! hyper client and for Axum responses.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;

use async_trait::async_trait;
use http_body::Frame;
use http_body_util::BodyExt;

use crate::error::UnderstudyError;

/// Default pull size for stages that get to choose (spool replay, body
/// adaptation). Matches the usual filesystem read granularity.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// One element of a chunk stream. `End` is an explicit marker rather
/// than an `Option` so stages can observe and forward it exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Bytes),
    End,
}

impl Chunk {
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

// async_trait is required here because sources are held as
// Box<dyn ChunkSource> and native async fn in traits (Rust 1.75+) does
// not support dyn dispatch.
#[async_trait]
pub trait ChunkSource: Send {
    /// Pull the next chunk, at most `max` bytes of data. After `End`
    /// has been returned once, every later call returns `End` again.
    async fn pull(&mut self, max: usize) -> Result<Chunk, UnderstudyError>;
}

/// Adapts an inbound [`axum::body::Body`] into a [`ChunkSource`].
///
/// Data frames pass through as-is (the `max` hint is ignored — frames
/// arrive at whatever granularity the connection produced them);
/// trailer frames are skipped.
pub struct BodySource {
    body: axum::body::Body,
    done: bool,
}

impl BodySource {
    #[must_use]
    pub const fn new(body: axum::body::Body) -> Self {
        Self { body, done: false }
    }
}

#[async_trait]
impl ChunkSource for BodySource {
    async fn pull(&mut self, _max: usize) -> Result<Chunk, UnderstudyError> {
        if self.done {
            return Ok(Chunk::End);
        }
        loop {
            match self.body.frame().await {
                None => {
                    self.done = true;
                    return Ok(Chunk::End);
                }
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        if data.is_empty() {
                            continue;
                        }
                        return Ok(Chunk::Data(data));
                    }
                    // Trailer frame — nothing to spool or forward.
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Err(UnderstudyError::Body {
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}

/// Replays an in-memory sequence of chunks in original order.
pub struct MemorySource {
    chunks: std::vec::IntoIter<Bytes>,
}

impl MemorySource {
    #[must_use]
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks: chunks.into_iter(),
        }
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    async fn pull(&mut self, _max: usize) -> Result<Chunk, UnderstudyError> {
        Ok(self.chunks.next().map_or(Chunk::End, Chunk::Data))
    }
}

type PullFuture = Pin<
    Box<
        dyn Future<Output = (Box<dyn ChunkSource>, Result<Chunk, UnderstudyError>)>
            + Send
            + 'static,
    >,
>;

enum BodyState {
    Idle(Box<dyn ChunkSource>),
    Pulling(PullFuture),
    Done,
}

/// Exposes a [`ChunkSource`] as an [`http_body::Body`].
///
/// This is the bridge between the pull-based stages and the hyper
/// client / Axum response machinery: each `poll_frame` drives one
/// `pull`, so upstream backpressure propagates all the way to the
/// spool file or the inbound connection.
pub struct ChunkBody {
    state: BodyState,
}

impl ChunkBody {
    #[must_use]
    pub fn new(source: Box<dyn ChunkSource>) -> Self {
        Self {
            state: BodyState::Idle(source),
        }
    }

    /// Shorthand for serving already-buffered chunks.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(Box::new(MemorySource::new(chunks)))
    }
}

impl Unpin for ChunkBody {}

impl http_body::Body for ChunkBody {
    type Data = Bytes;
    type Error = UnderstudyError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, BodyState::Done) {
                BodyState::Done => return Poll::Ready(None),
                BodyState::Idle(mut source) => {
                    this.state = BodyState::Pulling(Box::pin(async move {
                        let result = source.pull(CHUNK_SIZE).await;
                        (source, result)
                    }));
                }
                BodyState::Pulling(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = BodyState::Pulling(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready((source, Ok(Chunk::Data(data)))) => {
                        this.state = BodyState::Idle(source);
                        return Poll::Ready(Some(Ok(Frame::data(data))));
                    }
                    Poll::Ready((_, Ok(Chunk::End))) => return Poll::Ready(None),
                    Poll::Ready((_, Err(e))) => return Poll::Ready(Some(Err(e))),
                },
            }
        }
    }
}
