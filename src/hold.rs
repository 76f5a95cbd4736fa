//! Output hold/release buffer for trial executions.
//!
//! While a trial runs, every response chunk it produces lands here
//! instead of on the wire. After classification the buffer is either
//! released once to the client (serve path) or dropped unreleased
//! (forward path) — never both.

use bytes::Bytes;

#[derive(Debug, Default)]
pub struct HeldResponse {
    chunks: Vec<Bytes>,
    released: bool,
}

impl HeldResponse {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunks: Vec::new(),
            released: false,
        }
    }

    /// Capture one response chunk from the trial execution.
    pub fn push(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Take the buffered chunks for transmission, in original order.
    /// First call wins; every later call returns `None`.
    pub fn release(&mut self) -> Option<Vec<Bytes>> {
        if self.released {
            return None;
        }
        self.released = true;
        Some(std::mem::take(&mut self.chunks))
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_returns_chunks_in_order() {
        let mut held = HeldResponse::new();
        held.push(Bytes::from("a"));
        held.push(Bytes::from("b"));
        held.push(Bytes::from("c"));
        assert_eq!(held.total_bytes(), 3);

        let chunks = held.release().unwrap();
        assert_eq!(chunks, vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
    }

    #[test]
    fn release_happens_exactly_once() {
        let mut held = HeldResponse::new();
        held.push(Bytes::from("payload"));

        assert!(held.release().is_some());
        assert!(held.release().is_none());
        assert!(held.release().is_none());
    }

    #[test]
    fn empty_buffer_still_releases_once() {
        let mut held = HeldResponse::new();
        assert_eq!(held.release(), Some(vec![]));
        assert!(held.release().is_none());
    }

    #[test]
    fn empty_chunks_are_not_stored() {
        let mut held = HeldResponse::new();
        held.push(Bytes::new());
        assert!(held.is_empty());
    }
}
