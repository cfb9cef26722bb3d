//! Bounded request body collection
//!
//! A body is read in full while it stays within the limit. Once it is known
//! to be over the limit, either from Content-Length or while streaming, only
//! a short prefix is kept: enough for the multipart part headers, so the
//! rejection can still name a wrong file extension.

use bytes::{Bytes, BytesMut};

use crate::security;

/// Outcome of reading a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectedBody {
    /// Whole body, within the limit
    Complete(Bytes),
    /// Body over the limit; holds at most the prefix length
    Oversized(Bytes),
}

/// Accumulates body chunks against a size limit
#[derive(Debug)]
pub struct BodyCollector {
    buf: BytesMut,
    limit: usize,
    prefix_len: usize,
    oversized: bool,
}

impl BodyCollector {
    /// `content_length` is the declared length, if any. A declared length
    /// over `limit` marks the body oversized before any byte is read.
    pub fn new(content_length: Option<usize>, limit: usize, prefix_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
            prefix_len,
            oversized: security::validate_body_size(content_length, limit).is_err(),
        }
    }

    pub fn is_oversized(&self) -> bool {
        self.oversized
    }

    /// Whether another chunk should be read
    pub fn wants_more(&self) -> bool {
        !self.oversized || self.buf.len() < self.prefix_len
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if !self.oversized
            && security::validate_body_size(Some(self.buf.len() + chunk.len()), self.limit).is_err()
        {
            self.oversized = true;
            self.buf.truncate(self.prefix_len);
        }

        if self.oversized {
            let room = self.prefix_len.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..room.min(chunk.len())]);
        } else {
            self.buf.extend_from_slice(chunk);
        }
    }

    pub fn finish(self) -> CollectedBody {
        let body = self.buf.freeze();
        if self.oversized {
            CollectedBody::Oversized(body)
        } else {
            CollectedBody::Complete(body)
        }
    }
}
