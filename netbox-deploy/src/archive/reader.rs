//! Blocking `Read` over chunks received from an async producer

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use tokio::sync::mpsc;

/// Chunks or the error that ended the download
pub type ChunkResult = io::Result<Bytes>;

/// Reads chunks pushed by an async task through a bounded channel. The
/// producer waits whenever the channel is full, so the download advances at
/// the pace of whoever consumes this reader.
///
/// Must be used from a blocking context such as `spawn_blocking`.
pub struct ChunkReader {
    rx: mpsc::Receiver<ChunkResult>,
    current: Bytes,
}

impl ChunkReader {
    pub fn new(rx: mpsc::Receiver<ChunkResult>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while !self.current.has_remaining() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}
