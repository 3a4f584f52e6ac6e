use std::io::{self, Write};

use axum::body::Bytes;
use tokio::sync::mpsc::Sender;

/// Blocking `Write` adapter that forwards every write as a chunk on a bounded
/// channel.
///
/// Must only be used off the async runtime (e.g. inside `spawn_blocking`).
/// Once the receiving side is gone every write fails with `BrokenPipe`.
pub struct ChannelWriter {
    tx: Sender<io::Result<Bytes>>,
    sent: u64,
}

impl ChannelWriter {
    pub fn new(tx: Sender<io::Result<Bytes>>) -> Self {
        Self { tx, sent: 0 }
    }

    /// Total bytes handed to the channel so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver dropped"))?;
        self.sent += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn forwards_chunks_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut writer = ChannelWriter::new(tx);
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(writer.sent(), 11);
        drop(writer);

        let mut received = Vec::new();
        while let Some(chunk) = rx.blocking_recv() {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, b"hello world");
    }

    #[test]
    fn dropped_receiver_is_broken_pipe() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut writer = ChannelWriter::new(tx);
        let err = writer.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
