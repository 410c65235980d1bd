//! Forward-only accessor over an input stream.

use super::{check_access, check_writable, short_read, MediumAccessor};
use crate::error::{StoreError, StoreResult};
use crate::medium::{Medium, MediumKind, StreamSource};
use crate::offset::MediumOffset;
use crate::stats::AccessStats;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Chunks in flight between the pump thread and the accessor.
const PUMP_CHANNEL_CAPACITY: usize = 4;

enum StreamReader {
    Direct(Box<dyn Read + Send>),
    Pumped {
        chunks: Receiver<io::Result<Vec<u8>>>,
        timeout: Duration,
    },
}

/// Sequential access to a stream medium.
///
/// The stream can only be consumed forward. A read at a position behind the
/// current stream position skips the bytes in between; a read before it
/// fails with `Unsupported`. [`MediumAccessor::is_at_end_of_medium`]
/// consumes the bytes before the queried position and keeps the byte at it
/// buffered for the next read.
///
/// The stream is consumed in chunks of at most `max_read_write_block_size`
/// bytes, so the look-ahead buffer never holds more than one chunk beyond
/// what a read asked for.
///
/// With a configured read timeout, a pump thread reads the stream and the
/// accessor waits for each chunk at most that long.
pub struct StreamAccessor {
    medium: Medium,
    source: Option<StreamSource>,
    reader: Option<StreamReader>,
    position: u64,
    pending: VecDeque<u8>,
    exhausted: bool,
    stats: AccessStats,
}

impl StreamAccessor {
    /// Creates a closed accessor for a stream medium.
    #[must_use]
    pub fn new(medium: Medium) -> Self {
        let source = match medium.kind() {
            MediumKind::Stream { source } => Some(source.clone()),
            _ => None,
        };
        Self {
            medium,
            source,
            reader: None,
            position: 0,
            pending: VecDeque::new(),
            exhausted: false,
            stats: AccessStats::new(),
        }
    }

    fn chunk_size(&self) -> usize {
        self.medium.config().max_read_write_block_size
    }

    /// Buffers bytes until `wanted` are pending or the stream ends.
    fn fill(&mut self, wanted: usize) -> StoreResult<()> {
        let chunk_size = self.chunk_size();
        while self.pending.len() < wanted && !self.exhausted {
            let Some(reader) = self.reader.as_mut() else {
                return Err(StoreError::Closed);
            };
            match reader {
                StreamReader::Direct(reader) => {
                    let mut chunk = vec![0u8; chunk_size];
                    match reader.read(&mut chunk) {
                        Ok(0) => self.exhausted = true,
                        Ok(n) => self.pending.extend(&chunk[..n]),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                StreamReader::Pumped { chunks, timeout } => match chunks.recv_timeout(*timeout) {
                    Ok(Ok(chunk)) => self.pending.extend(chunk),
                    Ok(Err(e)) => return Err(e.into()),
                    Err(RecvTimeoutError::Disconnected) => self.exhausted = true,
                    Err(RecvTimeoutError::Timeout) => {
                        let offset = self.position + self.pending.len() as u64;
                        tracing::warn!(
                            medium = %self.medium.name(),
                            offset,
                            timeout = ?timeout,
                            "stream read timed out"
                        );
                        return Err(StoreError::ReadTimedOut {
                            offset,
                            timeout: *timeout,
                        });
                    }
                },
            }
        }
        Ok(())
    }

    /// Consumes up to `count` bytes, returning how many were consumed.
    fn skip(&mut self, count: u64) -> StoreResult<u64> {
        let mut skipped = 0;
        while skipped < count {
            let step = (count - skipped).min(self.chunk_size() as u64) as usize;
            self.fill(step)?;
            let available = step.min(self.pending.len());
            if available == 0 {
                break;
            }
            self.pending.drain(..available);
            skipped += available as u64;
        }
        self.position += skipped;
        if skipped > 0 {
            self.stats.record_read(skipped);
            tracing::trace!(medium = %self.medium.name(), skipped, "skipped stream bytes");
        }
        Ok(skipped)
    }
}

fn spawn_pump(
    mut reader: Box<dyn Read + Send>,
    chunk_size: usize,
    name: &str,
) -> io::Result<Receiver<io::Result<Vec<u8>>>> {
    let (sender, receiver) = mpsc::sync_channel(PUMP_CHANNEL_CAPACITY);
    thread::Builder::new()
        .name(format!("stream-pump-{name}"))
        .spawn(move || loop {
            let mut chunk = vec![0u8; chunk_size];
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    chunk.truncate(n);
                    if sender.send(Ok(chunk)).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = sender.send(Err(e));
                    break;
                }
            }
        })?;
    Ok(receiver)
}

impl MediumAccessor for StreamAccessor {
    fn medium(&self) -> &Medium {
        &self.medium
    }

    fn open(&mut self) -> StoreResult<()> {
        if self.reader.is_some() {
            return Err(StoreError::medium_access(format!(
                "{} is already open",
                self.medium.name()
            )));
        }
        let reader = self
            .source
            .as_ref()
            .and_then(|source| source.lock().take())
            .ok_or_else(|| {
                StoreError::medium_access(format!(
                    "stream {} was already consumed",
                    self.medium.name()
                ))
            })?;

        let reader = match self.medium.config().read_timeout {
            Some(timeout) => {
                let chunks = spawn_pump(reader, self.chunk_size(), self.medium.name())
                    .map_err(|e| StoreError::medium_access_io("cannot start stream pump", e))?;
                StreamReader::Pumped { chunks, timeout }
            }
            None => StreamReader::Direct(reader),
        };

        self.reader = Some(reader);
        self.position = 0;
        self.pending.clear();
        self.exhausted = false;
        tracing::debug!(medium = %self.medium.name(), "opened stream medium");
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.reader.take().is_none() {
            return Err(StoreError::Closed);
        }
        self.pending.clear();
        tracing::debug!(
            medium = %self.medium.name(),
            position = self.position,
            "closed stream medium"
        );
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.reader.is_some()
    }

    fn read(&mut self, offset: MediumOffset, buffer: &mut [u8]) -> StoreResult<()> {
        check_access(&self.medium, self.is_opened(), &offset)?;
        if offset.position() < self.position {
            return Err(StoreError::unsupported(format!(
                "backward read at {} on stream {} positioned at {}",
                offset.position(),
                self.medium.name(),
                self.position
            )));
        }
        let gap = offset.position() - self.position;
        if self.skip(gap)? < gap {
            return Err(short_read(offset, buffer, 0));
        }

        self.fill(buffer.len())?;
        let read = buffer.len().min(self.pending.len());
        for (target, byte) in buffer.iter_mut().zip(self.pending.drain(..read)) {
            *target = byte;
        }
        self.position += read as u64;

        self.stats.record_read(read as u64);
        tracing::trace!(offset = offset.position(), requested = buffer.len(), read, "stream read");
        if read < buffer.len() {
            return Err(short_read(offset, buffer, read));
        }
        Ok(())
    }

    fn write(&mut self, offset: MediumOffset, _data: &[u8]) -> StoreResult<()> {
        check_access(&self.medium, self.is_opened(), &offset)?;
        check_writable(&self.medium)?;
        Err(StoreError::unsupported("writes to stream media"))
    }

    fn truncate(&mut self, _new_length: u64) -> StoreResult<()> {
        if !self.is_opened() {
            return Err(StoreError::Closed);
        }
        check_writable(&self.medium)?;
        Err(StoreError::unsupported("truncation of stream media"))
    }

    fn is_at_end_of_medium(&mut self, offset: MediumOffset) -> StoreResult<bool> {
        check_access(&self.medium, self.is_opened(), &offset)?;
        if offset.position() < self.position {
            return Ok(false);
        }
        let ahead = offset.position() - self.position;
        if self.skip(ahead)? < ahead {
            return Ok(true);
        }
        self.fill(1)?;
        Ok(self.pending.is_empty())
    }

    fn length(&self) -> StoreResult<Option<u64>> {
        Ok(None)
    }

    fn stream_position(&self) -> Option<u64> {
        self.is_opened().then_some(self.position)
    }

    fn stats(&self) -> &AccessStats {
        &self.stats
    }
}

impl fmt::Debug for StreamAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAccessor")
            .field("medium", &self.medium)
            .field("opened", &self.is_opened())
            .field("position", &self.position)
            .field("buffered", &self.pending.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediumConfig;
    use std::io::Cursor;

    struct SlowReader {
        delay: Duration,
    }

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.delay);
            buf[0] = 1;
            Ok(1)
        }
    }

    fn open_stream(content: &[u8], config: MediumConfig) -> (Medium, StreamAccessor) {
        let medium = Medium::stream(Cursor::new(content.to_vec()), "test", config).unwrap();
        let mut accessor = StreamAccessor::new(medium.clone());
        accessor.open().unwrap();
        (medium, accessor)
    }

    fn at(medium: &Medium, position: u64) -> MediumOffset {
        MediumOffset::new(medium.id(), position)
    }

    #[test]
    fn sequential_reads() {
        let (medium, mut accessor) = open_stream(b"abcdef", MediumConfig::default());
        let mut buffer = [0u8; 3];

        accessor.read(at(&medium, 0), &mut buffer).unwrap();
        assert_eq!(&buffer, b"abc");
        accessor.read(at(&medium, 3), &mut buffer).unwrap();
        assert_eq!(&buffer, b"def");
        assert_eq!(accessor.stream_position(), Some(6));
    }

    #[test]
    fn forward_read_skips_gap() {
        let (medium, mut accessor) = open_stream(b"abcdef", MediumConfig::default());
        let mut buffer = [0u8; 2];
        accessor.read(at(&medium, 3), &mut buffer).unwrap();
        assert_eq!(&buffer, b"de");
    }

    #[test]
    fn backward_read_unsupported() {
        let (medium, mut accessor) = open_stream(b"abcdef", MediumConfig::default());
        let mut buffer = [0u8; 2];
        accessor.read(at(&medium, 2), &mut buffer).unwrap();
        assert!(matches!(
            accessor.read(at(&medium, 0), &mut buffer),
            Err(StoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn short_read_at_end() {
        let (medium, mut accessor) = open_stream(b"abc", MediumConfig::default());
        let mut buffer = [0u8; 5];
        let err = accessor.read(at(&medium, 1), &mut buffer).unwrap_err();
        let eom = err.as_end_of_medium().unwrap();
        assert_eq!(eom.offset.position(), 1);
        assert_eq!(eom.read, 2);
        assert_eq!(eom.bytes.as_ref(), b"bc");
    }

    #[test]
    fn end_of_medium_peek_keeps_byte_at_offset() {
        let (medium, mut accessor) = open_stream(b"abc", MediumConfig::default());
        assert!(!accessor.is_at_end_of_medium(at(&medium, 0)).unwrap());
        assert!(!accessor.is_at_end_of_medium(at(&medium, 1)).unwrap());
        assert_eq!(accessor.stream_position(), Some(1));

        let mut buffer = [0u8; 2];
        accessor.read(at(&medium, 1), &mut buffer).unwrap();
        assert_eq!(&buffer, b"bc");
        assert!(accessor.is_at_end_of_medium(at(&medium, 3)).unwrap());
    }

    #[test]
    fn far_end_of_medium_query_reads_in_chunks() {
        let config = MediumConfig::new().max_read_write_block_size(2);
        let (medium, mut accessor) = open_stream(b"abc", config);
        assert!(accessor.is_at_end_of_medium(at(&medium, 1 << 62)).unwrap());
        assert_eq!(accessor.stream_position(), Some(3));
        assert!(accessor.pending.is_empty());

        let mut buffer = [0u8; 1];
        let err = accessor.read(at(&medium, 1 << 62), &mut buffer).unwrap_err();
        assert_eq!(err.as_end_of_medium().unwrap().read, 0);
    }

    #[test]
    fn pumped_reads_deliver_content() {
        let config = MediumConfig::new()
            .max_read_write_block_size(2)
            .read_timeout(Some(Duration::from_secs(5)));
        let (medium, mut accessor) = open_stream(b"hello", config);
        let mut buffer = [0u8; 5];
        accessor.read(at(&medium, 0), &mut buffer).unwrap();
        assert_eq!(&buffer, b"hello");
        assert!(accessor.is_at_end_of_medium(at(&medium, 5)).unwrap());
    }

    #[test]
    fn slow_stream_times_out() {
        let config = MediumConfig::new().read_timeout(Some(Duration::from_millis(20)));
        let medium = Medium::stream(
            SlowReader {
                delay: Duration::from_millis(500),
            },
            "slow",
            config,
        )
        .unwrap();
        let mut accessor = StreamAccessor::new(medium.clone());
        accessor.open().unwrap();

        let mut buffer = [0u8; 1];
        assert!(matches!(
            accessor.read(at(&medium, 0), &mut buffer),
            Err(StoreError::ReadTimedOut { offset: 0, .. })
        ));
    }

    #[test]
    fn consumed_stream_cannot_reopen() {
        let (_, mut accessor) = open_stream(b"abc", MediumConfig::default());
        accessor.close().unwrap();
        assert!(matches!(
            accessor.open(),
            Err(StoreError::MediumAccess { .. })
        ));
    }

    #[test]
    fn writes_rejected() {
        let (medium, mut accessor) = open_stream(b"abc", MediumConfig::default());
        assert!(matches!(
            accessor.write(at(&medium, 0), b"x"),
            Err(StoreError::ReadOnly { .. })
        ));
        assert_eq!(accessor.length().unwrap(), None);
    }
}
