//! Bounded capture of a child's merged output
//!
//! The drainer forwards every byte to the diagnostic stream; a copy is kept in
//! a ring buffer so callers can inspect the most recent output after exit.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// A byte ring buffer that keeps at most `max_bytes`, dropping the oldest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: VecDeque<u8>,
    max_bytes: usize,
    total_bytes_written: usize,
}

impl RingBuffer {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_bytes.min(8192)),
            max_bytes,
            total_bytes_written: 0,
        }
    }

    /// Append data, evicting from the front once `max_bytes` is reached.
    pub fn write(&mut self, data: &[u8]) {
        self.total_bytes_written += data.len();
        if self.max_bytes == 0 {
            return;
        }

        let keep = &data[data.len().saturating_sub(self.max_bytes)..];
        let overflow = (self.buffer.len() + keep.len()).saturating_sub(self.max_bytes);
        self.buffer.drain(..overflow);
        self.buffer.extend(keep);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes ever written, including evicted ones.
    #[must_use]
    pub const fn total_bytes_written(&self) -> usize {
        self.total_bytes_written
    }

    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.total_bytes_written > self.max_bytes
    }

    /// Copy of the retained bytes, oldest first.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.iter().copied().collect()
    }
}

impl fmt::Display for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.contents()))
    }
}

/// A [`RingBuffer`] shared between the drainer thread and the caller.
///
/// Implements [`io::Write`] so it can be used as a diagnostic sink directly.
#[derive(Debug, Clone)]
pub struct SharedCapture {
    inner: Arc<Mutex<RingBuffer>>,
}

impl SharedCapture {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(max_bytes))),
        }
    }

    // A poisoned lock only means a writer panicked mid-append; the bytes are
    // still usable.
    fn lock(&self) -> MutexGuard<'_, RingBuffer> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, data: &[u8]) {
        self.lock().write(data);
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.lock().contents()
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        self.lock().to_string()
    }

    #[must_use]
    pub fn total_bytes_written(&self) -> usize {
        self.lock().total_bytes_written()
    }
}

impl io::Write for SharedCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ring_buffer_basic() {
        let mut buffer = RingBuffer::new(10);
        buffer.write(b"hello");
        assert_eq!(buffer.to_string(), "hello");
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_ring_buffer_truncation() {
        let mut buffer = RingBuffer::new(10);
        buffer.write(b"hello");
        buffer.write(b"world");
        buffer.write(b"!");

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.to_string(), "elloworld!");
        assert_eq!(buffer.total_bytes_written(), 11);
        assert!(buffer.was_truncated());
    }

    #[test]
    fn test_ring_buffer_single_oversized_write() {
        let mut buffer = RingBuffer::new(5);
        buffer.write(b"hello world");
        assert_eq!(buffer.to_string(), "world");
        assert_eq!(buffer.total_bytes_written(), 11);
    }

    #[test]
    fn test_ring_buffer_zero_capacity_counts_only() {
        let mut buffer = RingBuffer::new(0);
        buffer.write(b"abc");
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_bytes_written(), 3);
    }

    #[test]
    fn test_shared_capture_across_threads() {
        let capture = SharedCapture::new(64);
        let mut writer = capture.clone();
        std::thread::spawn(move || {
            writer.write_all(b"from drainer").unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(capture.to_string_lossy(), "from drainer");
        assert_eq!(capture.contents(), b"from drainer");
        assert_eq!(capture.total_bytes_written(), 12);
    }
}
