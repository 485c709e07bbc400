//! Length-prefixed framing over another transport.
//!
//! Wire format of one frame:
//! ```text
//! [frame_len:4][frame bytes: frame_len]
//! ```
//! `frame_len` is a big-endian `i32`.  Everything written between two
//! `flush()` calls becomes exactly one frame.

use super::{CloseHandle, Transport, TransportError};

/// Largest frame accepted by default (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Wraps a [`Transport`] so that writes are sent as length-prefixed frames.
#[derive(Debug)]
pub struct FramedTransport<T> {
    inner: T,
    max_frame_size: usize,
    write_buf: Vec<u8>,
    read_buf: Vec<u8>,
    read_pos: usize,
}

impl<T: Transport> FramedTransport<T> {
    /// Wraps `inner` with the default frame size limit.
    pub fn new(inner: T) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Wraps `inner`, rejecting inbound frames larger than `max_frame_size`.
    pub fn with_max_frame_size(inner: T, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
            write_buf: Vec::new(),
            read_buf: Vec::new(),
            read_pos: 0,
        }
    }

    /// Borrows the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwraps the framing layer.  Buffered, unflushed writes are dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn read_frame(&mut self) -> Result<(), TransportError> {
        let mut header = [0u8; 4];
        self.inner.read(&mut header)?;
        let frame_len = i32::from_be_bytes(header);
        if frame_len < 0 || frame_len as usize > self.max_frame_size {
            return Err(TransportError::FrameSize(frame_len));
        }
        let mut frame = vec![0u8; frame_len as usize];
        self.inner.read(&mut frame)?;
        self.read_buf = frame;
        self.read_pos = 0;
        Ok(())
    }
}

impl<T: Transport> Transport for FramedTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.read_pos == self.read_buf.len() {
                self.read_frame()?;
                continue;
            }
            let available = self.read_buf.len() - self.read_pos;
            let take = available.min(buf.len() - filled);
            buf[filled..filled + take]
                .copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + take]);
            self.read_pos += take;
            filled += take;
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if self.inner.is_closed() {
            return Err(TransportError::Closed);
        }
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let frame = std::mem::take(&mut self.write_buf);
        let frame_len = i32::try_from(frame.len())
            .map_err(|_| TransportError::FrameSize(i32::MAX))?;
        self.inner.write(&frame_len.to_be_bytes())?;
        self.inner.write(&frame)?;
        self.inner.flush()
    }

    fn close(&mut self) {
        self.write_buf.clear();
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn close_handle(&self) -> CloseHandle {
        self.inner.close_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BufferTransport;
    use std::time::Duration;

    /// Times out the first read of `stall_len` bytes without consuming input.
    struct StallOnce {
        inner: BufferTransport,
        stall_len: usize,
        stalled: bool,
    }

    impl Transport for StallOnce {
        fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
            if !self.stalled && buf.len() == self.stall_len {
                self.stalled = true;
                return Err(TransportError::ReadTimeout(Duration::from_millis(1)));
            }
            self.inner.read(buf)
        }

        fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> Result<(), TransportError> {
            self.inner.flush()
        }

        fn close(&mut self) {
            self.inner.close();
        }

        fn is_closed(&self) -> bool {
            self.inner.is_closed()
        }

        fn close_handle(&self) -> CloseHandle {
            self.inner.close_handle()
        }
    }

    #[test]
    fn test_flush_writes_length_prefixed_frame() {
        // Arrange
        let mut framed = FramedTransport::new(BufferTransport::new());

        // Act
        framed.write(b"ab").unwrap();
        framed.write(b"c").unwrap();
        framed.flush().unwrap();

        // Assert
        assert_eq!(framed.inner().as_bytes(), &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_nothing_reaches_inner_transport_before_flush() {
        let mut framed = FramedTransport::new(BufferTransport::new());

        framed.write(b"pending").unwrap();

        assert!(framed.inner().as_bytes().is_empty());
    }

    #[test]
    fn test_reads_span_consecutive_frames() {
        // Arrange – two frames: "ab" and "cd"
        let bytes = vec![0, 0, 0, 2, b'a', b'b', 0, 0, 0, 2, b'c', b'd'];
        let mut framed = FramedTransport::new(BufferTransport::from_bytes(bytes));

        // Act
        let mut buf = [0u8; 3];
        framed.read(&mut buf).unwrap();
        let mut last = [0u8; 1];
        framed.read(&mut last).unwrap();

        // Assert
        assert_eq!(&buf, b"abc");
        assert_eq!(&last, b"d");
    }

    #[test]
    fn test_timed_out_frame_body_is_not_served_as_zeroes() {
        // Arrange – one 2-byte frame whose body read times out once
        let inner = StallOnce {
            inner: BufferTransport::from_bytes(vec![0, 0, 0, 2, b'a', b'b']),
            stall_len: 2,
            stalled: false,
        };
        let mut framed = FramedTransport::with_max_frame_size(inner, 16);
        let mut buf = [0u8; 1];

        // Act
        let first = framed.read(&mut buf);
        let second = framed.read(&mut buf);

        // Assert – the retry goes back to the stream instead of a zeroed buffer
        assert!(matches!(first, Err(TransportError::ReadTimeout(_))));
        assert!(second.is_err(), "a failed frame must not yield data, got {buf:?}");
    }

    #[test]
    fn test_negative_frame_length_is_rejected() {
        let bytes = (-5i32).to_be_bytes().to_vec();
        let mut framed = FramedTransport::new(BufferTransport::from_bytes(bytes));

        let mut buf = [0u8; 1];
        let result = framed.read(&mut buf);

        assert!(matches!(result, Err(TransportError::FrameSize(-5))));
    }

    #[test]
    fn test_oversized_frame_length_is_rejected() {
        let bytes = 100i32.to_be_bytes().to_vec();
        let mut framed = FramedTransport::with_max_frame_size(BufferTransport::from_bytes(bytes), 10);

        let mut buf = [0u8; 1];
        let result = framed.read(&mut buf);

        assert!(matches!(result, Err(TransportError::FrameSize(100))));
    }

    #[test]
    fn test_close_propagates_to_inner_transport() {
        let mut framed = FramedTransport::new(BufferTransport::new());

        framed.close();

        assert!(framed.is_closed());
        assert!(matches!(framed.write(b"x"), Err(TransportError::Closed)));
    }
}
