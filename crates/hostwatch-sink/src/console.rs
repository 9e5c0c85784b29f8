//! Standard output sink.

use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use crate::traits::Sink;

/// Writes each message as one line.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// A sink writing to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn flush(&self, message: &str) -> bool {
        let mut out = self.out.lock().expect("console sink lock poisoned");
        match writeln!(out, "{message}").and_then(|()| out.flush()) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "console write failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_message() {
        let buffer = Buffer::default();
        let sink = ConsoleSink::with_writer(buffer.clone());

        assert!(sink.flush("12345").await);
        assert!(sink.flush("second").await);

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "12345\nsecond\n");
    }

    #[tokio::test]
    async fn reports_write_failure() {
        let sink = ConsoleSink::with_writer(Broken);
        assert!(!sink.flush("lost").await);
    }
}
