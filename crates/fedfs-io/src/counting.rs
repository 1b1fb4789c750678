use std::io::{Read, Result, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A reader feeding the number of bytes read into a shared counter.
#[derive(Debug)]
pub struct CountingRead<R> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> CountingRead<R> {
    /// Wrap `inner`, adding every byte read to `counter`.
    pub fn new(inner: R, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }
}

impl<R: Read> Read for CountingRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// A writer feeding the number of bytes written into a shared counter.
#[derive(Debug)]
pub struct CountingWrite<W> {
    inner: W,
    counter: Arc<AtomicU64>,
}

impl<W: Write> CountingWrite<W> {
    /// Wrap `inner`, adding every byte written to `counter`.
    pub fn new(inner: W, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }
}

impl<W: Write> Write for CountingWrite<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
