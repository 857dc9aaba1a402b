use super::ReadAt;
use async_trait::async_trait;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Mutex;

/// Adapter for any seekable byte stream.
///
/// Every read seeks to an absolute offset first, so the stream's own
/// cursor position is never relied upon between calls. The mutex
/// serializes callers sharing one handle.
pub struct StreamReader<R> {
    inner: Mutex<R>,
    size: u64,
}

impl<R: Read + Seek> StreamReader<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Mutex::new(inner),
            size,
        })
    }
}

#[async_trait]
impl<R: Read + Seek + Send> ReadAt for StreamReader<R> {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("stream lock poisoned"))?;
        inner.seek(SeekFrom::Start(offset))?;
        inner.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
