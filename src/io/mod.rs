mod http;
mod local;
mod memory;
mod stream;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use memory::MemoryReader;
pub use stream::StreamReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from an archive source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// May return fewer bytes than requested; zero means the offset is at
    /// or past the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Keep reading until `buf` is full or the source runs out.
    ///
    /// Returns the number of bytes actually placed in `buf`.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}
