use std::path::Path;

use rand::RngCore;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use wfb_model::MIB;

/// Append size used when the task sets no memory ceiling.
pub const DEFAULT_WRITE_CHUNK: u64 = 10 * MIB;

/// Read `path` to the end and discard it. With a `chunk` the file is
/// consumed `chunk` bytes at a time, otherwise in one read. Returns the
/// number of bytes read.
pub async fn read_input(path: &Path, chunk: Option<u64>) -> std::io::Result<u64> {
    let mut file = File::open(path).await?;

    let Some(chunk) = chunk else {
        let mut buf = Vec::new();
        return file.read_to_end(&mut buf).await.map(|n| n as u64);
    };

    let mut buf = vec![0u8; usize::try_from(chunk).unwrap_or(usize::MAX).max(1)];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
    }
}

/// Rewrite `path` with exactly `size` pseudo-random bytes, appended in
/// chunks of at most `chunk` bytes. Returns the number of appends.
pub async fn write_output<R>(path: &Path, size: u64, chunk: u64, rng: &mut R) -> std::io::Result<u64>
where
    R: RngCore + Send,
{
    let chunk = chunk.max(1);
    let mut file = File::create(path).await?;
    let mut buf = vec![0u8; usize::try_from(chunk.min(size)).unwrap_or(usize::MAX)];

    let mut remaining = size;
    let mut appends = 0;
    while remaining > 0 {
        let n = remaining.min(chunk) as usize;
        rng.fill_bytes(&mut buf[..n]);
        file.write_all(&buf[..n]).await?;
        remaining -= n as u64;
        appends += 1;
    }
    file.flush().await?;
    Ok(appends)
}
