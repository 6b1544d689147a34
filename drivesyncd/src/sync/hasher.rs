use std::path::Path;

use thiserror::Error;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Computes the MD5 fingerprint of a file's content as lowercase hex,
/// reading in fixed chunks so large files never sit in memory whole.
pub async fn file_fingerprint(path: &Path) -> Result<String, HashError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        context.consume(&buf[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}
