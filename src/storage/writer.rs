//! Document Writer
//!
//! Replaces a document by writing a sibling temp file and renaming it over
//! the target, so readers never observe a half-written document.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Write `bytes` to `target` through `temp`
///
/// With `durable` set, the temp file is fsynced before the rename.
pub fn write_atomic(target: &Path, temp: &Path, bytes: &[u8], durable: bool) -> Result<()> {
    let written = if durable {
        File::create(temp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
    } else {
        fs::write(temp, bytes)
    };

    if let Err(e) = written.and_then(|()| fs::rename(temp, target)) {
        let _ = fs::remove_file(temp);
        return Err(e.into());
    }
    Ok(())
}

/// Async form of [`write_atomic`]
pub async fn write_atomic_async(target: &Path, temp: &Path, bytes: &[u8], durable: bool) -> Result<()> {
    let written = if durable {
        write_synced(temp, bytes).await
    } else {
        tokio::fs::write(temp, bytes).await
    };

    let renamed = match written {
        Ok(()) => tokio::fs::rename(temp, target).await,
        Err(e) => Err(e),
    };

    if let Err(e) = renamed {
        let _ = tokio::fs::remove_file(temp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
