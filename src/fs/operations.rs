use std::{io::ErrorKind, path::Path};

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

/// Reads a whole file into a string. A missing file is reported as `None` so callers
/// can fall back to an empty state.
pub async fn read_optional(path: &Path) -> Result<Option<String>, io::Error> {
    match fs::read_to_string(path).await {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces the contents of `path`. Data is written into a sibling temporary file first
/// and then renamed over the target, so a crash mid-write never leaves a truncated file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");
    let temporary = Path::new(&temporary);

    let mut file = File::create(temporary).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temporary, path).await
}

/// Opens (creating when needed) a file that is only used as an advisory lock target.
pub async fn open_lock_file(path: &Path) -> Result<File, io::Error> {
    File::options()
        .write(true)
        .create(true)
        .read(true)
        .truncate(false)
        .open(path)
        .await
}
