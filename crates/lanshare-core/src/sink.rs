use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Destination for completed downloads.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Persist `contents`, using `suggested_name` (the remote file name) as
    /// the preferred name. Returns where the file ended up.
    async fn save(&self, suggested_name: &str, contents: &[u8]) -> io::Result<PathBuf>;
}

/// Writes downloads into a directory without ever overwriting: a clash
/// gets ` (1)`, ` (2)`, ... inserted before the extension.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

const MAX_NAME_ATTEMPTS: u32 = 10_000;

impl DirectorySink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

/// Reduce a remote name to a bare file name so it cannot escape the
/// download directory.
fn safe_file_name(suggested: &str) -> &str {
    let base = suggested
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    match base {
        "" | "." | ".." => "download",
        name => name,
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    }
}

/// Write `contents` into the freshly created file at `path`. If the write
/// fails the partial file is removed, so the name is free for a retry.
async fn fill_or_discard<W>(mut file: W, path: &Path, contents: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(contents).await?;
        file.flush().await
    }
    .await;
    drop(file);

    if let Err(e) = written {
        if let Err(rm) = fs::remove_file(path).await {
            tracing::warn!("Could not remove partial file {}: {}", path.display(), rm);
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn save(&self, suggested_name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let name = safe_file_name(suggested_name);
        let (stem, ext) = split_extension(name);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                format!("{} ({}){}", stem, attempt, ext)
            };
            let path = self.dir.join(candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    fill_or_discard(file, &path, contents).await?;
                    tracing::debug!("Wrote {} bytes to {}", contents.len(), path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {} in {}", name, self.dir.display()),
        ))
    }
}
