//! Chunk assembly
//!
//! A chunked upload writes its fragments into a per-session working
//! directory, one file per chunk index. Assembly concatenates them in strict
//! numeric index order into a temporary file that is renamed over the
//! destination only when every fragment has been consumed. Fragments are
//! deleted as they are copied; a failed assembly removes its partial output
//! and the session has to start over.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

/// Fragment file name prefix inside a chunk directory
const FRAGMENT_PREFIX: &str = "chunk_";

/// Errors raised while storing or assembling chunks
#[derive(Debug, thiserror::Error)]
pub enum ChunkAssemblyError {
    /// Two fragments claim the same index
    #[error("duplicate chunk index {0}")]
    DuplicateChunk(u32),
    /// The index set has a gap; chunk {0} was never stored
    #[error("missing chunk index {0}")]
    MissingChunk(u32),
    /// A file in the chunk directory is not a `chunk_<index>` fragment
    #[error("unexpected fragment name {0:?}")]
    UnexpectedFragment(String),
    #[error("chunk i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Working directory of a single in-flight chunked upload.
///
/// One session owns one directory; nothing here guards against two writers
/// sharing it.
pub struct ChunkDir {
    dir: PathBuf,
}

impl ChunkDir {
    /// Open a chunk directory, creating it if needed
    pub async fn create(dir: PathBuf) -> Result<Self, ChunkAssemblyError> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn fragment_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{FRAGMENT_PREFIX}{index}"))
    }

    /// Store one fragment. Writing an index twice is rejected.
    pub async fn write_fragment(&self, index: u32, data: &[u8]) -> Result<(), ChunkAssemblyError> {
        let path = self.fragment_path(index);
        if path.exists() {
            return Err(ChunkAssemblyError::DuplicateChunk(index));
        }

        tokio::fs::write(&path, data).await?;
        tracing::debug!(index = index, bytes = data.len(), "stored chunk fragment");
        Ok(())
    }

    /// Number of fragments currently stored
    pub async fn fragment_count(&self) -> Result<usize, ChunkAssemblyError> {
        Ok(self.ordered_fragments().await?.len())
    }

    /// Concatenate all fragments into `dest` in ascending index order.
    ///
    /// The index set must be exactly `0..n`: collisions yield
    /// [`ChunkAssemblyError::DuplicateChunk`], gaps
    /// [`ChunkAssemblyError::MissingChunk`]. Output goes through a `.part`
    /// file renamed into place, so `dest` only ever exists complete. Returns
    /// the assembled byte count.
    pub async fn assemble(&self, dest: &Path) -> Result<u64, ChunkAssemblyError> {
        let fragments = self.ordered_fragments().await?;

        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ChunkAssemblyError::UnexpectedFragment(dest.display().to_string()))?;
        let tmp = dest.with_file_name(format!("{file_name}.part"));

        let result = self.concat_into(&fragments, &tmp, dest).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    async fn concat_into(
        &self,
        fragments: &[(u32, PathBuf)],
        tmp: &Path,
        dest: &Path,
    ) -> Result<u64, ChunkAssemblyError> {
        let mut out = tokio::fs::File::create(tmp).await?;
        let mut total: u64 = 0;

        for (index, path) in fragments {
            let data = tokio::fs::read(path).await?;
            out.write_all(&data).await?;
            total += data.len() as u64;

            // Consumed exactly once, never re-read
            tokio::fs::remove_file(path).await?;
            tracing::debug!(index = index, bytes = data.len(), "consumed chunk fragment");
        }

        out.flush().await?;
        drop(out);
        tokio::fs::rename(tmp, dest).await?;

        Ok(total)
    }

    /// List fragments sorted by parsed index, verifying the set is `0..n`
    async fn ordered_fragments(&self) -> Result<Vec<(u32, PathBuf)>, ChunkAssemblyError> {
        let mut fragments = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let index = parse_fragment_index(&name)
                .ok_or_else(|| ChunkAssemblyError::UnexpectedFragment(name.clone()))?;
            fragments.push((index, entry.path()));
        }

        // Numeric order, never directory listing order
        fragments.sort_by_key(|(index, _)| *index);

        for (position, (index, _)) in fragments.iter().enumerate() {
            let expected = position as u32;
            if *index < expected {
                return Err(ChunkAssemblyError::DuplicateChunk(*index));
            }
            if *index > expected {
                return Err(ChunkAssemblyError::MissingChunk(expected));
            }
        }

        Ok(fragments)
    }

    /// Drop the whole working directory, fragments and all
    pub async fn remove(self) -> Result<(), ChunkAssemblyError> {
        tokio::fs::remove_dir_all(&self.dir).await?;
        Ok(())
    }
}

fn parse_fragment_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(FRAGMENT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
