use crate::config::RenderConfig;
use crate::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A rendered image held in memory after its file has been consumed
#[derive(Clone)]
pub struct Artifact {
    identity: String,
    extension: String,
    bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("identity", &self.identity)
            .field("extension", &self.extension)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// File handoff between the renderer process and the core:
/// `<image_dir>/<identity>.<extension>`
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.image_dir.clone(), config.extension.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Output path without extension, as passed to the renderer
    pub fn stem_for(&self, identity: &str) -> PathBuf {
        self.dir.join(identity)
    }

    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", identity, self.extension))
    }

    pub fn size_bytes(&self, identity: &str) -> Result<u64> {
        Ok(std::fs::metadata(self.path_for(identity))?.len())
    }

    /// Reads the artifact into memory and removes the file
    pub fn load(&self, identity: &str) -> Result<Artifact> {
        let path = self.path_for(identity);
        let bytes = std::fs::read(&path)?;
        self.discard(identity);
        Ok(Artifact {
            identity: identity.to_string(),
            extension: self.extension.clone(),
            bytes: Arc::from(bytes),
        })
    }

    /// Deletes the artifact file if present
    pub fn discard(&self, identity: &str) {
        let path = self.path_for(identity);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
