use std::path::{Path, PathBuf};

use crate::errors::GridPilotResult;
use crate::perception::types::ScreenArtifact;

/// Writes diagnostic copies of captured screenshots. Never read back.
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    /// Creates the directory if needed.
    pub fn open(dir: &Path) -> GridPilotResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn save(&self, step: u64, artifact: &ScreenArtifact) -> GridPilotResult<PathBuf> {
        let path = self.dir.join(format!("step_{step:04}.jpg"));
        std::fs::write(&path, &artifact.jpeg_bytes)?;
        tracing::debug!(path = %path.display(), "screenshot saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::ScreenshotMeta;

    #[test]
    fn saves_numbered_jpeg() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::open(&tmp.path().join("shots")).unwrap();
        let artifact = ScreenArtifact {
            jpeg_bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            image_base64: String::new(),
            meta: ScreenshotMeta {
                physical_width: 1,
                physical_height: 1,
                encoded_width: 1,
                encoded_height: 1,
            },
        };
        let path = store.save(7, &artifact).unwrap();
        assert!(path.ends_with("step_0007.jpg"));
        assert_eq!(std::fs::read(path).unwrap(), artifact.jpeg_bytes);
    }
}
