use std::path::{Path, PathBuf};

use serde::Serialize;

pub const DEFAULT_ASSET_DIR: &str = "thumbnails";
pub const DEFAULT_ASSET_EXTENSION: &str = "jpg";

/// Directory of page images named `page_{id}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStore {
    dir: PathBuf,
    extension: String,
}

/// Resolved image path for a page. `exists` is probed, never assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub path: PathBuf,
    pub exists: bool,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = extension.trim().trim_start_matches('.').to_string();
        Self {
            dir: dir.into(),
            extension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path_for(&self, page_id: u32) -> PathBuf {
        self.dir.join(format!("page_{}.{}", page_id, self.extension))
    }

    pub fn resolve(&self, page_id: u32) -> AssetRef {
        let path = self.path_for(page_id);
        let exists = path.is_file();
        AssetRef { path, exists }
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_DIR, DEFAULT_ASSET_EXTENSION)
    }
}
