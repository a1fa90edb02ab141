use std::path::{Path, PathBuf};

use crate::assets::AssetStore;

/// Page whose full image is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub page_id: u32,
    pub path: PathBuf,
}

/// Single-slot "full image being viewed" state.
///
/// Transitions consume the old value and return the new one; the owner
/// reassigns its field with the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    current: Option<SelectedImage>,
}

impl Selection {
    pub fn select(self, assets: &AssetStore, page_id: u32) -> Self {
        Self {
            current: Some(SelectedImage {
                page_id,
                path: assets.path_for(page_id),
            }),
        }
    }

    pub fn dismiss(self) -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<&SelectedImage> {
        self.current.as_ref()
    }

    pub fn page_id(&self) -> Option<u32> {
        self.current.as_ref().map(|image| image.page_id)
    }

    pub fn path(&self) -> Option<&Path> {
        self.current.as_ref().map(|image| image.path.as_path())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
