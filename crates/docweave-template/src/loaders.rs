//! Image loaders.
//!
//! An image bound by path is read through an [`ImageLoader`] when the template
//! is rendered. The [`ImageLoader`] trait is the only I/O seam of the render
//! pipeline; [`FileSystemLoader`] is the default and [`MemoryLoader`] serves
//! tests and callers that keep images somewhere other than the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use docweave_core::{DocweaveError, DocweaveResult};

/// Loads encoded image bytes by path.
pub trait ImageLoader: Send + Sync {
    /// Loads the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ImageLoad` if the image cannot be found or read.
    fn load(&self, path: &Path) -> DocweaveResult<Vec<u8>>;
}

/// Loads images from the filesystem.
///
/// Absolute paths are read directly. Relative paths are tried against each
/// configured directory in order and finally against the working directory.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
}

impl FileSystemLoader {
    /// Creates a `FileSystemLoader` with the given search directories.
    pub const fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn candidates<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        let searched = if path.is_absolute() { &[][..] } else { &self.dirs[..] };
        searched
            .iter()
            .map(move |dir| dir.join(path))
            .chain(std::iter::once(path.to_path_buf()))
    }
}

impl ImageLoader for FileSystemLoader {
    fn load(&self, path: &Path) -> DocweaveResult<Vec<u8>> {
        for candidate in self.candidates(path) {
            if candidate.is_file() {
                return std::fs::read(&candidate).map_err(|e| DocweaveError::ImageLoad {
                    name: path.display().to_string(),
                    reason: format!("error reading '{}': {e}", candidate.display()),
                });
            }
        }

        Err(DocweaveError::ImageLoad {
            name: path.display().to_string(),
            reason: format!("not found in directories: {:?}", self.dirs),
        })
    }
}

/// Serves images from an in-memory map of path to bytes.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    images: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryLoader {
    /// Creates an empty `MemoryLoader`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `MemoryLoader` from a map of paths to bytes.
    pub fn from_map(images: HashMap<PathBuf, Vec<u8>>) -> Self {
        Self {
            images: RwLock::new(images),
        }
    }

    /// Adds or replaces an image.
    pub fn add(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        if let Ok(mut images) = self.images.write() {
            images.insert(path.into(), data);
        }
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, path: &Path) -> DocweaveResult<Vec<u8>> {
        let images = self.images.read().map_err(|_| DocweaveError::ImageLoad {
            name: path.display().to_string(),
            reason: "image store lock poisoned".to_string(),
        })?;
        images
            .get(path)
            .cloned()
            .ok_or_else(|| DocweaveError::ImageLoad {
                name: path.display().to_string(),
                reason: "not found in memory loader".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader_basic() {
        let loader = MemoryLoader::new();
        loader.add("logo.png", vec![1, 2, 3]);
        assert_eq!(loader.load(Path::new("logo.png")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_memory_loader_not_found() {
        let loader = MemoryLoader::new();
        let err = loader.load(Path::new("missing.png")).unwrap_err();
        assert_eq!(err.code(), "image_load");
    }

    #[test]
    fn test_memory_loader_overwrite() {
        let mut map = HashMap::new();
        map.insert(PathBuf::from("a.png"), vec![1]);
        let loader = MemoryLoader::from_map(map);
        loader.add("a.png", vec![2]);
        assert_eq!(loader.load(Path::new("a.png")).unwrap(), vec![2]);
    }

    #[test]
    fn test_filesystem_loader_not_found() {
        let loader = FileSystemLoader::new(vec![PathBuf::from("/nonexistent/path")]);
        assert!(loader.load(Path::new("missing.png")).is_err());
    }

    #[test]
    fn test_filesystem_loader_with_temp_dir() {
        let dir = std::env::temp_dir().join("docweave_test_image_loader");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(dir.join("pixel.gif"), b"GIF89a").unwrap();

        let loader = FileSystemLoader::new(vec![dir.clone()]);
        assert_eq!(loader.load(Path::new("pixel.gif")).unwrap(), b"GIF89a");
        assert_eq!(loader.load(&dir.join("pixel.gif")).unwrap(), b"GIF89a");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
