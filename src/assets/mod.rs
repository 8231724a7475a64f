//! Asynchronous asset fetching and the per-session texture registry.

mod texture;

pub use texture::{load_textures, TextureCache};

use futures::future::BoxFuture;
use image::RgbaImage;
use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{
    config::ImportMeta,
    error::{LoadError, LoadResult},
};

/// Where mesh, animation, scene and texture files come from.
///
/// Only [`AssetSource::fetch_bytes`] has to be provided; text and images are decoded from it.
pub trait AssetSource: Send + Sync {
    fn fetch_bytes<'a>(&'a self, path: &'a str) -> BoxFuture<'a, LoadResult<Vec<u8>>>;

    fn fetch_text<'a>(&'a self, path: &'a str) -> BoxFuture<'a, LoadResult<String>> {
        Box::pin(async move {
            let bytes = self.fetch_bytes(path).await?;
            String::from_utf8(bytes).map_err(|err| LoadError::Fetch {
                path: path.to_owned(),
                source: io::Error::new(io::ErrorKind::InvalidData, err),
            })
        })
    }

    fn fetch_image<'a>(&'a self, path: &'a str) -> BoxFuture<'a, LoadResult<RgbaImage>> {
        Box::pin(async move {
            let bytes = self.fetch_bytes(path).await?;
            let image = image::load_from_memory(&bytes).map_err(|source| LoadError::Image {
                path: path.to_owned(),
                source,
            })?;
            Ok(image.to_rgba8())
        })
    }
}

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FsAssetSource {
    fn fetch_bytes<'a>(&'a self, path: &'a str) -> BoxFuture<'a, LoadResult<Vec<u8>>> {
        Box::pin(async move {
            let full = self.root.join(path);
            log::debug!("Reading {}", full.display());
            std::fs::read(&full).map_err(|source| LoadError::Fetch {
                path: path.to_owned(),
                source,
            })
        })
    }
}

/// State owned by one running scene: loaded textures and the import options in effect.
#[derive(Debug)]
pub struct Session<T> {
    pub textures: TextureCache<T>,
    pub meta: ImportMeta,
}

impl<T> Session<T> {
    pub fn new(meta: ImportMeta) -> Self {
        Self {
            textures: TextureCache::new(),
            meta,
        }
    }
}

impl<T> Default for Session<T> {
    fn default() -> Self {
        Self::new(ImportMeta::default())
    }
}
