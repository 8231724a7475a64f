use futures::future::try_join_all;
use image::RgbaImage;
use std::collections::{HashMap, HashSet};

use crate::error::LoadResult;

use super::AssetSource;

/// Textures keyed by material name, with an optional fallback for materials that have none.
#[derive(Debug)]
pub struct TextureCache<T> {
    textures: HashMap<String, T>,
    default_name: Option<String>,
}

impl<T> Default for TextureCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TextureCache<T> {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            default_name: None,
        }
    }

    /// Registers `texture` under `name` and makes it the fallback.
    pub fn set_default(&mut self, name: impl Into<String>, texture: T) {
        let name = name.into();
        self.textures.insert(name.clone(), texture);
        self.default_name = Some(name);
    }

    pub fn insert(&mut self, name: impl Into<String>, texture: T) -> Option<T> {
        self.textures.insert(name.into(), texture)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.textures.get(name)
    }

    /// The texture of `name`, or the fallback when there is none.
    pub fn get_or_default(&self, name: &str) -> Option<&T> {
        self.textures
            .get(name)
            .or_else(|| self.textures.get(self.default_name.as_deref()?))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Fetches `<prefix><material>.<extension>` for every material not cached yet, all at once.
///
/// Each distinct material is requested once. `upload` turns the decoded image into the cached
/// texture. The first failing fetch fails the whole call and nothing is inserted.
/// Returns the number of textures added.
pub async fn load_textures<'m, S, T, F>(
    source: &S,
    cache: &mut TextureCache<T>,
    materials: impl IntoIterator<Item = &'m str>,
    prefix: &str,
    extension: &str,
    mut upload: F,
) -> LoadResult<usize>
where
    S: AssetSource + ?Sized,
    F: FnMut(&str, RgbaImage) -> T,
{
    let mut in_flight = HashSet::new();
    let names: Vec<&str> = materials
        .into_iter()
        .filter(|name| !cache.contains(name) && in_flight.insert(*name))
        .collect();
    let paths: Vec<String> = names
        .iter()
        .map(|name| format!("{}{}.{}", prefix, name, extension))
        .collect();

    let images = try_join_all(paths.iter().map(|path| source.fetch_image(path))).await?;

    for (name, image) in names.iter().zip(images) {
        let texture = upload(name, image);
        cache.insert(*name, texture);
    }

    log::info!("Loaded {} textures, {} cached", names.len(), cache.len());
    Ok(names.len())
}
