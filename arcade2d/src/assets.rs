use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;

use crate::math::Vec2;
use crate::render::{Renderer, TextureHandle};

/// Placeholder size used when an image fails to load and no frame size is known.
const PLACEHOLDER_SIZE: (u32, u32) = (32, 32);

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("no texture registered under key '{0}'")]
    UnknownKey(String),
    #[error("asset key '{0}' is declared twice")]
    DuplicateKey(String),
    #[error("spritesheet '{key}' has an empty frame size {width}x{height}")]
    BadFrameSize { key: String, width: u32, height: u32 },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// How a declared file is sliced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    SpriteSheet { frame_width: u32, frame_height: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    pub key: String,
    pub path: PathBuf,
    pub kind: AssetKind,
}

/// Assets a scene wants loaded before `create` runs.
#[derive(Clone, Debug, Default)]
pub struct AssetManifest {
    root: PathBuf,
    requests: Vec<AssetRequest>,
}

impl AssetManifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            requests: Vec::new(),
        }
    }

    /// Directory relative paths are resolved against.
    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image(&mut self, key: impl Into<String>, path: impl AsRef<Path>) -> &mut Self {
        self.push(key.into(), path.as_ref(), AssetKind::Image)
    }

    pub fn spritesheet(
        &mut self,
        key: impl Into<String>,
        path: impl AsRef<Path>,
        frame_width: u32,
        frame_height: u32,
    ) -> &mut Self {
        self.push(
            key.into(),
            path.as_ref(),
            AssetKind::SpriteSheet {
                frame_width,
                frame_height,
            },
        )
    }

    pub fn requests(&self) -> &[AssetRequest] {
        &self.requests
    }

    pub fn get(&self, key: &str) -> Option<&AssetRequest> {
        self.requests.iter().find(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Check declarations without touching the filesystem.
    pub fn validate(&self) -> Result<(), AssetError> {
        for (i, request) in self.requests.iter().enumerate() {
            if self.requests[..i].iter().any(|r| r.key == request.key) {
                return Err(AssetError::DuplicateKey(request.key.clone()));
            }
            if let AssetKind::SpriteSheet {
                frame_width,
                frame_height,
            } = request.kind
            {
                if frame_width == 0 || frame_height == 0 {
                    return Err(AssetError::BadFrameSize {
                        key: request.key.clone(),
                        width: frame_width,
                        height: frame_height,
                    });
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, key: String, path: &Path, kind: AssetKind) -> &mut Self {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        self.requests.push(AssetRequest { key, path, kind });
        self
    }
}

/// Size and frame grid of a loaded texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureInfo {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    /// Cell size for spritesheets; `None` for plain images.
    pub frame: Option<(u32, u32)>,
}

impl TextureInfo {
    pub fn image(handle: TextureHandle, width: u32, height: u32) -> Self {
        Self {
            handle,
            width,
            height,
            frame: None,
        }
    }

    pub fn spritesheet(
        handle: TextureHandle,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            handle,
            width,
            height,
            frame: Some((frame_width, frame_height)),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Size of one drawable cell: the frame for spritesheets, the whole image otherwise.
    pub fn frame_size(&self) -> Vec2 {
        match self.frame {
            Some((w, h)) => Vec2::new(w as f32, h as f32),
            None => self.size(),
        }
    }

    fn columns(&self) -> u32 {
        match self.frame {
            Some((w, _)) if w > 0 => (self.width / w).max(1),
            _ => 1,
        }
    }

    fn rows(&self) -> u32 {
        match self.frame {
            Some((_, h)) if h > 0 => (self.height / h).max(1),
            _ => 1,
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.columns() * self.rows()
    }

    /// Normalized UV rect `[x, y, w, h]` of `frame`, reading the grid row by row.
    /// Out-of-range frames wrap around; plain images always return the full texture.
    pub fn frame_uv(&self, frame: u32) -> [f32; 4] {
        let Some((fw, fh)) = self.frame else {
            return [0.0, 0.0, 1.0, 1.0];
        };
        if self.width == 0 || self.height == 0 {
            return [0.0, 0.0, 1.0, 1.0];
        }
        let frame = frame % self.frame_count();
        let col = frame % self.columns();
        let row = frame / self.columns();
        let (w, h) = (self.width as f32, self.height as f32);
        [
            (col * fw) as f32 / w,
            (row * fh) as f32 / h,
            fw as f32 / w,
            fh as f32 / h,
        ]
    }
}

/// Key -> loaded texture lookup shared with scenes.
#[derive(Clone, Debug, Default)]
pub struct TextureCatalog {
    textures: HashMap<String, TextureInfo>,
}

impl TextureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, info: TextureInfo) {
        self.textures.insert(key.into(), info);
    }

    pub fn get(&self, key: &str) -> Result<&TextureInfo, AssetError> {
        self.textures
            .get(key)
            .ok_or_else(|| AssetError::UnknownKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Something that can turn decoded pixels into a drawable texture.
pub trait TextureUploader {
    fn upload_rgba(&mut self, data: &[u8], width: u32, height: u32) -> Result<TextureHandle>;
}

impl TextureUploader for Renderer<'_> {
    fn upload_rgba(&mut self, data: &[u8], width: u32, height: u32) -> Result<TextureHandle> {
        self.load_texture_from_rgba(data, width, height)
    }
}

/// Loads manifests and caches textures by file path.
pub struct AssetManager {
    textures: HashMap<PathBuf, (TextureHandle, u32, u32)>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }

    /// Load every request in `manifest`. Files that can't be read or decoded are
    /// replaced by the missing-texture placeholder and logged; only malformed
    /// declarations are errors.
    pub fn load_manifest(
        &mut self,
        uploader: &mut impl TextureUploader,
        manifest: &AssetManifest,
    ) -> Result<TextureCatalog> {
        manifest.validate()?;

        let mut catalog = TextureCatalog::new();
        for request in manifest.requests() {
            let info = match self.load_texture(uploader, &request.path) {
                Ok((handle, width, height)) => match request.kind {
                    AssetKind::Image => TextureInfo::image(handle, width, height),
                    AssetKind::SpriteSheet {
                        frame_width,
                        frame_height,
                    } => TextureInfo::spritesheet(handle, width, height, frame_width, frame_height),
                },
                Err(err) => {
                    log::warn!(
                        "asset '{}': {:#}; using placeholder texture",
                        request.key,
                        anyhow::Error::from(err)
                    );
                    placeholder_info(request.kind)
                }
            };
            log::debug!("asset '{}' -> {:?}", request.key, info);
            catalog.insert(request.key.clone(), info);
        }
        Ok(catalog)
    }

    /// Load a texture from a file path, caching it if already loaded.
    pub fn load_texture(
        &mut self,
        uploader: &mut impl TextureUploader,
        path: &Path,
    ) -> Result<(TextureHandle, u32, u32), AssetError> {
        if let Some(cached) = self.textures.get(path) {
            return Ok(*cached);
        }

        let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| AssetError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();

        let handle = match uploader.upload_rgba(&image, width, height) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!("uploading {} failed: {err:#}", path.display());
                TextureHandle::MISSING
            }
        };
        self.textures
            .insert(path.to_path_buf(), (handle, width, height));
        Ok((handle, width, height))
    }

    pub fn has_texture(&self, path: &Path) -> bool {
        self.textures.contains_key(path)
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder entry whose geometry still matches what the scene declared.
fn placeholder_info(kind: AssetKind) -> TextureInfo {
    match kind {
        AssetKind::Image => {
            TextureInfo::image(TextureHandle::MISSING, PLACEHOLDER_SIZE.0, PLACEHOLDER_SIZE.1)
        }
        AssetKind::SpriteSheet {
            frame_width,
            frame_height,
        } => TextureInfo::spritesheet(
            TextureHandle::MISSING,
            frame_width,
            frame_height,
            frame_width,
            frame_height,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out sequential handles without a GPU.
    #[derive(Default)]
    struct CountingUploader {
        uploads: Vec<(u32, u32)>,
    }

    impl TextureUploader for CountingUploader {
        fn upload_rgba(&mut self, data: &[u8], width: u32, height: u32) -> Result<TextureHandle> {
            assert_eq!(data.len(), (width * height * 4) as usize);
            self.uploads.push((width, height));
            Ok(TextureHandle(self.uploads.len() as u32))
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("arcade2d-assets-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn spritesheet_frames_read_row_by_row() {
        let sheet = TextureInfo::spritesheet(TextureHandle(1), 256, 48, 32, 48);
        assert_eq!(sheet.frame_count(), 8);
        assert_eq!(sheet.frame_size(), Vec2::new(32.0, 48.0));
        assert_eq!(sheet.frame_uv(0), [0.0, 0.0, 0.125, 1.0]);
        assert_eq!(sheet.frame_uv(4), [0.5, 0.0, 0.125, 1.0]);
        assert_eq!(sheet.frame_uv(9), sheet.frame_uv(1));

        let image = TextureInfo::image(TextureHandle(2), 400, 32);
        assert_eq!(image.frame_uv(3), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(image.frame_size(), Vec2::new(400.0, 32.0));
    }

    #[test]
    fn validate_rejects_bad_declarations() {
        let mut manifest = AssetManifest::new("assets");
        manifest.image("coin", "coin.png").image("coin", "coin2.png");
        assert!(matches!(manifest.validate(), Err(AssetError::DuplicateKey(k)) if k == "coin"));

        let mut manifest = AssetManifest::new("assets");
        manifest.spritesheet("player", "player.png", 0, 48);
        assert!(matches!(manifest.validate(), Err(AssetError::BadFrameSize { .. })));
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let mut manifest = AssetManifest::new("/game/assets");
        manifest.image("sky", "sky.png");
        assert_eq!(manifest.get("sky").unwrap().path, PathBuf::from("/game/assets/sky.png"));
    }

    #[test]
    fn missing_files_fall_back_to_placeholder() {
        let dir = scratch_dir("missing");
        let mut manifest = AssetManifest::new(&dir);
        manifest
            .image("background", "nope.png")
            .spritesheet("player", "nope_either.png", 32, 48);

        let mut uploader = CountingUploader::default();
        let catalog = AssetManager::new()
            .load_manifest(&mut uploader, &manifest)
            .unwrap();

        let bg = catalog.get("background").unwrap();
        assert_eq!(bg.handle, TextureHandle::MISSING);
        let player = catalog.get("player").unwrap();
        assert_eq!(player.frame_size(), Vec2::new(32.0, 48.0));
        assert!(uploader.uploads.is_empty());
        assert!(matches!(catalog.get("coin"), Err(AssetError::UnknownKey(_))));
    }

    #[test]
    fn loads_and_caches_real_images() {
        let dir = scratch_dir("real");
        let path = dir.join("tile.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let mut manifest = AssetManifest::new(&dir);
        manifest.image("a", "tile.png").image("b", "tile.png");

        let mut uploader = CountingUploader::default();
        let mut manager = AssetManager::new();
        let catalog = manager.load_manifest(&mut uploader, &manifest).unwrap();

        assert_eq!(uploader.uploads, vec![(4, 2)]);
        assert_eq!(catalog.get("a").unwrap(), catalog.get("b").unwrap());
        assert_eq!(catalog.get("a").unwrap().size(), Vec2::new(4.0, 2.0));
        assert!(manager.has_texture(&path));
    }
}
