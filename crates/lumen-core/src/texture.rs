//! Texture descriptors and dimension resolution.
//!
//! A [`TextureDesc`] names a texture source and its load options. Two
//! descriptors are equal only if they are the same descriptor: re-assigning
//! a descriptor that merely looks the same is a fresh load.

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Pixel dimensions of a loaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where texture pixels come from.
#[derive(Debug, Clone)]
pub enum TextureKind {
    /// Decoded image addressed by URL or path
    Image { src: String },
    /// Solid 1x1 color
    Color { color: u32 },
    /// Generated noise
    Noise { width: u32, height: u32 },
    /// Region of another texture
    SubTexture {
        parent: TextureDesc,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

impl TextureKind {
    /// Type tag, as named on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Image { .. } => "ImageTexture",
            Self::Color { .. } => "ColorTexture",
            Self::Noise { .. } => "NoiseTexture",
            Self::SubTexture { .. } => "SubTexture",
        }
    }
}

/// Per-use texture options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextureOptions {
    pub flip_x: bool,
    pub flip_y: bool,
}

#[derive(Debug)]
struct TextureSpec {
    kind: TextureKind,
    options: TextureOptions,
}

/// Immutable, cheaply cloned texture descriptor compared by identity.
#[derive(Clone)]
pub struct TextureDesc(Arc<TextureSpec>);

impl TextureDesc {
    pub fn new(kind: TextureKind, options: TextureOptions) -> Self {
        Self(Arc::new(TextureSpec { kind, options }))
    }

    /// Descriptor for an image addressed by `src`.
    pub fn image(src: impl Into<String>) -> Self {
        Self::new(
            TextureKind::Image { src: src.into() },
            TextureOptions::default(),
        )
    }

    /// Descriptor for a region of `parent`.
    pub fn sub_texture(
        parent: &TextureDesc,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Self {
        Self::new(
            TextureKind::SubTexture {
                parent: parent.clone(),
                x,
                y,
                width,
                height,
            },
            options,
        )
    }

    pub fn kind(&self) -> &TextureKind {
        &self.0.kind
    }

    pub fn options(&self) -> TextureOptions {
        self.0.options
    }

    /// Whether both handles name the same descriptor.
    pub fn same(&self, other: &TextureDesc) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for TextureDesc {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for TextureDesc {}

impl fmt::Debug for TextureDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureDesc")
            .field("type", &self.0.kind.type_name())
            .field("kind", &self.0.kind)
            .field("options", &self.0.options)
            .finish()
    }
}

/// Resolves image sources to their pixel dimensions.
pub trait ImageResolver {
    fn resolve(&self, src: &str) -> Result<Dimensions, ResourceError>;
}

/// Reads image headers from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageResolver;

impl ImageResolver for FsImageResolver {
    fn resolve(&self, src: &str) -> Result<Dimensions, ResourceError> {
        let path = src.strip_prefix("file://").unwrap_or(src);
        image::image_dimensions(Path::new(path))
            .map(|(width, height)| Dimensions::new(width, height))
            .map_err(|e| ResourceError::Image {
                src: src.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Work out the dimensions a descriptor will load at.
pub fn resolve_dimensions(
    texture: &TextureDesc,
    images: &dyn ImageResolver,
) -> Result<Dimensions, ResourceError> {
    match texture.kind() {
        TextureKind::Image { src } => {
            if src.is_empty() {
                return Err(ResourceError::EmptySource);
            }
            images.resolve(src)
        }
        TextureKind::Color { .. } => Ok(Dimensions::new(1, 1)),
        TextureKind::Noise { width, height } => {
            if *width == 0 || *height == 0 {
                return Err(ResourceError::ZeroSize);
            }
            Ok(Dimensions::new(*width, *height))
        }
        TextureKind::SubTexture {
            parent,
            x,
            y,
            width,
            height,
        } => {
            let outer = resolve_dimensions(parent, images)?;
            let fits = x.checked_add(*width).is_some_and(|r| r <= outer.width)
                && y.checked_add(*height).is_some_and(|b| b <= outer.height);
            if !fits {
                return Err(ResourceError::RegionOutOfBounds {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                    parent_width: outer.width,
                    parent_height: outer.height,
                });
            }
            Ok(Dimensions::new(*width, *height))
        }
    }
}
