// renderer/texture.rs

/// Format of a single texture as far as draw ordering cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgb8,
    Rgba8,
    Rgba16Float,
}

impl TextureFormat {
    pub const fn has_alpha(self) -> bool {
        matches!(self, TextureFormat::Rgba8 | TextureFormat::Rgba16Float)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Textures bound together by a renderer.
#[derive(Debug, Clone, Default)]
pub struct TextureSet {
    pub textures: Vec<TextureInfo>,
}

impl TextureSet {
    pub fn new(textures: Vec<TextureInfo>) -> Self {
        Self { textures }
    }

    pub fn has_alpha(&self) -> bool {
        self.textures.iter().any(|t| t.format.has_alpha())
    }
}

/// Off-screen target a render task draws into: its colour attachment
/// format and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub color_format: wgpu::TextureFormat,
    pub sample_count: u32,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32, color_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            color_format,
            sample_count: 1,
        }
    }
}
