use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec4};

use super::blending::{BlendMode, BlendingOptions};
use super::program::ShaderHints;
use super::{Geometry, Program, TextureSet};
use crate::resource::{GraphicsResources, Handle};

/// World alpha at or below this is fully transparent.
pub const FULLY_TRANSPARENT: f32 = 0.01;
/// World alpha above this is fully opaque.
pub const FULLY_OPAQUE: f32 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaceCullingMode {
    #[default]
    None = 0,
    Front = 1,
    Back = 2,
    FrontAndBack = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpacityType {
    Opaque,
    Translucent,
    Transparent,
}

/// Input handed to a render callback in place of a regular draw.
#[derive(Debug, Clone, Copy)]
pub struct RenderCallbackInput {
    pub model_view: Mat4,
    pub projection: Mat4,
    pub size: glam::Vec3,
}

/// Application hook that draws a node itself. Returns true when it drew.
pub type RenderCallback = Arc<dyn Fn(&RenderCallbackInput) -> bool + Send + Sync>;

/// Scene-graph renderer: what a node draws with.
#[derive(Clone)]
pub struct Renderer {
    pub geometry: Handle<Geometry>,
    pub program: Handle<Program>,
    pub texture_set: Option<Handle<TextureSet>>,
    pub blend_mode: BlendMode,
    pub blending_options: BlendingOptions,
    pub premultiplied_alpha: bool,
    pub depth_index: i32,
    pub face_cull_mode: FaceCullingMode,
    /// Renderer opacity multiplied into the node's world alpha.
    pub opacity: f32,
    pub render_callback: Option<RenderCallback>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("geometry", &self.geometry)
            .field("program", &self.program)
            .field("texture_set", &self.texture_set)
            .field("blend_mode", &self.blend_mode)
            .field("depth_index", &self.depth_index)
            .field("face_cull_mode", &self.face_cull_mode)
            .field("has_render_callback", &self.render_callback.is_some())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    pub fn new(geometry: Handle<Geometry>, program: Handle<Program>) -> Self {
        Self {
            geometry,
            program,
            texture_set: None,
            blend_mode: BlendMode::Auto,
            blending_options: BlendingOptions::default(),
            premultiplied_alpha: false,
            depth_index: 0,
            face_cull_mode: FaceCullingMode::None,
            opacity: 1.0,
            render_callback: None,
        }
    }

    pub fn with_texture_set(mut self, texture_set: Handle<TextureSet>) -> Self {
        self.texture_set = Some(texture_set);
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_blending_options(mut self, options: BlendingOptions) -> Self {
        self.blending_options = options;
        self
    }

    pub fn with_depth_index(mut self, depth_index: i32) -> Self {
        self.depth_index = depth_index;
        self
    }

    pub fn with_face_cull_mode(mut self, mode: FaceCullingMode) -> Self {
        self.face_cull_mode = mode;
        self
    }

    pub fn with_render_callback(mut self, callback: RenderCallback) -> Self {
        self.render_callback = Some(callback);
        self
    }

    pub fn has_render_callback(&self) -> bool {
        self.render_callback.is_some()
    }

    pub fn shader_hints(&self, resources: &GraphicsResources) -> ShaderHints {
        resources
            .program(self.program)
            .map(|p| p.hints)
            .unwrap_or_default()
    }

    /// Classifies how this renderer draws on a node with `world_color`.
    pub fn opacity_type(&self, resources: &GraphicsResources, world_color: Vec4) -> OpacityType {
        let alpha = world_color.w * self.opacity;
        match self.blend_mode {
            BlendMode::Off => OpacityType::Opaque,
            BlendMode::On => OpacityType::Translucent,
            BlendMode::Auto => {
                if self.blending_options.is_advanced_equation_applied() {
                    return OpacityType::Translucent;
                }

                let shader_requires_blending = self
                    .shader_hints(resources)
                    .contains(ShaderHints::OUTPUT_IS_TRANSPARENT);
                let texture_has_alpha = self
                    .texture_set
                    .and_then(|t| resources.texture_set(t))
                    .is_some_and(|t| t.has_alpha());

                let mut opacity = if shader_requires_blending || texture_has_alpha {
                    OpacityType::Translucent
                } else {
                    OpacityType::Opaque
                };
                if alpha <= FULLY_TRANSPARENT {
                    opacity = OpacityType::Transparent;
                } else if alpha <= FULLY_OPAQUE {
                    opacity = OpacityType::Translucent;
                }
                opacity
            }
            BlendMode::UseActorOpacity => {
                if alpha <= FULLY_TRANSPARENT {
                    OpacityType::Transparent
                } else if alpha <= FULLY_OPAQUE {
                    OpacityType::Translucent
                } else {
                    OpacityType::Opaque
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{TextureFormat, TextureInfo, Topology};

    fn fixture() -> (GraphicsResources, Renderer) {
        let mut resources = GraphicsResources::new();
        let geometry = resources.add_geometry(Geometry::new(Topology::Triangles));
        let program = resources.add_program(Program::new("flat"));
        (resources, Renderer::new(geometry, program))
    }

    #[test]
    fn auto_mode_follows_world_alpha() {
        let (resources, renderer) = fixture();
        assert_eq!(
            renderer.opacity_type(&resources, Vec4::ONE),
            OpacityType::Opaque
        );
        assert_eq!(
            renderer.opacity_type(&resources, Vec4::new(1.0, 1.0, 1.0, 0.5)),
            OpacityType::Translucent
        );
        assert_eq!(
            renderer.opacity_type(&resources, Vec4::new(1.0, 1.0, 1.0, 0.0)),
            OpacityType::Transparent
        );
    }

    #[test]
    fn texture_alpha_makes_auto_translucent() {
        let (mut resources, renderer) = fixture();
        let textures = resources.add_texture_set(TextureSet::new(vec![TextureInfo {
            width: 4,
            height: 4,
            format: TextureFormat::Rgba8,
        }]));
        let renderer = renderer.with_texture_set(textures);
        assert_eq!(
            renderer.opacity_type(&resources, Vec4::ONE),
            OpacityType::Translucent
        );
    }

    #[test]
    fn explicit_modes_ignore_alpha() {
        let (resources, renderer) = fixture();
        let invisible = Vec4::new(1.0, 1.0, 1.0, 0.0);
        let off = renderer.clone().with_blend_mode(BlendMode::Off);
        let on = renderer.with_blend_mode(BlendMode::On);
        assert_eq!(off.opacity_type(&resources, invisible), OpacityType::Opaque);
        assert_eq!(on.opacity_type(&resources, invisible), OpacityType::Translucent);
    }
}
