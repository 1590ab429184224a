// renderer/controller.rs
//
// Backend-neutral pipeline description and the controller seam the pipeline
// cache compiles through.

use glam::Vec4;

use super::blending::{BlendEquation, BlendFactor};
use super::{FaceCullingMode, Geometry, Program, RenderTarget, Topology, VertexFormat};
use crate::error::{Error, Result};

/// One vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInputBinding {
    pub stride: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub offset: u32,
    pub format: VertexFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexInputState {
    pub bindings: Vec<VertexInputBinding>,
    pub attributes: Vec<VertexInputAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    Point,
    Line,
    #[default]
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterizationState {
    pub cull_mode: FaceCullingMode,
    pub polygon_mode: PolygonMode,
    pub front_face: FrontFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputAssemblyState {
    pub topology: Topology,
}

/// Baked colour blend state of a single colour attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_op: BlendEquation,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_op: BlendEquation,
    pub blend_constants: Option<Vec4>,
}

impl ColorBlendState {
    /// Blending off; the factors are irrelevant.
    pub const DISABLED: ColorBlendState = ColorBlendState {
        blend_enable: false,
        src_color_factor: BlendFactor::One,
        dst_color_factor: BlendFactor::Zero,
        color_op: BlendEquation::Add,
        src_alpha_factor: BlendFactor::One,
        dst_alpha_factor: BlendFactor::Zero,
        alpha_op: BlendEquation::Add,
        blend_constants: None,
    };
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Everything a controller needs to compile one pipeline.
///
/// `color_blend` is `None` when the pipeline is compiled with dynamic blend
/// state, in which case blending is set at draw time.
#[derive(Debug, Clone, Copy)]
pub struct PipelineCreateInfo<'a> {
    pub program: &'a Program,
    pub vertex_input: &'a VertexInputState,
    pub input_assembly: &'a InputAssemblyState,
    pub rasterization: &'a RasterizationState,
    pub color_blend: Option<&'a ColorBlendState>,
    pub render_target: Option<&'a RenderTarget>,
}

/// Graphics backend used by the pipeline cache.
pub trait GraphicsController {
    type Pipeline;

    fn create_pipeline(&mut self, info: &PipelineCreateInfo<'_>) -> Result<Self::Pipeline>;

    /// Whether blend state can be left out of the pipeline and set per draw.
    fn supports_dynamic_blend_state(&self) -> bool {
        false
    }

    /// Program reflection: the location `program` binds attribute `name` to.
    fn vertex_attribute_location(&self, program: &Program, name: &str) -> Option<u32> {
        program.attribute_location(name)
    }
}

/// Builds the vertex input state for a (program, geometry) pair.
///
/// Attributes the program does not consume are skipped with a warning.
pub fn reflect_vertex_input<C: GraphicsController + ?Sized>(
    controller: &C,
    program: &Program,
    geometry: &Geometry,
) -> VertexInputState {
    let mut state = VertexInputState::default();
    for (binding, buffer) in geometry.vertex_buffers.iter().enumerate() {
        let binding = binding as u32;
        state.bindings.push(VertexInputBinding {
            stride: buffer.stride,
        });
        for attribute in &buffer.attributes {
            match controller.vertex_attribute_location(program, &attribute.name) {
                Some(location) => state.attributes.push(VertexInputAttribute {
                    location,
                    binding,
                    offset: attribute.offset,
                    format: attribute.format,
                }),
                None => log::warn!(
                    "Attribute '{}' not found in program '{}'",
                    attribute.name,
                    program.name
                ),
            }
        }
    }
    state
}

/// Pipeline produced by [`HeadlessController`]: a copy of the state it was
/// compiled from.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessPipeline {
    pub id: u32,
    pub program: String,
    pub vertex_input: VertexInputState,
    pub topology: Topology,
    pub rasterization: RasterizationState,
    pub color_blend: Option<ColorBlendState>,
}

/// Device-free controller. Records every pipeline it creates.
#[derive(Debug, Default)]
pub struct HeadlessController {
    dynamic_blend: bool,
    fail_creation: bool,
    created: u32,
}

impl HeadlessController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dynamic_blend(dynamic_blend: bool) -> Self {
        Self {
            dynamic_blend,
            ..Self::default()
        }
    }

    /// Make every following `create_pipeline` call fail.
    pub fn set_fail_creation(&mut self, fail: bool) {
        self.fail_creation = fail;
    }

    pub fn pipelines_created(&self) -> u32 {
        self.created
    }
}

impl GraphicsController for HeadlessController {
    type Pipeline = HeadlessPipeline;

    fn create_pipeline(&mut self, info: &PipelineCreateInfo<'_>) -> Result<HeadlessPipeline> {
        if self.fail_creation {
            return Err(Error::PipelineCreation(format!(
                "headless creation disabled for '{}'",
                info.program.name
            )));
        }
        self.created += 1;
        log::trace!("Headless pipeline #{} for '{}'", self.created, info.program.name);
        Ok(HeadlessPipeline {
            id: self.created,
            program: info.program.name.clone(),
            vertex_input: info.vertex_input.clone(),
            topology: info.input_assembly.topology,
            rasterization: *info.rasterization,
            color_blend: info.color_blend.copied(),
        })
    }

    fn supports_dynamic_blend_state(&self) -> bool {
        self.dynamic_blend
    }
}
