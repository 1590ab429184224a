// renderer/pipeline_builder.rs
//
// Translation of the backend-neutral pipeline states into wgpu descriptors.

use super::blending::{BlendEquation, BlendFactor};
use super::controller::{
    ColorBlendState, FrontFace, PipelineCreateInfo, PolygonMode, RasterizationState,
};
use super::{FaceCullingMode, Topology, VertexFormat};
use crate::error::{Error, Result};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Attachment formats used when a pipeline draws to the surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTargets {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// Owned wgpu description of one cached pipeline.
///
/// Vertex attributes are grouped per buffer slot so the borrowed
/// `VertexBufferLayout`s can be produced right before creation.
#[derive(Debug, Clone)]
pub struct PipelineDescription {
    pub label: String,
    pub primitive: wgpu::PrimitiveState,
    pub color_target: wgpu::ColorTargetState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub sample_count: u32,
    slots: Vec<(u64, Vec<wgpu::VertexAttribute>)>,
}

impl PipelineDescription {
    pub fn new(info: &PipelineCreateInfo<'_>, surface: &SurfaceTargets) -> Result<Self> {
        let primitive = primitive_state(info.input_assembly.topology, info.rasterization)?;
        let blend = match info.color_blend {
            Some(state) => to_wgpu_blend_state(state)?,
            None => None,
        };

        let mut slots: Vec<(u64, Vec<wgpu::VertexAttribute>)> = info
            .vertex_input
            .bindings
            .iter()
            .map(|binding| (u64::from(binding.stride), Vec::new()))
            .collect();
        for attribute in &info.vertex_input.attributes {
            let Some(format) = to_wgpu_vertex_format(attribute.format) else {
                log::warn!(
                    "Attribute at location {} has no wgpu vertex format, skipping",
                    attribute.location
                );
                continue;
            };
            if let Some((_, list)) = slots.get_mut(attribute.binding as usize) {
                list.push(wgpu::VertexAttribute {
                    format,
                    offset: u64::from(attribute.offset),
                    shader_location: attribute.location,
                });
            }
        }

        // Off-screen targets carry their own colour format and never a depth attachment.
        let (color_format, sample_count, depth_format) = match info.render_target {
            Some(target) => (target.color_format, target.sample_count, None),
            None => (surface.color_format, surface.sample_count, surface.depth_format),
        };

        Ok(Self {
            label: info.program.name.clone(),
            primitive,
            color_target: wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            sample_count,
            slots,
        })
    }

    pub fn is_blended(&self) -> bool {
        self.color_target.blend.is_some()
    }

    pub fn attribute_count(&self) -> usize {
        self.slots.iter().map(|(_, attributes)| attributes.len()).sum()
    }

    pub fn vertex_buffer_layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.slots
            .iter()
            .map(|(stride, attributes)| wgpu::VertexBufferLayout {
                array_stride: *stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect()
    }

    /// Compiles the description; `module` must expose `vs_main` and `fs_main`.
    pub fn create(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        module: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let buffers = self.vertex_buffer_layouts();
        let targets = [Some(self.color_target.clone())];
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label.as_str()),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: self.primitive,
            depth_stencil: self.depth_stencil.clone(),
            multisample: wgpu::MultisampleState {
                count: self.sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        })
    }
}

fn primitive_state(
    topology: Topology,
    rasterization: &RasterizationState,
) -> Result<wgpu::PrimitiveState> {
    Ok(wgpu::PrimitiveState {
        topology: to_wgpu_topology(topology)?,
        strip_index_format: None,
        front_face: match rasterization.front_face {
            FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
            FrontFace::Clockwise => wgpu::FrontFace::Cw,
        },
        cull_mode: to_wgpu_cull_mode(rasterization.cull_mode)?,
        polygon_mode: match rasterization.polygon_mode {
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
            PolygonMode::Line => wgpu::PolygonMode::Line,
            PolygonMode::Point => wgpu::PolygonMode::Point,
        },
        ..Default::default()
    })
}

pub(crate) fn to_wgpu_topology(topology: Topology) -> Result<wgpu::PrimitiveTopology> {
    match topology {
        Topology::Points => Ok(wgpu::PrimitiveTopology::PointList),
        Topology::Lines => Ok(wgpu::PrimitiveTopology::LineList),
        Topology::LineStrip => Ok(wgpu::PrimitiveTopology::LineStrip),
        Topology::Triangles => Ok(wgpu::PrimitiveTopology::TriangleList),
        Topology::TriangleStrip => Ok(wgpu::PrimitiveTopology::TriangleStrip),
        Topology::LineLoop | Topology::TriangleFan => Err(Error::UnsupportedTopology(topology)),
    }
}

pub(crate) fn to_wgpu_cull_mode(mode: FaceCullingMode) -> Result<Option<wgpu::Face>> {
    match mode {
        FaceCullingMode::None => Ok(None),
        FaceCullingMode::Front => Ok(Some(wgpu::Face::Front)),
        FaceCullingMode::Back => Ok(Some(wgpu::Face::Back)),
        FaceCullingMode::FrontAndBack => Err(Error::UnsupportedCullMode(mode)),
    }
}

/// wgpu has a single constant; alpha variants use it too.
pub(crate) fn to_wgpu_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
    }
}

pub(crate) fn to_wgpu_blend_operation(equation: BlendEquation) -> Result<wgpu::BlendOperation> {
    match equation {
        BlendEquation::Add => Ok(wgpu::BlendOperation::Add),
        BlendEquation::Subtract => Ok(wgpu::BlendOperation::Subtract),
        BlendEquation::ReverseSubtract => Ok(wgpu::BlendOperation::ReverseSubtract),
        BlendEquation::Min => Ok(wgpu::BlendOperation::Min),
        BlendEquation::Max => Ok(wgpu::BlendOperation::Max),
        advanced => Err(Error::UnsupportedBlendEquation(advanced)),
    }
}

/// Blend constants are pass state in wgpu and are not part of the result.
pub(crate) fn to_wgpu_blend_state(state: &ColorBlendState) -> Result<Option<wgpu::BlendState>> {
    if !state.blend_enable {
        return Ok(None);
    }
    Ok(Some(wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: to_wgpu_blend_factor(state.src_color_factor),
            dst_factor: to_wgpu_blend_factor(state.dst_color_factor),
            operation: to_wgpu_blend_operation(state.color_op)?,
        },
        alpha: wgpu::BlendComponent {
            src_factor: to_wgpu_blend_factor(state.src_alpha_factor),
            dst_factor: to_wgpu_blend_factor(state.dst_alpha_factor),
            operation: to_wgpu_blend_operation(state.alpha_op)?,
        },
    }))
}

pub(crate) fn to_wgpu_vertex_format(format: VertexFormat) -> Option<wgpu::VertexFormat> {
    match format {
        VertexFormat::Float => Some(wgpu::VertexFormat::Float32),
        VertexFormat::Vec2 => Some(wgpu::VertexFormat::Float32x2),
        VertexFormat::Vec3 => Some(wgpu::VertexFormat::Float32x3),
        VertexFormat::Vec4 => Some(wgpu::VertexFormat::Float32x4),
        VertexFormat::Int => Some(wgpu::VertexFormat::Sint32),
        VertexFormat::Undefined => None,
    }
}
