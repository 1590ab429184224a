pub mod blending;
pub mod controller;
pub mod draw;
pub mod geometry;
pub mod gpu;
pub mod pipeline_builder;
pub mod pipeline_cache;
pub mod program;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod texture;
pub mod uniforms;

pub use blending::{BlendEquation, BlendFactor, BlendMode, BlendingOptions};
pub use controller::{
    ColorBlendState, FrontFace, GraphicsController, HeadlessController, HeadlessPipeline,
    InputAssemblyState, PipelineCreateInfo, PolygonMode, RasterizationState, VertexInputAttribute,
    VertexInputBinding, VertexInputState,
};
pub use draw::{DrawCommand, FrameRenderer, RenderPass};
pub use geometry::{Geometry, Topology, VertexAttributeFormat, VertexBufferFormat, VertexFormat};
pub use gpu::WgpuController;
pub use pipeline_builder::{PipelineDescription, SurfaceTargets};
pub use pipeline_cache::{PipelineCache, PipelineCacheQuery, PipelineResult};
pub use program::{Program, ShaderHints};
pub use renderer::{
    FaceCullingMode, OpacityType, RenderCallback, RenderCallbackInput, Renderer, FULLY_OPAQUE,
    FULLY_TRANSPARENT,
};
pub use texture::{RenderTarget, TextureFormat, TextureInfo, TextureSet};
pub use uniforms::ItemUniforms;
