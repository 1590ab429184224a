// renderer/gpu.rs
use std::collections::HashMap;

use super::controller::{GraphicsController, PipelineCreateInfo};
use super::pipeline_builder::{PipelineDescription, SurfaceTargets};
use crate::error::{Error, Result};

/// Pipeline controller backed by a wgpu device.
///
/// Programs are matched to shader modules by name; each module must expose
/// `vs_main` and `fs_main`. All pipelines share one layout.
pub struct WgpuController {
    device: wgpu::Device,
    layout: wgpu::PipelineLayout,
    modules: HashMap<String, wgpu::ShaderModule>,
    surface: SurfaceTargets,
}

impl WgpuController {
    pub fn new(
        device: wgpu::Device,
        layout: wgpu::PipelineLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            layout,
            modules: HashMap::new(),
            surface: SurfaceTargets {
                color_format: surface_format,
                depth_format: None,
                sample_count: 1,
            },
        }
    }

    pub fn with_depth_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.surface.depth_format = Some(format);
        self
    }

    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.surface.sample_count = sample_count;
        self
    }

    pub fn register_program(&mut self, name: impl Into<String>, module: wgpu::ShaderModule) {
        self.modules.insert(name.into(), module);
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

impl GraphicsController for WgpuController {
    type Pipeline = wgpu::RenderPipeline;

    fn create_pipeline(&mut self, info: &PipelineCreateInfo<'_>) -> Result<wgpu::RenderPipeline> {
        let name = &info.program.name;
        let module = self
            .modules
            .get(name)
            .ok_or_else(|| Error::MissingProgramModule(name.clone()))?;
        let description = PipelineDescription::new(info, &self.surface)?;
        log::debug!(
            "Creating wgpu pipeline '{}' ({:?}, {} attributes)",
            name,
            description.primitive.topology,
            description.attribute_count()
        );
        Ok(description.create(&self.device, &self.layout, module))
    }
}
