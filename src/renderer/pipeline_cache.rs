// renderer/pipeline_cache.rs
//
// Three-level pipeline cache:
//   L0  (program, geometry, render target)  -> vertex input state
//   L1  (topology, cull mode, polygon mode) -> rasterization + input assembly
//   L2  (blend bitmask, blend colour)       -> compiled pipeline + ref count

use std::rc::Rc;

use super::blending::BlendingOptions;
use super::controller::{
    reflect_vertex_input, ColorBlendState, FrontFace, GraphicsController, InputAssemblyState,
    PipelineCreateInfo, PolygonMode, RasterizationState, VertexInputState,
};
use super::{FaceCullingMode, Geometry, Program, RenderTarget, Renderer, Topology};
use crate::error::{Error, Result};
use crate::resource::{
    GraphicsResources, Handle, LifecycleEvent, LifecycleObserver, ResourceCache,
};

/// Frames between two full eviction passes.
pub const DEFAULT_CLEAN_INTERVAL: u32 = 5;

/// Polygon mode derived from topology, indexed by `Topology as usize`.
const POLYGON_MODES: [PolygonMode; 7] = [
    PolygonMode::Point,
    PolygonMode::Line,
    PolygonMode::Line,
    PolygonMode::Line,
    PolygonMode::Fill,
    PolygonMode::Fill,
    PolygonMode::Fill,
];

/// Cull mode as drawn, indexed by `[using_reflection][FaceCullingMode as usize]`.
/// A reflected view flips winding, so front and back swap.
const CULL_MODES: [[FaceCullingMode; 4]; 2] = [
    [
        FaceCullingMode::None,
        FaceCullingMode::Front,
        FaceCullingMode::Back,
        FaceCullingMode::FrontAndBack,
    ],
    [
        FaceCullingMode::None,
        FaceCullingMode::Back,
        FaceCullingMode::Front,
        FaceCullingMode::FrontAndBack,
    ],
];

/// Everything that selects a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineCacheQuery {
    pub program: Handle<Program>,
    pub geometry: Handle<Geometry>,
    pub render_target: Option<Handle<RenderTarget>>,
    pub topology: Topology,
    pub face_cull_mode: FaceCullingMode,
    pub camera_using_reflection: bool,
    pub blending_enabled: bool,
    pub alpha_premultiplied: bool,
    pub blending_options: BlendingOptions,
}

impl PipelineCacheQuery {
    /// Query for drawing `renderer`. Returns `None` if its geometry is gone.
    pub fn for_renderer(
        renderer: &Renderer,
        resources: &GraphicsResources,
        render_target: Option<Handle<RenderTarget>>,
        blending_enabled: bool,
        camera_using_reflection: bool,
    ) -> Option<Self> {
        let geometry = resources.geometry(renderer.geometry)?;
        Some(Self {
            program: renderer.program,
            geometry: renderer.geometry,
            render_target,
            topology: geometry.topology,
            face_cull_mode: renderer.face_cull_mode,
            camera_using_reflection,
            blending_enabled,
            alpha_premultiplied: renderer.premultiplied_alpha,
            blending_options: renderer.blending_options,
        })
    }

    /// Equality used by the latest-query fast path. Blend options only count
    /// when they are baked into the pipeline.
    fn same_pipeline_as(&self, other: &Self, dynamic_blend: bool) -> bool {
        let core = self.program == other.program
            && self.geometry == other.geometry
            && self.render_target == other.render_target
            && self.topology == other.topology
            && self.face_cull_mode == other.face_cull_mode
            && self.camera_using_reflection == other.camera_using_reflection
            && self.blending_enabled == other.blending_enabled
            && self.alpha_premultiplied == other.alpha_premultiplied;
        if !core {
            return false;
        }
        if self.blending_enabled && !dynamic_blend {
            return self.blending_options.bitmask() == other.blending_options.bitmask()
                && self.blending_options.blend_color() == other.blending_options.blend_color();
        }
        true
    }

    fn level1_hash(&self) -> (u32, FaceCullingMode, PolygonMode) {
        let topology = self.topology as u32 & 0xff;
        let cull = CULL_MODES[usize::from(self.camera_using_reflection)][self.face_cull_mode as usize];
        let polygon = POLYGON_MODES[self.topology as usize];
        let hash = topology | ((cull as u32 & 0xff) << 8) | ((polygon as u32 & 0xff) << 16);
        (hash, cull, polygon)
    }
}

/// Which L2 node of an L1 node a result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level2Key {
    NoBlend,
    Keyed(u32),
}

pub struct Level2Node<P> {
    id: u32,
    hash: u32,
    color_blend: ColorBlendState,
    pipeline: Option<Rc<P>>,
    ref_count: u32,
}

impl<P> Level2Node<P> {
    fn new(id: u32, hash: u32, color_blend: ColorBlendState) -> Self {
        Self {
            id,
            hash,
            color_blend,
            pipeline: None,
            ref_count: 0,
        }
    }
}

pub struct Level1Node<P> {
    id: u32,
    hash: u32,
    rasterization: RasterizationState,
    input_assembly: InputAssemblyState,
    no_blend: Level2Node<P>,
    /// Kept sorted by blend bitmask.
    level2: Vec<Level2Node<P>>,
    /// Pipeline compiled without colour blend state, shared by every L2 node
    /// when the device blends dynamically.
    dynamic_blend_pipeline: Option<Rc<P>>,
}

impl<P> Level1Node<P> {
    fn level2(&self, key: Level2Key) -> Option<&Level2Node<P>> {
        match key {
            Level2Key::NoBlend => Some(&self.no_blend),
            Level2Key::Keyed(id) => self.level2.iter().find(|l2| l2.id == id),
        }
    }

    fn level2_mut(&mut self, key: Level2Key) -> Option<&mut Level2Node<P>> {
        match key {
            Level2Key::NoBlend => Some(&mut self.no_blend),
            Level2Key::Keyed(id) => self.level2.iter_mut().find(|l2| l2.id == id),
        }
    }

    fn find_or_create_level2(&mut self, query: &PipelineCacheQuery, next_id: &mut u32) -> Level2Key {
        if !query.blending_enabled {
            return Level2Key::NoBlend;
        }

        let options = &query.blending_options;
        let bitmask = options.bitmask();
        let blend_color = options.blend_color();
        let found = self
            .level2
            .iter()
            .skip_while(|l2| l2.hash < bitmask)
            .take_while(|l2| l2.hash == bitmask)
            .find(|l2| l2.color_blend.blend_constants == blend_color);
        if let Some(l2) = found {
            return Level2Key::Keyed(l2.id);
        }

        let id = allocate_id(next_id);
        let color_blend = color_blend_state(options, query.alpha_premultiplied);
        let position = self.level2.partition_point(|l2| l2.hash <= bitmask);
        self.level2
            .insert(position, Level2Node::new(id, bitmask, color_blend));
        log::trace!("Created L2 node {} (bitmask {:#x}) under L1 {}", id, bitmask, self.id);
        Level2Key::Keyed(id)
    }

    fn is_unused(&self) -> bool {
        self.level2.is_empty() && self.no_blend.ref_count == 0
    }
}

pub struct Level0Node<P> {
    program: Handle<Program>,
    geometry: Handle<Geometry>,
    render_target: Option<Handle<RenderTarget>>,
    vertex_input: VertexInputState,
    level1: Vec<Level1Node<P>>,
}

impl<P> Level0Node<P> {
    fn find_or_create_level1(&mut self, query: &PipelineCacheQuery, next_id: &mut u32) -> usize {
        let (hash, cull_mode, polygon_mode) = query.level1_hash();
        if let Some(index) = self.level1.iter().position(|l1| l1.hash == hash) {
            return index;
        }

        let id = allocate_id(next_id);
        self.level1.push(Level1Node {
            id,
            hash,
            rasterization: RasterizationState {
                cull_mode,
                polygon_mode,
                front_face: FrontFace::CounterClockwise,
            },
            input_assembly: InputAssemblyState {
                topology: query.topology,
            },
            no_blend: Level2Node::new(allocate_id(next_id), 0, ColorBlendState::DISABLED),
            level2: Vec::new(),
            dynamic_blend_pipeline: None,
        });
        log::trace!("Created L1 node {} (hash {:#x})", id, hash);
        self.level1.len() - 1
    }
}

/// Outcome of a pipeline lookup. Hand it back to
/// [`PipelineCache::reset_pipeline`] once the pipeline is no longer used.
pub struct PipelineResult<P> {
    pub pipeline: Option<Rc<P>>,
    pub level0: Handle<Level0Node<P>>,
    pub level1: u32,
    pub level2: Level2Key,
}

impl<P> Clone for PipelineResult<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            level0: self.level0,
            level1: self.level1,
            level2: self.level2,
        }
    }
}

impl<P> std::fmt::Debug for PipelineResult<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineResult")
            .field("has_pipeline", &self.pipeline.is_some())
            .field("level0", &self.level0)
            .field("level1", &self.level1)
            .field("level2", &self.level2)
            .finish()
    }
}

struct LatestQuery<P> {
    query: PipelineCacheQuery,
    result: PipelineResult<P>,
}

pub struct PipelineCache<P> {
    level0: ResourceCache<Level0Node<P>>,
    /// Indexed by `blending_enabled`.
    latest: [Option<LatestQuery<P>>; 2],
    next_id: u32,
    frame_counter: u32,
    clean_interval: u32,
}

impl<P> Default for PipelineCache<P> {
    fn default() -> Self {
        Self::new(DEFAULT_CLEAN_INTERVAL)
    }
}

impl<P> PipelineCache<P> {
    pub fn new(clean_interval: u32) -> Self {
        assert!(clean_interval > 0, "pipeline cache clean interval must be positive");
        Self {
            level0: ResourceCache::new(),
            latest: [None, None],
            next_id: 0,
            frame_counter: 0,
            clean_interval,
        }
    }

    /// Finds or builds the pipeline for `query`.
    ///
    /// With `create_new` false a missing pipeline is reported as `None`
    /// without compiling anything. Every call that returns takes one
    /// reference on the L2 node.
    pub fn get_pipeline<C>(
        &mut self,
        query: &PipelineCacheQuery,
        resources: &GraphicsResources,
        controller: &mut C,
        create_new: bool,
    ) -> Result<PipelineResult<P>>
    where
        C: GraphicsController<Pipeline = P>,
    {
        let slot = usize::from(query.blending_enabled);
        let dynamic_blend = controller.supports_dynamic_blend_state();

        if let Some(result) = self.fast_path(slot, query, dynamic_blend) {
            return Ok(result);
        }

        let program = resources
            .program(query.program)
            .ok_or_else(|| Error::stale("program"))?;
        let geometry = resources
            .geometry(query.geometry)
            .ok_or_else(|| Error::stale("geometry"))?;
        let render_target = match query.render_target {
            Some(target) => Some(
                resources
                    .render_target(target)
                    .ok_or_else(|| Error::stale("render target"))?,
            ),
            None => None,
        };

        let level0 = self.find_or_create_level0(query, controller, program, geometry);
        let next_id = &mut self.next_id;
        let l0 = self
            .level0
            .get_mut(level0)
            .ok_or_else(|| Error::stale("pipeline cache L0"))?;
        let l1_index = l0.find_or_create_level1(query, next_id);
        let Level0Node {
            vertex_input, level1, ..
        } = l0;
        let l1 = &mut level1[l1_index];
        let level2 = l1.find_or_create_level2(query, next_id);

        if create_new {
            compile_if_missing(controller, program, render_target, vertex_input, l1, level2)?;
        }

        let level1_id = l1.id;
        let l2 = l1
            .level2_mut(level2)
            .ok_or_else(|| Error::stale("pipeline cache L2"))?;
        l2.ref_count += 1;

        let result = PipelineResult {
            pipeline: l2.pipeline.clone(),
            level0,
            level1: level1_id,
            level2,
        };
        if result.pipeline.is_some() {
            self.latest[slot] = Some(LatestQuery {
                query: query.clone(),
                result: result.clone(),
            });
        }
        Ok(result)
    }

    fn fast_path(
        &mut self,
        slot: usize,
        query: &PipelineCacheQuery,
        dynamic_blend: bool,
    ) -> Option<PipelineResult<P>> {
        let latest = self.latest[slot].as_ref()?;
        if latest.result.pipeline.is_none() || !latest.query.same_pipeline_as(query, dynamic_blend) {
            return None;
        }
        let result = latest.result.clone();
        let l2 = self.level2_mut(&result)?;
        l2.ref_count += 1;
        Some(result)
    }

    fn find_or_create_level0<C>(
        &mut self,
        query: &PipelineCacheQuery,
        controller: &C,
        program: &Program,
        geometry: &Geometry,
    ) -> Handle<Level0Node<P>>
    where
        C: GraphicsController<Pipeline = P>,
    {
        let existing = self.level0.iter().find(|(_, l0)| {
            l0.program == query.program
                && l0.geometry == query.geometry
                && l0.render_target == query.render_target
        });
        if let Some((handle, _)) = existing {
            return handle;
        }

        let vertex_input = reflect_vertex_input(controller, program, geometry);
        let handle = self.level0.insert(Level0Node {
            program: query.program,
            geometry: query.geometry,
            render_target: query.render_target,
            vertex_input,
            level1: Vec::new(),
        });
        log::debug!(
            "Created L0 node {:?} for program '{}' / geometry {:?}",
            handle,
            program.name,
            query.geometry
        );
        handle
    }

    fn level2_mut(&mut self, result: &PipelineResult<P>) -> Option<&mut Level2Node<P>> {
        self.level0
            .get_mut(result.level0)?
            .level1
            .iter_mut()
            .find(|l1| l1.id == result.level1)?
            .level2_mut(result.level2)
    }

    /// Releases one reference taken by [`get_pipeline`](Self::get_pipeline).
    ///
    /// Never removes a node; removal happens in the periodic eviction pass.
    /// Results that outlived their node are ignored.
    pub fn reset_pipeline(&mut self, result: &PipelineResult<P>) {
        match self.level2_mut(result) {
            Some(l2) if l2.ref_count > 0 => l2.ref_count -= 1,
            Some(_) => log::warn!("Pipeline reference released more often than taken: {:?}", result),
            None => log::trace!("Released pipeline of an evicted node: {:?}", result),
        }
    }

    /// Once-per-frame tick before rendering.
    pub fn pre_render(&mut self) {
        self.latest[0] = None;
        self.frame_counter += 1;
        if self.frame_counter >= self.clean_interval {
            self.frame_counter = 0;
            self.latest = [None, None];
            self.clear_unused_cache();
        }
    }

    fn clear_unused_cache(&mut self) {
        let mut removed = 0usize;
        self.level0.retain(|_, l0| {
            l0.level1.retain_mut(|l1| {
                let before = l1.level2.len();
                l1.level2.retain(|l2| l2.ref_count > 0);
                removed += before - l1.level2.len();
                if l1.no_blend.ref_count == 0 {
                    l1.no_blend.pipeline = None;
                }
                if l1.is_unused() {
                    l1.dynamic_blend_pipeline = None;
                    false
                } else {
                    true
                }
            });
            !l0.level1.is_empty()
        });
        log::debug!(
            "Pipeline cache cleanup: removed {} L2 nodes, {} L0 nodes remain",
            removed,
            self.level0.len()
        );
    }

    pub fn contains(&self, result: &PipelineResult<P>) -> bool {
        self.level2(result).is_some()
    }

    pub fn reference_count(&self, result: &PipelineResult<P>) -> Option<u32> {
        self.level2(result).map(|l2| l2.ref_count)
    }

    pub fn level0_count(&self) -> usize {
        self.level0.len()
    }

    pub fn level1_count(&self) -> usize {
        self.level0.iter().map(|(_, l0)| l0.level1.len()).sum()
    }

    /// Keyed (blending) L2 nodes across the cache.
    pub fn level2_count(&self) -> usize {
        self.level0
            .iter()
            .flat_map(|(_, l0)| l0.level1.iter())
            .map(|l1| l1.level2.len())
            .sum()
    }

    fn level2(&self, result: &PipelineResult<P>) -> Option<&Level2Node<P>> {
        self.level0
            .get(result.level0)?
            .level1
            .iter()
            .find(|l1| l1.id == result.level1)?
            .level2(result.level2)
    }

    fn remove_level0_where(&mut self, what: &str, mut uses: impl FnMut(&Level0Node<P>) -> bool) {
        // The latest slots may point into nodes about to go.
        self.latest = [None, None];
        let before = self.level0.len();
        self.level0.retain(|_, l0| !uses(l0));
        let removed = before - self.level0.len();
        if removed > 0 {
            log::debug!("Removed {} L0 nodes after {} change", removed, what);
        }
    }
}

impl<P> LifecycleObserver for PipelineCache<P> {
    fn on_lifecycle_event(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::ProgramDestroyed(program) => {
                self.remove_level0_where("program", |l0| l0.program == program)
            }
            LifecycleEvent::GeometryDestroyed(geometry)
            | LifecycleEvent::GeometryBufferChanged(geometry) => {
                self.remove_level0_where("geometry", |l0| l0.geometry == geometry)
            }
            LifecycleEvent::RenderTargetDestroyed(target) => {
                self.remove_level0_where("render target", |l0| l0.render_target == Some(target))
            }
        }
    }
}

fn allocate_id(next_id: &mut u32) -> u32 {
    let id = *next_id;
    *next_id = next_id.wrapping_add(1);
    id
}

/// Colour blend state baked for `options`.
pub fn color_blend_state(options: &BlendingOptions, premultiplied: bool) -> ColorBlendState {
    let color_op = options.equation_rgb();
    let mut alpha_op = options.equation_alpha();
    if options.is_advanced_equation_applied() && premultiplied && color_op != alpha_op {
        log::error!("Advanced blend equation must be applied to RGB and alpha alike");
        alpha_op = color_op;
    }
    ColorBlendState {
        blend_enable: true,
        src_color_factor: options.src_factor_rgb(),
        dst_color_factor: options.dst_factor_rgb(),
        color_op,
        src_alpha_factor: options.src_factor_alpha(),
        dst_alpha_factor: options.dst_factor_alpha(),
        alpha_op,
        blend_constants: options.blend_color(),
    }
}

fn compile_if_missing<C>(
    controller: &mut C,
    program: &Program,
    render_target: Option<&RenderTarget>,
    vertex_input: &VertexInputState,
    l1: &mut Level1Node<C::Pipeline>,
    key: Level2Key,
) -> Result<()>
where
    C: GraphicsController,
{
    let Level1Node {
        rasterization,
        input_assembly,
        no_blend,
        level2,
        dynamic_blend_pipeline,
        ..
    } = l1;
    let l2 = match key {
        Level2Key::NoBlend => no_blend,
        Level2Key::Keyed(id) => level2
            .iter_mut()
            .find(|l2| l2.id == id)
            .ok_or_else(|| Error::stale("pipeline cache L2"))?,
    };
    if l2.pipeline.is_some() {
        return Ok(());
    }

    let mut info = PipelineCreateInfo {
        program,
        vertex_input,
        input_assembly,
        rasterization,
        color_blend: None,
        render_target,
    };

    if controller.supports_dynamic_blend_state() {
        let shared = match dynamic_blend_pipeline.clone() {
            Some(pipeline) => pipeline,
            None => {
                let pipeline = Rc::new(controller.create_pipeline(&info)?);
                *dynamic_blend_pipeline = Some(Rc::clone(&pipeline));
                pipeline
            }
        };
        l2.pipeline = Some(shared);
    } else {
        info.color_blend = Some(&l2.color_blend);
        let pipeline = controller.create_pipeline(&info)?;
        l2.pipeline = Some(Rc::new(pipeline));
    }
    log::trace!("Compiled pipeline for program '{}' ({:?})", program.name, key);
    Ok(())
}
