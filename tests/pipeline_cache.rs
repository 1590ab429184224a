use std::rc::Rc;

use glam::Vec4;
use wgpu_scenegraph::renderer::{
    BlendEquation, BlendFactor, BlendingOptions, FaceCullingMode, Geometry, HeadlessController,
    PipelineCache, PipelineCacheQuery, Program, RenderTarget, Renderer, Topology,
    VertexAttributeFormat, VertexBufferFormat, VertexFormat,
};
use wgpu_scenegraph::resource::{GraphicsResources, Handle};

struct Fixture {
    resources: GraphicsResources,
    program: Handle<Program>,
    geometry: Handle<Geometry>,
    controller: HeadlessController,
    cache: PipelineCache<wgpu_scenegraph::renderer::HeadlessPipeline>,
}

fn fixture() -> Fixture {
    let mut resources = GraphicsResources::new();
    let program = resources.add_program(
        Program::new("textured")
            .with_attribute("aPosition", 0)
            .with_attribute("aTexCoord", 1),
    );
    let geometry = resources.add_geometry(Geometry::quad());
    Fixture {
        resources,
        program,
        geometry,
        controller: HeadlessController::new(),
        cache: PipelineCache::new(3),
    }
}

fn query(f: &Fixture, blending: bool) -> PipelineCacheQuery {
    let renderer = Renderer::new(f.geometry, f.program);
    PipelineCacheQuery::for_renderer(&renderer, &f.resources, None, blending, false)
        .expect("geometry exists")
}

#[test]
fn identical_queries_share_one_pipeline() {
    let mut f = fixture();
    let q = query(&f, false);

    let first = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("first lookup");
    let second = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("second lookup");

    let a = first.pipeline.clone().expect("compiled");
    let b = second.pipeline.clone().expect("compiled");
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(f.controller.pipelines_created(), 1);
    assert_eq!(f.cache.reference_count(&second), Some(2));
}

#[test]
fn any_differing_key_selects_another_pipeline() {
    let mut f = fixture();
    let base = query(&f, false);
    let reference = f
        .cache
        .get_pipeline(&base, &f.resources, &mut f.controller, true)
        .expect("base")
        .pipeline
        .expect("compiled");

    let mut culled = base.clone();
    culled.face_cull_mode = FaceCullingMode::Back;
    let mut lines = base.clone();
    lines.topology = Topology::Lines;
    let mut blended = base.clone();
    blended.blending_enabled = true;
    let target = f.resources.add_render_target(RenderTarget::new(
        256,
        256,
        wgpu::TextureFormat::Rgba8Unorm,
    ));
    let mut offscreen = base.clone();
    offscreen.render_target = Some(target);

    for variant in [culled, lines, blended, offscreen] {
        let pipeline = f
            .cache
            .get_pipeline(&variant, &f.resources, &mut f.controller, true)
            .expect("variant")
            .pipeline
            .expect("compiled");
        assert!(!Rc::ptr_eq(&reference, &pipeline), "{:?}", variant);
    }
    assert_eq!(f.controller.pipelines_created(), 5);
    assert_eq!(f.cache.level0_count(), 2);
}

#[test]
fn blend_bitmask_and_colour_select_level2_nodes() {
    let mut f = fixture();
    let mut additive = query(&f, true);
    additive.blending_options.set_blend_func(
        BlendFactor::One,
        BlendFactor::One,
        BlendFactor::One,
        BlendFactor::One,
    );
    let mut tinted = query(&f, true);
    tinted.blending_options = BlendingOptions::default().with_blend_color(Vec4::new(1.0, 0.0, 0.0, 1.0));
    let plain = query(&f, true);

    let mut pipelines = Vec::new();
    for q in [&plain, &additive, &tinted, &plain] {
        let result = f
            .cache
            .get_pipeline(q, &f.resources, &mut f.controller, true)
            .expect("lookup");
        pipelines.push(result.pipeline.expect("compiled"));
    }
    assert!(Rc::ptr_eq(&pipelines[0], &pipelines[3]));
    assert!(!Rc::ptr_eq(&pipelines[0], &pipelines[1]));
    assert!(!Rc::ptr_eq(&pipelines[0], &pipelines[2]));
    assert_eq!(f.cache.level2_count(), 3);
    assert_eq!(f.controller.pipelines_created(), 3);
}

#[test]
fn dynamic_blend_shares_one_pipeline_per_level1_node() {
    let mut f = fixture();
    f.controller = HeadlessController::with_dynamic_blend(true);
    let plain = query(&f, true);
    let mut multiply = query(&f, true);
    multiply
        .blending_options
        .set_blend_equation(BlendEquation::Multiply, BlendEquation::Multiply);

    let a = f
        .cache
        .get_pipeline(&plain, &f.resources, &mut f.controller, true)
        .expect("plain")
        .pipeline
        .expect("compiled");
    let b = f
        .cache
        .get_pipeline(&multiply, &f.resources, &mut f.controller, true)
        .expect("multiply")
        .pipeline
        .expect("compiled");
    assert!(Rc::ptr_eq(&a, &b));
    assert!(a.color_blend.is_none());
    assert_eq!(f.controller.pipelines_created(), 1);
}

#[test]
fn get_then_reset_restores_reference_count() {
    let mut f = fixture();
    let q = query(&f, false);
    let held = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("held");
    assert_eq!(f.cache.reference_count(&held), Some(1));

    let mut taken = Vec::new();
    for _ in 0..4 {
        taken.push(
            f.cache
                .get_pipeline(&q, &f.resources, &mut f.controller, true)
                .expect("lookup"),
        );
    }
    assert_eq!(f.cache.reference_count(&held), Some(5));
    for result in &taken {
        f.cache.reset_pipeline(result);
    }
    assert_eq!(f.cache.reference_count(&held), Some(1));

    // Zero references alone do not evict; the periodic pass does.
    f.cache.reset_pipeline(&held);
    assert_eq!(f.cache.reference_count(&held), Some(0));
    assert!(f.cache.contains(&held));
    f.cache.pre_render();
    f.cache.pre_render();
    assert!(f.cache.contains(&held));
    f.cache.pre_render();
    assert!(!f.cache.contains(&held));
    assert_eq!(f.cache.level0_count(), 0);
}

#[test]
fn referenced_pipelines_survive_eviction() {
    let mut f = fixture();
    let q = query(&f, true);
    let held = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("held");
    for _ in 0..6 {
        f.cache.pre_render();
    }
    assert!(f.cache.contains(&held));
    assert_eq!(f.cache.level2_count(), 1);
}

#[test]
fn destroying_a_program_drops_its_nodes_despite_references() {
    let mut f = fixture();
    let q = query(&f, false);
    let old = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("lookup");
    assert_eq!(f.cache.reference_count(&old), Some(1));

    f.resources.destroy_program(f.program, &mut f.cache);
    assert!(!f.cache.contains(&old));
    assert_eq!(f.cache.level0_count(), 0);
    // Releasing the stale result afterwards is harmless.
    f.cache.reset_pipeline(&old);

    let program = f.resources.add_program(Program::new("textured").with_attribute("aPosition", 0));
    let mut fresh_query = q.clone();
    fresh_query.program = program;
    let fresh = f
        .cache
        .get_pipeline(&fresh_query, &f.resources, &mut f.controller, true)
        .expect("fresh lookup");
    assert!(f.cache.contains(&fresh));
    assert_eq!(f.controller.pipelines_created(), 2);
}

#[test]
fn lookup_with_destroyed_program_is_an_error() {
    let mut f = fixture();
    let q = query(&f, false);
    f.resources.destroy_program(f.program, &mut f.cache);
    assert!(matches!(
        f.cache.get_pipeline(&q, &f.resources, &mut f.controller, true),
        Err(wgpu_scenegraph::Error::StaleHandle { .. })
    ));
}

#[test]
fn vertex_layout_change_rebuilds_the_chain() {
    let mut f = fixture();
    let q = query(&f, false);
    let first = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("first");
    let layout = vec![VertexBufferFormat::new(vec![VertexAttributeFormat::new(
        "aPosition",
        VertexFormat::Vec3,
    )])];
    assert!(f.resources.set_vertex_buffers(f.geometry, layout, &mut f.cache));
    assert!(!f.cache.contains(&first));

    let second = f
        .cache
        .get_pipeline(&q, &f.resources, &mut f.controller, true)
        .expect("second");
    let a = first.pipeline.expect("compiled");
    let b = second.pipeline.expect("compiled");
    assert!(!Rc::ptr_eq(&a, &b));
    assert_eq!(b.vertex_input.attributes.len(), 1);
}

#[test]
fn creation_failure_propagates() {
    let mut f = fixture();
    f.controller.set_fail_creation(true);
    let q = query(&f, false);
    assert!(matches!(
        f.cache.get_pipeline(&q, &f.resources, &mut f.controller, true),
        Err(wgpu_scenegraph::Error::PipelineCreation(_))
    ));
}
