// Headless demo: builds a small scene, runs a few frames through the
// prepare and render phases and reports what happened.

use glam::{Vec2, Vec3, Vec4};
use wgpu_scenegraph::renderer::{
    BlendMode, FrameRenderer, Geometry, HeadlessController, Program, Renderer,
};
use wgpu_scenegraph::resource::GraphicsResources;
use wgpu_scenegraph::scene::{ClippingMode, Layer, LayerBehavior, Scene};
use wgpu_scenegraph::{
    hit_test, ActorTouchableCheck, PrepareSettings, PropagationType, RenderPreparer,
};

const FRAMES: usize = 6;

fn main() {
    wgpu_scenegraph::init_logging();

    let settings = PrepareSettings::load();
    log::info!("Starting headless render preparation ({} frames)", FRAMES);

    let mut resources = GraphicsResources::new();
    let quad = resources.add_geometry(Geometry::quad());
    let flat = resources.add_program(Program::new("flat").with_attribute("aPosition", 0));

    let mut scene = Scene::new(Vec2::new(480.0, 800.0));
    let opaque = scene.add_renderer(Renderer::new(quad, flat));
    let blended = scene.add_renderer(Renderer::new(quad, flat).with_blend_mode(BlendMode::On));

    let root = scene.root();
    let panel = scene
        .actor(root)
        .with_name("panel")
        .with_size(Vec3::new(300.0, 400.0, 0.0))
        .with_clipping_mode(ClippingMode::ClipChildren)
        .with_renderer(opaque)
        .touchable()
        .spawn();
    let button = scene
        .actor(panel)
        .with_name("button")
        .with_position(Vec3::new(0.0, -100.0, 0.0))
        .with_size(Vec3::new(120.0, 60.0, 0.0))
        .with_color(Vec4::new(1.0, 1.0, 1.0, 0.5))
        .with_renderer(blended)
        .touchable()
        .spawn();
    // Entirely off screen, culled every frame.
    scene
        .actor(root)
        .with_position(Vec3::new(2000.0, 0.0, 0.0))
        .with_size(Vec3::splat(50.0))
        .with_renderer(opaque)
        .spawn();

    let (_, layer_root) = scene.add_layer(Layer::new("world").with_behavior(LayerBehavior::ThreeD), root);
    for i in 0..3 {
        scene
            .actor(layer_root)
            .with_position(Vec3::new(-100.0 + 100.0 * i as f32, 250.0, -50.0 * i as f32))
            .with_size(Vec3::splat(80.0))
            .with_renderer(if i % 2 == 0 { opaque } else { blended })
            .spawn();
    }

    let mut preparer = RenderPreparer::new(settings.clone());
    let mut frame_renderer = FrameRenderer::new(settings.pipeline_cache_clean_interval);
    let mut controller = HeadlessController::new();

    for frame in 0..FRAMES {
        let buffer = frame % wgpu_scenegraph::BUFFER_COUNT;
        if frame == 3 {
            scene.set_position(button, Vec3::new(0.0, -120.0, 0.0));
        }
        scene.update(buffer);
        let stats = preparer.prepare(&mut scene, &resources, buffer);

        match frame_renderer.render(
            preparer.instructions(),
            buffer,
            &scene.renderers,
            &resources,
            &mut controller,
        ) {
            Ok(passes) => {
                let draws: usize = passes.iter().map(|pass| pass.commands.len()).sum();
                log::info!(
                    "Frame {}: {} lists ({} reused), {} items, {} draws",
                    frame,
                    stats.render_lists,
                    stats.reused_lists,
                    stats.items,
                    draws
                );
            }
            Err(err) => {
                log::error!("Frame {} failed to render: {}", frame, err);
                return;
            }
        }
    }

    let cache = frame_renderer.pipeline_cache();
    log::info!(
        "Pipeline cache: {} L0, {} L1, {} L2 nodes, {} pipelines compiled",
        cache.level0_count(),
        cache.level1_count(),
        cache.level2_count(),
        controller.pipelines_created()
    );

    let buffer = (FRAMES - 1) % wgpu_scenegraph::BUFFER_COUNT;
    let mut check = ActorTouchableCheck::new(buffer);
    for point in [Vec2::new(240.0, 520.0), Vec2::new(240.0, 300.0), Vec2::new(5.0, 5.0)] {
        match hit_test(&scene, buffer, point, &mut check, PropagationType::Default) {
            Some(results) => log::info!(
                "Touch at {:?} hit {:?} at local {:?}",
                point,
                results.actor,
                results.actor_coordinates
            ),
            None => log::info!("Touch at {:?} hit nothing", point),
        }
    }
}
