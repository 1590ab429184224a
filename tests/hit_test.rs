use glam::{Vec2, Vec3};
use wgpu_scenegraph::renderer::RenderTarget;
use wgpu_scenegraph::resource::GraphicsResources;
use wgpu_scenegraph::scene::{ClippingMode, Culled, DrawMode, Layer, LayerBehavior, RenderTask, Scene};
use wgpu_scenegraph::{hit_test, ActorTouchableCheck, PropagationType};

const CENTRE: Vec2 = Vec2::new(240.0, 400.0);

fn scene() -> Scene {
    Scene::new(Vec2::new(480.0, 800.0))
}

fn touch(scene: &Scene, point: Vec2) -> Option<wgpu_scenegraph::HitTestResults> {
    let mut check = ActorTouchableCheck::new(0);
    hit_test(scene, 0, point, &mut check, PropagationType::Default)
}

#[test]
fn screen_y_runs_downwards() {
    let mut scene = scene();
    let root = scene.root();
    let lower = scene
        .actor(root)
        .with_position(Vec3::new(0.0, -200.0, 0.0))
        .with_size(Vec3::new(100.0, 100.0, 0.0))
        .touchable()
        .spawn();
    scene.update(0);

    let results = touch(&scene, Vec2::new(240.0, 600.0)).expect("hit");
    assert_eq!(results.actor, Some(lower));
    assert!(touch(&scene, Vec2::new(240.0, 200.0)).is_none());
}

#[test]
fn children_outside_a_clipping_parent_are_not_hit() {
    let mut scene = scene();
    let root = scene.root();
    let clip = scene
        .actor(root)
        .with_size(Vec3::new(100.0, 100.0, 0.0))
        .with_clipping_mode(ClippingMode::ClipChildren)
        .spawn();
    let child = scene
        .actor(clip)
        .with_position(Vec3::new(80.0, 0.0, 0.0))
        .with_size(Vec3::new(100.0, 100.0, 0.0))
        .touchable()
        .spawn();
    scene.update(0);

    // Inside both.
    let results = touch(&scene, CENTRE + Vec2::new(40.0, 0.0)).expect("hit");
    assert_eq!(results.actor, Some(child));
    // Inside the child only.
    assert!(touch(&scene, CENTRE + Vec2::new(80.0, 0.0)).is_none());
}

#[test]
fn overlays_win_over_later_normal_actors() {
    let mut scene = scene();
    let root = scene.root();
    let overlay = scene
        .actor(root)
        .with_size(Vec3::splat(100.0))
        .with_draw_mode(DrawMode::Overlay2D)
        .touchable()
        .spawn();
    let _normal = scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    scene.update(0);

    assert_eq!(touch(&scene, CENTRE).and_then(|r| r.actor), Some(overlay));
}

#[test]
fn nearer_actor_wins_in_3d_layers() {
    let mut scene = scene();
    let root = scene.root();
    let (_, layer_root) = scene.add_layer(Layer::new("world").with_behavior(LayerBehavior::ThreeD), root);
    let near = scene
        .actor(layer_root)
        .with_position(Vec3::new(0.0, 0.0, 100.0))
        .with_size(Vec3::splat(100.0))
        .touchable()
        .spawn();
    let _far = scene.actor(layer_root).with_size(Vec3::splat(100.0)).touchable().spawn();
    scene.update(0);

    let results = touch(&scene, CENTRE).expect("hit");
    assert_eq!(results.actor, Some(near));
}

#[test]
fn upper_layers_are_tested_first() {
    let mut scene = scene();
    let root = scene.root();
    let _below = scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    let (_, layer_root) = scene.add_layer(Layer::new("popup"), root);
    let above = scene.actor(layer_root).with_size(Vec3::splat(50.0)).touchable().spawn();
    scene.update(0);

    assert_eq!(touch(&scene, CENTRE).and_then(|r| r.actor), Some(above));
}

#[test]
fn consuming_layer_hides_the_layers_below() {
    let mut scene = scene();
    let root = scene.root();
    let _below = scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    scene.add_layer(Layer::new("modal").with_consumes_touch(true), root);
    scene.update(0);

    let results = touch(&scene, CENTRE).expect("consumed");
    assert_eq!(results.actor, None);
    assert!(results.actor_chain.is_empty());
}

#[test]
fn culled_actors_cannot_be_touched() {
    let mut scene = scene();
    let root = scene.root();
    let actor = scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    scene.update(0);
    assert!(touch(&scene, CENTRE).is_some());

    if let Ok(mut culled) = scene.world.get::<&mut Culled>(actor) {
        culled.0[0] = true;
    }
    assert!(touch(&scene, CENTRE).is_none());
    // The other buffer still sees it.
    let mut check = ActorTouchableCheck::new(1);
    assert!(hit_test(&scene, 0, CENTRE, &mut check, PropagationType::Default).is_some());
}

#[test]
fn tasks_without_input_are_skipped() {
    let mut scene = scene();
    let root = scene.root();
    scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    let task = scene.default_task();
    if let Some(task) = scene.tasks.get_mut(task) {
        task.input_enabled = false;
    }
    scene.update(0);
    assert!(touch(&scene, CENTRE).is_none());
}

#[test]
fn offscreen_tasks_convert_screen_points() {
    fn shift_left(point: Vec2) -> Option<Vec2> {
        Some(point - Vec2::new(100.0, 0.0))
    }
    fn outside(_: Vec2) -> Option<Vec2> {
        None
    }

    let mut resources = GraphicsResources::new();
    let target = resources.add_render_target(RenderTarget::new(
        480,
        800,
        wgpu::TextureFormat::Rgba8Unorm,
    ));
    let mut scene = scene();
    let root = scene.root();
    let actor = scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    let camera = scene.default_camera();
    let default_task = scene.default_task();
    if let Some(task) = scene.tasks.get_mut(default_task) {
        task.input_enabled = false;
    }
    let offscreen = scene.add_task(
        RenderTask::new(root, camera)
            .with_render_target(target)
            .with_screen_to_frame_buffer(shift_left),
    );
    scene.update(0);

    // Touching right of the actor lands on it once shifted.
    let results = touch(&scene, CENTRE + Vec2::new(100.0, 0.0)).expect("hit");
    assert_eq!(results.actor, Some(actor));
    assert_eq!(results.task, offscreen);

    if let Some(task) = scene.tasks.get_mut(offscreen) {
        task.screen_to_frame_buffer = Some(outside);
    }
    assert!(touch(&scene, CENTRE).is_none());
}

#[test]
fn exclusive_actors_are_only_hit_through_their_task() {
    let mut scene = scene();
    let root = scene.root();
    let exclusive = scene.actor(root).with_size(Vec3::splat(100.0)).touchable().spawn();
    let camera = scene.default_camera();
    let owner = scene.add_task(
        RenderTask::new(exclusive, camera)
            .with_exclusive(true)
            .with_input_enabled(false),
    );
    scene.update(0);
    assert!(touch(&scene, CENTRE).is_none());

    if let Some(task) = scene.tasks.get_mut(owner) {
        task.input_enabled = true;
    }
    let results = touch(&scene, CENTRE).expect("hit");
    assert_eq!(results.actor, Some(exclusive));
    assert_eq!(results.task, owner);
}
