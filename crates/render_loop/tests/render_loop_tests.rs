//! End-to-end behaviour of the render loop against the headless device

use approx::assert_relative_eq;
use render_loop::config::{SceneConfig, ViewerConfig};
use render_loop::render::headless::{DeviceCall, HeadlessDevice};
use render_loop::render::{DeviceCaps, EffectPipeline, GraphicsDevice, RenderError, ShaderModel};
use render_loop::{FrameDriver, FrameHandler, FrameOutcome, LoopState, RenderLoopController};

fn controller_with(config: &ViewerConfig) -> RenderLoopController<HeadlessDevice> {
    let mut controller =
        RenderLoopController::new(config.headless_device(), EffectPipeline::shared(), config.scene.clone());
    controller.initialize().unwrap();
    controller
}

fn controller() -> RenderLoopController<HeadlessDevice> {
    controller_with(&ViewerConfig::default())
}

#[test]
fn test_begin_end_balanced_over_many_frames() {
    let mut controller = controller();

    for _ in 0..10 {
        controller.update(0.016);
        controller.draw_frame().unwrap();
    }

    let journal = controller.device().journal();
    let count = |call: DeviceCall| journal.count(|c| *c == call);
    assert_eq!(count(DeviceCall::BeginScene), 10);
    assert_eq!(count(DeviceCall::EndScene), 10);
    assert_eq!(count(DeviceCall::Present), 10);
    assert_eq!(
        journal.count(|c| matches!(c, DeviceCall::BeginEffect { .. })),
        journal.count(|c| matches!(c, DeviceCall::EndEffect { .. }))
    );
    assert_eq!(
        journal.count(|c| matches!(c, DeviceCall::BeginPass { .. })),
        journal.count(|c| matches!(c, DeviceCall::EndPass { .. }))
    );
    assert!(!journal.scene_open());
    assert_eq!(journal.open_effects(), 0);
    assert!(!journal.pass_open());
}

#[test]
fn test_lost_device_draws_nothing() {
    let mut controller = controller();
    controller.on_device_lost();
    let before = controller.device().journal().calls().len();

    controller.update(0.016);
    controller.draw_frame().unwrap();

    let journal = controller.device().journal();
    assert_eq!(journal.calls().len(), before);
    assert_eq!(journal.count(|c| *c == DeviceCall::Present), 0);
}

#[test]
fn test_reset_restores_aspect_after_resize() {
    let mut controller = controller();
    assert_relative_eq!(controller.camera().aspect_ratio(), 800.0 / 600.0, epsilon = 1e-5);

    controller.on_device_lost();
    controller.device_mut().resize(1280, 720);
    controller.device_mut().reset().unwrap();
    controller.on_device_reset();

    assert_eq!(controller.state(), LoopState::Running);
    assert_relative_eq!(controller.camera().aspect_ratio(), 1280.0 / 720.0, epsilon = 1e-5);
    controller.draw_frame().unwrap();
}

#[test]
fn test_zero_height_keeps_previous_aspect() {
    let mut controller = controller();
    let before = controller.camera().aspect_ratio();

    controller.on_device_lost();
    controller.device_mut().resize(640, 0);
    controller.device_mut().reset().unwrap();
    controller.on_device_reset();

    assert_eq!(controller.state(), LoopState::Running);
    assert_relative_eq!(controller.camera().aspect_ratio(), before, epsilon = 1e-6);
}

#[test]
fn test_unsupported_device_loads_nothing() {
    let mut config = ViewerConfig::default();
    config.device.caps = DeviceCaps {
        vertex_shader: ShaderModel::SM_1_1,
        pixel_shader: ShaderModel::SM_1_1,
    };
    let pipeline = EffectPipeline::shared();
    let mut controller = RenderLoopController::new(config.headless_device(), pipeline.clone(), config.scene.clone());

    let err = controller.initialize().unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedDevice { .. }));
    assert_eq!(controller.state(), LoopState::Uninitialized);
    assert_eq!(controller.device().loaded_meshes(), 0);
    assert!(!pipeline.borrow().is_initialized());
    assert!(controller.device().journal().calls().is_empty());
}

#[test]
fn test_update_rotates_oscillating_objects() {
    let mut controller = controller();
    let skull = controller.scene().find("skull").unwrap();
    let dwarf = controller.scene().find("dwarf").unwrap();
    let skull_before = controller.scene().get(skull).unwrap().rotation();
    let dwarf_before = controller.scene().get(dwarf).unwrap().rotation();
    let revision = controller.camera().view_revision();

    controller.update(0.5);

    let skull_after = controller.scene().get(skull).unwrap().rotation();
    let delta = skull_before.inverse() * skull_after;
    assert_relative_eq!(delta.angle(), 0.5f32.sin(), epsilon = 1e-5);
    assert_eq!(controller.scene().get(dwarf).unwrap().rotation(), dwarf_before);
    assert_eq!(controller.camera().view_revision(), revision + 1);
}

#[test]
fn test_update_issues_no_device_calls() {
    let mut controller = controller();
    let before = controller.device().journal().calls().len();

    controller.update(0.25);
    controller.update(0.25);

    assert_eq!(controller.device().journal().calls().len(), before);
}

#[test]
fn test_teardown_releases_and_unregisters() {
    let pipeline = EffectPipeline::shared();
    let config = ViewerConfig::default();
    let mut controller = RenderLoopController::new(config.headless_device(), pipeline.clone(), config.scene.clone());
    controller.initialize().unwrap();
    let client = controller.client_id();
    assert!(pipeline.borrow().registered_clients().contains(&client));

    controller.shutdown();

    assert_eq!(controller.state(), LoopState::Destroyed);
    assert_eq!(controller.device().loaded_meshes(), 0);
    assert!(pipeline.borrow().registered_clients().is_empty());

    // Only the pipeline's effects still hold device state
    assert_eq!(controller.device().journal().live_dependents(), 2);
    pipeline.borrow_mut().destroy_all();
    assert_eq!(controller.device().journal().live_dependents(), 0);
}

#[test]
fn test_two_controllers_share_one_pipeline() {
    let pipeline = EffectPipeline::shared();
    let config = ViewerConfig::default();
    let mut first = RenderLoopController::new(config.headless_device(), pipeline.clone(), SceneConfig::default());
    let mut second = RenderLoopController::new(config.headless_device(), pipeline.clone(), SceneConfig::default());
    first.initialize().unwrap();
    second.initialize().unwrap();

    assert_eq!(pipeline.borrow().registered_clients().len(), 2);
    assert_eq!(second.device().journal().count(|c| matches!(c, DeviceCall::CreateEffect(_))), 0);

    drop(first);
    assert_eq!(pipeline.borrow().registered_clients(), &[second.client_id()]);
}

#[test]
fn test_loss_in_one_controller_suspends_the_other() {
    let pipeline = EffectPipeline::shared();
    let config = ViewerConfig::default();
    // The effects live on the first device, so the second one draws only its overlay
    let overlay_only = SceneConfig {
        objects: Vec::new(),
        ..SceneConfig::default()
    };
    let mut first = RenderLoopController::new(config.headless_device(), pipeline.clone(), config.scene.clone());
    let mut second = RenderLoopController::new(config.headless_device(), pipeline.clone(), overlay_only);
    first.initialize().unwrap();
    second.initialize().unwrap();

    first.on_device_lost();
    let before = second.device().journal().calls().len();
    second.update(0.016);
    second.draw_frame().unwrap();

    assert_eq!(second.state(), LoopState::Running);
    assert!(!second.can_draw());
    assert_eq!(second.device().journal().calls().len(), before);

    first.on_device_reset();
    assert!(second.can_draw());
    second.draw_frame().unwrap();
    assert_eq!(second.device().journal().count(|c| *c == DeviceCall::Present), 1);
    assert_eq!(first.state(), LoopState::Running);
}

#[test]
fn test_driver_recovers_from_simulated_loss() {
    let mut controller = controller();
    let mut driver = FrameDriver::with_fixed_delta(1.0 / 60.0);

    assert_eq!(driver.tick(&mut controller).unwrap(), FrameOutcome::Presented);
    controller.device_mut().simulate_loss(3);

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(driver.tick(&mut controller).unwrap());
    }

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Skipped,
            FrameOutcome::Skipped,
            FrameOutcome::Skipped,
            FrameOutcome::Presented,
            FrameOutcome::Presented,
        ]
    );
    assert_eq!(controller.state(), LoopState::Running);
    let journal = controller.device().journal();
    assert_eq!(journal.count(|c| matches!(c, DeviceCall::Reset { .. })), 1);
    assert_eq!(journal.count(|c| *c == DeviceCall::OverlayReset), 1);
    assert_eq!(controller.device().backbuffer_extent(), (800, 600));
}
