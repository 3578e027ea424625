//! # Render Loop Controller
//!
//! Orchestrates the device lifecycle and the per-frame update/draw cycle
//! for a small lit scene.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized -> Initialized -> Running <-> DeviceLost -> ShuttingDown -> Destroyed
//! ```
//!
//! - `initialize` validates the device and loads the scene, then runs the
//!   first `on_device_reset`, which is what enters `Running`.
//! - `on_device_lost` is idempotent; only `on_device_reset` leaves
//!   `DeviceLost`. While lost, `draw_frame` silently skips the frame.
//! - `shutdown` (also run on drop) releases scene objects, the statistics
//!   overlay and the pipeline registration, in reverse acquisition order.
//!
//! The device and the effect pipeline are injected; nothing here reaches
//! for process globals.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::SceneConfig;
use crate::render::{
    Camera, ClearFlags, ClientId, Color, DirectionalLight, FrameScope, FrameStats, GraphicsDevice, RenderError,
    SharedPipeline, ShaderModel, Technique,
};
use crate::scene::{Scene, SceneObject};

/// Both shader stages must reach this model
pub const MIN_SHADER_MODEL: ShaderModel = ShaderModel::SM_2_0;

static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

/// Lifecycle state of a [`RenderLoopController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, device not yet validated
    Uninitialized,
    /// Scene loaded, waiting for the first reset
    Initialized,
    /// Frames are drawn
    Running,
    /// Device lost; frames are skipped until a reset
    DeviceLost,
    /// Teardown in progress
    ShuttingDown,
    /// All resources released
    Destroyed,
}

/// The callbacks a host loop drives
///
/// Device callbacks never fail: problems are logged and reflected in the
/// handler's state instead.
pub trait FrameHandler {
    /// The device was lost; release device-dependent resources
    fn on_device_lost(&mut self);

    /// The device was reset; reacquire resources and rebuild size-dependent state
    fn on_device_reset(&mut self);

    /// Advance simulation by `dt` seconds
    fn update(&mut self, dt: f32);

    /// Draw and present one frame
    fn draw_frame(&mut self) -> Result<(), RenderError>;
}

/// Owns the scene, camera and statistics and drives them each frame
pub struct RenderLoopController<D: GraphicsDevice> {
    scene: Scene,
    stats: Option<FrameStats>,
    camera: Camera,
    light: DirectionalLight,
    clear_color: Color,
    config: SceneConfig,
    pipeline: SharedPipeline,
    client: ClientId,
    state: LoopState,
    skinned_stub_logged: bool,
    device: D,
}

impl<D: GraphicsDevice> RenderLoopController<D> {
    /// Create a controller around an injected device and pipeline
    pub fn new(device: D, pipeline: SharedPipeline, config: SceneConfig) -> Self {
        Self {
            scene: Scene::new(),
            stats: None,
            camera: Camera::default(),
            light: config.light.normalized(),
            clear_color: config.clear_color,
            config,
            pipeline,
            client: ClientId(NEXT_CLIENT.fetch_add(1, Ordering::Relaxed)),
            state: LoopState::Uninitialized,
            skinned_stub_logged: false,
            device,
        }
    }

    /// Validate the device, build the scene and prime the projection
    ///
    /// # Errors
    /// `UnsupportedDevice` when either shader stage is below
    /// [`MIN_SHADER_MODEL`]; nothing is loaded in that case. Device and
    /// camera errors roll back whatever was acquired.
    pub fn initialize(&mut self) -> Result<(), RenderError> {
        if self.state != LoopState::Uninitialized {
            return Err(RenderError::NotReady(self.state));
        }

        let caps = self.device.capabilities();
        if !caps.supports(MIN_SHADER_MODEL) {
            log::error!(
                "Device caps check failed: vertex shader {}, pixel shader {}",
                caps.vertex_shader,
                caps.pixel_shader
            );
            return Err(RenderError::UnsupportedDevice {
                vertex: caps.vertex_shader,
                pixel: caps.pixel_shader,
                required: MIN_SHADER_MODEL,
            });
        }

        if let Err(e) = self.acquire() {
            log::error!("Initialization failed: {}", e);
            self.release();
            return Err(e);
        }

        self.state = LoopState::Initialized;
        log::info!("Render loop initialized with {} scene objects", self.scene.len());

        self.on_device_reset();
        Ok(())
    }

    fn acquire(&mut self) -> Result<(), RenderError> {
        {
            let mut pipeline = self.pipeline.borrow_mut();
            pipeline.init_all(&mut self.device)?;
            pipeline.register(self.client);
        }

        let mut stats = FrameStats::new(&mut self.device, &self.config.stats)?;

        let camera = &self.config.camera;
        self.camera.set_position(camera.position)?;
        self.camera.set_target(camera.target)?;
        self.camera.set_rotation(camera.up)?;
        self.camera.set_lens(camera.fov_degrees, camera.near, camera.far)?;

        for desc in &self.config.objects {
            let object = SceneObject::load(&mut self.device, desc)?;
            stats.add_vertices(object.vertex_count());
            stats.add_triangles(object.triangle_count());
            self.scene.insert(object);
        }

        self.stats = Some(stats);
        Ok(())
    }

    fn release(&mut self) {
        let released = self.scene.clear(&mut self.device);
        if !released.is_empty() {
            log::debug!("Released scene objects: {}", released.join(", "));
        }
        self.stats = None;
        match self.pipeline.try_borrow_mut() {
            Ok(mut pipeline) => {
                pipeline.unregister(self.client);
            }
            Err(_) => log::warn!("Effect pipeline busy; {:?} left registered", self.client),
        }
    }

    fn reacquire(&mut self) -> Result<(), RenderError> {
        if let Some(stats) = self.stats.as_mut() {
            stats.on_reset_device()?;
        }
        self.pipeline.borrow_mut().on_reset_device(self.client)?;
        Ok(())
    }

    fn build_projection(&mut self) {
        let (width, height) = self.device.backbuffer_extent();
        match self.camera.set_aspect_ratio(width, height) {
            Ok(aspect) => log::debug!("Projection rebuilt for {}x{} (aspect {:.4})", width, height, aspect),
            Err(e) => log::warn!("{}; keeping aspect ratio {:.4}", e, self.camera.aspect_ratio()),
        }
        self.camera.projection();
    }

    /// Release everything in reverse acquisition order; idempotent
    pub fn shutdown(&mut self) {
        if matches!(self.state, LoopState::ShuttingDown | LoopState::Destroyed) {
            return;
        }
        log::info!("Render loop shutting down from {:?}", self.state);
        self.state = LoopState::ShuttingDown;
        self.release();
        self.state = LoopState::Destroyed;
    }

    /// Current lifecycle state
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Whether `draw_frame` would reach the device
    pub fn can_draw(&self) -> bool {
        self.state == LoopState::Running && !self.pipeline.borrow().is_suspended()
    }

    /// The camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Frame statistics, once initialized
    pub fn stats(&self) -> Option<&FrameStats> {
        self.stats.as_ref()
    }

    /// The light shared by both techniques
    pub fn light(&self) -> &DirectionalLight {
        &self.light
    }

    /// The injected device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable device access for the host (status polling, resets)
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The shared effect pipeline
    pub fn pipeline(&self) -> &SharedPipeline {
        &self.pipeline
    }

    /// Identity used for pipeline registration
    pub fn client_id(&self) -> ClientId {
        self.client
    }
}

impl<D: GraphicsDevice> FrameHandler for RenderLoopController<D> {
    fn on_device_lost(&mut self) {
        match self.state {
            LoopState::Running | LoopState::Initialized => {
                if let Some(stats) = self.stats.as_mut() {
                    if let Err(e) = stats.on_lost_device() {
                        log::error!("Stats overlay failed to release device state: {}", e);
                    }
                }
                if let Err(e) = self.pipeline.borrow_mut().on_lost_device(self.client) {
                    log::error!("Effect pipeline failed to release device state: {}", e);
                }
                self.state = LoopState::DeviceLost;
                log::info!("Device lost; skipping frames until reset");
            }
            LoopState::DeviceLost => log::trace!("Device already lost"),
            other => log::warn!("Ignoring device loss in {:?}", other),
        }
    }

    fn on_device_reset(&mut self) {
        match self.state {
            LoopState::Initialized | LoopState::DeviceLost => {
                if let Err(e) = self.reacquire() {
                    log::error!("Failed to reacquire device resources: {}", e);
                    self.state = LoopState::DeviceLost;
                    return;
                }
            }
            LoopState::Running => log::debug!("Reset while running; rebuilding projection only"),
            other => {
                log::warn!("Ignoring device reset in {:?}", other);
                return;
            }
        }

        self.build_projection();
        if self.state != LoopState::Running {
            log::info!("Device reset; rendering resumed");
        }
        self.state = LoopState::Running;
    }

    fn update(&mut self, dt: f32) {
        match self.state {
            LoopState::Running | LoopState::DeviceLost | LoopState::Initialized => {}
            other => {
                log::trace!("update skipped in {:?}", other);
                return;
            }
        }

        if let Some(stats) = self.stats.as_mut() {
            stats.update(dt);
        }

        // The camera can move every frame, so the view is always rebuilt
        self.camera.render();
        self.scene.advance(dt);
    }

    fn draw_frame(&mut self) -> Result<(), RenderError> {
        match self.state {
            LoopState::Running => {}
            LoopState::DeviceLost => {
                log::trace!("Frame skipped: device lost");
                return Ok(());
            }
            other => return Err(RenderError::NotReady(other)),
        }
        if self.pipeline.borrow().is_suspended() {
            log::trace!("Frame skipped: effects released for {:?}", self.pipeline.borrow().lost_clients());
            return Ok(());
        }

        self.device
            .clear(ClearFlags::TARGET | ClearFlags::ZBUFFER, self.clear_color, 1.0, 0)?;

        let view_proj = self.camera.view_projection();
        let eye = self.camera.position();

        let mut pipeline = self.pipeline.borrow_mut();
        let mut frame = FrameScope::begin(&mut self.device)?;
        pipeline.set_eye_position(&eye)?;

        for technique in Technique::ALL {
            pipeline.set_directional_light(technique, &self.light)?;
            let mut effect = pipeline.scope(technique)?;
            let mut pass = effect.pass(0)?;

            match technique {
                Technique::StaticMesh => {
                    for object in self.scene.with_technique(technique) {
                        object.draw(&mut *frame, &mut pass, &view_proj)?;
                    }
                }
                Technique::SkinnedMesh => {
                    // Skinned geometry submission is not implemented; the pass only runs its setup
                    if !self.skinned_stub_logged && self.scene.with_technique(technique).next().is_some() {
                        log::warn!("Skinned-mesh drawing is a stub; skinned objects are not submitted");
                        self.skinned_stub_logged = true;
                    }
                }
            }

            pass.finish()?;
            effect.finish()?;
        }

        if let Some(stats) = self.stats.as_mut() {
            stats.display()?;
        }

        frame.finish()?;
        drop(pipeline);

        self.device.present()?;
        Ok(())
    }
}

impl<D: GraphicsDevice> Drop for RenderLoopController<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{DeviceCall, HeadlessDevice};
    use crate::render::{DeviceCaps, DeviceError, EffectPipeline};

    fn device() -> HeadlessDevice {
        HeadlessDevice::new(800, 600)
            .with_mesh("skullocc.x", 100, 50)
            .with_mesh("dwarf.x", 200, 100)
            .with_mesh("tiny.x", 300, 150)
    }

    fn running() -> RenderLoopController<HeadlessDevice> {
        let mut controller = RenderLoopController::new(device(), EffectPipeline::shared(), SceneConfig::default());
        controller.initialize().unwrap();
        controller
    }

    #[test]
    fn test_initialize_enters_running() {
        let controller = running();

        assert_eq!(controller.state(), LoopState::Running);
        assert_eq!(controller.scene().len(), 3);
        let stats = controller.stats().unwrap();
        assert_eq!(stats.vertex_count(), 600);
        assert_eq!(stats.triangle_count(), 300);
        assert!(controller.pipeline().borrow().registered_clients().contains(&controller.client_id()));
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let mut controller = running();
        assert!(matches!(
            controller.initialize(),
            Err(RenderError::NotReady(LoopState::Running))
        ));
    }

    #[test]
    fn test_missing_mesh_rolls_back() {
        let device = HeadlessDevice::new(800, 600).with_mesh("skullocc.x", 100, 50);
        let pipeline = EffectPipeline::shared();
        let mut controller = RenderLoopController::new(device, pipeline.clone(), SceneConfig::default());

        assert!(matches!(
            controller.initialize(),
            Err(RenderError::Device(DeviceError::AssetNotFound(_)))
        ));
        assert_eq!(controller.state(), LoopState::Uninitialized);
        assert!(controller.scene().is_empty());
        assert_eq!(controller.device().loaded_meshes(), 0);
        assert!(pipeline.borrow().registered_clients().is_empty());
    }

    #[test]
    fn test_draw_before_initialize_is_not_ready() {
        let mut controller = RenderLoopController::new(device(), EffectPipeline::shared(), SceneConfig::default());
        assert!(matches!(
            controller.draw_frame(),
            Err(RenderError::NotReady(LoopState::Uninitialized))
        ));
    }

    #[test]
    fn test_frame_draws_static_objects_once() {
        let mut controller = running();
        controller.update(0.016);
        controller.draw_frame().unwrap();

        let journal = controller.device().journal();
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::DrawMesh(_))), 3);
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::BeginPass { .. })), 2);
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::DrawText(_))), 1);
        assert_eq!(journal.calls().last(), Some(&DeviceCall::Present));
        assert!(!journal.scene_open());
    }

    #[test]
    fn test_skinned_objects_are_not_submitted() {
        let mut config = SceneConfig::default();
        for object in &mut config.objects {
            object.technique = Technique::SkinnedMesh;
        }
        let mut controller = RenderLoopController::new(device(), EffectPipeline::shared(), config);
        controller.initialize().unwrap();
        controller.draw_frame().unwrap();

        let journal = controller.device().journal();
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::DrawMesh(_))), 0);
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::EndPass { .. })), 2);
    }

    #[test]
    fn test_device_lost_is_idempotent() {
        let mut controller = running();
        controller.on_device_lost();
        controller.on_device_lost();

        assert_eq!(controller.state(), LoopState::DeviceLost);
        let journal = controller.device().journal();
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::OverlayLost)), 1);
        assert_eq!(journal.count(|c| matches!(c, DeviceCall::EffectLost { .. })), 2);
        assert_eq!(journal.live_dependents(), 0);
    }

    #[test]
    fn test_reset_in_destroyed_is_ignored() {
        let mut controller = running();
        controller.shutdown();
        controller.on_device_reset();
        assert_eq!(controller.state(), LoopState::Destroyed);
    }

    #[test]
    fn test_unsupported_pixel_shader() {
        let caps = DeviceCaps {
            vertex_shader: ShaderModel::SM_3_0,
            pixel_shader: ShaderModel::SM_1_1,
        };
        let mut controller =
            RenderLoopController::new(device().with_caps(caps), EffectPipeline::shared(), SceneConfig::default());

        assert!(matches!(
            controller.initialize(),
            Err(RenderError::UnsupportedDevice { pixel, .. }) if pixel == ShaderModel::SM_1_1
        ));
        assert_eq!(controller.device().loaded_meshes(), 0);
    }

    #[test]
    fn test_shutdown_releases_newest_first() {
        let mut controller = running();
        let handles: Vec<_> = controller.scene().iter().map(|(_, o)| o.mesh_handle()).collect();
        controller.shutdown();
        controller.shutdown();

        let journal = controller.device().journal();
        let released: Vec<_> = journal
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::ReleaseMesh(handle) => Some(*handle),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = handles.into_iter().rev().collect();
        assert_eq!(released, expected);
        assert_eq!(controller.state(), LoopState::Destroyed);
        assert!(controller.stats().is_none());
    }
}
