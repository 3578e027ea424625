//! # Headless Device
//!
//! A [`GraphicsDevice`] that does no GPU work. It keeps the bookkeeping a
//! real driver would (scene/effect/pass nesting, loaded meshes, live
//! device-dependent resources, lost/reset status) and journals every call,
//! which makes it the backend for the demo binary and for tests.
//!
//! ## Device Loss
//! [`HeadlessDevice::simulate_loss`] puts the device into `Lost` for a
//! number of cooperative-level polls, after which it reports `NotReset`.
//! `reset` refuses to run while any effect or overlay still holds device
//! state, mirroring the rule that `on_lost_device` must precede a reset.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::foundation::math::{Mat4, Vec3};
use crate::render::device::{
    ClearFlags, Color, DeviceCaps, DeviceError, DeviceResult, DeviceStatus, FontDesc, GraphicsDevice, MeshHandle,
    MeshInfo, ShaderEffect, TextOverlay,
};
use crate::render::lighting::DirectionalLight;

/// One recorded device, effect or overlay call
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DeviceCall {
    Clear(ClearFlags),
    BeginScene,
    EndScene,
    Present,
    Reset { width: u32, height: u32 },
    LoadMesh(String),
    ReleaseMesh(MeshHandle),
    DrawMesh(MeshHandle),
    CreateEffect(String),
    CreateTextOverlay,
    SetTechnique { effect: String, technique: String },
    SetDirectionalLight { effect: String },
    SetEyePosition { effect: String },
    SetTransforms { effect: String },
    CommitChanges { effect: String },
    BeginEffect { effect: String },
    BeginPass { effect: String, pass: u32 },
    EndPass { effect: String },
    EndEffect { effect: String },
    EffectLost { effect: String },
    EffectReset { effect: String },
    DrawText(String),
    OverlayLost,
    OverlayReset,
}

/// Call log and nesting state shared by the device and its resources
#[derive(Debug, Default)]
pub struct Journal {
    calls: Vec<DeviceCall>,
    scene_open: bool,
    open_effects: u32,
    pass_open: bool,
    live_dependents: u32,
}

impl Journal {
    /// Every call in order
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(*c)).count()
    }

    /// Whether `begin_scene` is waiting for its `end_scene`
    pub fn scene_open(&self) -> bool {
        self.scene_open
    }

    /// Effects between `begin` and `end`
    pub fn open_effects(&self) -> u32 {
        self.open_effects
    }

    /// Whether an effect pass is open
    pub fn pass_open(&self) -> bool {
        self.pass_open
    }

    /// Effects and overlays still holding device state
    pub fn live_dependents(&self) -> u32 {
        self.live_dependents
    }

    fn record(&mut self, call: DeviceCall) {
        log::trace!("device call: {:?}", call);
        self.calls.push(call);
    }
}

type SharedJournal = Rc<RefCell<Journal>>;

fn invalid(message: impl Into<String>) -> DeviceError {
    DeviceError::InvalidCall(message.into())
}

/// GPU-less graphics device
pub struct HeadlessDevice {
    caps: DeviceCaps,
    extent: (u32, u32),
    pending_extent: Option<(u32, u32)>,
    status: DeviceStatus,
    lost_polls: u32,
    catalog: HashMap<String, (u32, u32)>,
    loaded: HashMap<MeshHandle, String>,
    next_mesh: u64,
    journal: SharedJournal,
}

impl HeadlessDevice {
    /// Create a device with default capabilities and an empty mesh catalog
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            caps: DeviceCaps::default(),
            extent: (width, height),
            pending_extent: None,
            status: DeviceStatus::Ready,
            lost_polls: 0,
            catalog: HashMap::new(),
            loaded: HashMap::new(),
            next_mesh: 1,
            journal: Rc::default(),
        }
    }

    /// Override the reported capabilities
    pub fn with_caps(mut self, caps: DeviceCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Make a mesh name loadable with the given geometry counts
    pub fn with_mesh(mut self, name: impl Into<String>, vertices: u32, faces: u32) -> Self {
        self.catalog.insert(name.into(), (vertices, faces));
        self
    }

    /// Borrow the call journal
    pub fn journal(&self) -> Ref<'_, Journal> {
        self.journal.borrow()
    }

    /// Lose the device; it reports `Lost` for `polls` cooperative-level
    /// queries and `NotReset` afterwards
    pub fn simulate_loss(&mut self, polls: u32) {
        log::info!("Simulating device loss ({} polls)", polls);
        self.lost_polls = polls;
        self.status = if polls == 0 { DeviceStatus::NotReset } else { DeviceStatus::Lost };
    }

    /// Change the backbuffer size; takes effect on the next `reset`
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_extent = Some((width, height));
        self.status = DeviceStatus::NotReset;
    }

    /// Meshes currently loaded
    pub fn loaded_meshes(&self) -> usize {
        self.loaded.len()
    }

    fn ensure_usable(&self) -> DeviceResult<()> {
        match self.status {
            DeviceStatus::Ready => Ok(()),
            DeviceStatus::Lost | DeviceStatus::NotReset => Err(DeviceError::Lost),
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> DeviceCaps {
        self.caps
    }

    fn backbuffer_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn cooperative_level(&mut self) -> DeviceStatus {
        if self.status == DeviceStatus::Lost {
            if self.lost_polls <= 1 {
                self.lost_polls = 0;
                self.status = DeviceStatus::NotReset;
                return DeviceStatus::Lost;
            }
            self.lost_polls -= 1;
        }
        self.status
    }

    fn reset(&mut self) -> DeviceResult<()> {
        if self.status == DeviceStatus::Lost {
            return Err(DeviceError::Lost);
        }
        let mut journal = self.journal.borrow_mut();
        if journal.live_dependents > 0 {
            return Err(invalid(format!(
                "reset with {} device-dependent resources still alive",
                journal.live_dependents
            )));
        }
        if let Some(extent) = self.pending_extent.take() {
            self.extent = extent;
        }
        journal.record(DeviceCall::Reset {
            width: self.extent.0,
            height: self.extent.1,
        });
        self.status = DeviceStatus::Ready;
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, _color: Color, _depth: f32, _stencil: u32) -> DeviceResult<()> {
        self.ensure_usable()?;
        self.journal.borrow_mut().record(DeviceCall::Clear(flags));
        Ok(())
    }

    fn begin_scene(&mut self) -> DeviceResult<()> {
        self.ensure_usable()?;
        let mut journal = self.journal.borrow_mut();
        if journal.scene_open {
            return Err(invalid("begin_scene inside an open scene"));
        }
        journal.scene_open = true;
        journal.record(DeviceCall::BeginScene);
        Ok(())
    }

    fn end_scene(&mut self) -> DeviceResult<()> {
        let mut journal = self.journal.borrow_mut();
        if !journal.scene_open {
            return Err(invalid("end_scene without begin_scene"));
        }
        journal.scene_open = false;
        journal.record(DeviceCall::EndScene);
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.ensure_usable()?;
        let mut journal = self.journal.borrow_mut();
        if journal.scene_open {
            return Err(invalid("present inside an open scene"));
        }
        journal.record(DeviceCall::Present);
        Ok(())
    }

    fn load_mesh(&mut self, name: &str) -> DeviceResult<MeshInfo> {
        let (vertex_count, face_count) = *self
            .catalog
            .get(name)
            .ok_or_else(|| DeviceError::AssetNotFound(name.to_string()))?;
        let handle = MeshHandle(self.next_mesh);
        self.next_mesh += 1;
        self.loaded.insert(handle, name.to_string());
        self.journal.borrow_mut().record(DeviceCall::LoadMesh(name.to_string()));
        Ok(MeshInfo {
            handle,
            vertex_count,
            face_count,
        })
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        if self.loaded.remove(&mesh).is_some() {
            self.journal.borrow_mut().record(DeviceCall::ReleaseMesh(mesh));
        } else {
            log::warn!("Release of unknown mesh {:?}", mesh);
        }
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> DeviceResult<()> {
        self.ensure_usable()?;
        if !self.loaded.contains_key(&mesh) {
            return Err(invalid(format!("draw of unloaded mesh {mesh:?}")));
        }
        let mut journal = self.journal.borrow_mut();
        if !journal.scene_open || !journal.pass_open {
            return Err(invalid("draw outside an open scene and effect pass"));
        }
        journal.record(DeviceCall::DrawMesh(mesh));
        Ok(())
    }

    fn create_effect(&mut self, source: &str) -> DeviceResult<Box<dyn ShaderEffect>> {
        let mut journal = self.journal.borrow_mut();
        journal.record(DeviceCall::CreateEffect(source.to_string()));
        journal.live_dependents += 1;
        Ok(Box::new(HeadlessEffect {
            source: source.to_string(),
            journal: Rc::clone(&self.journal),
            technique: None,
            begun: false,
            lost: false,
        }))
    }

    fn create_text_overlay(&mut self, font: &FontDesc) -> DeviceResult<Box<dyn TextOverlay>> {
        log::debug!("Creating text overlay with font {:?}", font);
        let mut journal = self.journal.borrow_mut();
        journal.record(DeviceCall::CreateTextOverlay);
        journal.live_dependents += 1;
        Ok(Box::new(HeadlessOverlay {
            journal: Rc::clone(&self.journal),
            lost: false,
        }))
    }
}

struct HeadlessEffect {
    source: String,
    journal: SharedJournal,
    technique: Option<String>,
    begun: bool,
    lost: bool,
}

impl HeadlessEffect {
    fn record(&self, call: DeviceCall) {
        self.journal.borrow_mut().record(call);
    }

    fn effect(&self) -> String {
        self.source.clone()
    }
}

impl ShaderEffect for HeadlessEffect {
    fn source(&self) -> &str {
        &self.source
    }

    fn set_technique(&mut self, technique: &str) -> DeviceResult<()> {
        if self.begun {
            return Err(invalid("set_technique between begin and end"));
        }
        self.technique = Some(technique.to_string());
        self.record(DeviceCall::SetTechnique {
            effect: self.effect(),
            technique: technique.to_string(),
        });
        Ok(())
    }

    fn set_directional_light(&mut self, _light: &DirectionalLight) -> DeviceResult<()> {
        self.record(DeviceCall::SetDirectionalLight { effect: self.effect() });
        Ok(())
    }

    fn set_eye_position(&mut self, _eye: &Vec3) -> DeviceResult<()> {
        self.record(DeviceCall::SetEyePosition { effect: self.effect() });
        Ok(())
    }

    fn set_transforms(&mut self, _world: &Mat4, _world_view_proj: &Mat4) -> DeviceResult<()> {
        self.record(DeviceCall::SetTransforms { effect: self.effect() });
        Ok(())
    }

    fn begin(&mut self) -> DeviceResult<u32> {
        if self.technique.is_none() || self.begun || self.lost {
            return Err(invalid(format!("begin on {} in wrong state", self.source)));
        }
        self.begun = true;
        let mut journal = self.journal.borrow_mut();
        journal.open_effects += 1;
        journal.record(DeviceCall::BeginEffect { effect: self.effect() });
        Ok(1)
    }

    fn begin_pass(&mut self, pass: u32) -> DeviceResult<()> {
        let mut journal = self.journal.borrow_mut();
        if !self.begun || journal.pass_open {
            return Err(invalid(format!("begin_pass on {} in wrong state", self.source)));
        }
        journal.pass_open = true;
        journal.record(DeviceCall::BeginPass {
            effect: self.effect(),
            pass,
        });
        Ok(())
    }

    fn commit_changes(&mut self) -> DeviceResult<()> {
        self.record(DeviceCall::CommitChanges { effect: self.effect() });
        Ok(())
    }

    fn end_pass(&mut self) -> DeviceResult<()> {
        let mut journal = self.journal.borrow_mut();
        if !journal.pass_open {
            return Err(invalid("end_pass without begin_pass"));
        }
        journal.pass_open = false;
        journal.record(DeviceCall::EndPass { effect: self.effect() });
        Ok(())
    }

    fn end(&mut self) -> DeviceResult<()> {
        if !self.begun {
            return Err(invalid("end without begin"));
        }
        self.begun = false;
        let mut journal = self.journal.borrow_mut();
        journal.open_effects -= 1;
        journal.record(DeviceCall::EndEffect { effect: self.effect() });
        Ok(())
    }

    fn on_lost_device(&mut self) -> DeviceResult<()> {
        if !self.lost {
            self.lost = true;
            let mut journal = self.journal.borrow_mut();
            journal.live_dependents -= 1;
            journal.record(DeviceCall::EffectLost { effect: self.effect() });
        }
        Ok(())
    }

    fn on_reset_device(&mut self) -> DeviceResult<()> {
        if self.lost {
            self.lost = false;
            let mut journal = self.journal.borrow_mut();
            journal.live_dependents += 1;
            journal.record(DeviceCall::EffectReset { effect: self.effect() });
        }
        Ok(())
    }
}

impl Drop for HeadlessEffect {
    fn drop(&mut self) {
        if !self.lost {
            self.journal.borrow_mut().live_dependents -= 1;
        }
    }
}

struct HeadlessOverlay {
    journal: SharedJournal,
    lost: bool,
}

impl TextOverlay for HeadlessOverlay {
    fn draw_text(&mut self, text: &str, _x: i32, _y: i32, _color: Color) -> DeviceResult<()> {
        let mut journal = self.journal.borrow_mut();
        if self.lost || !journal.scene_open {
            return Err(invalid("draw_text outside a scene or while lost"));
        }
        journal.record(DeviceCall::DrawText(text.to_string()));
        Ok(())
    }

    fn on_lost_device(&mut self) -> DeviceResult<()> {
        if !self.lost {
            self.lost = true;
            let mut journal = self.journal.borrow_mut();
            journal.live_dependents -= 1;
            journal.record(DeviceCall::OverlayLost);
        }
        Ok(())
    }

    fn on_reset_device(&mut self) -> DeviceResult<()> {
        if self.lost {
            self.lost = false;
            let mut journal = self.journal.borrow_mut();
            journal.live_dependents += 1;
            journal.record(DeviceCall::OverlayReset);
        }
        Ok(())
    }
}

impl Drop for HeadlessOverlay {
    fn drop(&mut self) {
        if !self.lost {
            self.journal.borrow_mut().live_dependents -= 1;
        }
    }
}
