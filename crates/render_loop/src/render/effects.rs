//! # Effect Pipeline
//!
//! Owns the two compiled effects the viewer draws with and enforces the
//! nested acquisition protocol around them:
//!
//! ```text
//! bind(technique)
//! begin()            -> pass count
//!     begin_pass(i)
//!         set_transforms / commit / device draws
//!     end_pass()
//! end()
//! ```
//!
//! Breaking the nesting (a second `begin`, `end` with an open pass, a pass
//! outside `begin`, ...) is a programming error and panics. Device failures
//! inside a well-nested sequence are ordinary `DeviceError`s.
//!
//! [`EffectScope`] and [`PassScope`] close their half of the protocol on
//! drop, so `?` inside a pass still leaves the pipeline balanced.
//!
//! The pipeline is process-wide: one instance is created at startup, shared
//! through [`SharedPipeline`], initialized once and destroyed once. Clients
//! that render through it register themselves and report device loss and
//! reset with their [`ClientId`]. The effects release their device state on
//! the first reported loss and reacquire it once no client is still lost;
//! in between the pipeline is suspended and nobody may draw through it.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Vec3};
use crate::render::device::{DeviceError, DeviceResult, GraphicsDevice, ShaderEffect};
use crate::render::lighting::DirectionalLight;

/// Shared handle to the process-wide pipeline
pub type SharedPipeline = Rc<RefCell<EffectPipeline>>;

/// The techniques the viewer renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// Per-pixel directional lighting for static meshes
    StaticMesh,
    /// Two-bone vertex blending for skinned meshes
    SkinnedMesh,
}

impl Technique {
    /// Draw order within a frame
    pub const ALL: [Self; 2] = [Self::StaticMesh, Self::SkinnedMesh];

    /// Effect source compiled for this technique
    pub const fn effect_source(self) -> &'static str {
        match self {
            Self::StaticMesh => "PhongDirLtTex.fx",
            Self::SkinnedMesh => "VBlend2.fx",
        }
    }

    /// Technique name inside the effect
    pub const fn technique_name(self) -> &'static str {
        match self {
            Self::StaticMesh => "PhongDirLtTexTech",
            Self::SkinnedMesh => "VBlend2Tech",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::StaticMesh => 0,
            Self::SkinnedMesh => 1,
        }
    }
}

/// Identifies a client registered for device notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Bound(Technique),
    Active { technique: Technique, passes: u32 },
    InPass { technique: Technique, passes: u32 },
}

/// Compiled effects plus the begin/end protocol state
pub struct EffectPipeline {
    effects: Vec<Box<dyn ShaderEffect>>,
    clients: Vec<ClientId>,
    lost: Vec<ClientId>,
    suspended: bool,
    phase: Phase,
}

impl EffectPipeline {
    /// Create an empty, uninitialized pipeline
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            clients: Vec::new(),
            lost: Vec::new(),
            suspended: false,
            phase: Phase::Idle,
        }
    }

    /// Create an empty pipeline behind a shared handle
    pub fn shared() -> SharedPipeline {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Compile every technique's effect; a second call is a no-op
    pub fn init_all<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> DeviceResult<()> {
        if self.is_initialized() {
            log::debug!("Effect pipeline already initialized");
            return Ok(());
        }

        let mut effects = Vec::with_capacity(Technique::ALL.len());
        for technique in Technique::ALL {
            effects.push(device.create_effect(technique.effect_source())?);
            log::debug!("Compiled effect {} for {:?}", technique.effect_source(), technique);
        }
        self.effects = effects;
        log::info!("Effect pipeline initialized with {} effects", self.effects.len());
        Ok(())
    }

    /// Release every effect, newest first
    ///
    /// # Panics
    /// If a technique is still bound or active.
    pub fn destroy_all(&mut self) {
        assert_eq!(self.phase, Phase::Idle, "effect pipeline destroyed while a technique is in use");
        if !self.clients.is_empty() {
            log::warn!("Destroying effect pipeline with {} registered clients", self.clients.len());
        }
        while let Some(effect) = self.effects.pop() {
            log::debug!("Released effect {}", effect.source());
        }
        self.lost.clear();
        self.suspended = false;
    }

    /// Whether `init_all` has run
    pub fn is_initialized(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Add a client to the device-notification list
    pub fn register(&mut self, client: ClientId) {
        if !self.clients.contains(&client) {
            self.clients.push(client);
        }
    }

    /// Remove a client from the device-notification list
    ///
    /// A lost client leaving does not keep the remaining clients suspended.
    pub fn unregister(&mut self, client: ClientId) -> bool {
        let before = self.clients.len();
        self.clients.retain(|c| *c != client);
        self.lost.retain(|c| *c != client);

        if self.suspended && self.lost.is_empty() && !self.clients.is_empty() {
            if let Err(e) = self.restore() {
                log::error!("Failed to restore effects after {:?} left: {}", client, e);
            }
        }
        before != self.clients.len()
    }

    /// Clients currently registered
    pub fn registered_clients(&self) -> &[ClientId] {
        &self.clients
    }

    /// Clients whose device loss has not been followed by a reset
    pub fn lost_clients(&self) -> &[ClientId] {
        &self.lost
    }

    /// Whether the effects are released until every lost client resets
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Record `client`'s device loss; the first loss releases every effect
    pub fn on_lost_device(&mut self, client: ClientId) -> DeviceResult<()> {
        if !self.lost.contains(&client) {
            self.lost.push(client);
        }
        if self.suspended || !self.is_initialized() {
            return Ok(());
        }

        for effect in &mut self.effects {
            effect.on_lost_device()?;
        }
        self.suspended = true;
        log::debug!("Effects released after device loss reported by {:?}", client);
        Ok(())
    }

    /// Record `client`'s reset; effects reacquire once no client is lost
    pub fn on_reset_device(&mut self, client: ClientId) -> DeviceResult<()> {
        self.lost.retain(|c| *c != client);
        if !self.lost.is_empty() {
            log::debug!("{:?} reset; still waiting on {:?}", client, self.lost);
            return Ok(());
        }
        self.restore()
    }

    fn restore(&mut self) -> DeviceResult<()> {
        if !self.suspended {
            return Ok(());
        }
        for effect in &mut self.effects {
            effect.on_reset_device()?;
        }
        self.suspended = false;
        log::debug!("Effects reacquired device state");
        Ok(())
    }

    /// Upload the directional light for one technique
    pub fn set_directional_light(&mut self, technique: Technique, light: &DirectionalLight) -> DeviceResult<()> {
        self.effect_mut(technique)?.set_directional_light(light)
    }

    /// Upload the eye position to every effect
    pub fn set_eye_position(&mut self, eye: &Vec3) -> DeviceResult<()> {
        for effect in &mut self.effects {
            effect.set_eye_position(eye)?;
        }
        Ok(())
    }

    /// Select the technique for the next `begin`
    ///
    /// # Panics
    /// If a technique is already active.
    pub fn bind(&mut self, technique: Technique) -> DeviceResult<()> {
        assert!(
            matches!(self.phase, Phase::Idle | Phase::Bound(_)),
            "bind({technique:?}) while {:?}",
            self.phase
        );
        self.effect_mut(technique)?.set_technique(technique.technique_name())?;
        self.phase = Phase::Bound(technique);
        Ok(())
    }

    /// Begin the bound technique and return its pass count
    ///
    /// # Panics
    /// If nothing is bound or the technique already began.
    pub fn begin(&mut self) -> DeviceResult<u32> {
        let Phase::Bound(technique) = self.phase else {
            panic!("begin() while {:?}", self.phase);
        };
        let passes = self.effect_mut(technique)?.begin()?;
        self.phase = Phase::Active { technique, passes };
        Ok(passes)
    }

    /// Begin pass `pass` of the active technique
    ///
    /// # Panics
    /// Outside `begin`/`end`, with a pass already open, or for an
    /// out-of-range pass index.
    pub fn begin_pass(&mut self, pass: u32) -> DeviceResult<()> {
        let Phase::Active { technique, passes } = self.phase else {
            panic!("begin_pass({pass}) while {:?}", self.phase);
        };
        assert!(pass < passes, "pass {pass} out of range for {technique:?} ({passes} passes)");
        self.effect_mut(technique)?.begin_pass(pass)?;
        self.phase = Phase::InPass { technique, passes };
        Ok(())
    }

    /// Upload per-object transforms inside the open pass
    ///
    /// # Panics
    /// Without an open pass.
    pub fn set_transforms(&mut self, world: &Mat4, world_view_proj: &Mat4) -> DeviceResult<()> {
        let technique = self.open_pass_technique("set_transforms");
        self.effect_mut(technique)?.set_transforms(world, world_view_proj)
    }

    /// Flush parameter changes inside the open pass
    ///
    /// # Panics
    /// Without an open pass.
    pub fn commit(&mut self) -> DeviceResult<()> {
        let technique = self.open_pass_technique("commit");
        self.effect_mut(technique)?.commit_changes()
    }

    /// End the open pass
    ///
    /// # Panics
    /// Without an open pass.
    pub fn end_pass(&mut self) -> DeviceResult<()> {
        let Phase::InPass { technique, passes } = self.phase else {
            panic!("end_pass() while {:?}", self.phase);
        };
        self.phase = Phase::Active { technique, passes };
        self.effect_mut(technique)?.end_pass()
    }

    /// End the active technique
    ///
    /// # Panics
    /// Outside `begin`/`end` or with a pass still open.
    pub fn end(&mut self) -> DeviceResult<()> {
        let Phase::Active { technique, .. } = self.phase else {
            panic!("end() while {:?}", self.phase);
        };
        self.phase = Phase::Idle;
        self.effect_mut(technique)?.end()
    }

    /// Bind and begin `technique`; the returned scope ends it on drop
    pub fn scope(&mut self, technique: Technique) -> DeviceResult<EffectScope<'_>> {
        self.bind(technique)?;
        let passes = self.begin()?;
        Ok(EffectScope {
            pipeline: self,
            technique,
            passes,
            open: true,
        })
    }

    /// Whether a technique is currently between `begin` and `end`
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. } | Phase::InPass { .. })
    }

    fn open_pass_technique(&self, op: &str) -> Technique {
        match self.phase {
            Phase::InPass { technique, .. } => technique,
            other => panic!("{op}() outside a pass ({other:?})"),
        }
    }

    fn effect_mut(&mut self, technique: Technique) -> DeviceResult<&mut (dyn ShaderEffect + 'static)> {
        self.effects
            .get_mut(technique.index())
            .map(|effect| &mut **effect)
            .ok_or_else(|| DeviceError::InvalidCall("effect pipeline not initialized".to_string()))
    }
}

impl Default for EffectPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// An active technique; ends it when dropped
pub struct EffectScope<'a> {
    pipeline: &'a mut EffectPipeline,
    technique: Technique,
    passes: u32,
    open: bool,
}

impl EffectScope<'_> {
    /// Technique this scope runs
    pub fn technique(&self) -> Technique {
        self.technique
    }

    /// Number of passes reported by `begin`
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Begin a pass; the returned scope ends it on drop
    pub fn pass(&mut self, pass: u32) -> DeviceResult<PassScope<'_>> {
        self.pipeline.begin_pass(pass)?;
        Ok(PassScope {
            pipeline: &mut *self.pipeline,
            open: true,
        })
    }

    /// End the technique, surfacing the device result
    pub fn finish(mut self) -> DeviceResult<()> {
        self.open = false;
        self.pipeline.end()
    }
}

impl Drop for EffectScope<'_> {
    fn drop(&mut self) {
        if self.open && self.pipeline.is_active() {
            if let Err(e) = self.pipeline.end() {
                log::error!("Failed to end {:?}: {}", self.technique, e);
            }
        }
    }
}

/// An open pass; ends it when dropped
pub struct PassScope<'a> {
    pipeline: &'a mut EffectPipeline,
    open: bool,
}

impl PassScope<'_> {
    /// Upload per-object transforms
    pub fn set_transforms(&mut self, world: &Mat4, world_view_proj: &Mat4) -> DeviceResult<()> {
        self.pipeline.set_transforms(world, world_view_proj)
    }

    /// Flush parameter changes before a draw
    pub fn commit(&mut self) -> DeviceResult<()> {
        self.pipeline.commit()
    }

    /// End the pass, surfacing the device result
    pub fn finish(mut self) -> DeviceResult<()> {
        self.open = false;
        self.pipeline.end_pass()
    }
}

impl Drop for PassScope<'_> {
    fn drop(&mut self) {
        if self.open && matches!(self.pipeline.phase, Phase::InPass { .. }) {
            if let Err(e) = self.pipeline.end_pass() {
                log::error!("Failed to end pass: {}", e);
            }
        }
    }
}
