//! Host-side frame driver
//!
//! One [`FrameDriver::tick`] is one iteration of the idle branch of a
//! message pump: poll the device, recover it if it can be reset, then
//! update and draw.

use crate::controller::{FrameHandler, RenderLoopController};
use crate::foundation::time::Timer;
use crate::render::{DeviceError, DeviceStatus, GraphicsDevice, RenderError};

/// Result of one driver tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was drawn and presented
    Presented,
    /// The device was unavailable; nothing was drawn
    Skipped,
}

/// A [`FrameHandler`] that also exposes its device to the driver
pub trait DeviceHost: FrameHandler {
    /// Device type driven by the host
    type Device: GraphicsDevice;

    /// Device used for status polling and resets
    fn device_mut(&mut self) -> &mut Self::Device;

    /// Whether draws would reach the device
    fn is_rendering(&self) -> bool;
}

impl<D: GraphicsDevice> DeviceHost for RenderLoopController<D> {
    type Device = D;

    fn device_mut(&mut self) -> &mut D {
        RenderLoopController::device_mut(self)
    }

    fn is_rendering(&self) -> bool {
        self.can_draw()
    }
}

/// Drives a [`DeviceHost`] one frame at a time
pub struct FrameDriver {
    timer: Timer,
    fixed_delta: Option<f32>,
    paused: bool,
    presented: u64,
    skipped: u64,
}

impl FrameDriver {
    /// Driver that measures wall-clock deltas
    pub fn new() -> Self {
        Self {
            timer: Timer::new(),
            fixed_delta: None,
            paused: false,
            presented: 0,
            skipped: 0,
        }
    }

    /// Driver that feeds the same delta every frame
    pub fn with_fixed_delta(delta: f32) -> Self {
        Self {
            fixed_delta: Some(delta),
            ..Self::new()
        }
    }

    /// Run one iteration against `host`
    ///
    /// # Errors
    /// Failed resets and device-call failures other than loss during the
    /// frame.
    pub fn tick<H: DeviceHost>(&mut self, host: &mut H) -> Result<FrameOutcome, RenderError> {
        match host.device_mut().cooperative_level() {
            DeviceStatus::Lost => {
                host.on_device_lost();
                self.paused = true;
                return Ok(self.skip());
            }
            DeviceStatus::NotReset => {
                host.on_device_lost();
                host.device_mut().reset()?;
                host.on_device_reset();
                self.paused = true;
            }
            DeviceStatus::Ready => {}
        }

        if self.paused {
            self.timer.resync();
            self.paused = false;
        }

        let dt = match self.fixed_delta {
            Some(dt) => {
                self.timer.advance(dt);
                dt
            }
            None => self.timer.update(),
        };
        host.update(dt);

        if !host.is_rendering() {
            return Ok(self.skip());
        }

        match host.draw_frame() {
            Ok(()) => {
                self.presented += 1;
                Ok(FrameOutcome::Presented)
            }
            Err(RenderError::Device(DeviceError::Lost)) => {
                log::warn!("Device lost during frame {}", self.timer.frame_count());
                host.on_device_lost();
                self.paused = true;
                Ok(self.skip())
            }
            Err(e) => Err(e),
        }
    }

    fn skip(&mut self) -> FrameOutcome {
        self.skipped += 1;
        FrameOutcome::Skipped
    }

    /// Frames presented so far
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Ticks that drew nothing
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Simulation time fed to `update` so far
    pub fn total_time(&self) -> f32 {
        self.timer.total_time()
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}
