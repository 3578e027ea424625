//! Begin/end-scene guard

use std::ops::{Deref, DerefMut};

use crate::render::device::{DeviceResult, GraphicsDevice};

/// An open scene on a device; `end_scene` runs on drop if `finish` was not
/// called, so early returns cannot leave the device mid-scene
pub struct FrameScope<'a, D: GraphicsDevice + ?Sized> {
    device: &'a mut D,
    open: bool,
}

impl<'a, D: GraphicsDevice + ?Sized> FrameScope<'a, D> {
    /// Call `begin_scene` and return the guard
    pub fn begin(device: &'a mut D) -> DeviceResult<Self> {
        device.begin_scene()?;
        Ok(Self { device, open: true })
    }

    /// Call `end_scene`, surfacing its result
    pub fn finish(mut self) -> DeviceResult<()> {
        self.open = false;
        self.device.end_scene()
    }
}

impl<D: GraphicsDevice + ?Sized> Deref for FrameScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.device
    }
}

impl<D: GraphicsDevice + ?Sized> DerefMut for FrameScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.device
    }
}

impl<D: GraphicsDevice + ?Sized> Drop for FrameScope<'_, D> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.device.end_scene() {
                log::error!("Failed to end scene: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;

    #[test]
    fn test_drop_ends_scene() {
        let mut device = HeadlessDevice::new(320, 240);
        {
            let _frame = FrameScope::begin(&mut device).unwrap();
        }
        assert!(!device.journal().scene_open());
    }

    #[test]
    fn test_finish_ends_scene_once() {
        let mut device = HeadlessDevice::new(320, 240);
        let frame = FrameScope::begin(&mut device).unwrap();
        frame.finish().unwrap();

        let journal = device.journal();
        assert_eq!(journal.count(|c| *c == crate::render::headless::DeviceCall::EndScene), 1);
    }
}
