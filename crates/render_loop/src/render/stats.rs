//! Frame statistics overlay
//!
//! Geometry counts are accumulated as meshes load; frame rate is sampled
//! once per refresh interval and drawn in the top-left corner.

use serde::{Deserialize, Serialize};

use crate::render::device::{Color, DeviceResult, FontDesc, GraphicsDevice, TextOverlay};

/// Statistics overlay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Draw the overlay
    pub enabled: bool,
    /// Seconds between frame-rate samples
    pub refresh_interval: f32,
    /// Overlay font
    pub font: FontDesc,
    /// Text color
    pub color: Color,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval: 1.0,
            font: FontDesc::default(),
            color: Color::BLACK,
        }
    }
}

/// Vertex/triangle counts and frame timing
pub struct FrameStats {
    overlay: Option<Box<dyn TextOverlay>>,
    color: Color,
    refresh_interval: f32,

    fps: f32,
    ms_per_frame: f32,
    vertex_count: u32,
    triangle_count: u32,

    frames: u32,
    elapsed: f32,
}

impl FrameStats {
    /// Create the stats block, creating the overlay font if enabled
    pub fn new<D: GraphicsDevice + ?Sized>(device: &mut D, config: &StatsConfig) -> DeviceResult<Self> {
        let overlay = if config.enabled {
            Some(device.create_text_overlay(&config.font)?)
        } else {
            None
        };

        Ok(Self {
            overlay,
            color: config.color,
            refresh_interval: config.refresh_interval.max(f32::EPSILON),
            fps: 0.0,
            ms_per_frame: 0.0,
            vertex_count: 0,
            triangle_count: 0,
            frames: 0,
            elapsed: 0.0,
        })
    }

    /// Add loaded vertices
    pub fn add_vertices(&mut self, n: u32) {
        self.vertex_count = self.vertex_count.saturating_add(n);
    }

    /// Remove unloaded vertices
    pub fn sub_vertices(&mut self, n: u32) {
        self.vertex_count = self.vertex_count.saturating_sub(n);
    }

    /// Add loaded triangles
    pub fn add_triangles(&mut self, n: u32) {
        self.triangle_count = self.triangle_count.saturating_add(n);
    }

    /// Remove unloaded triangles
    pub fn sub_triangles(&mut self, n: u32) {
        self.triangle_count = self.triangle_count.saturating_sub(n);
    }

    /// Count a frame and resample the rate once per refresh interval
    pub fn update(&mut self, dt: f32) {
        self.frames += 1;
        self.elapsed += dt;

        if self.elapsed >= self.refresh_interval {
            #[allow(clippy::cast_precision_loss)]
            let frames = self.frames as f32;
            self.fps = frames / self.elapsed;
            self.ms_per_frame = 1000.0 / self.fps;
            self.frames = 0;
            self.elapsed = 0.0;
        }
    }

    /// Overlay text for the current numbers
    pub fn text(&self) -> String {
        format!(
            "Frames Per Second = {:.2}\nMilliseconds Per Frame = {:.4}\nTriangle Count = {}\nVertex Count = {}",
            self.fps, self.ms_per_frame, self.triangle_count, self.vertex_count
        )
    }

    /// Draw the overlay; must run inside an open scene
    pub fn display(&mut self) -> DeviceResult<()> {
        let text = self.text();
        match self.overlay.as_mut() {
            Some(overlay) => overlay.draw_text(&text, 5, 5, self.color),
            None => Ok(()),
        }
    }

    /// Release the overlay's device state
    pub fn on_lost_device(&mut self) -> DeviceResult<()> {
        self.overlay.as_mut().map_or(Ok(()), |o| o.on_lost_device())
    }

    /// Reacquire the overlay's device state
    pub fn on_reset_device(&mut self) -> DeviceResult<()> {
        self.overlay.as_mut().map_or(Ok(()), |o| o.on_reset_device())
    }

    /// Frames per second at the last sample
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Milliseconds per frame at the last sample
    pub fn ms_per_frame(&self) -> f32 {
        self.ms_per_frame
    }

    /// Vertices of all loaded meshes
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Triangles of all loaded meshes
    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;
    use approx::assert_relative_eq;

    fn stats() -> FrameStats {
        let mut device = HeadlessDevice::new(320, 240);
        FrameStats::new(&mut device, &StatsConfig::default()).unwrap()
    }

    #[test]
    fn test_rate_sampled_once_per_second() {
        let mut stats = stats();
        for _ in 0..3 {
            stats.update(0.25);
        }
        assert_eq!(stats.fps(), 0.0);

        stats.update(0.25);
        assert_relative_eq!(stats.fps(), 4.0, epsilon = 1e-5);
        assert_relative_eq!(stats.ms_per_frame(), 250.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rate_is_frames_over_sampled_window() {
        let mut stats = stats();
        for _ in 0..4 {
            stats.update(0.3);
        }

        // Four frames over 1.2 s, not a raw count of four
        assert_relative_eq!(stats.fps(), 4.0 / 1.2, epsilon = 1e-4);
        assert_relative_eq!(stats.ms_per_frame(), 300.0, epsilon = 1e-2);
    }

    #[test]
    fn test_counts_saturate() {
        let mut stats = stats();
        stats.add_vertices(10);
        stats.add_triangles(4);
        stats.sub_vertices(20);
        stats.sub_triangles(1);

        assert_eq!(stats.vertex_count(), 0);
        assert_eq!(stats.triangle_count(), 3);
        assert!(stats.text().contains("Triangle Count = 3"));
    }

    #[test]
    fn test_disabled_overlay_draws_nothing() {
        let mut device = HeadlessDevice::new(320, 240);
        let config = StatsConfig {
            enabled: false,
            ..StatsConfig::default()
        };
        let mut stats = FrameStats::new(&mut device, &config).unwrap();

        assert!(stats.display().is_ok());
        assert!(stats.on_lost_device().is_ok());
        assert_eq!(device.journal().live_dependents(), 0);
    }
}
