//! Display window sink (feature: display).

use anyhow::{anyhow, Result};
use minifb::{Key, Window, WindowOptions};

use super::{annotated_image, AnnotationSink};
use crate::pipeline::FrameOutcome;

/// Single named window, updated once per frame.
///
/// The window is created lazily from the first frame's dimensions and
/// recreated if the frame size changes.
pub struct WindowSink {
    title: String,
    window: Option<Window>,
    size: (usize, usize),
    closed: bool,
}

impl WindowSink {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            size: (0, 0),
            closed: false,
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() || self.size != (width, height) {
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .map_err(|e| anyhow!("failed to open window '{}': {}", self.title, e))?;
            self.window = Some(window);
            self.size = (width, height);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow!("window '{}' unavailable", self.title))
    }
}

impl AnnotationSink for WindowSink {
    fn render(&mut self, frame: &FrameOutcome) -> Result<()> {
        let image = annotated_image(frame);
        let (width, height) = (image.width() as usize, image.height() as usize);
        let argb: Vec<u32> = image
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect();

        let window = self.window_for(width, height)?;
        window
            .update_with_buffer(&argb, width, height)
            .map_err(|e| anyhow!("window update failed: {}", e))?;
        if !window.is_open() || window.is_key_down(Key::Escape) {
            self.closed = true;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}
