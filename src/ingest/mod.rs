//! Camera frame sources.

pub mod esp32;

pub use esp32::{Esp32Config, Esp32Source};

use anyhow::Result;

use crate::frame::Frame;

/// Camera stream boundary.
///
/// Read errors are transient: the run loop logs them, backs off for a fixed
/// delay, calls `connect` again and keeps going. Nothing a source returns is
/// allowed to stop monitoring.
pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<()>;

    fn read_frame(&mut self) -> Result<Frame>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Source yielding blank frames at a fixed size. Stands in for a camera in
/// tests and wiring checks.
#[derive(Debug)]
pub struct StaticSource {
    width: u32,
    height: u32,
}

impl StaticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for StaticSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        Ok(Frame::blank(self.width, self.height))
    }
}
