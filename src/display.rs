//! Interface contracts toward the renderer. The actual OpenGL display and
//! HID input live outside this crate; the coordinator only ever talks to
//! these traits.

use glam::Vec2;
use log::info;

use crate::domain::Extent;

/// Maps display-space coordinates (the renderer's [-1, 1] clip square)
/// into simulation space.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    pub scale: Vec2,
    pub offset: Vec2,
}

impl Projection {
    pub fn for_extent(extent: &Extent) -> Self {
        Self {
            scale: extent.side_lengths() * 0.5,
            offset: extent.center(),
        }
    }

    pub fn to_simulation(&self, x: f32, y: f32, _z: f32) -> Vec2 {
        Vec2::new(x, y) * self.scale + self.offset
    }
}

/// One gathered frame, decoded back into simulation space. `counts[i]` is
/// the number of positions contributed by worker `i` (rank `i + 1`).
pub struct FrameData {
    pub frame: u64,
    pub positions: Vec<Vec2>,
    pub counts: Vec<usize>,
}

pub trait Display {
    fn frame(&mut self, frame: &FrameData, projection: &Projection);
}

/// Sink for headless runs; logs a digest once a second of wall-clock
/// frames.
#[derive(Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn frame(&mut self, frame: &FrameData, _projection: &Projection) {
        if frame.frame % 60 == 0 {
            info!(
                "frame {:>6}: {} particles from {} workers",
                frame.frame,
                frame.positions.len(),
                frame.counts.len()
            );
        }
    }
}
