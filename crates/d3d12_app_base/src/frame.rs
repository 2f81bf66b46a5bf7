/// What the base application knows about the frame being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Swap chain back buffer index; also selects the allocator, fence and any per-frame buffers.
    pub slot: usize,
    /// Frames submitted before this one.
    pub frame_number: u64,
    pub width: u32,
    pub height: u32,
}

impl FrameInfo {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_of_a_minimised_window_is_one() {
        let frame = FrameInfo {
            slot: 0,
            frame_number: 0,
            width: 640,
            height: 0,
        };
        assert_eq!(frame.aspect_ratio(), 1.0);
    }

    #[test]
    fn aspect_ratio_is_width_over_height() {
        let frame = FrameInfo {
            slot: 1,
            frame_number: 7,
            width: 1280,
            height: 720,
        };
        assert!((frame.aspect_ratio() - 16.0 / 9.0).abs() < f32::EPSILON);
    }
}
