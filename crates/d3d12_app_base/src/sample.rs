use windows::Win32::Graphics::Direct3D12::*;

use crate::config::SampleConfig;
use crate::d3d12::upload_context::UploadContext;
use crate::frame::FrameInfo;

pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.1, 0.25, 0.5, 0.0];

/// A demo hosted by the base application.
///
/// The base owns the device, swap chain and frame resources. A sample builds
/// its pipeline and static resources once in [`Sample::setup`] and then only
/// records draw commands into the base's command list every frame.
pub trait Sample: Sized {
    fn title() -> &'static str;

    fn clear_color(&self) -> [f32; 4] {
        DEFAULT_CLEAR_COLOR
    }

    fn setup(context: &mut SetupContext) -> eyre::Result<Self>;

    /// CPU side state for the coming frame.
    fn update(&mut self, _frame: &FrameInfo) {}

    /// Records draw commands. The render target, depth buffer, viewport and
    /// scissor are already bound and the target is cleared.
    fn record(
        &mut self,
        command_list: &ID3D12GraphicsCommandList,
        frame: &FrameInfo,
    ) -> eyre::Result<()>;

    /// Runs before the base waits for the GPU to go idle.
    fn cleanup(&mut self) {}
}

/// What a sample may touch while building its resources.
pub struct SetupContext<'a> {
    pub device: &'a ID3D12Device,
    pub command_queue: &'a ID3D12CommandQueue,
    pub config: &'a SampleConfig,
    pub width: u32,
    pub height: u32,
}

impl<'a> SetupContext<'a> {
    /// A recorder for staged uploads; its `finish` blocks until the copies land.
    pub fn upload_context(&self) -> eyre::Result<UploadContext<'a>> {
        UploadContext::new(
            self.device,
            self.command_queue,
            self.config.gpu_wait_timeout(),
        )
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}
