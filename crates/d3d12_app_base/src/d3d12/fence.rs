use std::time::Duration;

use eyre::bail;
use eyre::WrapErr;
use tracing::warn;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::*;

use crate::frame_pacing::FenceSignal;
use crate::frame_pacing::FrameFence;

/// An `ID3D12Fence` with the event the CPU blocks on.
pub struct D3D12FrameFence {
    fence: ID3D12Fence,
    event: HANDLE,
}

impl D3D12FrameFence {
    pub fn new(device: &ID3D12Device) -> eyre::Result<Self> {
        let fence: ID3D12Fence =
            unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }.wrap_err("CreateFence")?;
        let event = unsafe { CreateEventA(None, false, false, None) }.wrap_err("CreateEventA")?;
        if event.is_invalid() {
            bail!("CreateEventA returned an invalid handle");
        }
        Ok(Self { fence, event })
    }
}

impl FrameFence for D3D12FrameFence {
    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_for(&self, value: u64, timeout: Duration) -> eyre::Result<bool> {
        unsafe { self.fence.SetEventOnCompletion(value, self.event) }
            .wrap_err("SetEventOnCompletion")?;

        // INFINITE is u32::MAX; stay below it so the wait stays bounded.
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(INFINITE - 1);
        let result = unsafe { WaitForSingleObject(self.event, millis) };
        if result == WAIT_OBJECT_0 {
            Ok(true)
        } else if result == WAIT_TIMEOUT {
            Ok(false)
        } else {
            Err(windows::core::Error::from_win32()).wrap_err("WaitForSingleObject")
        }
    }
}

impl Drop for D3D12FrameFence {
    fn drop(&mut self) {
        if !self.event.is_invalid() {
            if let Err(e) = unsafe { CloseHandle(self.event) } {
                warn!("Closing fence event failed: {e}");
            }
        }
    }
}

impl FenceSignal<D3D12FrameFence> for ID3D12CommandQueue {
    fn signal(&self, fence: &D3D12FrameFence, value: u64) -> eyre::Result<()> {
        unsafe { self.Signal(&fence.fence, value) }.wrap_err("ID3D12CommandQueue::Signal")
    }
}
