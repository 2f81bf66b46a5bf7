use std::time::Duration;

use eyre::WrapErr;
use tracing::debug;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::d3d12::barrier::transition_barrier;
use crate::d3d12::buffer::buffer_desc;
use crate::d3d12::buffer::create_committed_resource;
use crate::d3d12::buffer::create_upload_buffer;
use crate::d3d12::buffer::write_buffer;
use crate::d3d12::fence::D3D12FrameFence;
use crate::frame_pacing::wait_for_value;
use crate::frame_pacing::FenceSignal;
use crate::frame_pacing::FenceUse;
use crate::upload::TextureFootprint;

/// Records one-off copies from UPLOAD staging buffers into DEFAULT heap resources.
///
/// Nothing is copied until [`UploadContext::finish`], which submits the copies
/// and blocks until the GPU has executed them. The staging buffers live until then.
pub struct UploadContext<'a> {
    device: &'a ID3D12Device,
    queue: &'a ID3D12CommandQueue,
    // Keep the allocator alive as long as the list recorded into it.
    _allocator: ID3D12CommandAllocator,
    command_list: ID3D12GraphicsCommandList,
    staging: Vec<ID3D12Resource>,
    timeout: Duration,
}

impl<'a> UploadContext<'a> {
    pub fn new(
        device: &'a ID3D12Device,
        queue: &'a ID3D12CommandQueue,
        timeout: Duration,
    ) -> eyre::Result<Self> {
        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                .wrap_err("CreateCommandAllocator for uploads")?;
        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None)
        }
        .wrap_err("CreateCommandList for uploads")?;

        Ok(Self {
            device,
            queue,
            _allocator: allocator,
            command_list,
            staging: Vec::new(),
            timeout,
        })
    }

    /// Copies `bytes` into a new DEFAULT heap buffer left in `final_state`.
    ///
    /// Buffers always start in COMMON and are promoted to COPY_DEST by the copy.
    pub fn upload_buffer(
        &mut self,
        bytes: &[u8],
        final_state: D3D12_RESOURCE_STATES,
        name: &str,
    ) -> eyre::Result<ID3D12Resource> {
        let size = bytes.len() as u64;
        let buffer = create_committed_resource(
            self.device,
            D3D12_HEAP_TYPE_DEFAULT,
            &buffer_desc(size),
            D3D12_RESOURCE_STATE_COMMON,
            None,
            name,
        )?;

        let staging = create_upload_buffer(self.device, size, &format!("{name} (staging)"))?;
        write_buffer(&staging, bytes)?;

        unsafe {
            self.command_list
                .CopyBufferRegion(&buffer, 0, &staging, 0, size);
            self.command_list.ResourceBarrier(&[transition_barrier(
                &buffer,
                D3D12_RESOURCE_STATE_COPY_DEST,
                final_state,
            )]);
        }

        debug!("Queued {size} byte upload for {name}");
        self.staging.push(staging);
        Ok(buffer)
    }

    /// Copies tightly packed RGBA8 pixels into a new texture readable by pixel shaders.
    pub fn upload_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        name: &str,
    ) -> eyre::Result<ID3D12Resource> {
        let footprint = TextureFootprint::new(width, height, 4)?;

        let texture_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Alignment: 0,
            Width: u64::from(width),
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAG_NONE,
        };
        let texture = create_committed_resource(
            self.device,
            D3D12_HEAP_TYPE_DEFAULT,
            &texture_desc,
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
            name,
        )?;

        let mut pitched = vec![0u8; footprint.staging_size() as usize];
        footprint.copy_rows(pixels, &mut pitched)?;
        let staging =
            create_upload_buffer(self.device, footprint.staging_size(), &format!("{name} (staging)"))?;
        write_buffer(&staging, &pitched)?;

        let destination = D3D12_TEXTURE_COPY_LOCATION {
            // Borrowed, like the barrier helper.
            pResource: unsafe { std::mem::transmute_copy(&texture) },
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: 0,
            },
        };
        let source = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&staging) },
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                    Offset: 0,
                    Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                        Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                        Width: width,
                        Height: height,
                        Depth: 1,
                        RowPitch: footprint.row_pitch,
                    },
                },
            },
        };

        unsafe {
            self.command_list
                .CopyTextureRegion(&destination, 0, 0, 0, &source, None);
            self.command_list.ResourceBarrier(&[transition_barrier(
                &texture,
                D3D12_RESOURCE_STATE_COPY_DEST,
                D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
            )]);
        }

        debug!("Queued {width}x{height} texture upload for {name}");
        self.staging.push(staging);
        Ok(texture)
    }

    /// Submits the recorded copies and waits for the GPU to finish them.
    pub fn finish(self) -> eyre::Result<()> {
        unsafe { self.command_list.Close() }.wrap_err("closing upload command list")?;
        let command_list: ID3D12CommandList = self.command_list.cast()?;
        unsafe { self.queue.ExecuteCommandLists(&[Some(command_list)]) };

        let fence = D3D12FrameFence::new(self.device)?;
        self.queue.signal(&fence, 1)?;
        wait_for_value(&fence, 1, self.timeout, FenceUse::Uploads)?;

        debug!("Uploads complete, releasing {} staging buffers", self.staging.len());
        Ok(())
    }
}
