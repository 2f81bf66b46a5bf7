//! The per-sample Direct3D 12 scaffolding: device, swap chain, render target
//! and depth views, per-frame allocators and the paced render loop.

use eyre::bail;
use eyre::WrapErr;
use tracing::debug;
use tracing::info;
use windows::core::Interface;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::UI::WindowsAndMessaging::GetClientRect;

use crate::config::SampleConfig;
use crate::d3d12::barrier::transition_barrier;
use crate::d3d12::buffer::create_committed_resource;
use crate::d3d12::debug_messages::log_dxgi_debug_messages;
use crate::d3d12::device::create_device;
use crate::d3d12::device::DeviceBundle;
use crate::d3d12::fence::D3D12FrameFence;
use crate::d3d12::pipeline::DEPTH_FORMAT;
use crate::d3d12::pipeline::RENDER_TARGET_FORMAT;
use crate::d3d12::upload_context::UploadContext;
use crate::frame::FrameInfo;
use crate::frame_pacing::FramePacer;
use crate::frame_pacing::FRAME_COUNT;
use crate::sample::Sample;
use crate::sample::SetupContext;

pub struct D3D12AppBase {
    config: SampleConfig,
    // Kept alive for the swap chain's window association.
    _dxgi_factory: IDXGIFactory4,
    device: ID3D12Device,
    info_queue: Option<IDXGIInfoQueue>,
    command_queue: ID3D12CommandQueue,
    swap_chain: IDXGISwapChain3,
    render_targets: [ID3D12Resource; FRAME_COUNT],
    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: usize,
    dsv_heap: ID3D12DescriptorHeap,
    _depth_buffer: ID3D12Resource,
    command_allocators: [ID3D12CommandAllocator; FRAME_COUNT],
    command_list: ID3D12GraphicsCommandList,
    pacer: FramePacer<D3D12FrameFence, FRAME_COUNT>,
    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,
    width: u32,
    height: u32,
    frame_number: u64,
}

impl D3D12AppBase {
    pub fn new(config: &SampleConfig, hwnd: HWND) -> eyre::Result<Self> {
        let bundle = create_device(config)?;
        // The debug layer explains most failures past this point.
        let info_queue = bundle.info_queue.clone();
        Self::with_device(config, hwnd, bundle)
            .inspect_err(|_| log_dxgi_debug_messages(&info_queue))
    }

    fn with_device(config: &SampleConfig, hwnd: HWND, bundle: DeviceBundle) -> eyre::Result<Self> {
        let device = bundle.device;

        let (width, height) = client_size(hwnd)?;
        info!("Creating {FRAME_COUNT} buffer swap chain at {width}x{height}");

        let command_queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                ..Default::default()
            })
        }
        .wrap_err("CreateCommandQueue")?;

        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            BufferCount: FRAME_COUNT as u32,
            Width: width,
            Height: height,
            Format: RENDER_TARGET_FORMAT,
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let swap_chain: IDXGISwapChain1 = unsafe {
            bundle.dxgi_factory.CreateSwapChainForHwnd(
                &command_queue,
                hwnd,
                &swap_chain_desc,
                None,
                None,
            )
        }
        .wrap_err("CreateSwapChainForHwnd")?;
        let swap_chain: IDXGISwapChain3 = swap_chain.cast()?;

        // Fullscreen transitions are not supported.
        unsafe {
            bundle
                .dxgi_factory
                .MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)
        }
        .wrap_err("MakeWindowAssociation")?;

        let rtv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: FRAME_COUNT as u32,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                ..Default::default()
            })
        }
        .wrap_err("CreateDescriptorHeap (RTV)")?;
        let rtv_descriptor_size =
            unsafe { device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) }
                as usize;
        let rtv_start = unsafe { rtv_heap.GetCPUDescriptorHandleForHeapStart() };

        let render_targets: [ID3D12Resource; FRAME_COUNT] =
            array_init::try_array_init(|i| -> eyre::Result<ID3D12Resource> {
                let resource: ID3D12Resource = unsafe { swap_chain.GetBuffer(i as u32) }
                    .wrap_err_with(|| format!("IDXGISwapChain::GetBuffer({i})"))?;
                unsafe {
                    device.CreateRenderTargetView(
                        &resource,
                        None,
                        D3D12_CPU_DESCRIPTOR_HANDLE {
                            ptr: rtv_start.ptr + i * rtv_descriptor_size,
                        },
                    )
                };
                Ok(resource)
            })?;

        let dsv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: 1,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                ..Default::default()
            })
        }
        .wrap_err("CreateDescriptorHeap (DSV)")?;
        let depth_buffer = create_depth_buffer(&device, width, height)?;
        unsafe {
            device.CreateDepthStencilView(
                &depth_buffer,
                None,
                dsv_heap.GetCPUDescriptorHandleForHeapStart(),
            )
        };

        let command_allocators: [ID3D12CommandAllocator; FRAME_COUNT] =
            array_init::try_array_init(|i| -> eyre::Result<ID3D12CommandAllocator> {
                unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                    .wrap_err_with(|| format!("CreateCommandAllocator({i})"))
            })?;

        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &command_allocators[0],
                None,
            )
        }
        .wrap_err("CreateCommandList")?;
        // Render resets the list before recording, which needs it closed.
        unsafe { command_list.Close() }.wrap_err("closing fresh command list")?;

        let fences: [D3D12FrameFence; FRAME_COUNT] =
            array_init::try_array_init(|_| D3D12FrameFence::new(&device))?;
        let pacer = FramePacer::new(fences, config.gpu_wait_timeout())?;

        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: D3D12_MIN_DEPTH,
            MaxDepth: D3D12_MAX_DEPTH,
        };
        let scissor_rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };

        Ok(Self {
            config: config.clone(),
            _dxgi_factory: bundle.dxgi_factory,
            device,
            info_queue: bundle.info_queue,
            command_queue,
            swap_chain,
            render_targets,
            rtv_heap,
            rtv_descriptor_size,
            dsv_heap,
            _depth_buffer: depth_buffer,
            command_allocators,
            command_list,
            pacer,
            viewport,
            scissor_rect,
            width,
            height,
            frame_number: 0,
        })
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn setup_context(&self) -> SetupContext<'_> {
        SetupContext {
            device: &self.device,
            command_queue: &self.command_queue,
            config: &self.config,
            width: self.width,
            height: self.height,
        }
    }

    pub fn upload_context(&self) -> eyre::Result<UploadContext<'_>> {
        UploadContext::new(
            &self.device,
            &self.command_queue,
            self.config.gpu_wait_timeout(),
        )
    }

    /// Records, submits and presents one frame.
    pub fn render<S: Sample>(&mut self, sample: &mut S) -> eyre::Result<()> {
        let slot = unsafe { self.swap_chain.GetCurrentBackBufferIndex() } as usize;
        self.pacer.wait_for_slot(slot)?;

        let frame = FrameInfo {
            slot,
            frame_number: self.frame_number,
            width: self.width,
            height: self.height,
        };
        sample.update(&frame);

        self.populate_command_list(sample, &frame)?;

        let command_list: ID3D12CommandList = self.command_list.cast()?;
        unsafe { self.command_queue.ExecuteCommandLists(&[Some(command_list)]) };

        let sync_interval = if self.config.vsync { 1 } else { 0 };
        unsafe { self.swap_chain.Present(sync_interval, DXGI_PRESENT(0)) }
            .ok()
            .wrap_err("IDXGISwapChain::Present")?;

        self.pacer.signal_slot(&self.command_queue, slot)?;
        self.frame_number += 1;
        Ok(())
    }

    fn populate_command_list<S: Sample>(
        &self,
        sample: &mut S,
        frame: &FrameInfo,
    ) -> eyre::Result<()> {
        let slot = frame.slot;
        let command_allocator = &self.command_allocators[slot];
        unsafe { command_allocator.Reset() }.wrap_err("ID3D12CommandAllocator::Reset")?;

        let command_list = &self.command_list;
        unsafe { command_list.Reset(command_allocator, None) }
            .wrap_err("ID3D12GraphicsCommandList::Reset")?;

        let render_target = &self.render_targets[slot];
        let rtv_handle = D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() }.ptr
                + slot * self.rtv_descriptor_size,
        };
        let dsv_handle = unsafe { self.dsv_heap.GetCPUDescriptorHandleForHeapStart() };

        unsafe {
            command_list.ResourceBarrier(&[transition_barrier(
                render_target,
                D3D12_RESOURCE_STATE_PRESENT,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
            )]);
            command_list.ClearRenderTargetView(rtv_handle, &sample.clear_color(), None);
            command_list.ClearDepthStencilView(dsv_handle, D3D12_CLEAR_FLAG_DEPTH, 1.0, 0, None);
            command_list.OMSetRenderTargets(1, Some(&rtv_handle), false, Some(&dsv_handle));
            command_list.RSSetViewports(&[self.viewport]);
            command_list.RSSetScissorRects(&[self.scissor_rect]);
            command_list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        }

        sample.record(command_list, frame)?;

        unsafe {
            command_list.ResourceBarrier(&[transition_barrier(
                render_target,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            )]);
            command_list.Close()
        }
        .wrap_err("ID3D12GraphicsCommandList::Close")
    }

    /// Blocks until the GPU has finished every submitted frame.
    pub fn wait_for_idle(&mut self) -> eyre::Result<()> {
        debug!("Waiting for GPU to go idle");
        self.pacer.wait_for_idle(&self.command_queue)
    }

    pub fn log_debug_messages(&self) {
        log_dxgi_debug_messages(&self.info_queue);
    }
}

fn client_size(hwnd: HWND) -> eyre::Result<(u32, u32)> {
    let mut rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut rect) }.wrap_err("GetClientRect")?;
    let width = (rect.right - rect.left).max(1) as u32;
    let height = (rect.bottom - rect.top).max(1) as u32;
    if width > D3D12_REQ_TEXTURE2D_U_OR_V_DIMENSION || height > D3D12_REQ_TEXTURE2D_U_OR_V_DIMENSION {
        bail!("client area {width}x{height} exceeds the maximum texture size");
    }
    Ok((width, height))
}

fn create_depth_buffer(device: &ID3D12Device, width: u32, height: u32) -> eyre::Result<ID3D12Resource> {
    let desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        Alignment: 0,
        Width: u64::from(width),
        Height: height,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DEPTH_FORMAT,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
    };
    let clear_value = D3D12_CLEAR_VALUE {
        Format: DEPTH_FORMAT,
        Anonymous: D3D12_CLEAR_VALUE_0 {
            DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                Depth: 1.0,
                Stencil: 0,
            },
        },
    };
    create_committed_resource(
        device,
        D3D12_HEAP_TYPE_DEFAULT,
        &desc,
        D3D12_RESOURCE_STATE_DEPTH_WRITE,
        Some(&clear_value),
        "DepthBuffer",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_after_device_creation_names_the_failing_call() {
        let config = SampleConfig {
            use_warp_device: true,
            ..SampleConfig::default()
        };
        match D3D12AppBase::new(&config, HWND::default()) {
            Ok(_) => panic!("a null window has no client area"),
            Err(error) => assert_eq!(error.to_string(), "GetClientRect"),
        }
    }
}
