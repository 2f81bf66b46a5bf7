use eyre::bail;
use eyre::WrapErr;
use tracing::info;
use tracing::warn;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::config::SampleConfig;
use crate::d3d12::debug_messages::log_dxgi_debug_messages;

/// The factory and device a sample runs on, plus the DXGI info queue when the debug layer is active.
pub struct DeviceBundle {
    pub dxgi_factory: IDXGIFactory4,
    pub device: ID3D12Device,
    pub info_queue: Option<IDXGIInfoQueue>,
}

pub fn create_device(config: &SampleConfig) -> eyre::Result<DeviceBundle> {
    let mut factory_flags = DXGI_CREATE_FACTORY_FLAGS(0);
    let mut info_queue = None;

    if cfg!(debug_assertions) {
        unsafe {
            let mut debug: Option<ID3D12Debug> = None;
            if let Some(debug) = D3D12GetDebugInterface(&mut debug).ok().and(debug) {
                debug.EnableDebugLayer();
                factory_flags |= DXGI_CREATE_FACTORY_DEBUG;
                info!("D3D12 debug layer enabled");

                match DXGIGetDebugInterface1::<IDXGIInfoQueue>(0) {
                    Ok(queue) => info_queue = Some(queue),
                    Err(e) => warn!("DXGI info queue unavailable: {e}"),
                }
            } else {
                warn!("D3D12 debug layer unavailable");
            }
        }
    }

    let dxgi_factory: IDXGIFactory4 =
        unsafe { CreateDXGIFactory2(factory_flags) }.wrap_err("CreateDXGIFactory2")?;

    let adapter = if config.use_warp_device {
        info!("Using WARP adapter");
        unsafe { dxgi_factory.EnumWarpAdapter() }.wrap_err("EnumWarpAdapter")?
    } else {
        get_hardware_adapter(&dxgi_factory)?
    };

    let mut device: Option<ID3D12Device> = None;
    unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device) }
        .inspect_err(|_| log_dxgi_debug_messages(&info_queue))
        .wrap_err("D3D12CreateDevice")?;
    let Some(device) = device else {
        bail!("D3D12CreateDevice succeeded without returning a device");
    };

    Ok(DeviceBundle {
        dxgi_factory,
        device,
        info_queue,
    })
}

/// First hardware adapter that can create a feature level 11.0 device.
fn get_hardware_adapter(factory: &IDXGIFactory4) -> eyre::Result<IDXGIAdapter1> {
    for i in 0.. {
        let adapter = match unsafe { factory.EnumAdapters1(i) } {
            Ok(adapter) => adapter,
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
            Err(e) => return Err(e).wrap_err("EnumAdapters1"),
        };

        let desc = unsafe { adapter.GetDesc1() }.wrap_err("IDXGIAdapter1::GetDesc1")?;
        let name = String::from_utf16_lossy(&desc.Description);
        let name = name.trim_end_matches('\0');

        if (DXGI_ADAPTER_FLAG(desc.Flags as i32) & DXGI_ADAPTER_FLAG_SOFTWARE)
            != DXGI_ADAPTER_FLAG_NONE
        {
            info!("Skipping software adapter {i}: {name}");
            continue;
        }

        if unsafe {
            D3D12CreateDevice(
                &adapter,
                D3D_FEATURE_LEVEL_11_0,
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )
        }
        .is_ok()
        {
            info!("Using hardware adapter {i}: {name}");
            return Ok(adapter);
        }
        info!("Adapter {i} does not support Direct3D 12: {name}");
    }

    bail!("no Direct3D 12 capable hardware adapter found, try -warp")
}
