use eyre::bail;
use eyre::ensure;
use eyre::WrapErr;
use widestring::U16CString;
use windows::core::PCWSTR;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

pub fn buffer_desc(size: u64) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Alignment: 0,
        Width: size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        Flags: D3D12_RESOURCE_FLAG_NONE,
    }
}

pub fn create_committed_resource(
    device: &ID3D12Device,
    heap_type: D3D12_HEAP_TYPE,
    desc: &D3D12_RESOURCE_DESC,
    initial_state: D3D12_RESOURCE_STATES,
    clear_value: Option<&D3D12_CLEAR_VALUE>,
    name: &str,
) -> eyre::Result<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        ..Default::default()
    };

    let mut resource: Option<ID3D12Resource> = None;
    unsafe {
        device.CreateCommittedResource(
            &heap_props,
            D3D12_HEAP_FLAG_NONE,
            desc,
            initial_state,
            clear_value.map(|v| v as *const _),
            &mut resource,
        )
    }
    .wrap_err_with(|| format!("CreateCommittedResource for {name}"))?;
    let Some(resource) = resource else {
        bail!("CreateCommittedResource returned no resource for {name}");
    };
    set_debug_name(&resource, name);
    Ok(resource)
}

/// Labels a resource for the debug layer and graphics debuggers. Best effort.
pub fn set_debug_name(resource: &ID3D12Resource, name: &str) {
    if let Ok(wide) = U16CString::from_str(name) {
        unsafe { resource.SetName(PCWSTR(wide.as_ptr())) }.ok();
    }
}

/// An UPLOAD heap buffer that stays CPU writable, used for per-frame data.
pub fn create_upload_buffer(
    device: &ID3D12Device,
    size: u64,
    name: &str,
) -> eyre::Result<ID3D12Resource> {
    create_committed_resource(
        device,
        D3D12_HEAP_TYPE_UPLOAD,
        &buffer_desc(size),
        D3D12_RESOURCE_STATE_GENERIC_READ,
        None,
        name,
    )
}

/// Maps an UPLOAD buffer, copies `bytes` to its start, and unmaps it.
pub fn write_buffer(resource: &ID3D12Resource, bytes: &[u8]) -> eyre::Result<()> {
    let capacity = unsafe { resource.GetDesc() }.Width;
    ensure!(
        bytes.len() as u64 <= capacity,
        "writing {} bytes into a {capacity} byte buffer",
        bytes.len()
    );

    unsafe {
        let mut data = std::ptr::null_mut();
        let read_range = D3D12_RANGE { Begin: 0, End: 0 };
        resource
            .Map(0, Some(&read_range), Some(&mut data))
            .wrap_err("ID3D12Resource::Map")?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), data as *mut u8, bytes.len());
        resource.Unmap(0, None);
    }
    Ok(())
}

pub fn vertex_buffer_view(
    resource: &ID3D12Resource,
    stride: usize,
    size: usize,
) -> D3D12_VERTEX_BUFFER_VIEW {
    D3D12_VERTEX_BUFFER_VIEW {
        BufferLocation: unsafe { resource.GetGPUVirtualAddress() },
        StrideInBytes: stride as u32,
        SizeInBytes: size as u32,
    }
}

/// View over 32-bit indices.
pub fn index_buffer_view(resource: &ID3D12Resource, size: usize) -> D3D12_INDEX_BUFFER_VIEW {
    D3D12_INDEX_BUFFER_VIEW {
        BufferLocation: unsafe { resource.GetGPUVirtualAddress() },
        SizeInBytes: size as u32,
        Format: DXGI_FORMAT_R32_UINT,
    }
}
