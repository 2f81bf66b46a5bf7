use eyre::bail;
use eyre::WrapErr;
use windows::Win32::Graphics::Direct3D12::*;

use crate::shader::blob_to_string;

/// The empty signature used by samples with no bound resources.
pub fn empty_root_signature_desc() -> D3D12_ROOT_SIGNATURE_DESC {
    D3D12_ROOT_SIGNATURE_DESC {
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        ..Default::default()
    }
}

pub fn create_root_signature(
    device: &ID3D12Device,
    desc: &D3D12_ROOT_SIGNATURE_DESC,
) -> eyre::Result<ID3D12RootSignature> {
    let mut signature_blob = None;
    let mut error_blob = None;

    let result = unsafe {
        D3D12SerializeRootSignature(
            desc,
            D3D_ROOT_SIGNATURE_VERSION_1,
            &mut signature_blob,
            Some(&mut error_blob),
        )
    };
    if let Err(e) = result {
        let message = error_blob
            .map(|blob| blob_to_string(&blob))
            .unwrap_or_default();
        return Err(e).wrap_err_with(|| format!("serializing root signature: {}", message.trim()));
    }
    let Some(signature_blob) = signature_blob else {
        bail!("D3D12SerializeRootSignature returned no blob");
    };

    let signature_data: &[u8] = unsafe {
        std::slice::from_raw_parts(
            signature_blob.GetBufferPointer() as *const u8,
            signature_blob.GetBufferSize(),
        )
    };

    unsafe { device.CreateRootSignature(0, signature_data) }.wrap_err("CreateRootSignature")
}
