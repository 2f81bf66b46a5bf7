use eyre::WrapErr;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::shader::bytecode;

pub const RENDER_TARGET_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
pub const DEPTH_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D32_FLOAT;

pub struct PipelineDesc<'a> {
    pub root_signature: &'a ID3D12RootSignature,
    pub vertex_shader: &'a ID3DBlob,
    pub pixel_shader: &'a ID3DBlob,
    pub input_layout: &'a [D3D12_INPUT_ELEMENT_DESC],
    pub cull_mode: D3D12_CULL_MODE,
    pub depth_test: bool,
}

/// Opaque triangle-list pipeline writing the swap chain format and, when
/// `depth_test` is set, testing against the base application's depth buffer.
pub fn create_graphics_pipeline(
    device: &ID3D12Device,
    desc: &PipelineDesc,
) -> eyre::Result<ID3D12PipelineState> {
    let depth_stencil = if desc.depth_test {
        D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: TRUE,
            DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D12_COMPARISON_FUNC_LESS,
            StencilEnable: FALSE,
            ..Default::default()
        }
    } else {
        D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: FALSE,
            StencilEnable: FALSE,
            ..Default::default()
        }
    };

    let mut rtv_formats = [DXGI_FORMAT_UNKNOWN; 8];
    rtv_formats[0] = RENDER_TARGET_FORMAT;

    let pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        pRootSignature: unsafe { std::mem::transmute_copy(desc.root_signature) },
        VS: bytecode(desc.vertex_shader),
        PS: bytecode(desc.pixel_shader),
        InputLayout: D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: desc.input_layout.as_ptr(),
            NumElements: desc.input_layout.len() as u32,
        },
        RasterizerState: D3D12_RASTERIZER_DESC {
            FillMode: D3D12_FILL_MODE_SOLID,
            CullMode: desc.cull_mode,
            DepthClipEnable: TRUE,
            ..Default::default()
        },
        BlendState: D3D12_BLEND_DESC {
            AlphaToCoverageEnable: FALSE,
            IndependentBlendEnable: FALSE,
            RenderTarget: [D3D12_RENDER_TARGET_BLEND_DESC {
                BlendEnable: FALSE,
                LogicOpEnable: FALSE,
                SrcBlend: D3D12_BLEND_ONE,
                DestBlend: D3D12_BLEND_ZERO,
                BlendOp: D3D12_BLEND_OP_ADD,
                SrcBlendAlpha: D3D12_BLEND_ONE,
                DestBlendAlpha: D3D12_BLEND_ZERO,
                BlendOpAlpha: D3D12_BLEND_OP_ADD,
                LogicOp: D3D12_LOGIC_OP_NOOP,
                RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
            }; 8],
        },
        DepthStencilState: depth_stencil,
        SampleMask: u32::MAX,
        PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
        NumRenderTargets: 1,
        RTVFormats: rtv_formats,
        DSVFormat: DEPTH_FORMAT,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        ..Default::default()
    };

    unsafe { device.CreateGraphicsPipelineState(&pso_desc) }
        .wrap_err("CreateGraphicsPipelineState")
}
