use std::mem::offset_of;
use std::path::Path;

use d3d12_app_base::d3d12::buffer::index_buffer_view;
use d3d12_app_base::d3d12::buffer::vertex_buffer_view;
use d3d12_app_base::d3d12::pipeline::create_graphics_pipeline;
use d3d12_app_base::d3d12::pipeline::PipelineDesc;
use d3d12_app_base::d3d12::root_signature::create_root_signature;
use d3d12_app_base::d3d12::root_signature::empty_root_signature_desc;
use d3d12_app_base::sample::Sample;
use d3d12_app_base::sample::SetupContext;
use d3d12_app_base::shader::load_shader;
use d3d12_app_base::shader::ShaderStage;
use d3d12_app_base::FrameInfo;
use tracing::info;
use windows::core::s;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::geometry::Vertex;
use crate::geometry::TRIANGLE_INDICES;
use crate::geometry::TRIANGLE_VERTICES;

pub struct HelloTriangle {
    root_signature: ID3D12RootSignature,
    pipeline_state: ID3D12PipelineState,
    // Views point into these.
    _vertex_buffer: ID3D12Resource,
    _index_buffer: ID3D12Resource,
    vertex_buffer_view: D3D12_VERTEX_BUFFER_VIEW,
    index_buffer_view: D3D12_INDEX_BUFFER_VIEW,
    index_count: u32,
}

impl Sample for HelloTriangle {
    fn title() -> &'static str {
        "D3D12 Hello Triangle"
    }

    fn setup(context: &mut SetupContext) -> eyre::Result<Self> {
        let device = context.device;
        let root_signature = create_root_signature(device, &empty_root_signature_desc())?;

        let crate_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let vertex_shader = load_shader("VertexShader.hlsl", crate_dir, ShaderStage::Vertex)?;
        let pixel_shader = load_shader("PixelShader.hlsl", crate_dir, ShaderStage::Pixel)?;

        let input_layout = [
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                AlignedByteOffset: offset_of!(Vertex, position) as u32,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                ..Default::default()
            },
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
                AlignedByteOffset: offset_of!(Vertex, color) as u32,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                ..Default::default()
            },
        ];

        let pipeline_state = create_graphics_pipeline(
            device,
            &PipelineDesc {
                root_signature: &root_signature,
                vertex_shader: &vertex_shader,
                pixel_shader: &pixel_shader,
                input_layout: &input_layout,
                cull_mode: D3D12_CULL_MODE_NONE,
                depth_test: true,
            },
        )?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE_VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE_INDICES);

        let mut uploads = context.upload_context()?;
        let vertex_buffer = uploads.upload_buffer(
            vertex_bytes,
            D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER,
            "TriangleVertices",
        )?;
        let index_buffer = uploads.upload_buffer(
            index_bytes,
            D3D12_RESOURCE_STATE_INDEX_BUFFER,
            "TriangleIndices",
        )?;
        uploads.finish()?;
        info!(
            "Uploaded {} vertices and {} indices",
            TRIANGLE_VERTICES.len(),
            TRIANGLE_INDICES.len()
        );

        Ok(Self {
            vertex_buffer_view: vertex_buffer_view(
                &vertex_buffer,
                std::mem::size_of::<Vertex>(),
                vertex_bytes.len(),
            ),
            index_buffer_view: index_buffer_view(&index_buffer, index_bytes.len()),
            index_count: TRIANGLE_INDICES.len() as u32,
            root_signature,
            pipeline_state,
            _vertex_buffer: vertex_buffer,
            _index_buffer: index_buffer,
        })
    }

    fn record(
        &mut self,
        command_list: &ID3D12GraphicsCommandList,
        _frame: &FrameInfo,
    ) -> eyre::Result<()> {
        unsafe {
            command_list.SetGraphicsRootSignature(&self.root_signature);
            command_list.SetPipelineState(&self.pipeline_state);
            command_list.IASetVertexBuffers(0, Some(&[self.vertex_buffer_view]));
            command_list.IASetIndexBuffer(Some(&self.index_buffer_view));
            command_list.DrawIndexedInstanced(self.index_count, 1, 0, 0, 0);
        }
        Ok(())
    }
}
