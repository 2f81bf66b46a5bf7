use std::mem::offset_of;
use std::path::Path;

use d3d12_app_base::d3d12::buffer::create_upload_buffer;
use d3d12_app_base::d3d12::buffer::index_buffer_view;
use d3d12_app_base::d3d12::buffer::vertex_buffer_view;
use d3d12_app_base::d3d12::buffer::write_buffer;
use d3d12_app_base::d3d12::pipeline::create_graphics_pipeline;
use d3d12_app_base::d3d12::pipeline::PipelineDesc;
use d3d12_app_base::d3d12::root_signature::create_root_signature;
use d3d12_app_base::sample::Sample;
use d3d12_app_base::sample::SetupContext;
use d3d12_app_base::shader::load_shader;
use d3d12_app_base::shader::ShaderStage;
use d3d12_app_base::upload::constant_buffer_size;
use d3d12_app_base::FrameInfo;
use d3d12_app_base::FRAME_COUNT;
use eyre::eyre;
use eyre::WrapErr;
use tracing::debug;
use tracing::info;
use windows::core::s;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::geometry::Vertex;
use crate::geometry::CUBE_INDICES;
use crate::geometry::CUBE_VERTICES;
use crate::shader_parameters::ShaderParameters;
use crate::texture::TextureImage;

const ROOT_PARAMETER_CBV: u32 = 0;
const ROOT_PARAMETER_SRV: u32 = 1;
const ROOT_PARAMETER_SAMPLER: u32 = 2;

/// Slots in the CBV/SRV heap: the texture first, then one constant buffer view per frame.
const TEXTURE_SRV_DESCRIPTOR: usize = 0;
const CONSTANT_BUFFER_DESCRIPTOR_BASE: usize = 1;
/// The sampler lives alone in its own heap.
const SAMPLER_DESCRIPTOR: usize = 0;

pub struct TexturedCube {
    root_signature: ID3D12RootSignature,
    pipeline_state: ID3D12PipelineState,
    _vertex_buffer: ID3D12Resource,
    _index_buffer: ID3D12Resource,
    _texture: ID3D12Resource,
    vertex_buffer_view: D3D12_VERTEX_BUFFER_VIEW,
    index_buffer_view: D3D12_INDEX_BUFFER_VIEW,
    index_count: u32,
    srv_cbv_heap: ID3D12DescriptorHeap,
    sampler_heap: ID3D12DescriptorHeap,
    srv_cbv_descriptor_size: u64,
    sampler_descriptor_size: u64,
    /// Written by the CPU while recording the frame that uses them, so one per slot.
    constant_buffers: [ID3D12Resource; FRAME_COUNT],
    parameters: ShaderParameters,
}

impl TexturedCube {
    fn srv_cbv_gpu_handle(&self, index: usize) -> D3D12_GPU_DESCRIPTOR_HANDLE {
        D3D12_GPU_DESCRIPTOR_HANDLE {
            ptr: unsafe { self.srv_cbv_heap.GetGPUDescriptorHandleForHeapStart() }.ptr
                + index as u64 * self.srv_cbv_descriptor_size,
        }
    }

    fn sampler_gpu_handle(&self, index: usize) -> D3D12_GPU_DESCRIPTOR_HANDLE {
        D3D12_GPU_DESCRIPTOR_HANDLE {
            ptr: unsafe { self.sampler_heap.GetGPUDescriptorHandleForHeapStart() }.ptr
                + index as u64 * self.sampler_descriptor_size,
        }
    }
}

impl Sample for TexturedCube {
    fn title() -> &'static str {
        "D3D12 Textured Cube"
    }

    fn setup(context: &mut SetupContext) -> eyre::Result<Self> {
        let device = context.device;

        let root_signature = create_cube_root_signature(device)?;

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
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                Format: DXGI_FORMAT_R32G32_FLOAT,
                AlignedByteOffset: offset_of!(Vertex, uv) as u32,
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
                cull_mode: D3D12_CULL_MODE_BACK,
                depth_test: true,
            },
        )?;

        let image = TextureImage::from_config(context.config.texture.as_deref())?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&CUBE_VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&CUBE_INDICES);

        let mut uploads = context.upload_context()?;
        let vertex_buffer = uploads.upload_buffer(
            vertex_bytes,
            D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER,
            "CubeVertices",
        )?;
        let index_buffer =
            uploads.upload_buffer(index_bytes, D3D12_RESOURCE_STATE_INDEX_BUFFER, "CubeIndices")?;
        let texture =
            uploads.upload_texture_rgba8(image.width, image.height, &image.pixels, "CubeTexture")?;
        uploads.finish()?;
        info!(
            "Uploaded cube geometry and a {}x{} texture",
            image.width, image.height
        );

        let srv_cbv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                NumDescriptors: (CONSTANT_BUFFER_DESCRIPTOR_BASE + FRAME_COUNT) as u32,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                ..Default::default()
            })
        }
        .wrap_err("CreateDescriptorHeap (CBV/SRV)")?;
        let sampler_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
                NumDescriptors: 1,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                ..Default::default()
            })
        }
        .wrap_err("CreateDescriptorHeap (sampler)")?;

        let srv_cbv_descriptor_size = unsafe {
            device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV)
        } as usize;
        let sampler_descriptor_size =
            unsafe { device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER) }
                as usize;
        let srv_cbv_start = unsafe { srv_cbv_heap.GetCPUDescriptorHandleForHeapStart() };
        let sampler_start = unsafe { sampler_heap.GetCPUDescriptorHandleForHeapStart() };
        let srv_cbv_cpu_handle = |index: usize| D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: srv_cbv_start.ptr + index * srv_cbv_descriptor_size,
        };

        unsafe {
            device.CreateShaderResourceView(
                &texture,
                Some(&D3D12_SHADER_RESOURCE_VIEW_DESC {
                    Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                    ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
                    Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
                    Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                        Texture2D: D3D12_TEX2D_SRV {
                            MipLevels: 1,
                            ..Default::default()
                        },
                    },
                }),
                srv_cbv_cpu_handle(TEXTURE_SRV_DESCRIPTOR),
            );

            device.CreateSampler(
                &D3D12_SAMPLER_DESC {
                    Filter: D3D12_FILTER_MIN_MAG_MIP_LINEAR,
                    AddressU: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
                    AddressV: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
                    AddressW: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
                    MipLODBias: 0.0,
                    MaxAnisotropy: 1,
                    ComparisonFunc: D3D12_COMPARISON_FUNC_NEVER,
                    BorderColor: [0.0; 4],
                    MinLOD: 0.0,
                    MaxLOD: f32::MAX,
                },
                D3D12_CPU_DESCRIPTOR_HANDLE {
                    ptr: sampler_start.ptr + SAMPLER_DESCRIPTOR * sampler_descriptor_size,
                },
            );
        }

        let buffer_size = constant_buffer_size(std::mem::size_of::<ShaderParameters>() as u64);
        let parameters = ShaderParameters::for_frame(0, context.aspect_ratio());
        let constant_buffers: [ID3D12Resource; FRAME_COUNT] =
            array_init::try_array_init(|slot| -> eyre::Result<ID3D12Resource> {
                let buffer =
                    create_upload_buffer(device, buffer_size, &format!("ShaderParameters[{slot}]"))?;
                write_buffer(&buffer, bytemuck::bytes_of(&parameters))?;
                unsafe {
                    device.CreateConstantBufferView(
                        Some(&D3D12_CONSTANT_BUFFER_VIEW_DESC {
                            BufferLocation: buffer.GetGPUVirtualAddress(),
                            SizeInBytes: buffer_size as u32,
                        }),
                        srv_cbv_cpu_handle(CONSTANT_BUFFER_DESCRIPTOR_BASE + slot),
                    )
                };
                Ok(buffer)
            })?;
        debug!("Created {FRAME_COUNT} constant buffers of {buffer_size} bytes");

        Ok(Self {
            vertex_buffer_view: vertex_buffer_view(
                &vertex_buffer,
                std::mem::size_of::<Vertex>(),
                vertex_bytes.len(),
            ),
            index_buffer_view: index_buffer_view(&index_buffer, index_bytes.len()),
            index_count: CUBE_INDICES.len() as u32,
            root_signature,
            pipeline_state,
            _vertex_buffer: vertex_buffer,
            _index_buffer: index_buffer,
            _texture: texture,
            srv_cbv_heap,
            sampler_heap,
            srv_cbv_descriptor_size: srv_cbv_descriptor_size as u64,
            sampler_descriptor_size: sampler_descriptor_size as u64,
            constant_buffers,
            parameters,
        })
    }

    fn update(&mut self, frame: &FrameInfo) {
        self.parameters = ShaderParameters::for_frame(frame.frame_number, frame.aspect_ratio());
    }

    fn record(
        &mut self,
        command_list: &ID3D12GraphicsCommandList,
        frame: &FrameInfo,
    ) -> eyre::Result<()> {
        // The base has waited for this slot, so the GPU no longer reads its buffer.
        let constant_buffer = self
            .constant_buffers
            .get(frame.slot)
            .ok_or_else(|| eyre!("no constant buffer for frame slot {}", frame.slot))?;
        write_buffer(constant_buffer, bytemuck::bytes_of(&self.parameters))?;

        let constants = self.srv_cbv_gpu_handle(CONSTANT_BUFFER_DESCRIPTOR_BASE + frame.slot);
        let texture = self.srv_cbv_gpu_handle(TEXTURE_SRV_DESCRIPTOR);
        let sampler = self.sampler_gpu_handle(SAMPLER_DESCRIPTOR);

        unsafe {
            command_list.SetGraphicsRootSignature(&self.root_signature);
            command_list.SetPipelineState(&self.pipeline_state);
            command_list.SetDescriptorHeaps(&[
                Some(self.srv_cbv_heap.clone()),
                Some(self.sampler_heap.clone()),
            ]);
            command_list.SetGraphicsRootDescriptorTable(ROOT_PARAMETER_CBV, constants);
            command_list.SetGraphicsRootDescriptorTable(ROOT_PARAMETER_SRV, texture);
            command_list.SetGraphicsRootDescriptorTable(ROOT_PARAMETER_SAMPLER, sampler);
            command_list.IASetVertexBuffers(0, Some(&[self.vertex_buffer_view]));
            command_list.IASetIndexBuffer(Some(&self.index_buffer_view));
            command_list.DrawIndexedInstanced(self.index_count, 1, 0, 0, 0);
        }
        Ok(())
    }
}

/// b0 for the vertex stage, t0 and s0 for the pixel stage, each in its own table.
fn descriptor_table(
    ranges: &[D3D12_DESCRIPTOR_RANGE],
    visibility: D3D12_SHADER_VISIBILITY,
) -> D3D12_ROOT_PARAMETER {
    D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                NumDescriptorRanges: ranges.len() as u32,
                pDescriptorRanges: ranges.as_ptr(),
            },
        },
        ShaderVisibility: visibility,
    }
}

fn create_cube_root_signature(device: &ID3D12Device) -> eyre::Result<ID3D12RootSignature> {
    let range = |range_type| D3D12_DESCRIPTOR_RANGE {
        RangeType: range_type,
        NumDescriptors: 1,
        BaseShaderRegister: 0,
        RegisterSpace: 0,
        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
    };
    let cbv = [range(D3D12_DESCRIPTOR_RANGE_TYPE_CBV)];
    let srv = [range(D3D12_DESCRIPTOR_RANGE_TYPE_SRV)];
    let sampler = [range(D3D12_DESCRIPTOR_RANGE_TYPE_SAMPLER)];

    // Indices match the ROOT_PARAMETER_* constants.
    let parameters = [
        descriptor_table(&cbv, D3D12_SHADER_VISIBILITY_VERTEX),
        descriptor_table(&srv, D3D12_SHADER_VISIBILITY_PIXEL),
        descriptor_table(&sampler, D3D12_SHADER_VISIBILITY_PIXEL),
    ];

    let desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: parameters.len() as u32,
        pParameters: parameters.as_ptr(),
        NumStaticSamplers: 0,
        pStaticSamplers: std::ptr::null(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };
    create_root_signature(device, &desc)
}
