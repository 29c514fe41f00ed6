//! GPU post-processing pipeline.
//!
//! Owns the ping-pong colour targets, the merge target, the presentation
//! target, the auxiliary effect textures and one render pipeline per effect,
//! geometry and blend combination. A [`GpuFrame`] borrows it for one frame and
//! implements [`PassBackend`] so the compositor can drive it.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::compositor::{Blend, BufferId, DrawCall, Geometry, PassBackend};
use crate::effect::{AuxTexture, EffectKind, EffectParameters};
use crate::uniforms::{PostFxUniforms, XorShift64};

/// Colour format of every post-processing target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Side length of the generated auxiliary textures.
const AUX_SIZE: u32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum GeometryKind {
    Rect,
    Quad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    kind: EffectKind,
    geometry: GeometryKind,
    blend: Blend,
}

/// (geometry, blend) pairs the compositor can ask for.
const VARIANTS: [(GeometryKind, Blend); 3] = [
    (GeometryKind::Rect, Blend::Replace),
    (GeometryKind::Rect, Blend::Alpha),
    (GeometryKind::Quad, Blend::Replace),
];

struct TargetTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl TargetTexture {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// GPU post-processing system.
pub struct PostProcessor {
    /// Ping-pong targets; index 0 is A (the scene target).
    targets: [TargetTexture; 2],
    /// Second scene copy read by Merge passes.
    merge: TargetTexture,
    /// Final image, copied from whichever target was presented.
    present: TargetTexture,
    /// Noise, burn height-map and distortion map.
    aux: HashMap<AuxTexture, TargetTexture>,
    /// Bound in the auxiliary slot by effects that need none.
    placeholder: TargetTexture,
    source_sampler: wgpu::Sampler,
    aux_sampler: wgpu::Sampler,
    source_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    aux_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    width: u32,
    height: u32,
}

impl PostProcessor {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let target_usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;

        let targets = [
            TargetTexture::new(device, "Post-Process Texture A", width, height, target_usage),
            TargetTexture::new(device, "Post-Process Texture B", width, height, target_usage),
        ];
        let merge = TargetTexture::new(device, "Merge Texture", width, height, target_usage);
        let present = TargetTexture::new(device, "Present Texture", width, height, target_usage);

        let aux_usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let mut aux = HashMap::new();
        for (kind, label) in [
            (AuxTexture::Noise, "Noise Texture"),
            (AuxTexture::BurnHeight, "Burn Height Texture"),
            (AuxTexture::Distortion, "Distortion Texture"),
        ] {
            let texture = TargetTexture::new(device, label, AUX_SIZE, AUX_SIZE, aux_usage);
            write_rgba(queue, &texture.texture, &generate_aux(kind), AUX_SIZE, AUX_SIZE);
            aux.insert(kind, texture);
        }
        let placeholder = TargetTexture::new(device, "Placeholder Texture", 1, 1, aux_usage);
        write_rgba(queue, &placeholder.texture, &[0, 0, 0, 255], 1, 1);

        let source_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post-Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let aux_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Auxiliary Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let texture_layout = |label: &str| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            })
        };
        let source_layout = texture_layout("Post-Process Source Bind Group Layout");
        let aux_layout = texture_layout("Post-Process Auxiliary Bind Group Layout");

        // Vertex stage reads the region, fragment stage the effect constants
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post-Process Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut processor = Self {
            targets,
            merge,
            present,
            aux,
            placeholder,
            source_sampler,
            aux_sampler,
            source_layout,
            uniform_layout,
            aux_layout,
            pipelines: HashMap::new(),
            width,
            height,
        };
        processor.create_pipelines(device);
        processor
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post-Process Effects Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_post_fx.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post-Process Pipeline Layout"),
            bind_group_layouts: &[&self.source_layout, &self.uniform_layout, &self.aux_layout],
            push_constant_ranges: &[],
        });

        for kind in EffectKind::ALL {
            let Some(fragment_entry) = kind.fragment_entry() else {
                continue;
            };

            for (geometry, blend) in VARIANTS {
                let vertex_entry = match geometry {
                    GeometryKind::Rect => "vs_area",
                    GeometryKind::Quad => "vs_polygon",
                };
                let blend_state = match blend {
                    Blend::Replace => wgpu::BlendState::REPLACE,
                    Blend::Alpha => wgpu::BlendState::ALPHA_BLENDING,
                };
                let label = format!("Effect Pipeline: {} ({:?}, {:?})", kind.name(), geometry, blend);

                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&label),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some(vertex_entry),
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some(fragment_entry),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: TARGET_FORMAT,
                            blend: Some(blend_state),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleStrip,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });

                self.pipelines.insert(PipelineKey { kind, geometry, blend }, pipeline);
            }
        }

        log::info!("Created {} post-process pipelines", self.pipelines.len());
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Upload the rendered scene into target A and the merge target.
    ///
    /// `rgba` must hold `width * height` tightly packed RGBA8 pixels.
    pub fn upload_scene(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        write_rgba(queue, &self.targets[0].texture, rgba, self.width, self.height);
        write_rgba(queue, &self.merge.texture, rgba, self.width, self.height);
    }

    /// Replace the merge target with a separately rendered image.
    pub fn upload_merge(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        write_rgba(queue, &self.merge.texture, rgba, self.width, self.height);
    }

    /// The final image of the last finished frame.
    pub fn present_texture(&self) -> &wgpu::Texture {
        &self.present.texture
    }

    fn target(&self, buffer: BufferId) -> &TargetTexture {
        match buffer {
            BufferId::A => &self.targets[0],
            BufferId::B => &self.targets[1],
        }
    }

    fn aux_view(&self, kind: EffectKind) -> &wgpu::TextureView {
        match kind.auxiliary_texture() {
            Some(AuxTexture::Merge) => &self.merge.view,
            Some(other) => self
                .aux
                .get(&other)
                .map(|t| &t.view)
                .unwrap_or(&self.placeholder.view),
            None => &self.placeholder.view,
        }
    }

    /// Start recording a frame into `encoder`.
    pub fn frame<'a>(
        &'a self,
        device: &'a wgpu::Device,
        encoder: &'a mut wgpu::CommandEncoder,
    ) -> GpuFrame<'a> {
        GpuFrame {
            processor: self,
            device,
            encoder,
            bound: None,
        }
    }
}

/// One frame of GPU work; the compositor's backend.
pub struct GpuFrame<'a> {
    processor: &'a PostProcessor,
    device: &'a wgpu::Device,
    encoder: &'a mut wgpu::CommandEncoder,
    bound: Option<EffectKind>,
}

impl PassBackend for GpuFrame<'_> {
    fn begin_frame(&mut self) {
        // A already holds the scene; B starts black
        let _clear = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Post-Process Texture B"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.processor.targets[1].view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.bound = None;
    }

    fn bind_effect(&mut self, kind: EffectKind, _params: &EffectParameters) {
        self.bound = Some(kind);
    }

    fn draw(&mut self, call: &DrawCall, uniforms: &PostFxUniforms) {
        let processor = self.processor;
        let kind = self.bound.unwrap_or(call.kind);
        let geometry = match call.geometry {
            Geometry::Rect(_) => GeometryKind::Rect,
            Geometry::Quad(_) => GeometryKind::Quad,
        };
        let key = PipelineKey {
            kind,
            geometry,
            blend: call.blend,
        };
        let Some(pipeline) = processor.pipelines.get(&key) else {
            log::warn!("No pipeline for effect: {} ({:?})", kind.name(), geometry);
            return;
        };

        let source_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post-Process Source Bind Group"),
            layout: &processor.source_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&processor.target(call.source).view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&processor.source_sampler),
                },
            ],
        });

        // Each draw gets its own buffer: queued writes would all land before
        // the encoder runs and every pass would see the last block.
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post-Process Uniform Buffer"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post-Process Uniform Bind Group"),
            layout: &processor.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let aux_view = if call.merge_input {
            &processor.merge.view
        } else {
            processor.aux_view(kind)
        };
        let aux_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post-Process Auxiliary Bind Group"),
            layout: &processor.aux_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(aux_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&processor.aux_sampler),
                },
            ],
        });

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&format!("Effect Pass: {}", kind.name())),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &processor.target(call.destination).view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &source_bind_group, &[]);
        render_pass.set_bind_group(1, &uniform_bind_group, &[]);
        render_pass.set_bind_group(2, &aux_bind_group, &[]);
        render_pass.draw(0..4, 0..1);
    }

    fn present(&mut self, buffer: BufferId) {
        let processor = self.processor;
        self.encoder.copy_texture_to_texture(
            processor.target(buffer).texture.as_image_copy(),
            processor.present.texture.as_image_copy(),
            wgpu::Extent3d {
                width: processor.width,
                height: processor.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, rgba: &[u8], width: u32, height: u32) {
    queue.write_texture(
        texture.as_image_copy(),
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// Procedural contents of an auxiliary texture, RGBA8.
fn generate_aux(kind: AuxTexture) -> Vec<u8> {
    let mut rng = XorShift64::new(match kind {
        AuxTexture::Noise => 1,
        AuxTexture::BurnHeight => 2,
        AuxTexture::Distortion => 3,
        AuxTexture::Merge => 4,
    });
    let image = image::RgbaImage::from_fn(AUX_SIZE, AUX_SIZE, |x, y| {
        let u = x as f32 / AUX_SIZE as f32;
        let v = y as f32 / AUX_SIZE as f32;
        match kind {
            AuxTexture::Noise | AuxTexture::Merge => {
                let g = (rng.next_f32() * 255.0) as u8;
                image::Rgba([g, g, g, 255])
            }
            AuxTexture::BurnHeight => {
                // smooth swirl plus grain so the burn front is ragged
                let swirl = ((u * 9.0).sin() * (v * 7.0).cos() * 0.5 + 0.5) * 0.7;
                let h = (swirl + rng.next_f32() * 0.3).min(1.0);
                let h = (h * 255.0) as u8;
                image::Rgba([h, h, h, 255])
            }
            AuxTexture::Distortion => {
                let r = ((u * 12.0 + v * 5.0).sin() * 0.5 + 0.5) * 255.0;
                let g = ((v * 12.0 - u * 3.0).cos() * 0.5 + 0.5) * 255.0;
                image::Rgba([r as u8, g as u8, 128, 255])
            }
        }
    });
    image.into_raw()
}
