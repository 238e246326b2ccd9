use tracing::debug;

use crate::config::BloomConfig;

const BLOOM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Centre tap plus one side of the symmetric blur kernel.
pub const KERNEL_TAPS: usize = 8;

const MAX_SIGMA: f32 = (KERNEL_TAPS - 1) as f32 / 2.0;

/// Gaussian sigma, in half-resolution texels, for a configured radius.
pub fn blur_sigma(radius: f32) -> f32 {
    (1.0 + radius.max(0.0) * 1.5).min(MAX_SIGMA)
}

/// One-sided gaussian weights normalised so the mirrored kernel sums to one.
pub fn gaussian_weights(sigma: f32) -> [f32; KERNEL_TAPS] {
    let sigma = sigma.max(f32::EPSILON);
    let mut weights = [0.0; KERNEL_TAPS];
    for (i, w) in weights.iter_mut().enumerate() {
        let x = i as f32;
        *w = (-(x * x) / (2.0 * sigma * sigma)).exp();
    }
    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    weights.iter_mut().for_each(|w| *w /= total);
    weights
}

/// Bloom targets run at half the backing resolution.
pub fn bloom_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BloomUniforms {
    texel_step: [f32; 2],
    threshold: f32,
    strength: f32,
    decode_src: u32,
    encode_out: u32,
    _pad: [u32; 2],
    weights: [f32; KERNEL_TAPS],
}

impl BloomUniforms {
    /// Lensing output is display-encoded, so the bright pass decodes it first.
    pub fn bright(threshold: f32) -> Self {
        Self {
            threshold,
            decode_src: 1,
            ..Self::default()
        }
    }

    pub fn blur(texel_step: [f32; 2], sigma: f32) -> Self {
        Self {
            texel_step,
            weights: gaussian_weights(sigma),
            ..Self::default()
        }
    }

    /// Additive composite; encodes the glow when the surface will not.
    pub fn composite(strength: f32, surface: wgpu::TextureFormat) -> Self {
        Self {
            strength,
            encode_out: u32::from(!surface.is_srgb()),
            ..Self::default()
        }
    }
}

struct Stage {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
}

struct Targets {
    ping: wgpu::TextureView,
    pong: wgpu::TextureView,
    bright_bind: wgpu::BindGroup,
    horizontal_bind: wgpu::BindGroup,
    vertical_bind: wgpu::BindGroup,
    composite_bind: wgpu::BindGroup,
}

/// Thresholds the lensing target, blurs it at half resolution and adds the
/// result over the surface.
pub struct BloomPass {
    cfg: BloomConfig,
    surface_format: wgpu::TextureFormat,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright: Stage,
    horizontal: Stage,
    vertical: Stage,
    composite: Stage,
    targets: Option<Targets>,
}

impl BloomPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, cfg: &BloomConfig) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom.wgsl").into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let stage = |label: &str, entry: &str, format: wgpu::TextureFormat, blend: Option<wgpu::BlendState>| {
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<BloomUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            Stage { pipeline, uniforms }
        };
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        Self {
            cfg: cfg.clone(),
            surface_format,
            bright: stage("bloom-bright", "fs_bright", BLOOM_FORMAT, None),
            horizontal: stage("bloom-blur-h", "fs_blur", BLOOM_FORMAT, None),
            vertical: stage("bloom-blur-v", "fs_blur", BLOOM_FORMAT, None),
            composite: stage("bloom-composite", "fs_composite", surface_format, Some(additive)),
            layout,
            sampler,
            targets: None,
        }
    }

    fn bind(&self, device: &wgpu::Device, stage: &Stage, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom-bind"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: stage.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Rebuilds the half-resolution targets around a new lensing target.
    ///
    /// Every stage owns its uniform buffer, so the values are written here once
    /// per size rather than per frame.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, source: &wgpu::TextureView, width: u32, height: u32) {
        if !self.cfg.enabled {
            return;
        }
        let size = bloom_extent(width, height);
        let make = |label: &str| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: size.0,
                        height: size.1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: BLOOM_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let ping = make("bloom-ping");
        let pong = make("bloom-pong");

        let sigma = blur_sigma(self.cfg.radius);
        let texel = [1.0 / size.0 as f32, 1.0 / size.1 as f32];
        for (stage, uniforms) in [
            (&self.bright, BloomUniforms::bright(self.cfg.threshold)),
            (&self.horizontal, BloomUniforms::blur([texel[0], 0.0], sigma)),
            (&self.vertical, BloomUniforms::blur([0.0, texel[1]], sigma)),
            (&self.composite, BloomUniforms::composite(self.cfg.strength, self.surface_format)),
        ] {
            queue.write_buffer(&stage.uniforms, 0, bytemuck::bytes_of(&uniforms));
        }

        let targets = Targets {
            bright_bind: self.bind(device, &self.bright, source),
            horizontal_bind: self.bind(device, &self.horizontal, &ping),
            vertical_bind: self.bind(device, &self.vertical, &pong),
            composite_bind: self.bind(device, &self.composite, &ping),
            ping,
            pong,
        };
        debug!(width = size.0, height = size.1, sigma, "bloom_targets_resized");
        self.targets = Some(targets);
    }

    /// Bright-pass into ping, blur ping into pong horizontally, then back
    /// into ping vertically. Returns false when there is nothing to add.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder) -> bool {
        let Some(targets) = self.targets.as_ref().filter(|_| self.cfg.enabled) else {
            return false;
        };
        for (label, stage, bind, view) in [
            ("bloom-bright", &self.bright, &targets.bright_bind, &targets.ping),
            ("bloom-blur-h", &self.horizontal, &targets.horizontal_bind, &targets.pong),
            ("bloom-blur-v", &self.vertical, &targets.vertical_bind, &targets.ping),
        ] {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
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
            pass.set_pipeline(&stage.pipeline);
            pass.set_bind_group(0, bind, &[]);
            pass.draw(0..3, 0..1);
        }
        true
    }

    /// Adds the blurred highlights over the current pass.
    pub fn composite(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Some(targets) = &self.targets {
            pass.set_pipeline(&self.composite.pipeline);
            pass.set_bind_group(0, &targets.composite_bind, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalised_and_decreasing() {
        for radius in [0.0, 0.5, 1.5, 10.0] {
            let weights = gaussian_weights(blur_sigma(radius));
            let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
            assert!((total - 1.0).abs() < 1e-5, "radius {radius}: {total}");
            assert!(weights.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }

    #[test]
    fn wider_radius_spreads_the_kernel() {
        let narrow = gaussian_weights(blur_sigma(0.2));
        let wide = gaussian_weights(blur_sigma(1.5));
        assert!(wide[0] < narrow[0]);
        assert!(wide[KERNEL_TAPS - 1] > narrow[KERNEL_TAPS - 1]);
        assert_eq!(blur_sigma(100.0), MAX_SIGMA);
    }

    #[test]
    fn targets_are_half_resolution_but_never_empty() {
        assert_eq!(bloom_extent(1920, 1080), (960, 540));
        assert_eq!(bloom_extent(1, 3), (1, 1));
        assert_eq!(bloom_extent(0, 0), (1, 1));
    }

    #[test]
    fn uniform_layout_matches_shader() {
        // vec2 + 2 f32 + 4 u32 + array<vec4<f32>, 2>
        assert_eq!(std::mem::size_of::<BloomUniforms>(), 64);
        assert_eq!(std::mem::offset_of!(BloomUniforms, weights), 32);
    }

    #[test]
    fn composite_encodes_only_for_linear_surfaces() {
        let srgb = BloomUniforms::composite(0.4, wgpu::TextureFormat::Bgra8UnormSrgb);
        let linear = BloomUniforms::composite(0.4, wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(srgb.encode_out, 0);
        assert_eq!(linear.encode_out, 1);
        assert_eq!(BloomUniforms::bright(0.1).decode_src, 1);
    }
}
