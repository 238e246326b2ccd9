//! GPU side of the display list: lyon tessellation of the vector shapes and
//! textured quads for posters, drawn in list order.

use std::collections::HashMap;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use lyon::math::{Box2D, point};
use lyon::path::builder::{BorderRadii, PathBuilder};
use lyon::path::{Path, Winding};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, LineCap, StrokeOptions,
    StrokeTessellator, StrokeVertex, VertexBuffers,
};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use super::textures;
use crate::cache::ImageHandle;
use crate::render::draw_list::{DrawCmd, DrawList, Rect, Rgba};

const TOLERANCE: f32 = 0.25;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct ColorVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl ColorVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct PosterVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub local: [f32; 2],
    pub half_size: [f32; 2],
    /// Corner radius and opacity.
    pub style: [f32; 2],
}

impl PosterVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x2,
        3 => Float32x2,
        4 => Float32x2
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PosterVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
struct CanvasUniforms {
    size: [f32; 2],
    /// Non-zero when the target stores raw values and the shaders must
    /// apply the sRGB transfer themselves.
    encode_srgb: u32,
    _pad: u32,
}

impl CanvasUniforms {
    fn new(logical_size: [f32; 2], format: wgpu::TextureFormat) -> Self {
        Self {
            size: [logical_size[0].max(1.0), logical_size[1].max(1.0)],
            encode_srgb: u32::from(!format.is_srgb()),
            _pad: 0,
        }
    }
}

/// A run of consecutive draws sharing one pipeline.
#[derive(Debug, Clone)]
pub enum Batch {
    Shapes { indices: Range<u32> },
    Poster { image: ImageHandle, vertices: Range<u32> },
}

#[derive(Debug, Default)]
pub struct CanvasGeometry {
    pub shapes: VertexBuffers<ColorVertex, u32>,
    pub posters: Vec<PosterVertex>,
    pub batches: Vec<Batch>,
}

impl CanvasGeometry {
    fn open_shape_batch(&mut self) {
        let start = self.shapes.indices.len() as u32;
        if !matches!(self.batches.last(), Some(Batch::Shapes { .. })) {
            self.batches.push(Batch::Shapes { indices: start..start });
        }
    }

    fn close_shape_batch(&mut self) {
        let end = self.shapes.indices.len() as u32;
        if let Some(Batch::Shapes { indices }) = self.batches.last_mut() {
            indices.end = end;
            if indices.is_empty() {
                self.batches.pop();
            }
        }
    }
}

/// Converts a display list into vertex data and ordered batches.
pub fn tessellate(list: &DrawList) -> CanvasGeometry {
    let mut geometry = CanvasGeometry::default();
    let mut fill = FillTessellator::new();
    let mut stroke = StrokeTessellator::new();

    for cmd in list.commands() {
        match cmd {
            DrawCmd::Circle {
                center,
                radius,
                color,
            } => {
                geometry.open_shape_batch();
                let color = *color;
                if let Err(err) = fill.tessellate_circle(
                    point(center[0], center[1]),
                    *radius,
                    &FillOptions::tolerance(TOLERANCE),
                    &mut BuffersBuilder::new(&mut geometry.shapes, |v: FillVertex| ColorVertex {
                        position: v.position().to_array(),
                        color,
                    }),
                ) {
                    warn!(error = ?err, "canvas_circle_tessellation_failed");
                }
                geometry.close_shape_batch();
            }
            DrawCmd::RoundRect {
                rect,
                corner,
                fill: fill_color,
                stroke: outline,
            } => {
                geometry.open_shape_batch();
                let path = rounded_rect_path(rect, *corner);
                let color = *fill_color;
                if color[3] > 0.0
                    && let Err(err) = fill.tessellate_path(
                        &path,
                        &FillOptions::tolerance(TOLERANCE),
                        &mut BuffersBuilder::new(&mut geometry.shapes, |v: FillVertex| {
                            ColorVertex {
                                position: v.position().to_array(),
                                color,
                            }
                        }),
                    )
                {
                    warn!(error = ?err, "canvas_rect_tessellation_failed");
                }
                if let Some((width, color)) = *outline {
                    stroke_path(&mut stroke, &mut geometry.shapes, &path, width, color, LineCap::Butt);
                }
                geometry.close_shape_batch();
            }
            DrawCmd::Line {
                from,
                to,
                width,
                color,
            } => {
                geometry.open_shape_batch();
                let mut builder = Path::builder();
                builder.begin(point(from[0], from[1]));
                builder.line_to(point(to[0], to[1]));
                builder.end(false);
                let path = builder.build();
                stroke_path(&mut stroke, &mut geometry.shapes, &path, *width, *color, LineCap::Round);
                geometry.close_shape_batch();
            }
            DrawCmd::Image {
                rect,
                corner,
                image,
                opacity,
            } => {
                if rect.width <= 0.0 || rect.height <= 0.0 || *opacity <= 0.0 {
                    continue;
                }
                let start = geometry.posters.len() as u32;
                geometry
                    .posters
                    .extend(poster_quad(rect, *corner, *opacity, image.aspect()));
                let end = geometry.posters.len() as u32;
                geometry.batches.push(Batch::Poster {
                    image: image.clone(),
                    vertices: start..end,
                });
            }
        }
    }
    geometry
}

fn rounded_rect_path(rect: &Rect, corner: f32) -> Path {
    let mut builder = Path::builder();
    add_rounded_rect(&mut builder, rect, corner);
    builder.build()
}

fn add_rounded_rect<B: PathBuilder>(builder: &mut B, rect: &Rect, corner: f32) {
    let radius = corner.clamp(0.0, rect.width.min(rect.height) * 0.5);
    builder.add_rounded_rectangle(
        &Box2D::new(
            point(rect.x, rect.y),
            point(rect.x + rect.width, rect.y + rect.height),
        ),
        &BorderRadii::new(radius),
        Winding::Positive,
        &[],
    );
}

fn stroke_path(
    tessellator: &mut StrokeTessellator,
    buffers: &mut VertexBuffers<ColorVertex, u32>,
    path: &Path,
    width: f32,
    color: Rgba,
    cap: LineCap,
) {
    if width <= 0.0 || color[3] <= 0.0 {
        return;
    }
    let options = StrokeOptions::tolerance(TOLERANCE)
        .with_line_width(width)
        .with_line_cap(cap);
    if let Err(err) = tessellator.tessellate_path(
        path,
        &options,
        &mut BuffersBuilder::new(buffers, |v: StrokeVertex| ColorVertex {
            position: v.position().to_array(),
            color,
        }),
    ) {
        warn!(error = ?err, "canvas_stroke_tessellation_failed");
    }
}

/// Texture window that fills a `rect_aspect` card with an `image_aspect`
/// image without stretching, cropping the overflow evenly on both sides.
fn cover_uv(image_aspect: f32, rect_aspect: f32) -> ([f32; 2], [f32; 2]) {
    if !(image_aspect > 0.0 && rect_aspect > 0.0) {
        return ([0.0, 1.0], [0.0, 1.0]);
    }
    if image_aspect > rect_aspect {
        let span = rect_aspect / image_aspect;
        ([0.5 - span * 0.5, 0.5 + span * 0.5], [0.0, 1.0])
    } else {
        let span = image_aspect / rect_aspect;
        ([0.0, 1.0], [0.5 - span * 0.5, 0.5 + span * 0.5])
    }
}

/// Two triangles covering `rect`; the fragment shader clips the corners.
fn poster_quad(rect: &Rect, corner: f32, opacity: f32, image_aspect: f32) -> [PosterVertex; 6] {
    let half = [rect.width * 0.5, rect.height * 0.5];
    let style = [corner, opacity.clamp(0.0, 1.0)];
    let (us, vs) = cover_uv(image_aspect, rect.width / rect.height);
    let vertex = |u: f32, v: f32| PosterVertex {
        position: [rect.x + u * rect.width, rect.y + v * rect.height],
        uv: [us[0] + u * (us[1] - us[0]), vs[0] + v * (vs[1] - vs[0])],
        local: [(u - 0.5) * rect.width, (v - 0.5) * rect.height],
        half_size: half,
        style,
    };
    [
        vertex(0.0, 0.0),
        vertex(1.0, 0.0),
        vertex(0.0, 1.0),
        vertex(0.0, 1.0),
        vertex(1.0, 0.0),
        vertex(1.0, 1.0),
    ]
}

struct FrameBuffers {
    shape_vertices: Option<wgpu::Buffer>,
    shape_indices: Option<wgpu::Buffer>,
    posters: Option<wgpu::Buffer>,
    batches: Vec<Batch>,
}

/// Draws display lists onto the surface.
pub struct Canvas {
    shape_pipeline: wgpu::RenderPipeline,
    poster_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind: wgpu::BindGroup,
    poster_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Poster textures keyed by URL; mirrors the never-evicting image cache.
    textures: HashMap<String, wgpu::BindGroup>,
    frame: Option<FrameBuffers>,
    format: wgpu::TextureFormat,
}

impl Canvas {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shape_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("canvas-shapes"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/canvas.wgsl").into()),
        });
        let poster_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("canvas-posters"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/poster.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas-uniforms"),
            size: std::mem::size_of::<CanvasUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("canvas-uniform-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("canvas-uniform-bind"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let poster_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("canvas-poster-layout"),
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
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("canvas-poster-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let shape_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("canvas-shape-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let shape_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("canvas-shape-pipeline"),
            layout: Some(&shape_layout),
            vertex: wgpu::VertexState {
                module: &shape_shader,
                entry_point: Some("vs"),
                buffers: &[ColorVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shape_shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let poster_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("canvas-poster-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout, &poster_layout],
            push_constant_ranges: &[],
        });
        let poster_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("canvas-poster-pipeline"),
            layout: Some(&poster_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &poster_shader,
                entry_point: Some("vs"),
                buffers: &[PosterVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &poster_shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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

        Self {
            shape_pipeline,
            poster_pipeline,
            uniform_buffer,
            uniform_bind,
            poster_layout,
            sampler,
            textures: HashMap::new(),
            frame: None,
            format,
        }
    }

    /// Uploads this frame's geometry and any posters seen for the first time.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        list: &DrawList,
        logical_size: [f32; 2],
    ) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&CanvasUniforms::new(logical_size, self.format)),
        );

        let geometry = tessellate(list);
        for batch in &geometry.batches {
            if let Batch::Poster { image, .. } = batch
                && !self.textures.contains_key(&image.url)
            {
                let view = textures::upload_rgba(
                    device,
                    queue,
                    "canvas-poster",
                    image.width,
                    image.height,
                    &image.pixels,
                    wgpu::TextureFormat::Rgba8UnormSrgb,
                );
                let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("canvas-poster-bind"),
                    layout: &self.poster_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                });
                debug!(url = %image.url, width = image.width, height = image.height, textures = self.textures.len() + 1, "poster_texture_uploaded");
                self.textures.insert(image.url.clone(), bind);
            }
        }

        let shape_vertices = (!geometry.shapes.vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("canvas-shape-vertices"),
                contents: bytemuck::cast_slice(&geometry.shapes.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let shape_indices = (!geometry.shapes.indices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("canvas-shape-indices"),
                contents: bytemuck::cast_slice(&geometry.shapes.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        let posters = (!geometry.posters.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("canvas-poster-vertices"),
                contents: bytemuck::cast_slice(&geometry.posters),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        self.frame = Some(FrameBuffers {
            shape_vertices,
            shape_indices,
            posters,
            batches: geometry.batches,
        });
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(frame) = &self.frame else {
            return;
        };
        for batch in &frame.batches {
            match batch {
                Batch::Shapes { indices } => {
                    if let (Some(vertices), Some(index_buffer)) =
                        (&frame.shape_vertices, &frame.shape_indices)
                    {
                        pass.set_pipeline(&self.shape_pipeline);
                        pass.set_bind_group(0, &self.uniform_bind, &[]);
                        pass.set_vertex_buffer(0, vertices.slice(..));
                        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(indices.clone(), 0, 0..1);
                    }
                }
                Batch::Poster { image, vertices } => {
                    if let (Some(buffer), Some(bind)) = (&frame.posters, self.textures.get(&image.url)) {
                        pass.set_pipeline(&self.poster_pipeline);
                        pass.set_bind_group(0, &self.uniform_bind, &[]);
                        pass.set_bind_group(1, bind, &[]);
                        pass.set_vertex_buffer(0, buffer.slice(..));
                        pass.draw(vertices.clone(), 0..1);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DecodedImage;
    use std::sync::Arc;

    fn poster() -> ImageHandle {
        Arc::new(DecodedImage {
            url: "https://img/1.jpg".into(),
            width: 2,
            height: 3,
            pixels: vec![255; 2 * 3 * 4],
        })
    }

    #[test]
    fn batches_keep_list_order() {
        let mut list = DrawList::new([0.0; 4]);
        list.circle([10.0, 10.0], 4.0, [1.0; 4]);
        list.line([0.0, 0.0], [20.0, 0.0], 2.0, [1.0; 4]);
        list.push(DrawCmd::Image {
            rect: Rect::centered([50.0, 50.0], 20.0, 30.0),
            corner: 4.0,
            image: poster(),
            opacity: 0.8,
        });
        list.push(DrawCmd::RoundRect {
            rect: Rect::centered([50.0, 50.0], 20.0, 30.0),
            corner: 4.0,
            fill: [0.0; 4],
            stroke: Some((2.0, [1.0; 4])),
        });

        let geometry = tessellate(&list);
        assert_eq!(geometry.batches.len(), 3);
        let Batch::Shapes { indices: first } = &geometry.batches[0] else {
            panic!("expected shapes first");
        };
        assert_eq!(first.start, 0);
        assert!(matches!(geometry.batches[1], Batch::Poster { ref vertices, .. } if *vertices == (0..6)));
        let Batch::Shapes { indices: last } = &geometry.batches[2] else {
            panic!("expected outline last");
        };
        assert_eq!(first.end, last.start);
        assert_eq!(last.end as usize, geometry.shapes.indices.len());
    }

    #[test]
    fn circle_stays_within_radius() {
        let mut list = DrawList::new([0.0; 4]);
        list.circle([100.0, 50.0], 10.0, [0.5, 0.5, 0.5, 1.0]);
        let geometry = tessellate(&list);
        assert!(!geometry.shapes.indices.is_empty());
        for v in &geometry.shapes.vertices {
            let dx = v.position[0] - 100.0;
            let dy = v.position[1] - 50.0;
            assert!((dx * dx + dy * dy).sqrt() <= 10.0 + TOLERANCE);
            assert_eq!(v.color, [0.5, 0.5, 0.5, 1.0]);
        }
    }

    #[test]
    fn poster_quad_covers_rect() {
        let rect = Rect::centered([0.0, 0.0], 40.0, 60.0);
        let quad = poster_quad(&rect, 6.0, 2.0, 40.0 / 60.0);
        let xs: Vec<f32> = quad.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -20.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 20.0);
        assert!(quad.iter().all(|v| v.half_size == [20.0, 30.0] && v.style == [6.0, 1.0]));
        assert_eq!(quad[5].local, [20.0, 30.0]);
        assert_eq!(quad[0].uv, [0.0, 0.0]);
        assert_eq!(quad[5].uv, [1.0, 1.0]);
    }

    #[test]
    fn wide_poster_is_cropped_not_stretched() {
        // 2:1 image on a 1:2 card keeps the middle quarter of its width.
        let (us, vs) = cover_uv(2.0, 0.5);
        assert_eq!(vs, [0.0, 1.0]);
        assert!((us[0] - 0.375).abs() < 1e-6 && (us[1] - 0.625).abs() < 1e-6);

        let (us, vs) = cover_uv(0.5, 1.0);
        assert_eq!(us, [0.0, 1.0]);
        assert!((vs[0] - 0.25).abs() < 1e-6 && (vs[1] - 0.75).abs() < 1e-6);

        assert_eq!(cover_uv(0.0, 1.0), ([0.0, 1.0], [0.0, 1.0]));
    }

    #[test]
    fn tessellated_poster_uses_image_aspect() {
        let mut list = DrawList::new([0.0; 4]);
        // poster() is 2x3, drawn on a square card.
        list.push(DrawCmd::Image {
            rect: Rect::centered([0.0, 0.0], 30.0, 30.0),
            corner: 0.0,
            image: poster(),
            opacity: 1.0,
        });
        let geometry = tessellate(&list);
        let vs: Vec<f32> = geometry.posters.iter().map(|v| v.uv[1]).collect();
        let lo = vs.iter().cloned().fold(f32::MAX, f32::min);
        let hi = vs.iter().cloned().fold(f32::MIN, f32::max);
        assert!((hi - lo - 2.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn empty_list_has_no_geometry() {
        let geometry = tessellate(&DrawList::new([0.0; 4]));
        assert!(geometry.batches.is_empty());
        assert!(geometry.shapes.vertices.is_empty());
        assert!(geometry.posters.is_empty());
        assert_eq!(ColorVertex::default().color, [0.0; 4]);
    }

    #[test]
    fn canvas_encodes_only_for_linear_targets() {
        let srgb = CanvasUniforms::new([800.0, 600.0], wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(srgb.encode_srgb, 0);
        let raw = CanvasUniforms::new([0.0, 600.0], wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(raw.encode_srgb, 1);
        assert_eq!(raw.size, [1.0, 600.0]);
        assert_eq!(std::mem::size_of::<CanvasUniforms>(), 16);
    }

    #[test]
    fn transparent_fill_without_stroke_is_skipped() {
        let mut list = DrawList::new([0.0; 4]);
        list.push(DrawCmd::RoundRect {
            rect: Rect::centered([0.0, 0.0], 10.0, 10.0),
            corner: 2.0,
            fill: [1.0, 1.0, 1.0, 0.0],
            stroke: None,
        });
        assert!(tessellate(&list).batches.is_empty());
    }
}
