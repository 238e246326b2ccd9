//! wgpu passes that turn a [`FrameOutput`] into pixels.

pub mod bloom;
pub mod canvas;
pub mod lensing;
pub mod overlay;
pub mod textures;

use crate::config::ShaderConfig;
use crate::render::draw_list::Rgba;
use crate::render::frame::FrameOutput;
use crate::resize::Viewport;

use bloom::BloomPass;
use canvas::Canvas;
use lensing::LensPass;
use overlay::OverlayPass;
use textures::LensTextures;

pub struct Renderer {
    lens: LensPass,
    bloom: BloomPass,
    overlay: OverlayPass,
    canvas: Canvas,
}

impl Renderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        shader: &ShaderConfig,
    ) -> Self {
        let lens_textures = LensTextures::load(shader);
        Self {
            lens: LensPass::new(device, queue, format, &lens_textures),
            bloom: BloomPass::new(device, format, &shader.bloom),
            overlay: OverlayPass::new(device, format),
            canvas: Canvas::new(device, format),
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, viewport: &Viewport) {
        let (width, height) = (viewport.backing_width, viewport.backing_height);
        self.lens.resize(device, width, height);
        if let Some(source) = self.lens.target_view() {
            self.bloom.resize(device, queue, source, width, height);
        }
    }

    /// Encodes one frame: lensing backdrop and its glow, warp overlay, then
    /// the display list.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        frame: &FrameOutput,
        viewport: &Viewport,
    ) -> wgpu::CommandBuffer {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("nanimo-frame"),
        });

        let lens_ready = frame
            .backdrop
            .lens
            .as_ref()
            .is_some_and(|uniforms| self.lens.render(queue, &mut encoder, uniforms));
        let bloom_ready = lens_ready && self.bloom.render(&mut encoder);
        if let Some(overlay) = &frame.backdrop.overlay {
            self.overlay.prepare(queue, overlay);
        }
        self.canvas.prepare(
            device,
            queue,
            &frame.draw_list,
            [viewport.logical_width, viewport.logical_height],
        );

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("nanimo-surface"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(frame.draw_list.clear_color())),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if lens_ready {
                self.lens.blit(&mut pass);
            }
            if bloom_ready {
                self.bloom.composite(&mut pass);
            }
            if frame.backdrop.overlay.is_some() {
                self.overlay.draw(&mut pass);
            }
            self.canvas.draw(&mut pass);
        }

        encoder.finish()
    }
}

fn to_wgpu_color(color: Rgba) -> wgpu::Color {
    wgpu::Color {
        r: color[0] as f64,
        g: color[1] as f64,
        b: color[2] as f64,
        a: color[3] as f64,
    }
}
