pub mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key as WinitKey, NamedKey},
    window::{Window, WindowAttributes},
};

use crate::{
    cache::ImageCache,
    catalog::CatalogSnapshot,
    config::Configuration,
    events::{CatalogCommand, ViewerCommand},
    gpu::Renderer,
    render::{
        InputEvent, Key, RenderResult, explore::ExploreScene, frame::RenderLoop,
        landing::LandingScene,
    },
    resize::ResizeController,
};
use state::{ViewerSM, ViewerState};

/// Logical pixels per wheel "line", roughly what browsers report.
const WHEEL_LINE_PX: f32 = 40.0;
/// Wake-up period while the scene reports nothing to animate.
const IDLE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

/// Everything the viewer shares with the async side.
pub struct ViewerLinks {
    pub cache: ImageCache,
    pub catalog: watch::Receiver<CatalogSnapshot>,
    pub catalog_commands: mpsc::Sender<CatalogCommand>,
    pub control_tx: mpsc::Sender<ViewerCommand>,
    pub control_rx: mpsc::Receiver<ViewerCommand>,
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    renderer: Option<Renderer>,
    render: RenderLoop,
    resize: ResizeController,
    sm: ViewerSM,
    cache: Option<ImageCache>,
    catalog: watch::Receiver<CatalogSnapshot>,
    catalog_commands: mpsc::Sender<CatalogCommand>,
    control: mpsc::Receiver<ViewerCommand>,
    cursor: PhysicalPosition<f64>,
    title: Option<String>,
    pending_redraw: bool,
}

impl ViewerApp {
    fn new(cfg: Configuration, cancel: CancellationToken, links: ViewerLinks) -> Self {
        let navigate = links.control_tx.clone();
        let landing = LandingScene::new(&cfg, Some(links.catalog_commands.clone()), move || {
            if let Err(err) = navigate.try_send(ViewerCommand::Navigate) {
                warn!(error = %err, "failed to signal navigation");
            }
        });
        let render = RenderLoop::new(Box::new(landing), cfg.viewer.max_frame_dt);
        let resize = ResizeController::new(cfg.viewer.max_pixel_ratio);
        let sm = ViewerSM::new(cfg.viewer.navigate_delay, Instant::now());
        Self {
            cfg,
            cancel,
            window: None,
            surface: None,
            surface_config: None,
            device: None,
            queue: None,
            renderer: None,
            render,
            resize,
            sm,
            cache: Some(links.cache),
            catalog: links.catalog,
            catalog_commands: links.catalog_commands,
            control: links.control_rx,
            cursor: PhysicalPosition::new(0.0, 0.0),
            title: None,
            pending_redraw: false,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default().with_title(self.cfg.viewer.title.clone());
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("nanimo-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let renderer = Renderer::new(&device, &queue, format, &self.cfg.shader);

        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.device = Some(device);
        self.queue = Some(queue);
        self.renderer = Some(renderer);
        self.handle_resize(size, window.scale_factor());
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>, scale_factor: f64) {
        let (Some(surface), Some(device), Some(queue), Some(config)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.surface_config.as_mut(),
        ) else {
            return;
        };

        config.width = new_size.width.max(1);
        config.height = new_size.height.max(1);
        surface.configure(device, config);
        debug!(
            width = config.width,
            height = config.height,
            "viewer surface resized",
        );

        if self.resize.on_resize(new_size, scale_factor).is_some()
            && let Some(viewport) = self.resize.take_layout()
        {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.resize(device, queue, &viewport);
            }
            self.render.handle_resize(viewport);
            info!(
                logical_width = viewport.logical_width,
                logical_height = viewport.logical_height,
                pixel_ratio = viewport.pixel_ratio,
                backing_width = viewport.backing_width,
                backing_height = viewport.backing_height,
                "viewport_changed"
            );
        }

        self.request_redraw();
    }

    fn handle_input(&mut self, event: InputEvent) {
        if self.render.handle_input(event, Instant::now()) == RenderResult::NeedsRedraw {
            self.request_redraw();
        }
    }

    fn logical_cursor(&self) -> (f32, f32) {
        let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
        let logical = self.cursor.to_logical::<f64>(scale);
        (logical.x as f32, logical.y as f32)
    }

    fn advance_state(&mut self, now: Instant) {
        while let Ok(cmd) = self.control.try_recv() {
            if let Some(change) = self.sm.on_command(&cmd, now) {
                info!(from = ?change.from, to = ?change.to, "viewer_state_changed");
            }
        }
        if let Some(change) = self.sm.on_tick(now) {
            info!(from = ?change.from, to = ?change.to, "viewer_state_changed");
            if change.to == ViewerState::Explore {
                self.enter_explore();
            }
        }
    }

    fn enter_explore(&mut self) {
        let Some(cache) = self.cache.take() else {
            warn!("explore scene already owns the image cache");
            return;
        };
        let explore = ExploreScene::new(
            &self.cfg,
            cache,
            self.catalog.clone(),
            Some(self.catalog_commands.clone()),
        );
        self.render.replace_scene(Box::new(explore));
    }

    fn sync_title(&mut self) {
        let title = self.render.scene().title();
        if title.is_some() && title != self.title {
            if let (Some(window), Some(text)) = (self.window.as_ref(), title.as_deref()) {
                window.set_title(text);
            }
            self.title = title;
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        self.advance_state(now);

        let Some(viewport) = self.resize.current() else {
            return;
        };
        let (Some(surface), Some(device), Some(queue), Some(window)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.window.clone(),
        ) else {
            return;
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.handle_resize(window.inner_size(), window.scale_factor());
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                self.pending_redraw = true;
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.handle_resize(window.inner_size(), window.scale_factor());
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let output = self.render.step(now);
        self.pending_redraw = output.result == RenderResult::NeedsRedraw
            || self.sm.current() == ViewerState::Navigating;

        if let Some(renderer) = self.renderer.as_mut() {
            let commands = renderer.render(device, queue, &view, &output, &viewport);
            queue.submit(std::iter::once(commands));
        }
        window.pre_present_notify();
        frame.present();
        self.sync_title();
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn map_key(event: &KeyEvent) -> Option<Key> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    match &event.logical_key {
        WinitKey::Named(NamedKey::Enter | NamedKey::Space) => Some(Key::Activate),
        WinitKey::Character(c) if c.eq_ignore_ascii_case("m") => Some(Key::ToggleMedia),
        _ => None,
    }
}

fn wheel_delta(delta: MouseScrollDelta, scale_factor: f64) -> f32 {
    // Positive means "scroll down", matching DOM wheel events.
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE_PX,
        MouseScrollDelta::PixelDelta(pos) => -(pos.to_logical::<f64>(scale_factor).y as f32),
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if matches!(cause, StartCause::ResumeTimeReached { .. }) {
            self.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.device.is_none()
            && let Err(err) = self.init_gpu(window)
        {
            error!(error = ?err, "failed to initialize GPU state");
            event_loop.exit();
            return;
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size, window.scale_factor());
            }
            WindowEvent::ScaleFactorChanged {
                scale_factor,
                mut inner_size_writer,
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size, scale_factor);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                let (x, y) = self.logical_cursor();
                self.handle_input(InputEvent::PointerMoved { x, y });
            }
            WindowEvent::CursorLeft { .. } => {
                self.handle_input(InputEvent::PointerLeft);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let (x, y) = self.logical_cursor();
                let event = match state {
                    ElementState::Pressed => InputEvent::PointerDown { x, y },
                    ElementState::Released => InputEvent::PointerUp { x, y },
                };
                self.handle_input(event);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = wheel_delta(delta, window.scale_factor());
                self.handle_input(InputEvent::Wheel { delta });
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = map_key(&event) {
                    self.handle_input(InputEvent::Key(key));
                }
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.pending_redraw {
            event_loop.set_control_flow(ControlFlow::Wait);
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        } else {
            // Catalog and poster results arrive without window events.
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + IDLE_POLL));
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Runs the window on the calling thread until it closes or `cancel` fires.
pub fn run_windowed(cfg: Configuration, cancel: CancellationToken, links: ViewerLinks) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, links);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_lines_scale_to_pixels() {
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, -1.0), 1.0), WHEEL_LINE_PX);
        let px = MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 60.0));
        assert_eq!(wheel_delta(px, 2.0), -30.0);
    }
}
