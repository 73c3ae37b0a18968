//! Application runner and event loop.

use std::time::Instant;

use ash::vk;
use lantern_gpu::{GpuConfig, GpuContextBuilder, GpuError, Recreation};
use lantern_platform::{PlatformConfig, PlatformWindow};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::LanternApp;
use crate::context::AppContext;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title, also reported to the driver as the application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// GPU negotiation settings.
    pub gpu: GpuConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Lantern".to_string(),
            width: 800,
            height: 600,
            gpu: GpuConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Replace the GPU configuration.
    pub fn with_gpu_config(mut self, gpu: GpuConfig) -> Self {
        self.gpu = gpu;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.gpu = self.gpu.with_validation(validation);
        self
    }

    /// Set the preferred present mode.
    pub fn with_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.gpu = self.gpu.with_present_mode(mode);
        self
    }

    /// Window settings derived from this config.
    pub fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            ..Default::default()
        }
    }
}

/// Initialize the global tracing subscriber (`RUST_LOG`, default `info`).
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// Run a `LanternApp` with the given configuration.
///
/// Initializes logging, opens the window, negotiates the GPU and runs the
/// event loop until the window closes. A failure during setup is returned
/// once the loop exits.
pub fn run_app<A: LanternApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    init_logging();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        failure: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// How a frame error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorDisposition {
    /// The swapchain is stale; rebuild it next frame.
    Recreate,
    /// Give up and exit.
    Fatal,
}

fn classify(error: &anyhow::Error) -> ErrorDisposition {
    match error.downcast_ref::<GpuError>() {
        Some(e) if e.is_recoverable() => ErrorDisposition::Recreate,
        _ => ErrorDisposition::Fatal,
    }
}

/// Event loop pacing.
///
/// Polls while frames can be drawn and blocks on events while swapchain
/// recreation is deferred on a zero-sized window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Pacing {
    deferred: bool,
}

impl Pacing {
    fn on_recreation(&mut self, outcome: Recreation) {
        self.deferred = outcome == Recreation::Deferred;
    }

    fn on_resized(&mut self) {
        self.deferred = false;
    }

    const fn control_flow(self) -> ControlFlow {
        if self.deferred {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        }
    }
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner<A: LanternApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    failure: Option<anyhow::Error>,
}

/// Internal application state.
struct AppState<A: LanternApp> {
    // Dropped before the context
    app: A,
    ctx: AppContext,
    pacing: Pacing,
}

impl<A: LanternApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let result = match &mut self.state {
                    Some(state) => state.frame(),
                    None => Ok(()),
                };
                if let Err(e) = result {
                    error!("Frame error: {e:#}");
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    debug!("Window resized to {}x{}", size.width, size.height);
                    state.ctx.gpu.notify_resized();
                    state.pacing.on_resized();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            let flow = state.pacing.control_flow();
            event_loop.set_control_flow(flow);
            if flow == ControlFlow::Poll {
                state.ctx.window.request_redraw();
            }
        }
    }
}

impl<A: LanternApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window = PlatformWindow::create(event_loop, &self.config.platform_config())?;

        let gpu = GpuContextBuilder::with_config(self.config.gpu.clone())
            .app_name(&self.config.title)
            .build(&window)?;

        info!("GPU: {}", gpu.device_name());

        let mut ctx = AppContext::new(window, gpu);
        let app = A::init(&mut ctx)?;

        Ok(AppState {
            app,
            ctx,
            pacing: Pacing::default(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        if let Some(mut state) = self.state.take() {
            state.cleanup();
        }
        self.failure.get_or_insert(error);
        event_loop.exit();
    }
}

impl<A: LanternApp> AppState<A> {
    fn frame(&mut self) -> anyhow::Result<()> {
        if self.ctx.gpu.needs_recreation() && !self.recreate_swapchain()? {
            return Ok(());
        }

        let now = Instant::now();
        let dt = now.duration_since(self.ctx.last_frame_time).as_secs_f32();
        self.ctx.last_frame_time = now;

        self.app.update(&self.ctx, dt);

        if let Err(e) = self.app.render(&mut self.ctx) {
            match classify(&e) {
                ErrorDisposition::Recreate => {
                    debug!("Presentation needs a new swapchain: {e}");
                    self.ctx.gpu.notify_resized();
                }
                ErrorDisposition::Fatal => return Err(e),
            }
        }

        self.ctx.frame_count += 1;
        Ok(())
    }

    /// Rebuild the swapchain. Returns whether a chain is active afterwards.
    fn recreate_swapchain(&mut self) -> anyhow::Result<bool> {
        let framebuffer = self.ctx.framebuffer_size();
        let outcome = self.ctx.gpu.recreate_swapchain(framebuffer)?;
        self.pacing.on_recreation(outcome);
        match outcome {
            Recreation::Rebuilt => {
                self.app.on_swapchain_recreated(&mut self.ctx)?;
                Ok(true)
            }
            Recreation::Deferred => Ok(false),
        }
    }

    fn cleanup(&mut self) {
        info!("Starting cleanup...");
        if let Err(e) = self.ctx.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);

        if self.ctx.frame_count > 0 {
            info!("Total frames: {}", self.ctx.frame_count);
        }
        info!("Cleanup complete");
    }
}
