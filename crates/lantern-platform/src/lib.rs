//! Windowing integration for the Lantern renderer.
//!
//! Wraps a winit window so the GPU layer can ask it for instance
//! extensions, a presentation surface and its framebuffer size.

use ash::vk;
use lantern_gpu::surface::{create_surface_for, required_extensions_for};
use lantern_gpu::WindowSurface;
use std::ffi::CStr;
use std::sync::Arc;
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Lantern".to_string(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

impl PlatformConfig {
    /// Window attributes for this configuration.
    pub fn window_attributes(&self) -> winit::window::WindowAttributes {
        Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// A winit window usable as a presentation target.
#[derive(Debug, Clone)]
pub struct PlatformWindow {
    window: Arc<Window>,
}

impl PlatformWindow {
    /// Open a window on a running event loop.
    pub fn create(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Result<Self> {
        let window = event_loop
            .create_window(config.window_attributes())
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

        tracing::debug!(
            "Window created: {} ({}x{})",
            config.title,
            config.width,
            config.height
        );

        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// Wrap an existing window.
    pub fn from_window(window: Arc<Window>) -> Self {
        Self { window }
    }

    /// Get the underlying window.
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Ask the window for a redraw.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl WindowSurface for PlatformWindow {
    fn required_instance_extensions(&self) -> lantern_gpu::Result<Vec<&'static CStr>> {
        required_extensions_for(self.window.as_ref())
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> lantern_gpu::Result<vk::SurfaceKHR> {
        // SAFETY: forwarded to the caller
        unsafe { create_surface_for(entry, instance, self.window.as_ref()) }
    }

    fn framebuffer_size(&self) -> vk::Extent2D {
        to_extent(self.window.inner_size())
    }
}

/// Convert a physical window size to a Vulkan extent.
pub fn to_extent(size: PhysicalSize<u32>) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}
