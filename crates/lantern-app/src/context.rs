//! Application context.

use std::time::Instant;

use ash::vk;
use lantern_gpu::{GpuContext, WindowSurface};
use lantern_platform::PlatformWindow;

/// Application context shared across all app methods.
pub struct AppContext {
    /// GPU context with device, queues and swapchain.
    ///
    /// Declared before the window so it drops first.
    pub gpu: GpuContext,
    /// The window the swapchain presents to.
    pub window: PlatformWindow,
    /// Total frames run.
    pub frame_count: u64,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    pub(crate) fn new(window: PlatformWindow, gpu: GpuContext) -> Self {
        Self {
            gpu,
            window,
            frame_count: 0,
            last_frame_time: Instant::now(),
        }
    }

    /// Current framebuffer size of the window.
    pub fn framebuffer_size(&self) -> vk::Extent2D {
        self.window.framebuffer_size()
    }

    /// Extent of the active swapchain, if there is one.
    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.gpu.swapchain().map(|chain| chain.extent())
    }
}
